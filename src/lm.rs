//! Language model seam.
//!
//! The real n-gram scorer is an external collaborator consumed through a
//! small capability set: a begin state and a `score(state, word)` step.
//! States must be cheap to clone and hashable, because the beam decoder
//! merges hypotheses on `(trie node, LM state, last token, blank flag)`.
//!
//! Two stub backends live here: [`UniformLm`] for flat scoring and
//! [`TableLm`] with explicit unigram/bigram tables, enough to drive the
//! decoder and the sentence corrector in tests.

use std::collections::HashMap;
use std::sync::Arc;

/// Reserved LM vocabulary index for unknown words.
pub const LM_UNK: usize = 0;

/// Opaque, hashable language-model context.
///
/// Backends encode whatever context they need as a word-id sequence; the
/// decoder only clones, compares and hashes it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LmState {
    words: Arc<[u32]>,
}

impl LmState {
    /// The empty (context-free) state.
    pub fn empty() -> Self {
        Self {
            words: Vec::new().into(),
        }
    }

    /// Builds a state from explicit context word ids.
    pub fn from_words(words: &[u32]) -> Self {
        Self {
            words: words.to_vec().into(),
        }
    }

    /// The backend-defined context word ids.
    pub fn words(&self) -> &[u32] {
        &self.words
    }
}

/// Capability set of an n-gram language model.
pub trait LanguageModel: Send + Sync {
    /// State at the beginning of a sentence.
    fn begin_state(&self) -> LmState;

    /// Scores `word` (an index in the LM's own vocabulary) given `state`,
    /// returning the advanced state and the log-probability.
    fn score(&self, state: &LmState, word: usize) -> (LmState, f32);

    /// Maps a surface word to the LM's vocabulary index. Unknown words
    /// map to [`LM_UNK`].
    fn index(&self, word: &str) -> usize;
}

/// Context-free language model assigning every word the same score.
#[derive(Debug, Clone)]
pub struct UniformLm {
    log_prob: f32,
}

impl UniformLm {
    /// Creates a uniform model with the given per-word log-probability.
    pub fn new(log_prob: f32) -> Self {
        Self { log_prob }
    }
}

impl LanguageModel for UniformLm {
    fn begin_state(&self) -> LmState {
        LmState::empty()
    }

    fn score(&self, _state: &LmState, _word: usize) -> (LmState, f32) {
        (LmState::empty(), self.log_prob)
    }

    fn index(&self, _word: &str) -> usize {
        LM_UNK
    }
}

/// Bigram table language model built from explicit entries.
///
/// Vocabulary index 0 is `<unk>`, index 1 is `<s>`. Scoring looks up the
/// bigram `(context, word)` first, then the word's unigram, then the
/// default score.
#[derive(Debug, Clone)]
pub struct TableLm {
    words: Vec<String>,
    ids: HashMap<String, u32>,
    unigrams: HashMap<u32, f32>,
    bigrams: HashMap<(u32, u32), f32>,
    default_score: f32,
}

/// Sentence-start symbol of [`TableLm`].
pub const BOS_WORD: &str = "<s>";

impl TableLm {
    /// Creates an empty table with the given fallback score.
    pub fn new(default_score: f32) -> Self {
        let mut lm = Self {
            words: Vec::new(),
            ids: HashMap::new(),
            unigrams: HashMap::new(),
            bigrams: HashMap::new(),
            default_score,
        };
        lm.intern("<unk>");
        lm.intern(BOS_WORD);
        lm
    }

    fn intern(&mut self, word: &str) -> u32 {
        if let Some(&id) = self.ids.get(word) {
            return id;
        }
        let id = self.words.len() as u32;
        self.words.push(word.to_string());
        self.ids.insert(word.to_string(), id);
        id
    }

    /// Adds a unigram log-probability.
    pub fn with_unigram(mut self, word: &str, log_prob: f32) -> Self {
        let id = self.intern(word);
        self.unigrams.insert(id, log_prob);
        self
    }

    /// Adds a bigram log-probability. Use [`BOS_WORD`] as the context for
    /// sentence-initial words.
    pub fn with_bigram(mut self, context: &str, word: &str, log_prob: f32) -> Self {
        let ctx = self.intern(context);
        let id = self.intern(word);
        self.bigrams.insert((ctx, id), log_prob);
        self
    }
}

impl LanguageModel for TableLm {
    fn begin_state(&self) -> LmState {
        LmState::from_words(&[self.ids[BOS_WORD]])
    }

    fn score(&self, state: &LmState, word: usize) -> (LmState, f32) {
        let id = word as u32;
        let context = state.words().last().copied();

        let log_prob = context
            .and_then(|ctx| self.bigrams.get(&(ctx, id)))
            .or_else(|| self.unigrams.get(&id))
            .copied()
            .unwrap_or(self.default_score);

        (LmState::from_words(&[id]), log_prob)
    }

    fn index(&self, word: &str) -> usize {
        self.ids.get(word).map(|&id| id as usize).unwrap_or(LM_UNK)
    }
}
