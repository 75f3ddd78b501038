//! Lexicon- and language-model-constrained CTC beam search decoding.
//!
//! [`CtcDecoder`] owns the token and word dictionaries, the smeared
//! lexicon trie and the language model. It is read-only after
//! construction and may be shared by any number of streams; every decode
//! call owns its own beam arena.

mod beam;

use crate::config::DecoderConfig;
use crate::defaults::{BLANK_TOKEN, EOS_TOKEN, PAD_TOKEN, SIL_TOKEN, SOS_TOKEN};
use crate::dict::{Lexicon, TokenDictionary, WordDictionary};
use crate::error::Result;
use crate::lm::LanguageModel;
use crate::model::Logits;
use crate::trie::Trie;
use std::sync::Arc;

/// One decoded hypothesis.
#[derive(Debug, Clone, PartialEq)]
pub struct CtcHypothesis {
    /// Raw per-timestep token indices, blanks included.
    pub tokens: Vec<usize>,
    /// Emitted word indices, in order.
    pub words: Vec<usize>,
    /// Joint acoustic + language-model score.
    pub score: f32,
}

/// Beam-search options resolved from [`DecoderConfig`].
#[derive(Debug, Clone)]
pub(crate) struct BeamOptions {
    pub nbest: usize,
    pub beam_size: usize,
    /// `None` means consider every token at each step.
    pub beam_size_token: Option<usize>,
    pub beam_threshold: f32,
    pub lm_weight: f32,
    pub word_score: f32,
    pub unk_score: f32,
    pub sil_score: f32,
    pub log_add: bool,
}

/// Lexicon-constrained CTC beam decoder.
pub struct CtcDecoder {
    opts: BeamOptions,
    tokens: TokenDictionary,
    words: WordDictionary,
    trie: Trie,
    lm: Arc<dyn LanguageModel>,
    /// Word-dictionary index to LM vocabulary index.
    lm_word_ids: Vec<usize>,
    blank_idx: usize,
    sil_idx: Option<usize>,
    unk_word_idx: Option<usize>,
}

impl CtcDecoder {
    /// Builds a decoder by loading the tokens and lexicon files named in
    /// `config`. The language model is injected by the caller; `lm_path`
    /// is the caller's concern.
    pub fn from_config(config: &DecoderConfig, lm: Arc<dyn LanguageModel>) -> Result<Self> {
        let tokens = TokenDictionary::from_path(&config.tokens_path)?;
        let lexicon = Lexicon::from_path(&config.lexicon_path)?;
        Self::from_parts(config, tokens, &lexicon, lm)
    }

    /// Builds a decoder from already-loaded parts.
    pub fn from_parts(
        config: &DecoderConfig,
        mut tokens: TokenDictionary,
        lexicon: &Lexicon,
        lm: Arc<dyn LanguageModel>,
    ) -> Result<Self> {
        let words = WordDictionary::from_lexicon(lexicon, &config.unk_word);

        let blank_idx = match tokens.index(&config.blank_token) {
            Some(idx) => idx,
            None => {
                eprintln!(
                    "cuedec: blank token '{}' not found in vocabulary, using index 0",
                    config.blank_token
                );
                0
            }
        };
        let sil_idx = tokens.index(&config.sil_token);
        let unk_word_idx = words.index(&config.unk_word);

        let default_idx = tokens
            .index(&config.blank_token)
            .or_else(|| tokens.index(&config.unk_word))
            .unwrap_or(0);
        tokens.set_default_index(default_idx);

        // Build and smear the lexicon trie. The prior stored at each
        // terminal is the word's sentence-initial LM score.
        let mut trie = Trie::new();
        let begin = lm.begin_state();
        let mut lm_word_ids = vec![0usize; words.len()];
        for (word, spellings) in lexicon.iter() {
            let word_idx = words
                .index(word)
                .expect("lexicon word missing from word dictionary");
            let lm_word = lm.index(word);
            lm_word_ids[word_idx] = lm_word;
            let (_, prior) = lm.score(&begin, lm_word);

            for spelling in spellings {
                let mut spelling_idxs = Vec::with_capacity(spelling.len());
                let mut complete = true;
                for token in spelling {
                    match tokens.index(token) {
                        Some(idx) => spelling_idxs.push(idx),
                        None => {
                            eprintln!(
                                "cuedec: lexicon token '{}' not found in vocabulary, \
                                 skipping one spelling of '{}'",
                                token, word
                            );
                            complete = false;
                            break;
                        }
                    }
                }
                if complete && !spelling_idxs.is_empty() {
                    trie.insert(&spelling_idxs, word_idx, prior);
                }
            }
        }
        trie.smear();

        if let Some(unk_idx) = unk_word_idx {
            lm_word_ids[unk_idx] = lm.index(&config.unk_word);
        }

        let beam_size_token = if config.beam_size_token > 0 {
            Some(config.beam_size_token as usize)
        } else {
            None
        };

        Ok(Self {
            opts: BeamOptions {
                nbest: config.nbest.max(1),
                beam_size: config.beam_size.max(1),
                beam_size_token,
                beam_threshold: config.beam_threshold,
                lm_weight: config.lm_weight,
                word_score: config.word_score,
                unk_score: config.unk_score,
                sil_score: config.sil_score,
                log_add: config.log_add,
            },
            tokens,
            words,
            trie,
            lm,
            lm_word_ids,
            blank_idx,
            sil_idx,
            unk_word_idx,
        })
    }

    /// Decodes raw logits: applies a row-wise log-softmax first.
    pub fn decode(&self, logits: &Logits) -> Vec<CtcHypothesis> {
        if logits.is_empty() {
            return Vec::new();
        }
        self.decode_log_probs(&logits.log_softmax())
    }

    /// Decodes a `[T × V]` log-probability matrix into up to `nbest`
    /// hypotheses, best first. Empty input yields an empty list.
    pub fn decode_log_probs(&self, log_probs: &Logits) -> Vec<CtcHypothesis> {
        if log_probs.is_empty() {
            return Vec::new();
        }
        self.run_beam_search(log_probs)
    }

    /// Converts a raw token path to user-visible phoneme strings:
    /// drops the leading and trailing surrogate markers, removes special
    /// tokens, collapses adjacent duplicates and trims trailing silence.
    pub fn idxs_to_tokens(&self, indices: &[usize]) -> Vec<String> {
        let mut tokens: Vec<&str> = indices
            .iter()
            .map(|&idx| self.tokens.entry(idx).unwrap_or(""))
            .collect();

        if tokens.len() >= 2 {
            tokens.remove(0);
            tokens.pop();
        }

        let mut deduped: Vec<String> = Vec::with_capacity(tokens.len());
        for token in tokens {
            if token.is_empty() {
                continue;
            }
            if token == BLANK_TOKEN || token == PAD_TOKEN || token == SOS_TOKEN || token == EOS_TOKEN
            {
                continue;
            }
            if deduped.last().map(String::as_str) != Some(token) {
                deduped.push(token.to_string());
            }
        }

        while deduped.last().map(String::as_str) == Some(SIL_TOKEN) {
            deduped.pop();
        }

        deduped
    }

    /// Word strings for a hypothesis' word indices.
    pub fn word_strings(&self, hyp: &CtcHypothesis) -> Vec<String> {
        hyp.words
            .iter()
            .filter_map(|&idx| self.words.entry(idx))
            .map(str::to_string)
            .collect()
    }

    /// Vocabulary size.
    pub fn vocab_size(&self) -> usize {
        self.tokens.len()
    }

    /// Exact token lookup.
    pub fn token_to_idx(&self, token: &str) -> Option<usize> {
        self.tokens.index(token)
    }

    /// Token string at `idx`.
    pub fn idx_to_token(&self, idx: usize) -> Option<&str> {
        self.tokens.entry(idx)
    }

    /// Word string at `idx`.
    pub fn word_entry(&self, idx: usize) -> Option<&str> {
        self.words.entry(idx)
    }

    pub(crate) fn opts(&self) -> &BeamOptions {
        &self.opts
    }

    pub(crate) fn trie(&self) -> &Trie {
        &self.trie
    }

    pub(crate) fn lm(&self) -> &Arc<dyn LanguageModel> {
        &self.lm
    }

    pub(crate) fn lm_word_id(&self, word_idx: usize) -> usize {
        self.lm_word_ids.get(word_idx).copied().unwrap_or(0)
    }

    pub(crate) fn blank_idx(&self) -> usize {
        self.blank_idx
    }

    pub(crate) fn sil_idx(&self) -> Option<usize> {
        self.sil_idx
    }

    pub(crate) fn unk_word_idx(&self) -> Option<usize> {
        self.unk_word_idx
    }
}
