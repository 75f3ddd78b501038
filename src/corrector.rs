//! Homophone-aware sentence correction.
//!
//! Lifts a LIAPHON phoneme sequence to a natural-language sentence: the
//! phonemes become an IPA string, the IPA word-tokens are expanded into
//! their homophone candidates, and a word-level beam search over the
//! language model picks the best spelling sequence.
//!
//! Correction degrades gracefully: an uninitialized corrector refuses to
//! run and the caller falls back to raw phonemes.

use crate::defaults::DEFAULT_CORRECTOR_BEAM_WIDTH;
use crate::error::{CuedecError, Result};
use crate::lm::{LanguageModel, LmState};
use crate::phonemes::liaphon_to_ipa;
use serde::Deserialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One line of the homophones file.
#[derive(Debug, Deserialize)]
struct HomophoneEntry {
    ipa: String,
    #[serde(default)]
    words: Vec<String>,
}

/// Word-level homophone disambiguator.
pub struct SentenceCorrector {
    homophones_path: PathBuf,
    lm: Arc<dyn LanguageModel>,
    homophones: HashMap<String, Vec<String>>,
    beam_width: usize,
    initialized: bool,
}

impl SentenceCorrector {
    /// Creates a corrector over a homophones file and a word-level
    /// language model. Call [`SentenceCorrector::initialize`] before use.
    pub fn new(homophones_path: impl Into<PathBuf>, lm: Arc<dyn LanguageModel>) -> Self {
        Self {
            homophones_path: homophones_path.into(),
            lm,
            homophones: HashMap::new(),
            beam_width: DEFAULT_CORRECTOR_BEAM_WIDTH,
            initialized: false,
        }
    }

    /// Overrides the beam width.
    pub fn with_beam_width(mut self, beam_width: usize) -> Self {
        self.beam_width = beam_width.max(1);
        self
    }

    /// Loads the homophones file: one JSON object per line with an
    /// `"ipa"` key and optional `"words"`. An entry without words maps
    /// to its own IPA string. Unparseable lines are skipped.
    pub fn initialize(&mut self) -> Result<()> {
        self.homophones.clear();
        self.initialized = false;

        let contents =
            fs::read_to_string(&self.homophones_path).map_err(|e| CuedecError::HomophonesLoad {
                path: self.homophones_path.display().to_string(),
                message: e.to_string(),
            })?;

        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let Ok(entry) = serde_json::from_str::<HomophoneEntry>(line) else {
                continue;
            };
            let words = if entry.words.is_empty() {
                vec![entry.ipa.clone()]
            } else {
                entry.words
            };
            self.homophones.insert(entry.ipa, words);
        }

        self.initialized = true;
        Ok(())
    }

    /// Loads homophones from an already-parsed mapping. Used by tests
    /// and embedders that manage the file themselves.
    pub fn with_homophones(mut self, homophones: HashMap<String, Vec<String>>) -> Self {
        self.homophones = homophones;
        self.initialized = true;
        self
    }

    /// Returns true once the homophones are loaded.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// The homophones file this corrector reads.
    pub fn homophones_path(&self) -> &Path {
        &self.homophones_path
    }

    /// Corrects a LIAPHON phoneme sequence into a sentence.
    ///
    /// Returns `None` when the corrector is uninitialized or the input
    /// produces no words; the caller keeps the raw phonemes.
    pub fn correct<S: AsRef<str>>(&self, liaphon: &[S]) -> Option<String> {
        if !self.initialized {
            return None;
        }

        let ipa_sentence = liaphon_to_ipa(liaphon);
        let mut ipa_tokens: Vec<&str> = ipa_sentence.split_whitespace().collect();
        if ipa_tokens.is_empty() && !ipa_sentence.is_empty() {
            ipa_tokens.push(&ipa_sentence);
        }
        if ipa_tokens.is_empty() {
            return None;
        }

        let candidate_lists: Vec<Vec<String>> = ipa_tokens
            .iter()
            .map(|&token| {
                self.homophones
                    .get(token)
                    .cloned()
                    .unwrap_or_else(|| vec![token.to_string()])
            })
            .collect();

        let best = self.beam_search(&candidate_lists)?;

        let mut sentence = best.join(" ");
        capitalize_in_place(&mut sentence);
        if !sentence.ends_with('.') {
            sentence.push('.');
        }
        Some(sentence)
    }

    /// Word-level beam search over homophone candidates.
    fn beam_search(&self, candidate_lists: &[Vec<String>]) -> Option<Vec<String>> {
        struct Beam {
            score: f32,
            state: LmState,
            words: Vec<String>,
        }

        let mut beams = vec![Beam {
            score: 0.0,
            state: self.lm.begin_state(),
            words: Vec::new(),
        }];

        for candidates in candidate_lists {
            let mut next: Vec<Beam> = Vec::with_capacity(beams.len() * candidates.len());
            for beam in &beams {
                for word in candidates {
                    let (state, delta) = self.lm.score(&beam.state, self.lm.index(word));
                    let mut words = beam.words.clone();
                    words.push(word.clone());
                    next.push(Beam {
                        score: beam.score + delta,
                        state,
                        words,
                    });
                }
            }

            if next.is_empty() {
                return None;
            }
            next.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
            next.truncate(self.beam_width);
            beams = next;
        }

        beams.into_iter().next().map(|b| b.words)
    }
}

/// Uppercases the first character of `text` in place.
fn capitalize_in_place(text: &mut String) {
    let Some(first) = text.chars().next() else {
        return;
    };
    let upper: String = first.to_uppercase().collect();
    text.replace_range(..first.len_utf8(), &upper);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lm::{BOS_WORD, TableLm, UniformLm};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn uniform_lm() -> Arc<dyn LanguageModel> {
        Arc::new(UniformLm::new(-1.0))
    }

    #[test]
    fn test_uninitialized_corrector_refuses() {
        let corrector = SentenceCorrector::new("/nonexistent.jsonl", uniform_lm());
        assert!(!corrector.is_initialized());
        assert!(corrector.correct(&["b", "o~"]).is_none());
    }

    #[test]
    fn test_initialize_missing_file_errors() {
        let mut corrector = SentenceCorrector::new("/nonexistent.jsonl", uniform_lm());
        let result = corrector.initialize();
        assert!(matches!(result, Err(CuedecError::HomophonesLoad { .. })));
        assert!(!corrector.is_initialized());
    }

    #[test]
    fn test_initialize_parses_jsonl() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"ipa": "sɛ", "words": ["c'est", "sait", "ses"]}}"#).unwrap();
        writeln!(file, r#"{{"ipa": "bɔ̃ʒuʁ", "words": ["bonjour"]}}"#).unwrap();
        writeln!(file, r#"{{"ipa": "wi"}}"#).unwrap();
        writeln!(file, "not json at all").unwrap();
        file.flush().unwrap();

        let mut corrector = SentenceCorrector::new(file.path(), uniform_lm());
        corrector.initialize().unwrap();
        assert!(corrector.is_initialized());
        assert_eq!(corrector.homophones.len(), 3);
        assert_eq!(corrector.homophones["wi"], vec!["wi".to_string()]);
    }

    #[test]
    fn test_correct_single_known_word() {
        let mut homophones = HashMap::new();
        homophones.insert("bɔ̃ʒuʁ".to_string(), vec!["bonjour".to_string()]);
        let corrector =
            SentenceCorrector::new("unused.jsonl", uniform_lm()).with_homophones(homophones);

        let sentence = corrector.correct(&["b", "o~", "z^", "u", "r"]).unwrap();
        assert_eq!(sentence, "Bonjour.");
    }

    #[test]
    fn test_correct_prefers_lm_choice() {
        let mut homophones = HashMap::new();
        homophones.insert(
            "sɛ".to_string(),
            vec!["c'est".to_string(), "sait".to_string(), "ses".to_string()],
        );

        let lm = TableLm::new(-10.0)
            .with_unigram("sait", -4.0)
            .with_unigram("ses", -4.5)
            .with_bigram(BOS_WORD, "c'est", -0.2);
        let corrector =
            SentenceCorrector::new("unused.jsonl", Arc::new(lm)).with_homophones(homophones);

        let sentence = corrector.correct(&["s", "e^"]).unwrap();
        assert_eq!(sentence, "C'est.");
    }

    #[test]
    fn test_correct_multiple_words_uses_context() {
        let mut homophones = HashMap::new();
        homophones.insert("sɛ".to_string(), vec!["c'est".to_string(), "sait".to_string()]);
        homophones.insert("bo".to_string(), vec!["beau".to_string()]);

        let lm = TableLm::new(-10.0)
            .with_bigram(BOS_WORD, "c'est", -0.2)
            .with_bigram("c'est", "beau", -0.1)
            .with_unigram("sait", -0.1);
        let corrector =
            SentenceCorrector::new("unused.jsonl", Arc::new(lm)).with_homophones(homophones);

        // "s e^ _ b o^" → "sɛ bo" → two tokens.
        let sentence = corrector.correct(&["s", "e^", "_", "b", "o^"]).unwrap();
        assert_eq!(sentence, "C'est beau.");
    }

    #[test]
    fn test_unknown_token_falls_back_to_itself() {
        let corrector =
            SentenceCorrector::new("unused.jsonl", uniform_lm()).with_homophones(HashMap::new());
        let sentence = corrector.correct(&["b", "u"]).unwrap();
        assert_eq!(sentence, "Bu.");
    }

    #[test]
    fn test_existing_period_not_duplicated() {
        let mut homophones = HashMap::new();
        homophones.insert("wi".to_string(), vec!["oui.".to_string()]);
        let corrector =
            SentenceCorrector::new("unused.jsonl", uniform_lm()).with_homophones(homophones);
        assert_eq!(corrector.correct(&["w", "i"]).unwrap(), "Oui.");
    }

    #[test]
    fn test_empty_input_yields_none() {
        let corrector =
            SentenceCorrector::new("unused.jsonl", uniform_lm()).with_homophones(HashMap::new());
        assert!(corrector.correct::<&str>(&[]).is_none());
    }

    #[test]
    fn test_beam_width_one_is_greedy() {
        let mut homophones = HashMap::new();
        homophones.insert("a".to_string(), vec!["à".to_string(), "a".to_string()]);
        let lm = TableLm::new(-10.0).with_unigram("à", -0.5).with_unigram("a", -1.5);
        let corrector = SentenceCorrector::new("unused.jsonl", Arc::new(lm))
            .with_homophones(homophones)
            .with_beam_width(1);
        assert_eq!(corrector.correct(&["a"]).unwrap(), "À.");
    }
}
