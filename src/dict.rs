//! Token and word dictionaries plus the lexicon file loader.
//!
//! The token dictionary is a bijection between a contiguous index range
//! and token strings, with `<BLANK>` pinned to index 0. The lexicon maps
//! words to one or more token spellings; the word dictionary indexes the
//! lexicon's words in file order.

use crate::defaults::{BLANK_TOKEN, SPECIAL_TOKENS, UNK_TOKEN};
use crate::error::{CuedecError, Result};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Vocabulary of model output tokens.
#[derive(Debug, Clone)]
pub struct TokenDictionary {
    entries: Vec<String>,
    index: HashMap<String, usize>,
    default_index: usize,
}

impl TokenDictionary {
    /// Loads a vocabulary file: one token per non-blank line, with
    /// `,;\t\r` treated as field separators (first field kept).
    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| CuedecError::TokensLoad {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let raw: Vec<String> = contents
            .lines()
            .filter_map(|line| {
                let field = line.split([',', ';', '\t', '\r']).next().unwrap_or("");
                let token = field.trim();
                if token.is_empty() {
                    None
                } else {
                    Some(token.to_string())
                }
            })
            .collect();

        Ok(Self::from_tokens(raw))
    }

    /// Builds a vocabulary from raw tokens: duplicates are dropped
    /// preserving first occurrence, the special tokens are inserted at
    /// the head when absent, and `<BLANK>` is forced to index 0.
    pub fn from_tokens<I>(tokens: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut entries: Vec<String> = Vec::new();
        let mut seen: HashMap<String, ()> = HashMap::new();
        for token in tokens {
            if seen.insert(token.clone(), ()).is_none() {
                entries.push(token);
            }
        }

        for &special in SPECIAL_TOKENS.iter().rev() {
            if !entries.iter().any(|t| t == special) {
                entries.insert(0, special.to_string());
            }
        }

        // Guarantee <BLANK> at index 0.
        if let Some(pos) = entries.iter().position(|t| t == BLANK_TOKEN) {
            if pos != 0 {
                let blank = entries.remove(pos);
                entries.insert(0, blank);
            }
        } else {
            entries.insert(0, BLANK_TOKEN.to_string());
        }

        let index = entries
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i))
            .collect();

        let mut dict = Self {
            entries,
            index,
            default_index: 0,
        };
        dict.default_index = dict
            .index(BLANK_TOKEN)
            .or_else(|| dict.index(UNK_TOKEN))
            .unwrap_or(0);
        dict
    }

    /// Exact lookup.
    pub fn index(&self, token: &str) -> Option<usize> {
        self.index.get(token).copied()
    }

    /// Lookup falling back to the default index on a miss.
    pub fn index_or_default(&self, token: &str) -> usize {
        self.index(token).unwrap_or(self.default_index)
    }

    /// Overrides the miss fallback index.
    pub fn set_default_index(&mut self, idx: usize) {
        self.default_index = idx;
    }

    /// Token string at `idx`.
    pub fn entry(&self, idx: usize) -> Option<&str> {
        self.entries.get(idx).map(String::as_str)
    }

    /// Number of tokens.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the vocabulary has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Word-to-spellings mapping parsed from a lexicon file.
#[derive(Debug, Clone, Default)]
pub struct Lexicon {
    entries: Vec<(String, Vec<Vec<String>>)>,
}

impl Lexicon {
    /// Loads a lexicon file: each line `word<TAB>tok₁ tok₂ …`. A word
    /// appearing on several lines collects several spellings.
    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| CuedecError::LexiconLoad {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let mut lexicon = Self::default();
        for line in contents.lines() {
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }
            let Some((word, spelling)) = line.split_once('\t') else {
                continue;
            };
            let tokens: Vec<String> = spelling
                .split_whitespace()
                .map(str::to_string)
                .collect();
            if word.is_empty() || tokens.is_empty() {
                continue;
            }
            lexicon.insert(word, tokens);
        }
        Ok(lexicon)
    }

    /// Builds a lexicon from `(word, spelling)` pairs, preserving order.
    pub fn from_entries<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, Vec<S>)>,
        S: Into<String>,
    {
        let mut lexicon = Self::default();
        for (word, spelling) in pairs {
            lexicon.insert(
                &word.into(),
                spelling.into_iter().map(Into::into).collect(),
            );
        }
        lexicon
    }

    fn insert(&mut self, word: &str, spelling: Vec<String>) {
        if let Some(entry) = self.entries.iter_mut().find(|(w, _)| w == word) {
            entry.1.push(spelling);
        } else {
            self.entries.push((word.to_string(), vec![spelling]));
        }
    }

    /// Iterates `(word, spellings)` in file order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Vec<String>])> {
        self.entries
            .iter()
            .map(|(w, s)| (w.as_str(), s.as_slice()))
    }

    /// Number of distinct words.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when no words are loaded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Index over the lexicon's words, in file order, with the unknown word
/// appended when absent.
#[derive(Debug, Clone)]
pub struct WordDictionary {
    entries: Vec<String>,
    index: HashMap<String, usize>,
}

impl WordDictionary {
    /// Builds the word dictionary from a lexicon.
    pub fn from_lexicon(lexicon: &Lexicon, unk_word: &str) -> Self {
        let mut entries: Vec<String> = lexicon.iter().map(|(w, _)| w.to_string()).collect();
        if !entries.iter().any(|w| w == unk_word) {
            entries.push(unk_word.to_string());
        }
        let index = entries
            .iter()
            .enumerate()
            .map(|(i, w)| (w.clone(), i))
            .collect();
        Self { entries, index }
    }

    /// Exact lookup.
    pub fn index(&self, word: &str) -> Option<usize> {
        self.index.get(word).copied()
    }

    /// Word string at `idx`.
    pub fn entry(&self, idx: usize) -> Option<&str> {
        self.entries.get(idx).map(String::as_str)
    }

    /// Number of words.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when the dictionary is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_tokens_blank_is_index_zero() {
        let dict = TokenDictionary::from_tokens(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(dict.entry(0), Some("<BLANK>"));
    }

    #[test]
    fn test_tokens_specials_inserted_in_order() {
        let dict = TokenDictionary::from_tokens(vec!["a".to_string()]);
        assert_eq!(dict.entry(0), Some("<BLANK>"));
        assert_eq!(dict.entry(1), Some("<UNK>"));
        assert_eq!(dict.entry(2), Some("<SOS>"));
        assert_eq!(dict.entry(3), Some("<EOS>"));
        assert_eq!(dict.entry(4), Some("<PAD>"));
        assert_eq!(dict.entry(5), Some("a"));
    }

    #[test]
    fn test_tokens_existing_blank_moved_to_front() {
        let dict = TokenDictionary::from_tokens(vec![
            "a".to_string(),
            "<BLANK>".to_string(),
            "b".to_string(),
        ]);
        assert_eq!(dict.entry(0), Some("<BLANK>"));
        assert_eq!(dict.index("a"), Some(1 + 4)); // after 4 remaining specials
    }

    #[test]
    fn test_tokens_duplicates_keep_first_occurrence() {
        let dict = TokenDictionary::from_tokens(vec![
            "a".to_string(),
            "b".to_string(),
            "a".to_string(),
        ]);
        let a = dict.index("a").unwrap();
        let b = dict.index("b").unwrap();
        assert!(a < b);
        assert_eq!(dict.len(), 2 + SPECIAL_TOKENS.len());
    }

    #[test]
    fn test_tokens_miss_falls_back_to_default() {
        let dict = TokenDictionary::from_tokens(vec!["a".to_string()]);
        assert_eq!(dict.index_or_default("missing"), 0);

        let mut dict = dict;
        dict.set_default_index(1);
        assert_eq!(dict.index_or_default("missing"), 1);
    }

    #[test]
    fn test_tokens_from_path_with_separators() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "a,freq=3").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "b;ignored").unwrap();
        writeln!(file, "  c\textra").unwrap();
        file.flush().unwrap();

        let dict = TokenDictionary::from_path(file.path()).unwrap();
        assert!(dict.index("a").is_some());
        assert!(dict.index("b").is_some());
        assert!(dict.index("c").is_some());
        assert!(dict.index("freq=3").is_none());
    }

    #[test]
    fn test_tokens_missing_file_errors() {
        let result = TokenDictionary::from_path(Path::new("/nonexistent/tokens.txt"));
        assert!(matches!(result, Err(CuedecError::TokensLoad { .. })));
    }

    #[test]
    fn test_lexicon_parse_lines() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "bonjour\tb o~ z^ u r").unwrap();
        writeln!(file, "oui\tw i").unwrap();
        writeln!(file, "oui\tu i").unwrap();
        writeln!(file).unwrap();
        file.flush().unwrap();

        let lexicon = Lexicon::from_path(file.path()).unwrap();
        assert_eq!(lexicon.len(), 2);

        let entries: Vec<_> = lexicon.iter().collect();
        assert_eq!(entries[0].0, "bonjour");
        assert_eq!(entries[0].1.len(), 1);
        assert_eq!(entries[1].0, "oui");
        assert_eq!(entries[1].1.len(), 2);
    }

    #[test]
    fn test_lexicon_missing_file_errors() {
        let result = Lexicon::from_path(Path::new("/nonexistent/lexicon.txt"));
        assert!(matches!(result, Err(CuedecError::LexiconLoad { .. })));
    }

    #[test]
    fn test_lexicon_skips_malformed_lines() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "no-tab-here").unwrap();
        writeln!(file, "word\ta b").unwrap();
        file.flush().unwrap();

        let lexicon = Lexicon::from_path(file.path()).unwrap();
        assert_eq!(lexicon.len(), 1);
    }

    #[test]
    fn test_word_dictionary_preserves_file_order() {
        let lexicon = Lexicon::from_entries(vec![
            ("bonjour", vec!["b", "o~"]),
            ("oui", vec!["w", "i"]),
        ]);
        let words = WordDictionary::from_lexicon(&lexicon, "<UNK>");
        assert_eq!(words.index("bonjour"), Some(0));
        assert_eq!(words.index("oui"), Some(1));
        assert_eq!(words.index("<UNK>"), Some(2));
        assert_eq!(words.entry(1), Some("oui"));
        assert_eq!(words.len(), 3);
    }

    #[test]
    fn test_word_dictionary_unk_not_duplicated() {
        let lexicon = Lexicon::from_entries(vec![("<UNK>", vec!["_"])]);
        let words = WordDictionary::from_lexicon(&lexicon, "<UNK>");
        assert_eq!(words.len(), 1);
    }
}
