//! cuedec - Streaming cued-speech recognition core
//!
//! Turns per-frame face/hand/lip landmarks into a rolling phoneme
//! transcript via overlap-save windowed inference and lexicon-constrained
//! CTC beam search, optionally lifted to a sentence through homophone
//! disambiguation.

pub mod config;
pub mod corrector;
pub mod decoder;
pub mod defaults;
pub mod dict;
pub mod error;
pub mod features;
pub mod landmarks;
pub mod lm;
pub mod model;
pub mod phonemes;
pub mod stream;
pub mod trie;
pub mod window;
