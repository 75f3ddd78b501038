//! Bidirectional IPA ↔ LIAPHON phoneme mapping.
//!
//! LIAPHON is the ASCII transliteration the acoustic model is trained
//! on; IPA is the user-facing representation. The tables are immutable
//! after static initialization and shared process-wide.
//!
//! IPA graphemes like `ɑ̃` span several code points, so IPA input is
//! iterated by grapheme cluster, never by byte or `char`.

use once_cell::sync::Lazy;
use std::collections::HashMap;
use unicode_segmentation::UnicodeSegmentation;

/// IPA grapheme → LIAPHON token pairs, in table order. Later entries win
/// when inverting (`c` and `k` both map to `k`; the inverse keeps `k`).
const PAIRS: &[(&str, &str)] = &[
    ("a", "a"),
    ("ə", "x"),
    ("ɛ", "e^"),
    ("œ", "x^"),
    ("i", "i"),
    ("y", "y"),
    ("e", "e"),
    ("u", "u"),
    ("ɔ", "o"),
    ("o", "o^"),
    ("ɑ̃", "a~"),
    ("ɛ̃", "e~"),
    ("ɔ̃", "o~"),
    ("œ̃", "x~"),
    (" ", "_"),
    ("b", "b"),
    ("c", "k"),
    ("d", "d"),
    ("f", "f"),
    ("ɡ", "g"),
    ("j", "j"),
    ("k", "k"),
    ("l", "l"),
    ("m", "m"),
    ("n", "n"),
    ("p", "p"),
    ("s", "s"),
    ("t", "t"),
    ("v", "v"),
    ("w", "w"),
    ("z", "z"),
    ("ɥ", "h"),
    ("ʁ", "r"),
    ("ʃ", "s^"),
    ("ʒ", "z^"),
    ("ɲ", "gn"),
    ("ŋ", "ng"),
];

/// IPA grapheme → LIAPHON token.
pub static IPA_TO_LIAPHON: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| PAIRS.iter().copied().collect());

/// LIAPHON token → IPA grapheme.
pub static LIAPHON_TO_IPA: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| PAIRS.iter().map(|&(ipa, lia)| (lia, ipa)).collect());

/// Concatenates LIAPHON tokens into an IPA string. Unmapped tokens pass
/// through unchanged.
pub fn liaphon_to_ipa<S: AsRef<str>>(liaphon: &[S]) -> String {
    let mut ipa = String::new();
    for phone in liaphon {
        let phone = phone.as_ref();
        ipa.push_str(LIAPHON_TO_IPA.get(phone).copied().unwrap_or(phone));
    }
    ipa
}

/// Splits an IPA string into grapheme clusters and maps each to its
/// LIAPHON token. Unmapped graphemes pass through unchanged.
pub fn ipa_to_liaphon(ipa: &str) -> Vec<String> {
    ipa.graphemes(true)
        .map(|g| IPA_TO_LIAPHON.get(g).copied().unwrap_or(g).to_string())
        .collect()
}
