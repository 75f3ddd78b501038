//! Configuration types, loaded from TOML.

use crate::defaults;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub model: ModelConfig,
    pub decoder: DecoderConfig,
    pub corrector: CorrectorConfig,
}

/// Sequence model configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ModelConfig {
    /// Path to the sequence model weights.
    pub model_path: PathBuf,
}

/// Beam decoder configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DecoderConfig {
    /// Word → spellings file, one word per line, tab-separated tokens.
    pub lexicon_path: PathBuf,
    /// Vocabulary file, one token per line.
    pub tokens_path: PathBuf,
    /// Binary n-gram language model, consumed by the LM backend.
    pub lm_path: PathBuf,
    /// Maximum hypotheses returned.
    pub nbest: usize,
    /// Maximum live hypotheses.
    pub beam_size: usize,
    /// Tokens considered per step; -1 means the whole vocabulary.
    pub beam_size_token: i32,
    /// Score margin below the best hypothesis before pruning.
    pub beam_threshold: f32,
    /// LM log-probability multiplier.
    pub lm_weight: f32,
    /// Additive bonus per word emission.
    pub word_score: f32,
    /// Additive penalty for the unknown word; -inf forbids OOV output.
    pub unk_score: f32,
    /// Additive score on silence token emission.
    pub sil_score: f32,
    /// Merge hypotheses by logaddexp instead of max.
    pub log_add: bool,
    /// Blank symbol string.
    pub blank_token: String,
    /// Silence token string.
    pub sil_token: String,
    /// Unknown word string.
    pub unk_word: String,
}

/// Sentence corrector configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CorrectorConfig {
    /// Homophones file, one JSON object per line.
    pub homophones_path: PathBuf,
    /// Word-level n-gram language model for homophone choice.
    pub lm_path: PathBuf,
    /// Beam width of the homophone search.
    pub beam_width: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            lexicon_path: PathBuf::new(),
            tokens_path: PathBuf::new(),
            lm_path: PathBuf::new(),
            nbest: defaults::DEFAULT_NBEST,
            beam_size: defaults::DEFAULT_BEAM_SIZE,
            beam_size_token: -1,
            beam_threshold: defaults::DEFAULT_BEAM_THRESHOLD,
            lm_weight: defaults::DEFAULT_LM_WEIGHT,
            word_score: 0.0,
            unk_score: f32::NEG_INFINITY,
            sil_score: 0.0,
            log_add: false,
            blank_token: defaults::BLANK_TOKEN.to_string(),
            sil_token: defaults::SIL_TOKEN.to_string(),
            unk_word: defaults::UNK_TOKEN.to_string(),
        }
    }
}

impl Default for CorrectorConfig {
    fn default() -> Self {
        Self {
            homophones_path: PathBuf::new(),
            lm_path: PathBuf::new(),
            beam_width: defaults::DEFAULT_CORRECTOR_BEAM_WIDTH,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns defaults if the file is missing.
    /// Returns errors for invalid TOML.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                if e.downcast_ref::<std::io::Error>()
                    .map(|io_err| io_err.kind() == std::io::ErrorKind::NotFound)
                    .unwrap_or(false)
                {
                    Self::default()
                } else {
                    panic!("Failed to load config from {}: {}", path.display(), e);
                }
            }
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - CUEDEC_MODEL → model.model_path
    /// - CUEDEC_LM → decoder.lm_path
    /// - CUEDEC_HOMOPHONES → corrector.homophones_path
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(model) = std::env::var("CUEDEC_MODEL")
            && !model.is_empty()
        {
            self.model.model_path = PathBuf::from(model);
        }

        if let Ok(lm) = std::env::var("CUEDEC_LM")
            && !lm.is_empty()
        {
            self.decoder.lm_path = PathBuf::from(lm);
        }

        if let Ok(homophones) = std::env::var("CUEDEC_HOMOPHONES")
            && !homophones.is_empty()
        {
            self.corrector.homophones_path = PathBuf::from(homophones);
        }

        self
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/cuedec/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .expect("Could not determine config directory")
            .join("cuedec")
            .join("config.toml")
    }
}
