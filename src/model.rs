//! Sequence model adapter.
//!
//! The acoustic sequence model is an external collaborator: a pretrained
//! network mapping a fixed-length feature window to per-timestep
//! log-probabilities over the phoneme vocabulary. This module defines the
//! trait seam it plugs into, a mutex-guarded adapter so independent
//! streams can share one backend, and a mock backend for tests.

use crate::defaults::WINDOW_SIZE;
use crate::error::{CuedecError, Result};
use crate::features::FrameFeatures;
use std::path::Path;
use std::sync::Mutex;

/// Row-major `[steps × vocab]` matrix of per-timestep scores.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Logits {
    data: Vec<f32>,
    steps: usize,
    vocab: usize,
}

impl Logits {
    /// Creates a matrix from row-major data. Panics if the dimensions do
    /// not match the data length.
    pub fn new(data: Vec<f32>, steps: usize, vocab: usize) -> Self {
        assert_eq!(data.len(), steps * vocab, "logits shape mismatch");
        Self { data, steps, vocab }
    }

    /// The empty matrix, returned when no model is loaded.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of timesteps.
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Vocabulary size.
    pub fn vocab(&self) -> usize {
        self.vocab
    }

    /// Returns true if the matrix holds no timesteps.
    pub fn is_empty(&self) -> bool {
        self.steps == 0 || self.vocab == 0
    }

    /// One timestep's scores.
    pub fn row(&self, t: usize) -> &[f32] {
        &self.data[t * self.vocab..(t + 1) * self.vocab]
    }

    /// Raw row-major data.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Copies the inclusive row range `[start, end]` into a new matrix.
    pub fn slice_rows(&self, start: usize, end: usize) -> Self {
        let data = self.data[start * self.vocab..(end + 1) * self.vocab].to_vec();
        Self::new(data, end - start + 1, self.vocab)
    }

    /// Concatenates matrices along the time axis. All parts must share a
    /// vocabulary size; empty parts are skipped.
    pub fn concat(parts: &[Logits]) -> Self {
        let mut data = Vec::new();
        let mut steps = 0;
        let mut vocab = 0;
        for part in parts {
            if part.is_empty() {
                continue;
            }
            if vocab == 0 {
                vocab = part.vocab;
            }
            debug_assert_eq!(vocab, part.vocab);
            data.extend_from_slice(&part.data);
            steps += part.steps;
        }
        Self { data, steps, vocab }
    }

    /// Row-wise log-softmax with max-subtraction for numerical stability.
    pub fn log_softmax(&self) -> Self {
        let mut out = Vec::with_capacity(self.data.len());
        for t in 0..self.steps {
            let row = self.row(t);
            let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            let log_sum = row.iter().map(|v| (v - max).exp()).sum::<f32>().ln();
            out.extend(row.iter().map(|v| v - max - log_sum));
        }
        Self::new(out, self.steps, self.vocab)
    }
}

/// Trait for the sequence model backend.
///
/// This trait allows swapping implementations (real interpreter vs mock).
/// The backend sees three inputs per frame (lips, hand shape, hand
/// position); a window shorter than `window` frames is zero-padded on the
/// right, a longer one is truncated.
pub trait SequenceModel: Send {
    /// Load model weights from `path`. Returns false on a missing file or
    /// an incompatible model shape.
    fn load(&mut self, path: &Path) -> bool;

    /// Run inference over one padded window.
    ///
    /// Returns the empty matrix when no model is loaded; allocation or
    /// invoke failures are fatal errors.
    fn infer(&mut self, frames: &[FrameFeatures], window: usize) -> Result<Logits>;

    /// Check if weights are loaded.
    fn is_loaded(&self) -> bool;
}

/// Thread-safe wrapper around a [`SequenceModel`] backend.
///
/// Independent pipelines may share one adapter; concurrent inference is
/// serialized by the internal mutex. Within a single stream no
/// concurrency occurs.
pub struct ModelAdapter {
    inner: Mutex<AdapterInner>,
}

struct AdapterInner {
    backend: Box<dyn SequenceModel>,
    last_steps: usize,
    last_vocab: usize,
}

impl ModelAdapter {
    /// Wraps a backend.
    pub fn new(backend: Box<dyn SequenceModel>) -> Self {
        Self {
            inner: Mutex::new(AdapterInner {
                backend,
                last_steps: 0,
                last_vocab: 0,
            }),
        }
    }

    /// Loads model weights, returning false on failure.
    pub fn load(&self, path: &Path) -> bool {
        match self.inner.lock() {
            Ok(mut inner) => inner.backend.load(path),
            Err(_) => false,
        }
    }

    /// Returns true if the backend has weights loaded.
    pub fn is_loaded(&self) -> bool {
        match self.inner.lock() {
            Ok(inner) => inner.backend.is_loaded(),
            Err(_) => false,
        }
    }

    /// Runs inference over one window, default [`WINDOW_SIZE`] frames.
    ///
    /// Returns the empty matrix when the backend is not loaded.
    pub fn infer(&self, frames: &[FrameFeatures]) -> Result<Logits> {
        self.infer_window(frames, WINDOW_SIZE)
    }

    /// Runs inference with an explicit window length.
    pub fn infer_window(&self, frames: &[FrameFeatures], window: usize) -> Result<Logits> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| CuedecError::ModelInference {
                message: "model adapter mutex poisoned".to_string(),
            })?;
        let logits = inner.backend.infer(frames, window)?;
        if !logits.is_empty() {
            inner.last_steps = logits.steps();
            inner.last_vocab = logits.vocab();
        }
        Ok(logits)
    }

    /// Vocabulary size reported by the most recent successful inference.
    pub fn vocab_size(&self) -> usize {
        self.inner.lock().map(|i| i.last_vocab).unwrap_or(0)
    }

    /// Sequence length reported by the most recent successful inference.
    pub fn last_sequence_length(&self) -> usize {
        self.inner.lock().map(|i| i.last_steps).unwrap_or(0)
    }
}

/// Mock sequence model for testing.
///
/// Emits one output step per window frame with a peaked score at a label
/// read from the frame itself: `hand_shape[0]`, rounded, is the target
/// token index. All-zero padding frames therefore peak at the blank.
#[derive(Debug, Clone)]
pub struct MockSequenceModel {
    vocab: usize,
    loaded: bool,
    peak: f32,
    should_fail: bool,
}

impl MockSequenceModel {
    /// Creates a loaded mock with the given vocabulary size.
    pub fn new(vocab: usize) -> Self {
        Self {
            vocab,
            loaded: true,
            peak: 10.0,
            should_fail: false,
        }
    }

    /// Creates a mock that behaves as if no weights were ever loaded.
    pub fn unloaded(vocab: usize) -> Self {
        Self {
            loaded: false,
            ..Self::new(vocab)
        }
    }

    /// Configure the mock to fail fatally on infer.
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    /// Configure the peak score used for the scripted label.
    pub fn with_peak(mut self, peak: f32) -> Self {
        self.peak = peak;
        self
    }

    /// Encodes a token label into a frame the mock will recognize.
    pub fn frame_for_label(label: usize) -> FrameFeatures {
        let mut frame = FrameFeatures::zeroed();
        frame.hand_shape[0] = label as f32;
        frame
    }
}

impl SequenceModel for MockSequenceModel {
    fn load(&mut self, path: &Path) -> bool {
        if !path.exists() {
            return false;
        }
        self.loaded = true;
        true
    }

    fn infer(&mut self, frames: &[FrameFeatures], window: usize) -> Result<Logits> {
        if self.should_fail {
            return Err(CuedecError::ModelInference {
                message: "mock inference failure".to_string(),
            });
        }
        if !self.loaded {
            return Ok(Logits::empty());
        }

        let steps = if window > 0 { window } else { frames.len() };
        let mut data = vec![0.0f32; steps * self.vocab];
        for t in 0..steps {
            let label = frames
                .get(t)
                .map(|f| f.hand_shape[0].round().max(0.0) as usize)
                .unwrap_or(0)
                .min(self.vocab.saturating_sub(1));
            data[t * self.vocab + label] = self.peak;
        }
        Ok(Logits::new(data, steps, self.vocab))
    }

    fn is_loaded(&self) -> bool {
        self.loaded
    }
}
