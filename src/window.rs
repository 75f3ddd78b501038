//! Overlap-save streaming window processor.
//!
//! Buffers valid feature frames, slices overlapping inference windows,
//! commits only each window's stable interior to a growing logit
//! accumulator, and re-decodes the whole accumulator after every commit.
//! Committed rows are monotone, non-overlapping and strictly in frame
//! order; the hypothesis after chunk `k` depends only on the frames seen
//! so far.

use crate::decoder::CtcDecoder;
use crate::defaults::{COMMIT_SIZE, LEFT_CONTEXT, WINDOW_SIZE};
use crate::error::{CuedecError, Result};
use crate::features::FrameFeatures;
use crate::model::{Logits, ModelAdapter};
use std::sync::Arc;

/// One decoded snapshot of the stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecognitionResult {
    /// Count of valid frames at decode time.
    pub frame_number: usize,
    /// Best-hypothesis phonemes, post-processed for display.
    pub phonemes: Vec<String>,
    /// Homophone-corrected sentence, when a corrector is attached and ran.
    pub sentence: Option<String>,
    /// Score of the best hypothesis; 0 when nothing decoded.
    pub confidence: f32,
}

impl RecognitionResult {
    /// Returns true when no phonemes were decoded.
    pub fn is_empty(&self) -> bool {
        self.phonemes.is_empty()
    }
}

/// Streaming overlap-save processor.
pub struct WindowProcessor {
    decoder: Arc<CtcDecoder>,
    adapter: Arc<ModelAdapter>,
    valid_features: Vec<FrameFeatures>,
    committed: Vec<Logits>,
    chunk_idx: usize,
    next_window_needed: usize,
    /// Model vocabulary size pinned at the first non-empty inference.
    pinned_vocab: usize,
    total_frames_seen: usize,
    chunks_processed: usize,
}

impl WindowProcessor {
    /// Creates a processor over a shared decoder and model adapter.
    pub fn new(decoder: Arc<CtcDecoder>, adapter: Arc<ModelAdapter>) -> Self {
        Self {
            decoder,
            adapter,
            valid_features: Vec::new(),
            committed: Vec::new(),
            chunk_idx: 0,
            next_window_needed: WINDOW_SIZE,
            pinned_vocab: 0,
            total_frames_seen: 0,
            chunks_processed: 0,
        }
    }

    /// Clears all buffered state for a new utterance.
    pub fn reset(&mut self) {
        self.valid_features.clear();
        self.committed.clear();
        self.chunk_idx = 0;
        self.next_window_needed = WINDOW_SIZE;
        self.pinned_vocab = 0;
        self.total_frames_seen = 0;
        self.chunks_processed = 0;
    }

    /// Pushes one frame. `None` records a dropped (invalid) frame.
    ///
    /// Returns true when enough valid frames are buffered for the next
    /// decode.
    pub fn push_frame(&mut self, features: Option<FrameFeatures>) -> bool {
        self.total_frames_seen += 1;

        let Some(features) = features else {
            return false;
        };
        self.valid_features.push(features);

        self.valid_features.len() >= self.next_window_needed
    }

    /// Decodes the next ready window and returns the accumulated
    /// transcript. A call before the threshold is met is a no-op
    /// returning the empty result.
    pub fn process_window(&mut self) -> Result<RecognitionResult> {
        let mut result = RecognitionResult {
            frame_number: self.valid_features.len(),
            ..Default::default()
        };

        if !self.adapter.is_loaded() {
            return Ok(result);
        }

        let num_valid = self.valid_features.len();
        if num_valid < self.next_window_needed {
            return Ok(result);
        }
        let last = num_valid - 1;

        let (window_start, window_end, commit_start, commit_end);
        match self.chunk_idx {
            0 => {
                window_start = 0;
                window_end = (WINDOW_SIZE - 1).min(last);
                commit_start = 0;
                commit_end = (COMMIT_SIZE - 1).min(last);
                self.next_window_needed = LEFT_CONTEXT + WINDOW_SIZE;
            }
            1 => {
                window_start = LEFT_CONTEXT;
                window_end = (window_start + WINDOW_SIZE - 1).min(last);
                // The second chunk intentionally commits only LEFT_CONTEXT
                // frames; this stitches the transient and keeps timestep
                // alignment for every later chunk.
                commit_start = COMMIT_SIZE;
                commit_end = (commit_start + LEFT_CONTEXT - 1).min(last);
                self.next_window_needed = COMMIT_SIZE + WINDOW_SIZE;
            }
            k => {
                window_start = COMMIT_SIZE * (k - 1);
                window_end = (window_start + WINDOW_SIZE - 1).min(last);
                commit_start = window_start + LEFT_CONTEXT;
                commit_end = (commit_start + COMMIT_SIZE - 1).min(last);
                self.next_window_needed = COMMIT_SIZE * k + WINDOW_SIZE;
            }
        }

        match self.process_single_window(window_start, window_end, commit_start, commit_end)? {
            Some(chunk) => {
                self.commit_and_decode(chunk, &mut result)?;
                self.chunk_idx += 1;
                Ok(result)
            }
            None => {
                self.chunk_idx += 1;
                Ok(result)
            }
        }
    }

    /// Flushes the uncommitted tail and returns the final transcript.
    ///
    /// Skipped (returning the empty result) when nothing new could be
    /// committed or the tail window is shorter than [`LEFT_CONTEXT`].
    pub fn finalize(&mut self) -> Result<RecognitionResult> {
        let mut result = RecognitionResult {
            frame_number: self.valid_features.len(),
            ..Default::default()
        };

        if !self.adapter.is_loaded() {
            return Ok(result);
        }

        let num_valid = self.valid_features.len();
        if num_valid == 0 {
            return Ok(result);
        }
        let last = num_valid - 1;

        let frames_committed = match self.chunk_idx {
            0 => 0,
            1 => COMMIT_SIZE,
            k => COMMIT_SIZE + LEFT_CONTEXT + (k - 2) * COMMIT_SIZE,
        };
        if frames_committed >= num_valid {
            return Ok(result);
        }

        let (window_start, commit_start) = match self.chunk_idx {
            0 => (0, 0),
            1 => (LEFT_CONTEXT, COMMIT_SIZE),
            k => {
                let start = COMMIT_SIZE * (k - 1);
                (start, start + LEFT_CONTEXT)
            }
        };

        if last + 1 - window_start < LEFT_CONTEXT {
            return Ok(result);
        }

        if let Some(chunk) =
            self.process_single_window(window_start, last, commit_start, last)?
        {
            self.commit_and_decode(chunk, &mut result)?;
        }
        Ok(result)
    }

    /// Runs one padded window through the model and slices out the commit
    /// range, clamped to the model's timestep count.
    fn process_single_window(
        &self,
        window_start: usize,
        window_end: usize,
        commit_start: usize,
        commit_end: usize,
    ) -> Result<Option<Logits>> {
        if window_end < window_start {
            return Ok(None);
        }

        let mut frames = self.valid_features[window_start..=window_end].to_vec();
        frames.truncate(WINDOW_SIZE);

        let logits = self.adapter.infer(&frames)?;
        if logits.is_empty() {
            return Ok(None);
        }

        let steps = logits.steps();
        let commit_start_rel = (commit_start - window_start).min(steps - 1);
        let commit_end_rel = (commit_end - window_start).min(steps - 1);
        if commit_start_rel > commit_end_rel {
            return Ok(None);
        }

        Ok(Some(logits.slice_rows(commit_start_rel, commit_end_rel)))
    }

    /// Appends a committed chunk and re-decodes the whole accumulator.
    fn commit_and_decode(&mut self, chunk: Logits, result: &mut RecognitionResult) -> Result<()> {
        let got = chunk.vocab();
        if self.pinned_vocab == 0 {
            self.pinned_vocab = got;
        } else if self.pinned_vocab != got {
            // Token indices would be meaningless across a vocabulary
            // change, so this surfaces instead of re-pinning.
            return Err(CuedecError::VocabSizeMismatch {
                pinned: self.pinned_vocab,
                got,
            });
        }

        self.committed.push(chunk);
        let full = Logits::concat(&self.committed);

        let hypotheses = self.decoder.decode(&full);
        if let Some(best) = hypotheses.first() {
            result.phonemes = self.decoder.idxs_to_tokens(&best.tokens);
            result.confidence = best.score;
            self.chunks_processed += 1;
        }
        Ok(())
    }

    /// Count of frames pushed, valid or not.
    pub fn total_frames_seen(&self) -> usize {
        self.total_frames_seen
    }

    /// Count of buffered valid frames.
    pub fn valid_frame_count(&self) -> usize {
        self.valid_features.len()
    }

    /// Count of frames dropped as invalid.
    pub fn dropped_frame_count(&self) -> usize {
        self.total_frames_seen - self.valid_features.len()
    }

    /// Count of chunks that produced a decoded hypothesis.
    pub fn chunks_processed(&self) -> usize {
        self.chunks_processed
    }

    /// Total committed timesteps across all chunks.
    pub fn committed_frames(&self) -> usize {
        self.committed.iter().map(Logits::steps).sum()
    }

    /// Valid-frame threshold that triggers the next decode.
    pub fn next_window_needed(&self) -> usize {
        self.next_window_needed
    }
}
