//! Streaming recognition session.
//!
//! Owns a window processor, an optional shared sentence corrector and
//! the two-frame landmark history needed for temporal features. The
//! caller pushes frames one at a time; a push returning true means a
//! window is ready and [`RecognitionStream::process`] will decode.

use crate::corrector::SentenceCorrector;
use crate::decoder::CtcDecoder;
use crate::defaults::FEATURE_DIM;
use crate::error::Result;
use crate::features::{FeatureExtractor, FrameFeatures};
use crate::landmarks::LandmarkFrame;
use crate::model::ModelAdapter;
use crate::window::WindowProcessor;
use std::collections::VecDeque;
use std::sync::Arc;

pub use crate::window::RecognitionResult;

/// One streaming recognition session over a shared decoder and model.
pub struct RecognitionStream {
    processor: WindowProcessor,
    corrector: Option<Arc<SentenceCorrector>>,
    extractor: FeatureExtractor,
    history: VecDeque<LandmarkFrame>,
    last_result: RecognitionResult,
}

impl RecognitionStream {
    /// Creates a stream. The decoder and adapter are read-only shared
    /// resources; each stream owns its buffers.
    pub fn new(decoder: Arc<CtcDecoder>, adapter: Arc<ModelAdapter>) -> Self {
        Self {
            processor: WindowProcessor::new(decoder, adapter),
            corrector: None,
            extractor: FeatureExtractor::new(),
            history: VecDeque::with_capacity(2),
            last_result: RecognitionResult::default(),
        }
    }

    /// Attaches a sentence corrector. An uninitialized corrector simply
    /// never produces a sentence.
    pub fn with_corrector(mut self, corrector: Arc<SentenceCorrector>) -> Self {
        self.corrector = Some(corrector);
        self
    }

    /// Pushes one pre-extracted feature vector in the 33-float wire
    /// order. Returns true when a window is ready to process.
    pub fn push(&mut self, features: &[f32; FEATURE_DIM]) -> bool {
        self.processor
            .push_frame(Some(FrameFeatures::from_flat(features)))
    }

    /// Pushes one [`FrameFeatures`]. Returns true when a window is ready.
    pub fn push_features(&mut self, features: FrameFeatures) -> bool {
        self.processor.push_frame(Some(features))
    }

    /// Pushes one raw landmark frame, extracting features against the
    /// internally kept two-frame history. Incomplete frames are dropped
    /// and accounted. Returns true when a window is ready.
    pub fn push_landmarks(&mut self, frame: LandmarkFrame) -> bool {
        let features = {
            let prev = self.history.back();
            let prev2 = if self.history.len() >= 2 {
                self.history.front()
            } else {
                None
            };
            self.extractor.extract(&frame, prev, prev2)
        };

        self.history.push_back(frame);
        if self.history.len() > 2 {
            self.history.pop_front();
        }

        self.processor.push_frame(features)
    }

    /// Decodes the next ready window and returns the whole accumulated
    /// transcript, with the sentence lifted when a corrector is attached.
    pub fn process(&mut self) -> Result<RecognitionResult> {
        let mut result = self.processor.process_window()?;
        self.attach_sentence(&mut result);
        if !result.is_empty() {
            self.last_result = result.clone();
        }
        Ok(result)
    }

    /// Flushes the tail window. When nothing new can be committed the
    /// last hypothesis is returned unchanged.
    pub fn finalize(&mut self) -> Result<RecognitionResult> {
        let mut result = self.processor.finalize()?;
        if result.is_empty() {
            return Ok(self.last_result.clone());
        }
        self.attach_sentence(&mut result);
        self.last_result = result.clone();
        Ok(result)
    }

    /// Clears all per-stream state for a new utterance.
    pub fn reset(&mut self) {
        self.processor.reset();
        self.history.clear();
        self.last_result = RecognitionResult::default();
    }

    fn attach_sentence(&self, result: &mut RecognitionResult) {
        if result.phonemes.is_empty() {
            return;
        }
        if let Some(corrector) = &self.corrector {
            result.sentence = corrector.correct(&result.phonemes);
        }
    }

    /// Count of frames pushed, valid or not.
    pub fn total_frames_seen(&self) -> usize {
        self.processor.total_frames_seen()
    }

    /// Count of valid frames currently buffered.
    pub fn valid_frame_count(&self) -> usize {
        self.processor.valid_frame_count()
    }

    /// Count of frames dropped as invalid.
    pub fn dropped_frame_count(&self) -> usize {
        self.processor.dropped_frame_count()
    }

    /// Count of chunks that produced a hypothesis.
    pub fn chunks_processed(&self) -> usize {
        self.processor.chunks_processed()
    }
}
