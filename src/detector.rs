//! Inference seam
//!
//! The neural accelerator and its model are opaque to the agent. A detector
//! classifies one frame and reports per-class detection scores keyed by the
//! model's fixed class index space; the watch-list maps names to indices once
//! at startup (see `labels`).

use crate::errors::AgentError;
use crate::types::Frame;

/// Per-frame classifier over a fixed class index space.
///
/// `infer` may block for up to nominal accelerator latency.
pub trait Detector {
    fn infer(&mut self, frame: &Frame) -> Result<Inference, AgentError>;
}

/// Detection scores for one frame.
///
/// `scores[class_id]` holds the scores of every detection of that class in
/// the frame, in model output order. Classes beyond the model's output are
/// simply absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Inference {
    scores: Vec<Vec<f32>>,
}

impl Inference {
    pub fn new(scores: Vec<Vec<f32>>) -> Self {
        Self { scores }
    }

    /// Best score for a class, if the frame contained any detection of it.
    pub fn top_score(&self, class_id: usize) -> Option<f32> {
        self.scores
            .get(class_id)?
            .iter()
            .copied()
            .fold(None, |best, s| match best {
                Some(b) if b >= s => Some(b),
                _ => Some(s),
            })
    }

    pub fn class_count(&self) -> usize {
        self.scores.len()
    }
}
