//! Contracts for the inference services the guidance engine consumes.
//!
//! Implementations are loaded once at startup and shared read-only across
//! requests. Every call gets only the raw frame (or labels), so the three
//! vision calls can run concurrently.

use std::fmt;
use std::future::Future;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::vision::{DepthMap, Detection, Frame, HandPose};

/// What the user asked us to locate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Query {
    Text(String),
    /// Precomputed semantic embedding. `text` keeps the original wording
    /// for spoken replies when it is known.
    Embedding {
        vector: Vec<f32>,
        text: Option<String>,
    },
}

impl Query {
    pub fn text(text: impl Into<String>) -> Self {
        Query::Text(text.into())
    }

    /// Wording used when talking about the query back to the user.
    pub fn describe(&self) -> &str {
        match self {
            Query::Text(text) => text.as_str(),
            Query::Embedding { text: Some(text), .. } => text.as_str(),
            Query::Embedding { text: None, .. } => "that object",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredLabel {
    pub label: String,
    /// Raw cosine similarity in `[-1, 1]`.
    pub score: f32,
}

/// Stage names used when reporting inference failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InferenceStage {
    ObjectDetection,
    HandTracking,
    DepthEstimation,
    SimilarityRanking,
}

impl fmt::Display for InferenceStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InferenceStage::ObjectDetection => "object detection",
            InferenceStage::HandTracking => "hand tracking",
            InferenceStage::DepthEstimation => "depth estimation",
            InferenceStage::SimilarityRanking => "similarity ranking",
        };
        f.write_str(name)
    }
}

pub trait ObjectDetector: Send + Sync {
    /// Labeled boxes for one frame; may be empty.
    fn detect(&self, frame: &Frame) -> impl Future<Output = Result<Vec<Detection>>> + Send;
}

pub trait HandTracker: Send + Sync {
    /// Zero, one or two hands.
    fn track_hands(&self, frame: &Frame) -> impl Future<Output = Result<Vec<HandPose>>> + Send;
}

pub trait DepthEstimator: Send + Sync {
    /// Relative depth with the same pixel dimensions as `frame`.
    fn estimate_depth(&self, frame: &Frame) -> impl Future<Output = Result<DepthMap>> + Send;
}

pub trait SimilarityRanker: Send + Sync {
    /// Scores every candidate label against the query, best first.
    fn rank(
        &self,
        query: &Query,
        labels: &[String],
    ) -> impl Future<Output = Result<Vec<ScoredLabel>>> + Send;

    /// Turns a query into the form this ranker scores fastest, so a
    /// session can reuse it across frames. Defaults to the query as-is.
    fn prepare(&self, query: Query) -> impl Future<Output = Result<Query>> + Send {
        async move { Ok(query) }
    }
}

/// Read-text and describe-scene services used by the assistant pipeline.
pub trait SceneNarrator: Send + Sync {
    fn describe(&self, frame: &Frame) -> impl Future<Output = Result<String>> + Send;

    fn read_text(&self, frame: &Frame) -> impl Future<Output = Result<String>> + Send;
}

/// Sorts scored labels best first, keeping the incoming order among ties.
pub fn sort_scores(scores: &mut [ScoredLabel]) {
    scores.sort_by(|a, b| b.score.total_cmp(&a.score));
}
