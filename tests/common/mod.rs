#![allow(dead_code)]

use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use spectra::config::GuidanceConfig;
use spectra::guidance::GuidanceEngine;
use spectra::inference::{
    sort_scores, DepthEstimator, HandTracker, InferenceStage, ObjectDetector, Query, SceneNarrator,
    ScoredLabel, SimilarityRanker,
};
use spectra::vision::{BoundingBox, DepthMap, Detection, Frame, HandPose};

pub const WIDTH: u32 = 640;
pub const HEIGHT: u32 = 400;

/// Detector, hand tracker and depth model in one, with optional failure.
#[derive(Clone)]
pub struct StubVision {
    pub detections: Vec<Detection>,
    pub hands: Vec<HandPose>,
    pub depth: DepthMap,
    pub fail_stage: Option<InferenceStage>,
    pub calls: Arc<AtomicUsize>,
}

impl StubVision {
    pub fn new(detections: Vec<Detection>, hands: Vec<HandPose>, depth: DepthMap) -> Self {
        Self {
            detections,
            hands,
            depth,
            fail_stage: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing(mut self, stage: InferenceStage) -> Self {
        self.fail_stage = Some(stage);
        self
    }

    fn check(&self, stage: InferenceStage) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_stage == Some(stage) {
            return Err(anyhow!("{} model timed out", stage));
        }
        Ok(())
    }
}

impl ObjectDetector for StubVision {
    async fn detect(&self, _frame: &Frame) -> Result<Vec<Detection>> {
        self.check(InferenceStage::ObjectDetection)?;
        Ok(self.detections.clone())
    }
}

impl HandTracker for StubVision {
    async fn track_hands(&self, _frame: &Frame) -> Result<Vec<HandPose>> {
        self.check(InferenceStage::HandTracking)?;
        Ok(self.hands.clone())
    }
}

impl DepthEstimator for StubVision {
    async fn estimate_depth(&self, _frame: &Frame) -> Result<DepthMap> {
        self.check(InferenceStage::DepthEstimation)?;
        Ok(self.depth.clone())
    }
}

/// Ranker with fixed per-label scores; unknown labels score 0.
#[derive(Clone, Default)]
pub struct FixedRanker {
    pub scores: HashMap<String, f32>,
    pub fail: bool,
}

impl FixedRanker {
    pub fn new(scores: &[(&str, f32)]) -> Self {
        Self {
            scores: scores.iter().map(|(l, s)| (l.to_string(), *s)).collect(),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            scores: HashMap::new(),
            fail: true,
        }
    }
}

impl SimilarityRanker for FixedRanker {
    async fn rank(&self, _query: &Query, labels: &[String]) -> Result<Vec<ScoredLabel>> {
        if self.fail {
            return Err(anyhow!("embedding service unavailable"));
        }
        let mut scores: Vec<ScoredLabel> = labels
            .iter()
            .map(|label| ScoredLabel {
                label: label.clone(),
                score: self.scores.get(label).copied().unwrap_or(0.0),
            })
            .collect();
        sort_scores(&mut scores);
        Ok(scores)
    }
}

#[derive(Clone, Default)]
pub struct StubNarrator {
    pub fail: bool,
}

impl SceneNarrator for StubNarrator {
    async fn describe(&self, _frame: &Frame) -> Result<String> {
        if self.fail {
            return Err(anyhow!("vision API returned 500"));
        }
        Ok("A mug sits on a desk in front of you.".to_string())
    }

    async fn read_text(&self, _frame: &Frame) -> Result<String> {
        if self.fail {
            return Err(anyhow!("vision API returned 500"));
        }
        Ok("EXIT".to_string())
    }
}

pub type StubEngine = GuidanceEngine<StubVision, StubVision, StubVision, FixedRanker>;

pub fn engine(vision: StubVision, ranker: FixedRanker, config: GuidanceConfig) -> StubEngine {
    GuidanceEngine::new(vision.clone(), vision.clone(), vision, ranker, config)
}

pub fn frame() -> Frame {
    Frame::blank(WIDTH, HEIGHT)
}

/// Box of the given size centred on `(cx, cy)`.
pub fn boxed(label: &str, cx: f32, cy: f32) -> Detection {
    Detection::new(label, 0.9, BoundingBox::new(cx - 20.0, cy - 20.0, cx + 20.0, cy + 20.0))
}

/// Normalized hand pose for a wrist at pixel `(x, y)` of the test frame.
pub fn hand_at(x: f32, y: f32) -> HandPose {
    HandPose::new(x / WIDTH as f32, y / HEIGHT as f32)
}

/// Uniform depth with explicit samples at the object and hand pixels.
pub fn depth_with(object: (u32, u32, f32), hand: (u32, u32, f32)) -> DepthMap {
    let mut depth = DepthMap::filled(WIDTH, HEIGHT, 0.0);
    depth.set(object.0, object.1, object.2);
    depth.set(hand.0, hand.1, hand.2);
    depth
}
