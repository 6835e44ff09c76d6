//! Recorded model outputs played back as inference services.
//!
//! Lets the CLI and benchmarks drive the full pipeline without loading any
//! models: a JSON file holds what the detector, hand tracker and depth model
//! produced for one frame.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::inference::{DepthEstimator, HandTracker, ObjectDetector};
use crate::vision::{BoundingBox, DepthMap, Detection, Frame, HandPose};

/// Depth given either densely or as constant-valued boxes over a background.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordedDepth {
    Dense(DepthMap),
    Regions {
        background: f32,
        #[serde(default)]
        regions: Vec<DepthRegion>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepthRegion {
    pub bbox: BoundingBox,
    pub value: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedObservations {
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub detections: Vec<Detection>,
    #[serde(default)]
    pub hands: Vec<HandPose>,
    pub depth: RecordedDepth,
}

impl RecordedObservations {
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read observations from {:?}", path))?;
        let observations: Self = serde_json::from_str(&content)
            .with_context(|| format!("Invalid observations file {:?}", path))?;
        Ok(observations)
    }

    /// Expands the recorded depth to a dense map of the recorded size.
    pub fn depth_map(&self) -> Result<DepthMap> {
        match &self.depth {
            RecordedDepth::Dense(map) => {
                DepthMap::new(map.width, map.height, map.values.clone())
            }
            RecordedDepth::Regions { background, regions } => {
                let mut map = DepthMap::filled(self.width, self.height, *background);
                for region in regions {
                    let x_end = region.bbox.x2.ceil().clamp(0.0, self.width as f32) as u32;
                    let y_end = region.bbox.y2.ceil().clamp(0.0, self.height as f32) as u32;
                    let x_start = region.bbox.x1.floor().max(0.0) as u32;
                    let y_start = region.bbox.y1.floor().max(0.0) as u32;
                    for y in y_start..y_end {
                        for x in x_start..x_end {
                            map.set(x, y, region.value);
                        }
                    }
                }
                Ok(map)
            }
        }
    }

    pub fn blank_frame(&self) -> Frame {
        Frame::blank(self.width, self.height)
    }
}

/// Serves the same recorded outputs for every frame.
#[derive(Debug, Clone)]
pub struct ReplayInference {
    detections: Arc<Vec<Detection>>,
    hands: Arc<Vec<HandPose>>,
    depth: Arc<DepthMap>,
}

impl ReplayInference {
    pub fn new(observations: &RecordedObservations) -> Result<Self> {
        Ok(Self {
            detections: Arc::new(observations.detections.clone()),
            hands: Arc::new(observations.hands.clone()),
            depth: Arc::new(observations.depth_map()?),
        })
    }

    pub fn from_parts(detections: Vec<Detection>, hands: Vec<HandPose>, depth: DepthMap) -> Self {
        Self {
            detections: Arc::new(detections),
            hands: Arc::new(hands),
            depth: Arc::new(depth),
        }
    }
}

impl ObjectDetector for ReplayInference {
    async fn detect(&self, frame: &Frame) -> Result<Vec<Detection>> {
        debug!("Replaying {} detections for {}x{} frame", self.detections.len(), frame.width, frame.height);
        Ok(self.detections.as_ref().clone())
    }
}

impl HandTracker for ReplayInference {
    async fn track_hands(&self, _frame: &Frame) -> Result<Vec<HandPose>> {
        Ok(self.hands.as_ref().clone())
    }
}

impl DepthEstimator for ReplayInference {
    async fn estimate_depth(&self, _frame: &Frame) -> Result<DepthMap> {
        Ok(self.depth.as_ref().clone())
    }
}
