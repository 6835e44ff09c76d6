//! Hand-to-object directional guidance.
//!
//! One call fuses object detection, hand tracking and relative depth for a
//! single frame into one egocentric instruction. Nothing carries over from
//! one frame to the next.

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::config::GuidanceConfig;
use crate::error::LocateError;
use crate::geometry::{heading, Direction, PixelPoint};
use crate::inference::{
    DepthEstimator, HandTracker, InferenceStage, ObjectDetector, Query, SimilarityRanker,
};
use crate::vision::{DepthMap, Detection, Frame, HandPose};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    /// Object is well behind the hand in depth
    MoveForward,
    /// Same depth plane and a short reach away
    WithinReach,
    /// Plain direction
    Direction,
}

/// Successful outcome of a locate call, with the measurements behind it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Guidance {
    pub target: String,
    pub match_score: f32,
    pub direction: Direction,
    pub instruction: Instruction,
    pub object_center: PixelPoint,
    pub hand_position: PixelPoint,
    pub pixel_distance: f32,
    pub object_depth: f32,
    pub hand_depth: f32,
    pub depth_delta: f32,
    /// Sentence to speak to the user
    pub text: String,
}

/// Model outputs for one frame, gathered before any fusion happens.
#[derive(Debug, Clone)]
pub struct Observations {
    pub frame_size: (u32, u32),
    pub detections: Vec<Detection>,
    pub hands: Vec<HandPose>,
    pub depth: DepthMap,
}

pub struct GuidanceEngine<D, H, E, S> {
    detector: D,
    hand_tracker: H,
    depth_estimator: E,
    ranker: S,
    config: GuidanceConfig,
}

impl<D, H, E, S> GuidanceEngine<D, H, E, S>
where
    D: ObjectDetector,
    H: HandTracker,
    E: DepthEstimator,
    S: SimilarityRanker,
{
    pub fn new(
        detector: D,
        hand_tracker: H,
        depth_estimator: E,
        ranker: S,
        config: GuidanceConfig,
    ) -> Self {
        info!(
            "Guidance engine ready (far={}, near={}, reach={}px, match>={})",
            config.far_depth_threshold,
            config.near_depth_threshold,
            config.reach_pixel_threshold,
            config.match_threshold
        );
        Self {
            detector,
            hand_tracker,
            depth_estimator,
            ranker,
            config,
        }
    }

    pub fn config(&self) -> &GuidanceConfig {
        &self.config
    }

    pub fn ranker(&self) -> &S {
        &self.ranker
    }

    /// Finds the object best matching `query` and says where it is relative
    /// to the user's hand.
    pub async fn locate_object(&self, frame: &Frame, query: &Query) -> Result<Guidance, LocateError> {
        let result = self.locate_inner(frame, query).await;
        if let Err(LocateError::InferenceFailure { stage, source }) = &result {
            error!("Locate failed during {}: {:#}", stage, source);
        }
        result
    }

    async fn locate_inner(&self, frame: &Frame, query: &Query) -> Result<Guidance, LocateError> {
        let observations = self.observe(frame).await?;
        self.fuse(&observations, query).await
    }

    /// Runs detection, hand tracking and depth estimation concurrently.
    pub async fn observe(&self, frame: &Frame) -> Result<Observations, LocateError> {
        let detect = async {
            self.detector
                .detect(frame)
                .await
                .map_err(|e| LocateError::inference(InferenceStage::ObjectDetection, e))
        };
        let track = async {
            self.hand_tracker
                .track_hands(frame)
                .await
                .map_err(|e| LocateError::inference(InferenceStage::HandTracking, e))
        };
        let depth = async {
            self.depth_estimator
                .estimate_depth(frame)
                .await
                .map_err(|e| LocateError::inference(InferenceStage::DepthEstimation, e))
        };

        let (detections, hands, depth) = futures::try_join!(detect, track, depth)?;

        if depth.dimensions() != frame.dimensions() {
            return Err(LocateError::inference(
                InferenceStage::DepthEstimation,
                anyhow::anyhow!(
                    "depth map is {}x{} but frame is {}x{}",
                    depth.width,
                    depth.height,
                    frame.width,
                    frame.height
                ),
            ));
        }
        if !depth.is_complete() {
            return Err(LocateError::inference(
                InferenceStage::DepthEstimation,
                anyhow::anyhow!(
                    "depth map has {} samples for {}x{}",
                    depth.values.len(),
                    depth.width,
                    depth.height
                ),
            ));
        }

        debug!(
            "Observed {} detections, {} hands",
            detections.len(),
            hands.len()
        );

        Ok(Observations {
            frame_size: frame.dimensions(),
            detections,
            hands,
            depth,
        })
    }

    /// Candidate filtering, best-match selection, hand acquisition and
    /// instruction classification over already gathered observations.
    pub async fn fuse(&self, obs: &Observations, query: &Query) -> Result<Guidance, LocateError> {
        let candidates = filter_candidates(&obs.detections, &self.config);
        if candidates.is_empty() {
            return Err(LocateError::NoObjectsDetected);
        }

        let (target, match_score) = self.best_match(&candidates, query).await?;

        let hand = obs.hands.first().ok_or_else(|| LocateError::NoHandDetected {
            target: target.label.clone(),
        })?;

        let (width, height) = obs.frame_size;
        let hand_position = PixelPoint::from(hand.wrist_pixel(width, height));
        let object_center = PixelPoint::from(target.bbox.center());

        let object_depth = obs.depth.sample(object_center.x, object_center.y);
        let hand_depth = obs.depth.sample(hand_position.x, hand_position.y);

        Ok(compose_guidance(
            &self.config,
            &target.label,
            match_score,
            object_center,
            hand_position,
            object_depth,
            hand_depth,
        ))
    }

    async fn best_match<'a>(
        &self,
        candidates: &[&'a Detection],
        query: &Query,
    ) -> Result<(&'a Detection, f32), LocateError> {
        let labels: Vec<String> = candidates.iter().map(|d| d.label.clone()).collect();
        let scores = self
            .ranker
            .rank(query, &labels)
            .await
            .map_err(|e| LocateError::inference(InferenceStage::SimilarityRanking, e))?;

        let mut ranked: Vec<(&Detection, f32)> = candidates
            .iter()
            .map(|d| {
                let score = scores
                    .iter()
                    .find(|s| s.label == d.label)
                    .map(|s| s.score)
                    .filter(|s| !s.is_nan())
                    .unwrap_or(f32::NEG_INFINITY);
                (*d, score)
            })
            .collect();
        // Stable: equal scores keep detector order.
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

        let (best, score) = ranked[0];
        debug!("Best match for '{}': {} ({:.2})", query.describe(), best.label, score);

        if score < self.config.match_threshold {
            return Err(LocateError::LowConfidenceMatch {
                query: query.describe().to_string(),
                best_score: score,
                available: labels,
            });
        }

        Ok((best, score))
    }
}

/// Drops people (by label or reserved class id), excluded labels and
/// low-confidence boxes, keeping detector order.
pub fn filter_candidates<'a>(detections: &'a [Detection], config: &GuidanceConfig) -> Vec<&'a Detection> {
    detections
        .iter()
        .filter(|d| !d.is_person())
        .filter(|d| config.person_class_id.is_none() || d.class_id != config.person_class_id)
        .filter(|d| {
            !config
                .excluded_labels
                .iter()
                .any(|l| l.trim().eq_ignore_ascii_case(d.label.trim()))
        })
        .filter(|d| d.confidence >= config.min_detection_confidence)
        .collect()
}

/// Picks the instruction from depth and pixel distance, in priority order:
/// move forward, within reach, plain direction.
pub fn classify(
    config: &GuidanceConfig,
    object_depth: f32,
    hand_depth: f32,
    pixel_distance: f32,
) -> Instruction {
    let depth_delta = (hand_depth - object_depth).abs();

    if depth_delta >= config.far_depth_threshold
        && config.depth_convention.is_closer(hand_depth, object_depth)
    {
        Instruction::MoveForward
    } else if depth_delta <= config.near_depth_threshold
        && pixel_distance <= config.reach_pixel_threshold
    {
        Instruction::WithinReach
    } else {
        Instruction::Direction
    }
}

pub fn instruction_text(instruction: Instruction, label: &str, direction: Direction) -> String {
    match instruction {
        Instruction::MoveForward => format!(
            "Move your hand forward toward the {}, which is {} of your hand.",
            label, direction
        ),
        Instruction::WithinReach => {
            format!("The {} is within reach, {} of your hand.", label, direction)
        }
        Instruction::Direction => format!("The {} is {} of your hand.", label, direction),
    }
}

/// Geometry and depth classification for one target/hand pair.
pub fn compose_guidance(
    config: &GuidanceConfig,
    label: &str,
    match_score: f32,
    object_center: PixelPoint,
    hand_position: PixelPoint,
    object_depth: f32,
    hand_depth: f32,
) -> Guidance {
    let heading = heading(hand_position, object_center);
    let depth_delta = (hand_depth - object_depth).abs();
    let instruction = classify(config, object_depth, hand_depth, heading.distance);

    debug!(
        "target={} center=({:.0},{:.0}) depth={:.2} hand=({:.0},{:.0}) depth={:.2} dist={:.1} delta={:.2} angle={:.1}deg dir={}",
        label,
        object_center.x,
        object_center.y,
        object_depth,
        hand_position.x,
        hand_position.y,
        hand_depth,
        heading.distance,
        depth_delta,
        heading.angle.to_degrees(),
        heading.direction
    );

    Guidance {
        target: label.to_string(),
        match_score,
        direction: heading.direction,
        instruction,
        object_center,
        hand_position,
        pixel_distance: heading.distance,
        object_depth,
        hand_depth,
        depth_delta,
        text: instruction_text(instruction, label, heading.direction),
    }
}
