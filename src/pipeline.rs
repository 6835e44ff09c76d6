use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{info, debug, warn, error};

use crate::config::SpectraConfig;
use crate::guidance::{Guidance, GuidanceEngine};
use crate::inference::{
    DepthEstimator, HandTracker, ObjectDetector, Query, SceneNarrator, SimilarityRanker,
};
use crate::intent::{Intent, IntentClassifier};
use crate::session::SessionStore;
use crate::vision::Frame;

const NOT_UNDERSTOOD: &str =
    "I'm sorry, I couldn't quite understand your request. Could you please rephrase?";
const NOT_EQUIPPED: &str = "I am not equipped to handle that request. Please try asking something else, like 'read the text', 'describe what I see', or 'find the [object]'.";
const INTERNAL_ERROR: &str = "Sorry, an internal error occurred.";
const NARRATOR_MISSING: &str = "Scene narration is not configured on this server.";
const NO_TARGET: &str = "Tell me which object to look for first.";

/// What the caller turns into speech. `text` is always present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantReply {
    pub intent: Intent,
    pub text: String,
    pub guidance: Option<Guidance>,
    pub processing_time_ms: u128,
}

impl AssistantReply {
    fn new(intent: Intent, text: impl Into<String>, started: Instant) -> Self {
        Self {
            intent,
            text: text.into(),
            guidance: None,
            processing_time_ms: started.elapsed().as_millis(),
        }
    }
}

/// Routes a spoken request to reading, describing or locating, and keeps
/// per-user locate sessions.
pub struct AssistantPipeline<D, H, E, S, N> {
    engine: GuidanceEngine<D, H, E, S>,
    narrator: Option<N>,
    classifier: IntentClassifier,
    sessions: SessionStore,
    session_idle: Duration,
}

impl<D, H, E, S, N> AssistantPipeline<D, H, E, S, N>
where
    D: ObjectDetector,
    H: HandTracker,
    E: DepthEstimator,
    S: SimilarityRanker,
    N: SceneNarrator,
{
    pub fn new(engine: GuidanceEngine<D, H, E, S>, narrator: Option<N>, config: &SpectraConfig) -> Self {
        if narrator.is_none() {
            warn!("No scene narrator configured; read/describe requests will be declined");
        }
        Self {
            engine,
            narrator,
            classifier: IntentClassifier::new(config.intent.clone()),
            sessions: SessionStore::new(config.performance.session_history),
            session_idle: Duration::from_secs(config.performance.session_idle_seconds),
        }
    }

    pub fn engine(&self) -> &GuidanceEngine<D, H, E, S> {
        &self.engine
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Handles one self-contained request: classify, then act on `frame`.
    pub async fn respond(&self, request: &str, frame: Option<&Frame>) -> AssistantReply {
        let started = Instant::now();
        info!("Request: '{}' (frame: {})", request, frame.is_some());

        let intent = match self.classifier.classify(self.engine.ranker(), request).await {
            Ok(found) => found.intent,
            Err(e) => {
                error!("Intent classification failed: {:#}", e);
                return AssistantReply::new(Intent::Unknown, INTERNAL_ERROR, started);
            }
        };

        let reply = match (intent, frame) {
            (Intent::Unknown, _) => AssistantReply::new(intent, NOT_UNDERSTOOD, started),
            (Intent::Other, _) => AssistantReply::new(intent, NOT_EQUIPPED, started),
            (intent, None) => AssistantReply::new(
                intent,
                format!("This request ('{}') requires an image. Please provide one.", intent.prompt()),
                started,
            ),
            (Intent::ReadText, Some(frame)) => {
                let text = self.narrate(intent, frame).await;
                AssistantReply::new(intent, text, started)
            }
            (Intent::DescribeScene, Some(frame)) => {
                let text = self.narrate(intent, frame).await;
                AssistantReply::new(intent, text, started)
            }
            (Intent::LocateObject, Some(frame)) => {
                let object = self.classifier.extract_object_query(request);
                debug!("Object query: '{}'", object);
                self.locate(&Query::Text(object), frame, started).await
            }
        };

        info!("Reply ({}, {}ms): {}", reply.intent, reply.processing_time_ms, reply.text);
        reply
    }

    /// Starts a locate session: the target is prepared once and reused for
    /// every following frame of `session_id`.
    pub async fn set_target(&self, session_id: &str, object: &str) -> AssistantReply {
        let started = Instant::now();
        self.evict_idle_sessions();
        let object = self.classifier.extract_object_query(object);

        match self.engine.ranker().prepare(Query::Text(object.clone())).await {
            Ok(query) => {
                self.sessions.set_target(session_id, query);
                AssistantReply::new(
                    Intent::LocateObject,
                    format!("Looking for the {}.", object),
                    started,
                )
            }
            Err(e) => {
                error!("Failed to prepare target '{}': {:#}", object, e);
                AssistantReply::new(Intent::LocateObject, INTERNAL_ERROR, started)
            }
        }
    }

    /// Locates the session's target in a new frame.
    pub async fn locate_in_session(&self, session_id: &str, frame: &Frame) -> AssistantReply {
        let started = Instant::now();
        self.evict_idle_sessions();
        let Some(query) = self.sessions.target(session_id) else {
            return AssistantReply::new(Intent::LocateObject, NO_TARGET, started);
        };

        let reply = self.locate(&query, frame, started).await;
        self.sessions
            .record_outcome(session_id, reply.text.clone(), reply.guidance.is_some());
        reply
    }

    pub fn end_session(&self, session_id: &str) -> bool {
        self.sessions.clear(session_id)
    }

    fn evict_idle_sessions(&self) {
        let evicted = self.sessions.evict_idle(self.session_idle);
        if evicted > 0 {
            info!("Evicted {} idle locate session(s)", evicted);
        }
    }

    async fn locate(&self, query: &Query, frame: &Frame, started: Instant) -> AssistantReply {
        match self.engine.locate_object(frame, query).await {
            Ok(guidance) => {
                let mut reply = AssistantReply::new(Intent::LocateObject, guidance.text.clone(), started);
                reply.guidance = Some(guidance);
                reply
            }
            Err(e) => {
                debug!("Locate ended without guidance: {}", e);
                AssistantReply::new(Intent::LocateObject, e.spoken_message(), started)
            }
        }
    }

    async fn narrate(&self, intent: Intent, frame: &Frame) -> String {
        let Some(narrator) = &self.narrator else {
            return NARRATOR_MISSING.to_string();
        };

        let (result, fallback) = match intent {
            Intent::ReadText => (narrator.read_text(frame).await, "Error performing text recognition."),
            _ => (narrator.describe(frame).await, "Error analyzing the image."),
        };

        match result {
            Ok(text) => text,
            Err(e) => {
                error!("{} failed: {:#}", intent, e);
                fallback.to_string()
            }
        }
    }
}
