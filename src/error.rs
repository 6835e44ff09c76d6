use thiserror::Error;

use crate::inference::InferenceStage;

/// Every way a locate request can end without guidance.
///
/// All variants are recoverable per request and carry a spoken fallback,
/// since the user relies on hearing something back even on failure.
#[derive(Debug, Error)]
pub enum LocateError {
    #[error("no non-person objects detected")]
    NoObjectsDetected,

    #[error("best match for '{query}' scored {best_score:.2}, below threshold")]
    LowConfidenceMatch {
        query: String,
        best_score: f32,
        available: Vec<String>,
    },

    #[error("found {target} but no hand is visible")]
    NoHandDetected { target: String },

    #[error("{stage} failed: {source}")]
    InferenceFailure {
        stage: InferenceStage,
        #[source]
        source: anyhow::Error,
    },
}

impl LocateError {
    pub fn inference(stage: InferenceStage, source: impl Into<anyhow::Error>) -> Self {
        LocateError::InferenceFailure {
            stage,
            source: source.into(),
        }
    }

    /// Natural-language reply for the end user. Never includes internals.
    pub fn spoken_message(&self) -> String {
        match self {
            LocateError::NoObjectsDetected => "No objects detected in the scene.".to_string(),
            LocateError::LowConfidenceMatch { query, available, .. } => format!(
                "I couldn't clearly identify a {}. Objects detected: {}.",
                query,
                available.join(", ")
            ),
            LocateError::NoHandDetected { target } => {
                format!("I see a {}, but I don't detect your hand.", target)
            }
            LocateError::InferenceFailure { .. } => {
                "Error finding the object relative to your hand.".to_string()
            }
        }
    }

    pub fn stage(&self) -> Option<InferenceStage> {
        match self {
            LocateError::InferenceFailure { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}
