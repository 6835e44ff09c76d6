use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tokio::fs;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpectraConfig {
    #[serde(default)]
    pub guidance: GuidanceConfig,
    #[serde(default)]
    pub intent: IntentConfig,
    #[serde(default)]
    pub similarity: SimilarityConfig,
    /// Remote vision model used for "read the text" and "describe" requests
    #[serde(default)]
    pub narrator: Option<RemoteModelConfig>,
    #[serde(default)]
    pub performance: PerformanceConfig,
}

/// Which way the depth model's values run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepthConvention {
    /// Inverse-depth style output: a larger value is nearer the camera
    #[default]
    LargerIsCloser,
    LargerIsFarther,
}

impl DepthConvention {
    /// True when a sample of `a` is nearer the camera than a sample of `b`.
    pub fn is_closer(&self, a: f32, b: f32) -> bool {
        match self {
            DepthConvention::LargerIsCloser => a > b,
            DepthConvention::LargerIsFarther => a < b,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuidanceConfig {
    /// Depth difference at or above which the hand must move forward
    pub far_depth_threshold: f32,
    /// Depth difference at or below which hand and object share a plane
    pub near_depth_threshold: f32,
    /// Pixel distance at or below which the object counts as in reach
    pub reach_pixel_threshold: f32,
    /// Minimum cosine similarity for the best label match
    pub match_threshold: f32,
    pub depth_convention: DepthConvention,
    /// Labels the engine never targets
    pub excluded_labels: Vec<String>,
    /// Detector class id reserved for people (0 in COCO label sets)
    pub person_class_id: Option<u32>,
    /// Detector confidence floor; 0 keeps every detection
    pub min_detection_confidence: f32,
}

impl Default for GuidanceConfig {
    fn default() -> Self {
        Self {
            far_depth_threshold: 80.0,
            near_depth_threshold: 30.0,
            reach_pixel_threshold: 150.0,
            match_threshold: 0.3,
            depth_convention: DepthConvention::LargerIsCloser,
            excluded_labels: vec!["person".to_string()],
            person_class_id: Some(0),
            min_detection_confidence: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntentConfig {
    /// Top intent score must be strictly above this
    pub threshold: f32,
    /// Phrases stripped from a locate request to get the object query
    pub object_query_phrases: Vec<String>,
}

impl Default for IntentConfig {
    fn default() -> Self {
        Self {
            threshold: 0.35,
            object_query_phrases: vec![
                "identify object location".to_string(),
                "find the".to_string(),
                "where is the".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimilarityConfig {
    /// Dimension of the built-in hashed embedding
    pub embedding_dimension: usize,
    /// Remote embedding endpoint; the hashed embedding is used when absent
    pub remote: Option<RemoteEmbeddingConfig>,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            embedding_dimension: 256,
            remote: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteEmbeddingConfig {
    pub base_url: String,
    pub api_key: String,
    pub model_name: String,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteModelConfig {
    /// Base URL for the API (e.g., "https://api.openai.com/v1")
    pub base_url: String,
    pub api_key: String,
    /// Model name (e.g., "gpt-4o")
    pub model_name: String,
    pub max_tokens: Option<usize>,
    pub temperature: Option<f32>,
    pub timeout_seconds: Option<u64>,
    /// Image detail hint sent with the frame ("low" or "high")
    pub image_detail: Option<String>,
    pub additional_headers: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Longest frame side sent to remote vision models
    pub max_upload_side: u32,
    /// Synthetic frame size used by benchmark mode
    pub benchmark_width: u32,
    pub benchmark_height: u32,
    /// Replies remembered per locate session
    pub session_history: usize,
    /// Locate sessions untouched for this long are dropped
    pub session_idle_seconds: u64,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            max_upload_side: 1024,
            benchmark_width: 640,
            benchmark_height: 480,
            session_history: 10,
            session_idle_seconds: 600,
        }
    }
}

impl SpectraConfig {
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            // Create default config file
            let default_config = Self::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            fs::write(path, toml_content).await?;
            return Ok(default_config);
        }

        let content = fs::read_to_string(path).await?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub async fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).await?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let g = &self.guidance;
        let finite = [
            ("near_depth_threshold", g.near_depth_threshold),
            ("far_depth_threshold", g.far_depth_threshold),
            ("reach_pixel_threshold", g.reach_pixel_threshold),
            ("min_detection_confidence", g.min_detection_confidence),
        ];
        if let Some((name, value)) = finite.iter().find(|(_, v)| !v.is_finite()) {
            return Err(anyhow!("{} must be a finite number, got {}", name, value));
        }
        if g.near_depth_threshold < 0.0 || g.far_depth_threshold < 0.0 {
            return Err(anyhow!("Depth thresholds must be non-negative"));
        }
        if g.near_depth_threshold >= g.far_depth_threshold {
            return Err(anyhow!(
                "near_depth_threshold ({}) must be below far_depth_threshold ({})",
                g.near_depth_threshold,
                g.far_depth_threshold
            ));
        }
        if g.reach_pixel_threshold <= 0.0 {
            return Err(anyhow!("reach_pixel_threshold must be positive"));
        }
        if !(-1.0..=1.0).contains(&g.match_threshold) {
            return Err(anyhow!("match_threshold must be a cosine similarity in [-1, 1]"));
        }
        if !(-1.0..=1.0).contains(&self.intent.threshold) {
            return Err(anyhow!("intent threshold must be a cosine similarity in [-1, 1]"));
        }
        if self.similarity.embedding_dimension == 0 {
            return Err(anyhow!("embedding_dimension must be at least 1"));
        }
        let p = &self.performance;
        if p.benchmark_width == 0 || p.benchmark_height == 0 {
            return Err(anyhow!(
                "benchmark frame size must be non-zero, got {}x{}",
                p.benchmark_width,
                p.benchmark_height
            ));
        }
        Ok(())
    }
}
