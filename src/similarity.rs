//! Label similarity rankers.
//!
//! `HashEmbeddingRanker` needs no model and is deterministic, which makes it
//! the default for offline runs and tests. `RemoteEmbeddingRanker` calls an
//! OpenAI-compatible `/embeddings` endpoint.

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::RemoteEmbeddingConfig;
use crate::inference::{sort_scores, Query, ScoredLabel, SimilarityRanker};

/// Cosine similarity; zero when either vector has no magnitude or the
/// lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn score_labels(query: &[f32], labels: &[String], embeddings: &[Vec<f32>]) -> Result<Vec<ScoredLabel>> {
    if let Some(bad) = embeddings.iter().find(|e| e.len() != query.len()) {
        return Err(anyhow!(
            "Query embedding has dimension {}, label embedding has {}",
            query.len(),
            bad.len()
        ));
    }
    let mut scores: Vec<ScoredLabel> = labels
        .iter()
        .zip(embeddings)
        .map(|(label, embedding)| ScoredLabel {
            label: label.clone(),
            score: cosine_similarity(query, embedding),
        })
        .collect();
    sort_scores(&mut scores);
    Ok(scores)
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in bytes {
        hash ^= *b as u64;
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

/// Bag of lowercased word tokens plus character trigrams, hashed into a
/// fixed number of buckets. Words weigh more than trigrams, so "cup" and
/// "coffee cup" stay close while "cup" and "bottle" do not.
#[derive(Debug, Clone)]
pub struct HashEmbeddingRanker {
    dimension: usize,
}

impl HashEmbeddingRanker {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        let normalized = text.to_lowercase();

        for token in normalized
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let bucket = (fnv1a(token.as_bytes()) % self.dimension as u64) as usize;
            vector[bucket] += 2.0;

            let padded: Vec<char> = format!(" {} ", token).chars().collect();
            for window in padded.windows(3) {
                let gram: String = window.iter().collect();
                let bucket = (fnv1a(gram.as_bytes()) % self.dimension as u64) as usize;
                vector[bucket] += 1.0;
            }
        }
        vector
    }

    fn query_vector(&self, query: &Query) -> Result<Vec<f32>> {
        match query {
            Query::Text(text) => Ok(self.embed(text)),
            Query::Embedding { vector, .. } if vector.len() == self.dimension => Ok(vector.clone()),
            Query::Embedding { vector, .. } => Err(anyhow!(
                "Query embedding has dimension {}, ranker expects {}",
                vector.len(),
                self.dimension
            )),
        }
    }
}

impl Default for HashEmbeddingRanker {
    fn default() -> Self {
        Self::new(256)
    }
}

impl SimilarityRanker for HashEmbeddingRanker {
    async fn rank(&self, query: &Query, labels: &[String]) -> Result<Vec<ScoredLabel>> {
        let query_vector = self.query_vector(query)?;
        let embeddings: Vec<Vec<f32>> = labels.iter().map(|l| self.embed(l)).collect();
        score_labels(&query_vector, labels, &embeddings)
    }

    async fn prepare(&self, query: Query) -> Result<Query> {
        match query {
            Query::Text(text) => Ok(Query::Embedding {
                vector: self.embed(&text),
                text: Some(text),
            }),
            other => Ok(other),
        }
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

pub struct RemoteEmbeddingRanker {
    config: RemoteEmbeddingConfig,
    client: reqwest::Client,
}

impl RemoteEmbeddingRanker {
    pub fn new(config: RemoteEmbeddingConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_seconds.unwrap_or(30));
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("Spectra/1.0")
            .build()
            .map_err(|e| anyhow!("Failed to create HTTP client: {}", e))?;

        info!("🌐 Remote embedding ranker: {} at {}", config.model_name, config.base_url);
        Ok(Self { config, client })
    }

    pub async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/embeddings", self.config.base_url.trim_end_matches('/'));
        debug!("📤 Embedding {} inputs via {}", inputs.len(), url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&EmbeddingRequest {
                model: &self.config.model_name,
                input: inputs,
            })
            .send()
            .await
            .map_err(|e| anyhow!("Failed to send embedding request: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow!("Embedding API error ({}): {}", status, error_text));
        }

        let mut body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| anyhow!("Failed to parse embedding response: {}", e))?;

        if body.data.len() != inputs.len() {
            return Err(anyhow!(
                "Embedding API returned {} vectors for {} inputs",
                body.data.len(),
                inputs.len()
            ));
        }
        body.data.sort_by_key(|d| d.index);
        Ok(body.data.into_iter().map(|d| d.embedding).collect())
    }

    async fn query_vector(&self, query: &Query) -> Result<Vec<f32>> {
        match query {
            Query::Embedding { vector, .. } => Ok(vector.clone()),
            Query::Text(text) => self
                .embed(std::slice::from_ref(text))
                .await?
                .pop()
                .ok_or_else(|| anyhow!("Embedding API returned no vector for the query")),
        }
    }
}

impl SimilarityRanker for RemoteEmbeddingRanker {
    async fn rank(&self, query: &Query, labels: &[String]) -> Result<Vec<ScoredLabel>> {
        let query_vector = self.query_vector(query).await?;
        let embeddings = self.embed(labels).await?;
        score_labels(&query_vector, labels, &embeddings)
    }

    async fn prepare(&self, query: Query) -> Result<Query> {
        match query {
            Query::Text(text) => {
                let vector = self.query_vector(&Query::Text(text.clone())).await?;
                Ok(Query::Embedding {
                    vector,
                    text: Some(text),
                })
            }
            other => Ok(other),
        }
    }
}

/// Either ranker, chosen from configuration at startup.
pub enum ConfiguredRanker {
    Hashed(HashEmbeddingRanker),
    Remote(RemoteEmbeddingRanker),
}

impl ConfiguredRanker {
    pub fn from_config(config: &crate::config::SimilarityConfig) -> Result<Self> {
        match &config.remote {
            Some(remote) => Ok(ConfiguredRanker::Remote(RemoteEmbeddingRanker::new(remote.clone())?)),
            None => Ok(ConfiguredRanker::Hashed(HashEmbeddingRanker::new(
                config.embedding_dimension,
            ))),
        }
    }
}

impl SimilarityRanker for ConfiguredRanker {
    async fn rank(&self, query: &Query, labels: &[String]) -> Result<Vec<ScoredLabel>> {
        match self {
            ConfiguredRanker::Hashed(r) => r.rank(query, labels).await,
            ConfiguredRanker::Remote(r) => r.rank(query, labels).await,
        }
    }

    async fn prepare(&self, query: Query) -> Result<Query> {
        match self {
            ConfiguredRanker::Hashed(r) => r.prepare(query).await,
            ConfiguredRanker::Remote(r) => r.prepare(query).await,
        }
    }
}
