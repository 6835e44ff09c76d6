use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::config::IntentConfig;
use crate::inference::{Query, SimilarityRanker};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Intent {
    ReadText,
    DescribeScene,
    LocateObject,
    Other,
    /// Nothing scored above the intent threshold
    Unknown,
}

impl Intent {
    /// Intents a request can be classified into, with their reference prompt.
    pub const PROMPTS: [(Intent, &'static str); 4] = [
        (Intent::ReadText, "Read the text"),
        (Intent::DescribeScene, "describe what I am viewing"),
        (Intent::LocateObject, "Identify object location"),
        (Intent::Other, "Other"),
    ];

    pub fn prompt(&self) -> &'static str {
        Self::PROMPTS
            .iter()
            .find(|(intent, _)| intent == self)
            .map(|(_, prompt)| *prompt)
            .unwrap_or("Unknown")
    }

    pub fn needs_frame(&self) -> bool {
        matches!(
            self,
            Intent::ReadText | Intent::DescribeScene | Intent::LocateObject
        )
    }

    fn from_prompt(prompt: &str) -> Option<Intent> {
        Self::PROMPTS
            .iter()
            .find(|(_, p)| *p == prompt)
            .map(|(intent, _)| *intent)
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prompt())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentMatch {
    pub intent: Intent,
    pub score: f32,
}

/// Maps a free-form request to one of the assistant's intents.
pub struct IntentClassifier {
    config: IntentConfig,
}

impl IntentClassifier {
    pub fn new(config: IntentConfig) -> Self {
        Self { config }
    }

    pub async fn classify<S: SimilarityRanker>(&self, ranker: &S, request: &str) -> Result<IntentMatch> {
        let prompts: Vec<String> = Intent::PROMPTS.iter().map(|(_, p)| p.to_string()).collect();
        let scores = ranker.rank(&Query::text(request), &prompts).await?;

        let best = scores
            .iter()
            .filter_map(|s| Intent::from_prompt(&s.label).map(|intent| (intent, s.score)))
            .fold(None::<(Intent, f32)>, |best, (intent, score)| match best {
                Some((_, best_score)) if best_score >= score => best,
                _ => Some((intent, score)),
            });

        let result = match best {
            Some((intent, score)) if score > self.config.threshold => IntentMatch { intent, score },
            Some((_, score)) => IntentMatch {
                intent: Intent::Unknown,
                score,
            },
            None => IntentMatch {
                intent: Intent::Unknown,
                score: f32::NEG_INFINITY,
            },
        };

        debug!("Intent for '{}': {} ({:.2})", request, result.intent, result.score);
        Ok(result)
    }

    /// Strips request phrasing such as "where is the" to leave the object.
    /// Falls back to the whole request when nothing is left.
    pub fn extract_object_query(&self, request: &str) -> String {
        let mut remaining = request.to_string();
        for phrase in &self.config.object_query_phrases {
            remaining = remove_ignore_case(&remaining, phrase);
        }
        let cleaned = remaining
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .trim_matches(|c: char| c == '?' || c == '.' || c == '!')
            .trim()
            .to_string();

        if cleaned.is_empty() {
            request.trim().to_string()
        } else {
            cleaned
        }
    }
}

fn remove_ignore_case(haystack: &str, needle: &str) -> String {
    if needle.is_empty() {
        return haystack.to_string();
    }
    // Case-folded offsets only line up with the original for ASCII.
    if !haystack.is_ascii() || !needle.is_ascii() {
        return haystack.replace(needle, "");
    }
    let lower_haystack = haystack.to_ascii_lowercase();
    let lower_needle = needle.to_ascii_lowercase();

    let mut out = String::with_capacity(haystack.len());
    let mut cursor = 0;
    while let Some(pos) = lower_haystack[cursor..].find(&lower_needle) {
        let start = cursor + pos;
        out.push_str(&haystack[cursor..start]);
        cursor = start + lower_needle.len();
    }
    out.push_str(&haystack[cursor..]);
    out
}
