// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Accumulates distinct texts across successive frames
//!
//! The caller runs the pipeline on each frame it grabs and feeds the results
//! here. The collector keeps first-seen order and tracks a wall-clock budget;
//! it never touches the pipeline or a camera itself.

use std::collections::HashSet;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::model::RecognizedText;

/// Default polling budget for a collection session
pub const DEFAULT_COLLECTION_BUDGET: Duration = Duration::from_secs(30);

/// Distinct-text accumulator for a multi-frame session
#[derive(Debug, Clone)]
pub struct TextCollector {
    texts: Vec<String>,
    seen: HashSet<String>,
    allowlist: Option<HashSet<String>>,
    started_at: Instant,
    budget: Duration,
    frames: usize,
}

impl Default for TextCollector {
    fn default() -> Self {
        Self::new(DEFAULT_COLLECTION_BUDGET)
    }
}

impl TextCollector {
    /// Start a session with the given wall-clock budget
    pub fn new(budget: Duration) -> Self {
        Self::started_at(budget, Instant::now())
    }

    /// Start a session with an explicit start instant
    pub fn started_at(budget: Duration, started_at: Instant) -> Self {
        Self {
            texts: Vec::new(),
            seen: HashSet::new(),
            allowlist: None,
            started_at,
            budget,
            frames: 0,
        }
    }

    /// Only accept texts that exactly match one of `allowed`
    pub fn with_allowlist<I, S>(mut self, allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowlist = Some(allowed.into_iter().map(Into::into).collect());
        self
    }

    /// Record one frame's results
    ///
    /// Returns the texts accepted for the first time, in result order.
    pub fn observe(&mut self, results: &[RecognizedText]) -> Vec<String> {
        self.observe_texts(results.iter().map(|r| r.content.as_str()))
    }

    /// Record one frame's decoded strings
    pub fn observe_texts<'a, I>(&mut self, texts: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.frames += 1;

        let mut accepted = Vec::new();
        for text in texts {
            if self.seen.contains(text) || !self.is_allowed(text) {
                continue;
            }
            self.seen.insert(text.to_string());
            self.texts.push(text.to_string());
            accepted.push(text.to_string());
        }

        if !accepted.is_empty() {
            info!("Frame {}: collected {:?}", self.frames, accepted);
        } else {
            debug!("Frame {}: nothing new", self.frames);
        }
        accepted
    }

    fn is_allowed(&self, text: &str) -> bool {
        self.allowlist
            .as_ref()
            .map_or(true, |allowed| allowed.contains(text))
    }

    /// Distinct texts in first-seen order
    pub fn texts(&self) -> &[String] {
        &self.texts
    }

    pub fn into_texts(self) -> Vec<String> {
        self.texts
    }

    pub fn contains(&self, text: &str) -> bool {
        self.seen.contains(text)
    }

    /// Number of frames observed so far
    pub fn frames_observed(&self) -> usize {
        self.frames
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Whether the budget has run out
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    /// Whether the budget has run out at `now`
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.started_at) > self.budget
    }
}
