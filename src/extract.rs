//! Tag extraction with retry
//!
//! One extraction is up to `extraction_attempts` attempts spaced
//! `extraction_retry_ms` apart. Each attempt waits for the host to render
//! something readable, then runs the tag probes in order. Running out of
//! attempts is reported as [`Extraction::Exhausted`], never as an empty
//! snapshot, so nobody mistakes "could not read the page" for "the page
//! has no tags".

use crate::config::{FolderViewConfig, TimingConfig};
use crate::host::{first_match, wait_until, HostPage, TagProbe};
use crate::tags::TagSnapshot;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Outcome of one extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// The page was read. The snapshot may legitimately be empty.
    Complete(TagSnapshot),
    /// Every attempt failed; nothing is known about the page.
    Exhausted { attempts: u32 },
}

impl Extraction {
    pub fn snapshot(&self) -> Option<&TagSnapshot> {
        match self {
            Self::Complete(snapshot) => Some(snapshot),
            Self::Exhausted { .. } => None,
        }
    }

    pub fn into_snapshot(self) -> Option<TagSnapshot> {
        match self {
            Self::Complete(snapshot) => Some(snapshot),
            Self::Exhausted { .. } => None,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }
}

/// Why a single attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttemptError {
    #[error("page not ready after {waited_ms} ms")]
    NotReady { waited_ms: u64 },
    #[error("no tag probe matched ({tried} tried)")]
    NoProbeMatched { tried: usize },
}

/// Anything that can produce tag snapshots.
///
/// Implementations must be read-only with respect to the host page.
#[async_trait]
pub trait TagSource: Send + Sync {
    async fn extract(&self) -> Extraction;
}

/// Reads tags from a [`HostPage`] through the configured probe cascade.
pub struct TagExtractor {
    page: Arc<dyn HostPage>,
    ready: Vec<String>,
    probes: Vec<TagProbe>,
    timing: TimingConfig,
}

impl TagExtractor {
    pub fn new(page: Arc<dyn HostPage>, config: &FolderViewConfig) -> Self {
        Self {
            page,
            ready: config.probes.ready.clone(),
            probes: config.probes.tags.clone(),
            timing: config.timing.clone(),
        }
    }

    fn is_ready(&self) -> bool {
        self.ready.is_empty()
            || self
                .ready
                .iter()
                .any(|selector| self.page.query(None, selector).is_some())
    }

    /// One attempt: wait for readiness, then take the first probe that
    /// recognizes the page.
    pub async fn attempt(&self) -> Result<TagSnapshot, AttemptError> {
        let ready = wait_until(self.timing.poll_interval(), self.timing.readiness_wait(), || {
            self.is_ready().then_some(())
        })
        .await;
        if ready.is_none() {
            return Err(AttemptError::NotReady {
                waited_ms: self.timing.readiness_wait_ms,
            });
        }

        match first_match(&self.probes, |probe| probe.probe(self.page.as_ref())) {
            Some((index, snapshot)) => {
                tracing::debug!(
                    probe = %self.probes[index].describe(),
                    tags = snapshot.len(),
                    "tag probe matched"
                );
                Ok(snapshot)
            }
            None => Err(AttemptError::NoProbeMatched {
                tried: self.probes.len(),
            }),
        }
    }
}

#[async_trait]
impl TagSource for TagExtractor {
    async fn extract(&self) -> Extraction {
        let max_attempts = self.timing.extraction_attempts;
        for attempt in 1..=max_attempts {
            match self.attempt().await {
                Ok(snapshot) => return Extraction::Complete(snapshot),
                Err(e) => {
                    tracing::warn!(attempt, max_attempts, error = %e, "failed to extract tags");
                }
            }
            if attempt < max_attempts {
                tokio::time::sleep(self.timing.extraction_retry()).await;
            }
        }
        tracing::error!(attempts = max_attempts, "failed to extract tags after multiple attempts");
        Extraction::Exhausted {
            attempts: max_attempts,
        }
    }
}
