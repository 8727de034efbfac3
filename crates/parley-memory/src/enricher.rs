// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fire-and-forget HTTP hand-off to an out-of-band richer-summary process.
//!
//! The enricher never reports back into the request path: the spawn is
//! detached, failures are logged, and the heuristic summary written at save
//! time remains the authoritative one until the enriched record lands.

use std::time::Duration;

use tracing::{debug, warn};

use parley_core::types::ConversationRecord;
use parley_core::ParleyError;

const ENRICH_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client for the out-of-band summary enrichment endpoint.
#[derive(Clone)]
pub struct SummaryEnricher {
    client: reqwest::Client,
    endpoint: String,
}

impl SummaryEnricher {
    /// Build an enricher POSTing record snapshots to `endpoint`.
    pub fn new(endpoint: impl Into<String>) -> Result<Self, ParleyError> {
        let client = reqwest::Client::builder()
            .timeout(ENRICH_TIMEOUT)
            .build()
            .map_err(|e| ParleyError::Channel {
                message: "failed to build enrichment HTTP client".to_string(),
                source: Some(Box::new(e)),
            })?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    /// POST the saved record snapshot to the enrichment endpoint.
    pub async fn enrich(&self, record: &ConversationRecord) -> Result<(), ParleyError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(record)
            .send()
            .await
            .map_err(|e| ParleyError::Channel {
                message: format!("enrichment request to {} failed", self.endpoint),
                source: Some(Box::new(e)),
            })?;

        if !response.status().is_success() {
            return Err(ParleyError::Channel {
                message: format!(
                    "enrichment endpoint {} returned {}",
                    self.endpoint,
                    response.status()
                ),
                source: None,
            });
        }
        debug!(identity = %record.identity_key, "enrichment hand-off accepted");
        Ok(())
    }

    /// Detached enrichment: spawn, log on failure, never await.
    ///
    /// Absence of the enriched summary is a degraded-quality condition for
    /// later turns, not an error for this one.
    pub fn spawn_enrich(&self, record: ConversationRecord) {
        let enricher = self.clone();
        tokio::spawn(async move {
            if let Err(e) = enricher.enrich(&record).await {
                warn!(
                    identity = %record.identity_key,
                    error = %e,
                    "summary enrichment failed, continuing without it"
                );
            }
        });
    }
}
