//! Transport failure classification.
//!
//! # Responsibilities
//! - Turn a failed dispatch (no HTTP response at all) into a `GatewayError`
//! - Tell "backend down" apart from "this endpoint failed" with one probe
//!
//! # Decision Order
//! ```text
//! error mentions a cross-origin restriction → CorsBlocked (no probe)
//! otherwise GET {base}{probe_path} with a bounded timeout
//!     any HTTP answer       → EndpointUnreachable
//!     error or timeout      → BackendUnreachable
//! ```
//!
//! # Design Decisions
//! - Only invoked for transport failures, never for error statuses
//! - The probe never raises; its own failure is folded into the result
//! - No retries

use std::time::{Duration, Instant};

use url::Url;

use crate::gateway::types::GatewayError;
use crate::observability::metrics;

/// Broad nature of a transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Connection refused, DNS failure, TLS handshake failure.
    Connect,
    /// The round trip exceeded its deadline.
    Timeout,
    /// The connection broke mid-exchange or the response was unreadable.
    Other,
}

/// A dispatch that produced no HTTP response.
#[derive(Debug, Clone)]
pub struct TransportFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl TransportFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Flatten a `reqwest` error and its source chain.
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            FailureKind::Timeout
        } else if err.is_connect() {
            FailureKind::Connect
        } else {
            FailureKind::Other
        };

        let mut message = err.to_string();
        let mut source = std::error::Error::source(err);
        while let Some(inner) = source {
            message.push_str(": ");
            message.push_str(&inner.to_string());
            source = inner.source();
        }
        Self { kind, message }
    }

    /// True when the failure text points at a cross-origin restriction.
    pub fn indicates_cors(&self) -> bool {
        let lowered = self.message.to_ascii_lowercase();
        lowered.contains("cors") || lowered.contains("cross-origin")
    }
}

/// Result of the diagnostic liveness probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The backend answered with any HTTP status.
    Alive,
    /// No answer within the timeout.
    Down,
}

/// Pure decision table. `probe` is `None` when no probe was issued.
pub fn classify(failure: &TransportFailure, probe: Option<ProbeOutcome>) -> GatewayError {
    let cause = failure.message.clone();
    if failure.indicates_cors() {
        return GatewayError::CorsBlocked { cause };
    }
    match probe {
        Some(ProbeOutcome::Alive) => GatewayError::EndpointUnreachable { cause },
        Some(ProbeOutcome::Down) | None => GatewayError::BackendUnreachable { cause },
    }
}

/// Classifies failures against one backend, probing it when needed.
#[derive(Debug, Clone)]
pub struct FailureClassifier {
    client: reqwest::Client,
    probe_url: Url,
    probe_timeout: Duration,
}

impl FailureClassifier {
    pub fn new(client: reqwest::Client, probe_url: Url, probe_timeout: Duration) -> Self {
        Self {
            client,
            probe_url,
            probe_timeout,
        }
    }

    pub fn probe_url(&self) -> &Url {
        &self.probe_url
    }

    /// Issue the single liveness probe.
    pub async fn probe(&self) -> ProbeOutcome {
        let start = Instant::now();
        let request = self
            .client
            .get(self.probe_url.clone())
            .header("user-agent", "task-gateway-probe")
            .timeout(self.probe_timeout)
            .send();

        // The outer deadline also bounds connection setup.
        let outcome = match tokio::time::timeout(self.probe_timeout, request).await {
            Ok(Ok(response)) => {
                tracing::debug!(status = %response.status(), "Liveness probe answered");
                ProbeOutcome::Alive
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Liveness probe failed: connection error");
                ProbeOutcome::Down
            }
            Err(_) => {
                tracing::warn!(timeout = ?self.probe_timeout, "Liveness probe failed: timeout");
                ProbeOutcome::Down
            }
        };
        metrics::record_probe(outcome == ProbeOutcome::Alive, start);
        outcome
    }

    /// Classify one transport failure.
    pub async fn classify(&self, failure: TransportFailure) -> GatewayError {
        if failure.indicates_cors() {
            return classify(&failure, None);
        }
        let probe = self.probe().await;
        classify(&failure, Some(probe))
    }
}
