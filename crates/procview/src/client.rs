use std::time::Duration;

use serde_json::Value;

use crate::record::{normalize_records, ProcessRecord};

/// Uniform failure outcome for backend calls. Control flow only ever
/// branches on success/failure; the variants exist for operator-facing
/// diagnostics.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Transport(String),
    #[error("HTTP {0}")]
    Status(u16),
    #[error("unreadable response body: {0}")]
    Shape(String),
}

impl From<ureq::Error> for ApiError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(code, _) => ApiError::Status(code),
            ureq::Error::Transport(transport) => ApiError::Transport(transport.to_string()),
        }
    }
}

/// The three backend calls the core depends on. Split out as a trait so the
/// polling controller can run against an in-memory backend in tests.
pub trait ProcessApi {
    /// `GET {base}/api/processes/` — the latest stored rows.
    fn list_processes(&self) -> Result<Vec<ProcessRecord>, ApiError>;
    /// `POST {base}/api/processes/collect/` — trigger a snapshot, returns
    /// the number of processes captured.
    fn trigger_collection(&self) -> Result<u64, ApiError>;
    /// `DELETE {base}/api/processes/clear/` — idempotent row wipe.
    fn clear_all(&self) -> Result<(), ApiError>;
}

pub struct ApiClient {
    agent: ureq::Agent,
    base: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(10))
            .build();
        Self {
            agent,
            base: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }
}

impl ProcessApi for ApiClient {
    fn list_processes(&self) -> Result<Vec<ProcessRecord>, ApiError> {
        let response = self
            .agent
            .get(&self.url("/api/processes/"))
            .set("Accept", "application/json")
            .call()?;
        let body: Value = response
            .into_json()
            .map_err(|err| ApiError::Shape(err.to_string()))?;
        // Non-array bodies are treated as an empty batch, not a failure.
        Ok(normalize_records(&body))
    }

    fn trigger_collection(&self) -> Result<u64, ApiError> {
        let response = self.agent.post(&self.url("/api/processes/collect/")).call()?;
        let body: Value = response
            .into_json()
            .map_err(|err| ApiError::Shape(err.to_string()))?;
        Ok(parse_collect_count(&body))
    }

    fn clear_all(&self) -> Result<(), ApiError> {
        // Success is all that matters; the body is ignored.
        self.agent.delete(&self.url("/api/processes/clear/")).call()?;
        Ok(())
    }
}

/// A collect response carries a numeric `count`; anything else reads as 0.
fn parse_collect_count(body: &Value) -> u64 {
    match body.get("count") {
        Some(value) => value
            .as_u64()
            .or_else(|| value.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f as u64))
            .unwrap_or(0),
        None => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn collect_count_reads_numeric_field() {
        assert_eq!(parse_collect_count(&json!({"count": 42})), 42);
        assert_eq!(parse_collect_count(&json!({"count": 42.0})), 42);
    }

    #[test]
    fn collect_count_defaults_to_zero_on_odd_shapes() {
        assert_eq!(parse_collect_count(&json!({})), 0);
        assert_eq!(parse_collect_count(&json!({"count": "many"})), 0);
        assert_eq!(parse_collect_count(&json!({"count": null})), 0);
        assert_eq!(parse_collect_count(&json!([1, 2, 3])), 0);
    }

    #[test]
    fn base_url_joining_tolerates_trailing_slash() {
        let client = ApiClient::new("http://127.0.0.1:8000/");
        assert_eq!(
            client.url("/api/processes/"),
            "http://127.0.0.1:8000/api/processes/"
        );
        let client = ApiClient::new("http://127.0.0.1:8000");
        assert_eq!(
            client.url("/api/processes/collect/"),
            "http://127.0.0.1:8000/api/processes/collect/"
        );
    }
}
