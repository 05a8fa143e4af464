//! Experience lookup over the local JSON-RPC service.

use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

const METHOD: &str = "org.rdk.AuthService.getExperience";

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<ExperienceResult>,
}

#[derive(Debug, Deserialize)]
struct ExperienceResult {
    experience: Option<String>,
    #[serde(default = "default_success")]
    success: bool,
}

fn default_success() -> bool {
    true
}

/// Asks the auth service for the device experience, falling back to `fallback`.
pub fn lookup(endpoint: &str, timeout: Duration, fallback: &str) -> String {
    match query(endpoint, timeout) {
        Ok(Some(experience)) => {
            debug!(experience, "experience read");
            experience
        }
        Ok(None) => {
            debug!(fallback, "no experience reported");
            fallback.to_string()
        }
        Err(e) => {
            warn!(endpoint, error = %e, "experience lookup failed");
            fallback.to_string()
        }
    }
}

fn query(endpoint: &str, timeout: Duration) -> Result<Option<String>, reqwest::Error> {
    let client = reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()?;
    let body = client
        .post(endpoint)
        .json(&json!({ "jsonrpc": "2.0", "id": 3, "method": METHOD }))
        .send()?
        .text()?;
    Ok(parse_experience(&body))
}

/// Extracts a non-empty experience from a JSON-RPC reply.
pub fn parse_experience(body: &str) -> Option<String> {
    let reply: RpcResponse = serde_json::from_str(body).ok()?;
    let result = reply.result?;
    if !result.success {
        return None;
    }
    result
        .experience
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
}
