//! Contract of the outbound client that talks to service brokers.
//!
//! The persistence core never calls it; the type lives here so that
//! orchestration code can depend on one crate for the registry's ports.

use crate::ClientError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Basic credentials a broker is called with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicCredentials {
    pub username: String,
    pub password: String,
}

impl BasicCredentials {
    /// Credentials are only applied when both parts are present.
    pub fn is_usable(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}

/// An outbound request to a broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerRequest {
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    #[serde(default)]
    pub body: Option<serde_json::Value>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl BrokerRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            params: BTreeMap::new(),
            body: None,
            headers: BTreeMap::new(),
        }
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// A broker's response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerResponse {
    pub status: u16,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub body: Option<serde_json::Value>,
}

/// Sends requests to one broker, applying its credentials and TLS settings.
#[async_trait]
pub trait BrokerClient: Send + Sync {
    async fn send_request(&self, request: BrokerRequest) -> Result<BrokerResponse, ClientError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_need_both_parts() {
        let creds = BasicCredentials {
            username: "admin".to_string(),
            password: String::new(),
        };
        assert!(!creds.is_usable());
    }

    #[test]
    fn test_request_builder() {
        let request = BrokerRequest::new("PUT", "https://broker.example/v2/service_instances/1")
            .with_header("X-Broker-API-Version", "2.14")
            .with_body(serde_json::json!({"plan_id": "plan-1"}));
        assert_eq!(request.headers.len(), 1);
        assert!(request.body.is_some());
    }
}
