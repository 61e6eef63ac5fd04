//! HTTP plumbing for the remote delegate.
//!
//! `HttpTransport` talks to real services over `reqwest`. `MockTransport` is
//! a scripted in-memory double.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde_json::Value;
use thiserror::Error;

#[cfg(any(test, feature = "mock"))]
use std::collections::HashMap;

#[cfg(any(test, feature = "mock"))]
use parking_lot::Mutex;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors from one exchange with a remote service.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The request never produced a response.
    #[error("network error calling {url}: {reason}")]
    Network { url: String, reason: String },

    /// The service answered outside the 2xx range.
    #[error("{url} answered status {status}")]
    Status { url: String, status: u16 },

    /// The response body was not the JSON we expected.
    #[error("undecodable response from {url}: {reason}")]
    Decode { url: String, reason: String },
}

/// The HTTP surface a remote reconciliation service is driven through.
#[async_trait]
pub trait RemoteTransport: Send + Sync {
    /// `GET url?params`, expecting a JSON response.
    async fn get(&self, url: &str, params: &[(String, String)]) -> Result<Value, TransportError>;

    /// `POST url` with a JSON body, expecting a JSON response.
    async fn post_json(&self, url: &str, body: &Value) -> Result<Value, TransportError>;

    /// `POST url` with form-encoded fields, expecting a JSON response.
    async fn post_form(
        &self,
        url: &str,
        form: &[(String, String)],
    ) -> Result<Value, TransportError>;
}

/// Transport over a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: HttpClient,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::with_timeout(REQUEST_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            http: HttpClient::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| HttpClient::new()),
        }
    }

    async fn decode(url: &str, response: reqwest::Response) -> Result<Value, TransportError> {
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        response
            .json()
            .await
            .map_err(|error| TransportError::Decode {
                url: url.to_string(),
                reason: error.to_string(),
            })
    }

    fn network_error(url: &str, error: reqwest::Error) -> TransportError {
        TransportError::Network {
            url: url.to_string(),
            reason: error.to_string(),
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteTransport for HttpTransport {
    async fn get(&self, url: &str, params: &[(String, String)]) -> Result<Value, TransportError> {
        let response = self
            .http
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(|error| Self::network_error(url, error))?;
        Self::decode(url, response).await
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<Value, TransportError> {
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|error| Self::network_error(url, error))?;
        Self::decode(url, response).await
    }

    async fn post_form(
        &self,
        url: &str,
        form: &[(String, String)],
    ) -> Result<Value, TransportError> {
        let response = self
            .http
            .post(url)
            .form(form)
            .send()
            .await
            .map_err(|error| Self::network_error(url, error))?;
        Self::decode(url, response).await
    }
}

/// One call seen by [`MockTransport`], in arrival order.
#[cfg(any(test, feature = "mock"))]
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: &'static str,
    pub url: String,
    pub params: Vec<(String, String)>,
    pub body: Option<Value>,
}

/// Scripted [`RemoteTransport`] keyed by URL.
///
/// Unscripted URLs answer 404 so tests fail loudly on unexpected calls.
#[cfg(any(test, feature = "mock"))]
#[derive(Default)]
pub struct MockTransport {
    responses: Mutex<HashMap<String, Value>>,
    failures: Mutex<HashMap<String, TransportError>>,
    calls: Mutex<Vec<RecordedCall>>,
}

#[cfg(any(test, feature = "mock"))]
impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the JSON answer for `url`, replacing any earlier script.
    pub fn script(&self, url: impl Into<String>, response: Value) {
        self.responses.lock().insert(url.into(), response);
    }

    pub fn script_failure(&self, url: impl Into<String>, error: TransportError) {
        self.failures.lock().insert(url.into(), error);
    }

    pub fn clear_failure(&self, url: &str) {
        self.failures.lock().remove(url);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    fn answer(
        &self,
        method: &'static str,
        url: &str,
        params: Vec<(String, String)>,
        body: Option<Value>,
    ) -> Result<Value, TransportError> {
        self.calls.lock().push(RecordedCall {
            method,
            url: url.to_string(),
            params,
            body,
        });

        if let Some(error) = self.failures.lock().get(url) {
            return Err(error.clone());
        }
        match self.responses.lock().get(url) {
            Some(value) => Ok(value.clone()),
            None => Err(TransportError::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}

#[cfg(any(test, feature = "mock"))]
#[async_trait]
impl RemoteTransport for MockTransport {
    async fn get(&self, url: &str, params: &[(String, String)]) -> Result<Value, TransportError> {
        self.answer("GET", url, params.to_vec(), None)
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<Value, TransportError> {
        self.answer("POST", url, Vec::new(), Some(body.clone()))
    }

    async fn post_form(
        &self,
        url: &str,
        form: &[(String, String)],
    ) -> Result<Value, TransportError> {
        self.answer("POST", url, form.to_vec(), None)
    }
}
