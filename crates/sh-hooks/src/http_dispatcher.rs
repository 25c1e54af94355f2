//! HTTP delivery for hooks
//!
//! Sends one rendered hook request and classifies the outcome. Only 200 and
//! 201 count as success; there are no retries.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Serialize;
use sh_common::{Authentication, Hook, HookHeader, HttpMethod, StoreHooksError};
use sh_config::HttpConfig;
use tracing::{debug, warn};

use crate::response::{format_transcript, is_success_status};

/// Message stored when the target answered with anything but 200/201
pub const CONNECT_ERROR_MESSAGE: &str = "Cannot connect to server. Please try again later.";

/// HTTP dispatcher configuration
#[derive(Debug, Clone)]
pub struct HttpDispatcherConfig {
    /// Connect timeout
    pub connect_timeout: Duration,
    /// Request timeout
    pub request_timeout: Duration,
}

impl Default for HttpDispatcherConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl From<&HttpConfig> for HttpDispatcherConfig {
    fn from(config: &HttpConfig) -> Self {
        Self {
            connect_timeout: config.connect_timeout(),
            request_timeout: config.request_timeout(),
        }
    }
}

/// A rendered hook request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<HookHeader>,
    /// Full `Authorization` header value
    pub authorization: Option<String>,
    pub content_type: Option<String>,
    pub body: String,
}

impl DeliveryRequest {
    /// Combine a hook's transport settings with a rendered URL and body
    pub fn from_hook(hook: &Hook, url: String, body: String) -> Self {
        let authorization = match hook.authentication {
            Authentication::Basic => Some(basic_auth_header(
                hook.username.as_deref().unwrap_or_default(),
                hook.password.as_deref().unwrap_or_default(),
            )),
            Authentication::None => None,
        };

        Self {
            method: hook.method,
            url,
            headers: hook.headers.clone(),
            authorization,
            content_type: hook.content_type.clone().filter(|c| !c.trim().is_empty()),
            body,
        }
    }

    /// Configured headers (trimmed), then `Authorization` and `Content-Type`.
    /// Basic auth is added next to a configured `Authorization` header, not
    /// in place of it.
    pub fn header_map(&self) -> Result<HeaderMap, StoreHooksError> {
        let mut headers = HeaderMap::new();
        for header in &self.headers {
            let name = HeaderName::from_bytes(header.name.trim().as_bytes())
                .map_err(|e| StoreHooksError::Delivery(format!("Invalid header name '{}': {}", header.name, e)))?;
            let value = HeaderValue::from_str(header.value.trim())
                .map_err(|e| StoreHooksError::Delivery(format!("Invalid value for header '{}': {}", header.name, e)))?;
            headers.append(name, value);
        }

        if let Some(ref auth) = self.authorization {
            let value = HeaderValue::from_str(auth)
                .map_err(|e| StoreHooksError::Delivery(format!("Invalid authorization header: {}", e)))?;
            headers.append(AUTHORIZATION, value);
        }

        if let Some(ref content_type) = self.content_type {
            let value = HeaderValue::from_str(content_type.trim())
                .map_err(|e| StoreHooksError::Delivery(format!("Invalid content type: {}", e)))?;
            headers.insert(CONTENT_TYPE, value);
        }

        Ok(headers)
    }
}

/// Outcome of one delivery attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryResult {
    pub success: bool,
    pub status: Option<u16>,
    /// Raw response transcript, empty when nothing was received
    pub response: String,
    pub message: Option<String>,
}

impl DeliveryResult {
    /// Classify a received response
    pub fn from_response(status: u16, response: String) -> Self {
        if !response.is_empty() && is_success_status(status) {
            Self { success: true, status: Some(status), response, message: None }
        } else {
            Self {
                success: false,
                status: Some(status),
                response,
                message: Some(CONNECT_ERROR_MESSAGE.to_string()),
            }
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            status: None,
            response: String::new(),
            message: Some(message.into()),
        }
    }
}

pub fn basic_auth_header(username: &str, password: &str) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(format!("{}:{}", username, password));
    format!("Basic {}", encoded)
}

/// Sends rendered hook requests
#[async_trait]
pub trait HookTransport: Send + Sync {
    async fn deliver(&self, request: &DeliveryRequest) -> DeliveryResult;
}

/// reqwest backed transport
pub struct HttpDispatcher {
    client: reqwest::Client,
}

impl HttpDispatcher {
    pub fn new(config: HttpDispatcherConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self { client })
    }

    async fn send(&self, request: &DeliveryRequest) -> Result<(u16, String), StoreHooksError> {
        let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes())
            .map_err(|e| StoreHooksError::Delivery(e.to_string()))?;
        let headers = request.header_map()?;

        let mut builder = self.client.request(method, &request.url).headers(headers);
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| StoreHooksError::Delivery(e.to_string()))?;

        let version = format!("{:?}", response.version());
        let status = response.status();
        let response_headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .map(|(name, value)| (name.to_string(), String::from_utf8_lossy(value.as_bytes()).into_owned()))
            .collect();
        let body = response
            .text()
            .await
            .map_err(|e| StoreHooksError::Delivery(e.to_string()))?;

        let transcript = format_transcript(
            &version,
            status.as_u16(),
            status.canonical_reason(),
            &response_headers,
            &body,
        );
        Ok((status.as_u16(), transcript))
    }
}

#[async_trait]
impl HookTransport for HttpDispatcher {
    async fn deliver(&self, request: &DeliveryRequest) -> DeliveryResult {
        debug!(method = request.method.as_str(), url = %request.url, "Sending hook request");

        match self.send(request).await {
            Ok((status, transcript)) => {
                let result = DeliveryResult::from_response(status, transcript);
                if !result.success {
                    warn!(url = %request.url, status, "Hook target returned non-success status");
                }
                result
            }
            Err(e) => {
                warn!(url = %request.url, error = %e, "Hook request failed");
                let message = match e {
                    StoreHooksError::Delivery(message) => message,
                    other => other.to_string(),
                };
                DeliveryResult::failure(message)
            }
        }
    }
}
