//! HTTP transport behind a trait, so checks can run against a stub

use std::time::{Duration, Instant};

use personcheck_core::{AuthConfig, Config, HttpMethod};
use serde::Deserialize;
use serde_json::Value;

/// One request to the API under test.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub query: Vec<(String, String)>,
    /// JSON body, sent only with POST
    pub body: Option<Value>,
}

impl HttpRequest {
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            query: Vec::new(),
            body: None,
        }
    }

    #[must_use]
    pub fn post(url: impl Into<String>, body: Value) -> Self {
        Self {
            method: HttpMethod::Post,
            url: url.into(),
            query: Vec::new(),
            body: Some(body),
        }
    }

    #[must_use]
    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    /// URL including the encoded query string, as shown in reports.
    #[must_use]
    pub fn display_url(&self) -> String {
        if self.query.is_empty() {
            return self.url.clone();
        }
        match reqwest::Url::parse_with_params(&self.url, &self.query) {
            Ok(url) => url.to_string(),
            Err(_) => {
                let pairs: Vec<String> =
                    self.query.iter().map(|(k, v)| format!("{k}={v}")).collect();
                format!("{}?{}", self.url, pairs.join("&"))
            }
        }
    }
}

/// A completed response. `elapsed` is wall time in seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
    pub elapsed: f64,
}

impl HttpResponse {
    /// JSON response, for stubs and tests.
    #[must_use]
    pub fn json(status: u16, body: &Value) -> Self {
        Self {
            status,
            content_type: Some("application/json".into()),
            body: body.to_string().into_bytes(),
            elapsed: 0.0,
        }
    }

    #[must_use]
    pub fn with_elapsed(mut self, elapsed: f64) -> Self {
        self.elapsed = elapsed;
        self
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HttpError {
    #[error("Request timed out after {0}s")]
    Timeout(f64),
    #[error("HTTP error: {0}")]
    Transport(String),
    #[error("Authentication failed: {0}")]
    Auth(String),
    #[error("Cannot build HTTP client: {0}")]
    Client(String),
}

/// Sends requests to the API under test. Shared across scenario threads.
pub trait HttpClient: Send + Sync {
    /// # Errors
    ///
    /// Returns [`HttpError::Timeout`] when the request exceeds the client
    /// timeout, [`HttpError::Transport`] for any other I/O failure.
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, HttpError>;
}

#[derive(Debug, Clone)]
enum Credentials {
    Bearer(String),
    Basic { username: String, password: String },
    None,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// reqwest-backed client, authenticated once at construction.
#[derive(Debug)]
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
    credentials: Credentials,
    timeout: f64,
}

impl ReqwestClient {
    /// Build the client and obtain credentials.
    ///
    /// With client credentials configured, a token is requested from
    /// `token_api_url` before any check runs.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::Auth`] if credentials are incomplete or the token
    /// request fails, [`HttpError::Client`] for an invalid timeout.
    pub fn connect(config: &Config) -> Result<Self, HttpError> {
        let timeout = config.timeout_seconds;
        if !(timeout.is_finite() && timeout > 0.0) {
            return Err(HttpError::Client(format!(
                "timeout_seconds must be positive, got {timeout}"
            )));
        }
        let limit = Duration::try_from_secs_f64(timeout)
            .map_err(|e| HttpError::Client(format!("timeout_seconds {timeout}: {e}")))?;
        let auth = config.auth().map_err(|e| HttpError::Auth(e.to_string()))?;

        let client = reqwest::blocking::Client::builder()
            .timeout(limit)
            .danger_accept_invalid_certs(config.local_test)
            .build()
            .map_err(|e| HttpError::Client(error_chain(&e)))?;

        let credentials = match auth {
            AuthConfig::ClientCredentials {
                token_url,
                client_id,
                client_secret,
            } => Credentials::Bearer(fetch_token(
                &client,
                &token_url,
                &client_id,
                &client_secret,
            )?),
            AuthConfig::Basic { username, password } => Credentials::Basic { username, password },
            AuthConfig::Anonymous => Credentials::None,
        };

        Ok(Self {
            client,
            credentials,
            timeout,
        })
    }

    fn classify(&self, e: &reqwest::Error) -> HttpError {
        if e.is_timeout() {
            HttpError::Timeout(self.timeout)
        } else {
            HttpError::Transport(error_chain(e))
        }
    }
}

impl HttpClient for ReqwestClient {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, HttpError> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
        };
        let mut req = self.client.request(method, &request.url);
        if !request.query.is_empty() {
            req = req.query(&request.query);
        }
        if let Some(body) = &request.body {
            req = req.json(body);
        }
        req = match &self.credentials {
            Credentials::Bearer(token) => req.bearer_auth(token),
            Credentials::Basic { username, password } => req.basic_auth(username, Some(password)),
            Credentials::None => req,
        };

        let start = Instant::now();
        let resp = req.send().map_err(|e| self.classify(&e))?;
        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = resp.bytes().map_err(|e| self.classify(&e))?.to_vec();
        let elapsed = start.elapsed().as_secs_f64();

        tracing::debug!(
            method = %request.method,
            url = %request.display_url(),
            status,
            elapsed,
            "response received"
        );

        Ok(HttpResponse {
            status,
            content_type,
            body,
            elapsed,
        })
    }
}

fn fetch_token(
    client: &reqwest::blocking::Client,
    token_url: &str,
    client_id: &str,
    client_secret: &str,
) -> Result<String, HttpError> {
    tracing::debug!(token_url, "requesting access token");
    let resp = client
        .post(token_url)
        .form(&[
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("grant_type", "client_credentials"),
        ])
        .send()
        .and_then(reqwest::blocking::Response::error_for_status)
        .map_err(|e| HttpError::Auth(error_chain(&e)))?;
    let token: TokenResponse = resp
        .json()
        .map_err(|e| HttpError::Auth(format!("invalid token response: {}", error_chain(&e))))?;
    Ok(token.access_token)
}

/// Render a query parameter value: strings bare, everything else as JSON.
#[must_use]
pub fn query_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn error_chain(e: &dyn std::error::Error) -> String {
    let mut message = e.to_string();
    let mut source = e.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
