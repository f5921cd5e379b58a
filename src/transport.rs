use std::sync::Once;

use reqwest::Method;
use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::{Credentials, Endpoint};
use crate::error::ReconcileError;

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Uniform result of one REST exchange.
///
/// Transport failures carry no status; every HTTP response does, so callers
/// can branch on conflict and not-found without inspecting raw codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiOutcome {
    /// Any 2xx response.
    Success { status: u16, body: String },
    /// 409: the named resource already exists.
    Conflict { detail: String },
    /// 404.
    NotFound { detail: String },
    /// Any other non-2xx response.
    Backend { status: u16, detail: String },
    /// No usable response (DNS, connect, TLS, timeout).
    Transport { detail: String },
}

impl ApiOutcome {
    pub fn from_response(status: u16, body: String) -> Self {
        match status {
            200..=299 => Self::Success { status, body },
            404 => Self::NotFound { detail: body },
            409 => Self::Conflict { detail: body },
            _ => Self::Backend {
                status,
                detail: body,
            },
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Success { status, .. } | Self::Backend { status, .. } => Some(*status),
            Self::Conflict { .. } => Some(409),
            Self::NotFound { .. } => Some(404),
            Self::Transport { .. } => None,
        }
    }

    /// True only for 201, i.e. the backend created a new resource.
    pub fn is_created(&self) -> bool {
        matches!(self, Self::Success { status: 201, .. })
    }

    /// Body of a successful response; `None` for failures.
    pub fn body(&self) -> Option<&str> {
        match self {
            Self::Success { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Decode a successful, non-empty JSON body.
    pub fn json<T: DeserializeOwned>(&self) -> Option<T> {
        self.body()
            .filter(|b| !b.trim().is_empty())
            .and_then(|b| serde_json::from_str(b).ok())
    }

    /// Convert a failed outcome into a resource-scoped error.
    pub fn into_error(self, kind: &'static str, name: &str) -> ReconcileError {
        match self {
            Self::Transport { detail } => ReconcileError::Transport {
                kind,
                name: name.to_owned(),
                detail,
            },
            other => {
                let status = other.status().unwrap_or_default();
                let detail = match other {
                    Self::Success { body, .. } => body,
                    Self::Conflict { detail }
                    | Self::NotFound { detail }
                    | Self::Backend { detail, .. }
                    | Self::Transport { detail } => detail,
                };
                ReconcileError::Backend {
                    kind,
                    name: name.to_owned(),
                    status,
                    detail,
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

static CRYPTO_PROVIDER: Once = Once::new();

/// Install the process-wide rustls provider once; kube and reqwest both build TLS configs.
pub fn ensure_crypto_provider() {
    CRYPTO_PROVIDER.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// Authenticated JSON client for one REST backend.
#[derive(Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
    credentials: Credentials,
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("base_url", &self.base_url)
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

impl RestClient {
    pub fn new(endpoint: &impl Endpoint) -> Result<Self, reqwest::Error> {
        ensure_crypto_provider();
        let http = reqwest::Client::builder()
            .user_agent(concat!("platformer/", env!("CARGO_PKG_VERSION")))
            .danger_accept_invalid_certs(endpoint.tls().insecure_skip_verify)
            .build()?;

        Ok(Self {
            http,
            base_url: endpoint.url().trim_end_matches('/').to_owned(),
            credentials: endpoint.credentials().clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Issue one request. Always sends basic auth and a JSON content type.
    pub async fn call(&self, method: Method, path: &str, body: Option<&Value>) -> ApiOutcome {
        let url = format!("{}{path}", self.base_url);
        let mut request = self
            .http
            .request(method.clone(), &url)
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .header(CONTENT_TYPE, "application/json");

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = match request.send().await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!(%method, %url, error = %e, "request failed");
                return ApiOutcome::Transport {
                    detail: e.to_string(),
                };
            }
        };

        let status = response.status().as_u16();
        let text = match response.text().await {
            Ok(t) => t,
            Err(e) => {
                return ApiOutcome::Transport {
                    detail: format!("failed to read response body: {e}"),
                };
            }
        };

        tracing::debug!(%method, %url, status, "api call");
        ApiOutcome::from_response(status, text)
    }

    pub async fn get(&self, path: &str) -> ApiOutcome {
        self.call(Method::GET, path, None).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> ApiOutcome {
        self.call(Method::POST, path, Some(body)).await
    }

    pub async fn put(&self, path: &str, body: &Value) -> ApiOutcome {
        self.call(Method::PUT, path, Some(body)).await
    }

    /// Liveness probe: any HTTP response at the base URL counts as reachable.
    pub async fn probe(&self) -> Result<(), String> {
        match self.get("/").await {
            ApiOutcome::Transport { detail } => Err(detail),
            _ => Ok(()),
        }
    }
}
