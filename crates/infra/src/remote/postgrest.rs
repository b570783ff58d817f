//! PostgREST remote applier
//!
//! Translates queued mutations into REST calls against a PostgREST-compatible
//! endpoint:
//!
//! - insert → `POST {base}/rest/v1/{resource}` with body `[payload]`
//! - update → `PATCH {base}/rest/v1/{resource}?id=eq.{id}` with body `payload`
//!
//! Every request carries the record's idempotency key so the remote side can
//! recognise a resubmission after a crash.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use shopsync_core::{RemoteApplier, RemoteApplyError, RemoteMutation};
use shopsync_domain::constants::PRIMARY_KEY_FIELD;
use shopsync_domain::{MutationAction, RemoteConfig, Result as DomainResult, ShopSyncError};
use tracing::{debug, instrument, warn};
use url::Url;

use crate::errors::{classify_http_error, classify_status, InfraError};

const REST_PATH: &str = "rest/v1/";
const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";
const MAX_ERROR_BODY_LEN: usize = 200;

/// Connection settings for [`PostgrestApplier`].
#[derive(Clone)]
pub struct PostgrestConfig {
    /// Project root, e.g. `https://abc.supabase.co/`.
    pub base_url: Url,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl std::fmt::Debug for PostgrestConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgrestConfig")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl TryFrom<&RemoteConfig> for PostgrestConfig {
    type Error = ShopSyncError;

    fn try_from(config: &RemoteConfig) -> DomainResult<Self> {
        let mut base_url = Url::parse(&config.base_url).map_err(|e| {
            ShopSyncError::Config(format!("Invalid remote base URL '{}': {}", config.base_url, e))
        })?;
        // Url::join drops the last segment unless the path ends with '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self { base_url, api_key: config.api_key.clone(), timeout: config.timeout() })
    }
}

/// `RemoteApplier` speaking the PostgREST dialect.
pub struct PostgrestApplier {
    client: Client,
    config: PostgrestConfig,
}

impl PostgrestApplier {
    /// Build an applier with default headers derived from `config`.
    ///
    /// # Errors
    /// `Config` when the API key is not a valid header value or the HTTP
    /// client cannot be built.
    pub fn new(config: PostgrestConfig) -> DomainResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("prefer", HeaderValue::from_static("return=minimal"));

        if let Some(key) = &config.api_key {
            let apikey = HeaderValue::from_str(key)
                .map_err(|_| ShopSyncError::Config("API key is not a valid header value".into()))?;
            let mut bearer = HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|_| ShopSyncError::Config("API key is not a valid header value".into()))?;
            bearer.set_sensitive(true);
            headers.insert("apikey", apikey);
            headers.insert(AUTHORIZATION, bearer);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| ShopSyncError::from(InfraError::from(e)))?;

        Ok(Self { client, config })
    }

    /// Convenience constructor from the remote config section.
    pub fn from_config(config: &RemoteConfig) -> DomainResult<Self> {
        Self::new(PostgrestConfig::try_from(config)?)
    }

    pub fn config(&self) -> &PostgrestConfig {
        &self.config
    }

    /// `true` when the REST root answers with a success status.
    ///
    /// # Errors
    /// Transport failures (no route, refused, timed out) are errors; any
    /// HTTP answer, even a non-success one, is not.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<bool, RemoteApplyError> {
        let url = self.rest_root()?;
        debug!(url = %url, "Performing health check");

        let response = self.send(self.client.get(url)).await?;
        let status = response.status();
        if status.is_success() {
            Ok(true)
        } else {
            warn!(status = %status, "Remote store returned non-success status on health check");
            Ok(false)
        }
    }

    fn rest_root(&self) -> Result<Url, RemoteApplyError> {
        self.config
            .base_url
            .join(REST_PATH)
            .map_err(|e| RemoteApplyError::Config(format!("invalid REST root: {e}")))
    }

    fn resource_url(&self, resource: &str) -> Result<Url, RemoteApplyError> {
        validate_resource(resource)?;
        self.rest_root()?
            .join(resource)
            .map_err(|e| RemoteApplyError::Config(format!("invalid resource URL: {e}")))
    }

    fn build_request(&self, mutation: &RemoteMutation<'_>) -> Result<RequestBuilder, RemoteApplyError> {
        let mut url = self.resource_url(mutation.resource)?;

        let builder = match mutation.action {
            MutationAction::Insert => self.client.post(url).json(&[mutation.payload]),
            MutationAction::Update => {
                let id = primary_key_filter(mutation.payload.get(PRIMARY_KEY_FIELD))?;
                url.query_pairs_mut().append_pair(PRIMARY_KEY_FIELD, &format!("eq.{id}"));
                self.client.patch(url).json(mutation.payload)
            }
        };

        Ok(builder.header(IDEMPOTENCY_HEADER, mutation.idempotency_key))
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, RemoteApplyError> {
        builder.send().await.map_err(|err| classify_http_error(&err, self.config.timeout))
    }
}

#[async_trait]
impl RemoteApplier for PostgrestApplier {
    #[instrument(
        skip(self, mutation),
        fields(action = %mutation.action, resource = %mutation.resource)
    )]
    async fn apply(&self, mutation: &RemoteMutation<'_>) -> Result<(), RemoteApplyError> {
        let response = self.send(self.build_request(mutation)?).await?;
        let status = response.status();

        if status.is_success() {
            debug!(status = %status, "Mutation accepted by remote store");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let body: String = body.chars().take(MAX_ERROR_BODY_LEN).collect();
        Err(classify_status(status, &body, self.config.timeout))
    }
}

/// Resource names end up in the URL path; only plain identifiers are allowed.
fn validate_resource(resource: &str) -> Result<(), RemoteApplyError> {
    if !resource.is_empty() && resource.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(RemoteApplyError::Client(format!("invalid resource name '{resource}'")))
    }
}

fn primary_key_filter(value: Option<&Value>) -> Result<String, RemoteApplyError> {
    match value {
        Some(Value::String(id)) if !id.trim().is_empty() => Ok(id.clone()),
        Some(Value::Number(id)) => Ok(id.to_string()),
        _ => Err(RemoteApplyError::Client(format!(
            "update payload has no usable '{PRIMARY_KEY_FIELD}'"
        ))),
    }
}
