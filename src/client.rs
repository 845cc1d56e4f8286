use crate::error::FetchError;
use crate::local_file::read_local_file;
use crate::query::{Query, QueryType};
use crate::request::build_request;
use crate::settings::ConnectionSettings;
use crate::tls::client_tls_config;
use bytes::Bytes;
use reqwest::redirect::Policy;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const MAX_REDIRECTS: usize = 10;

/// Fetch client for one configured instance.
///
/// Built once per instance; the TLS configuration is validated here and the
/// HTTP client is then shared read-only across concurrent calls. Redirects
/// are followed and the status policy applies to the final response.
#[derive(Clone)]
pub struct FetchClient {
    settings: Arc<ConnectionSettings>,
    http: reqwest::Client,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for FetchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchClient")
            .field("url", &self.settings.url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl FetchClient {
    pub fn new(settings: ConnectionSettings) -> Result<Self, FetchError> {
        let tls = client_tls_config(&settings)?;
        let http = reqwest::Client::builder()
            .use_preconfigured_tls(tls)
            .redirect(Policy::limited(MAX_REDIRECTS))
            .no_proxy()
            .build()
            .map_err(|e| FetchError::Configuration(format!("Failed to create HTTP client: {}", e)))?;
        let timeout = settings.timeout_secs.map(Duration::from_secs);
        Ok(Self {
            settings: Arc::new(settings),
            http,
            timeout,
        })
    }

    /// Applies `timeout` unless the instance settings carry their own.
    pub fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        if self.timeout.is_none() {
            self.timeout = timeout;
        }
        self
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Runs a remote query and returns the response body verbatim.
    pub async fn get_results(&self, query: &Query) -> Result<Bytes, FetchError> {
        match query.url_options.method.as_str() {
            "GET" => self.req(query, None).await,
            "POST" => {
                let body = if query.query_type == QueryType::Graphql {
                    let payload = json!({ "query": query.url_options.data });
                    Bytes::from(serde_json::to_vec(&payload)?)
                } else {
                    Bytes::from(query.url_options.data.clone())
                };
                self.req(query, Some(body)).await
            }
            other => Err(FetchError::UnsupportedMethod(other.to_string())),
        }
    }

    /// Reads the file a local-file query points at, under the same deadline
    /// as outbound requests.
    pub async fn get_local_file_content(&self, query: &Query) -> Result<Bytes, FetchError> {
        let read = read_local_file(&query.url);
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, read)
                .await
                .map_err(|_| FetchError::Timeout {
                    url: query.url.trim().to_string(),
                    secs: limit.as_secs(),
                })?,
            None => read.await,
        }
    }

    async fn req(&self, query: &Query, body: Option<Bytes>) -> Result<Bytes, FetchError> {
        let request = build_request(&self.settings, query, body)?;
        // URLs may carry substituted secrets, so they are stripped from errors.
        let request = reqwest::Request::try_from(request)
            .map_err(|e| FetchError::Request(format!("invalid request: {}", e.without_url())))?;
        let exchange = self.execute(request, &query.url);
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, exchange)
                .await
                .map_err(|_| FetchError::Timeout {
                    url: query.url.clone(),
                    secs: limit.as_secs(),
                })?,
            None => exchange.await,
        }
    }

    async fn execute(&self, request: reqwest::Request, url: &str) -> Result<Bytes, FetchError> {
        let transport_error = |err: reqwest::Error| FetchError::Transport {
            url: url.to_string(),
            source: Box::new(err.without_url()),
        };

        let response = self.http.execute(request).await.map_err(transport_error)?;

        let status = response.status();
        if status.as_u16() >= 400 {
            return Err(FetchError::HttpStatus(status_line(status)));
        }

        response.bytes().await.map_err(transport_error)
    }
}

/// Formats a status the way it appears on the wire, e.g. `404 Not Found`.
pub fn status_line(status: http::StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{} {}", status.as_u16(), reason),
        None => status.as_u16().to_string(),
    }
}
