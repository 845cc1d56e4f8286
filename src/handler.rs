use crate::client::FetchClient;
use crate::error::FetchError;
use crate::instance::{INSTANCE_ID_HEADER, InstanceProvider};
use crate::metrics::ProxyMetrics;
use crate::query::{Query, QuerySource};
use crate::secrets::redact_secrets;
use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderValue, X_CONTENT_TYPE_OPTIONS};
use http_body_util::{BodyExt, Full};
use hyper::body::Body;
use hyper::{Method, Request, Response, StatusCode};
use log::{debug, warn};
use std::sync::Arc;

pub const INVALID_QUERY_MESSAGE: &str = "500 - Something bad happened! Invalid query.";

/// Plain-text responses for the proxy boundary.
pub struct ResponseBuilder;

impl ResponseBuilder {
    /// Success: the fetched bytes, verbatim and without a content type.
    pub fn bytes(body: Bytes) -> Response<Full<Bytes>> {
        Response::new(Full::new(body))
    }

    /// Failure: a flat text message with a trailing newline.
    pub fn error(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
        let mut response = Response::new(Full::new(Bytes::from(format!("{}\n", message))));
        *response.status_mut() = status;
        let headers = response.headers_mut();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
        headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
        response
    }

    pub fn internal_server_error(message: &str) -> Response<Full<Bytes>> {
        Self::error(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn not_found() -> Response<Full<Bytes>> {
        Self::error(StatusCode::NOT_FOUND, "404 page not found")
    }
}

/// Entry point for proxy calls: resolves the instance, decodes the query and
/// routes it to the remote or local-file fetch.
#[derive(Clone)]
pub struct ProxyHandler {
    instances: Arc<dyn InstanceProvider>,
    metrics: ProxyMetrics,
}

impl ProxyHandler {
    pub fn new(instances: Arc<dyn InstanceProvider>, metrics: ProxyMetrics) -> Self {
        Self { instances, metrics }
    }

    pub fn metrics(&self) -> &ProxyMetrics {
        &self.metrics
    }

    pub async fn handle<B>(&self, req: Request<B>) -> Response<Full<Bytes>>
    where
        B: Body,
        B::Error: std::fmt::Display,
    {
        let instance_id = req
            .headers()
            .get(INSTANCE_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let client = match self.instances.resolve(&instance_id) {
            Ok(client) => client,
            Err(err) => {
                warn!("Failed to resolve instance '{}': {}", instance_id, err);
                return ResponseBuilder::internal_server_error(&err.to_string());
            }
        };

        if req.method() != Method::POST {
            debug!("Rejecting {} proxy call for instance '{}'", req.method(), instance_id);
            return ResponseBuilder::internal_server_error(INVALID_QUERY_MESSAGE);
        }

        let body = match req.into_body().collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(err) => {
                warn!("Failed to read proxy call body: {}", err);
                return ResponseBuilder::internal_server_error(&err.to_string());
            }
        };

        let query = match Query::decode(&body) {
            Ok(query) => query,
            Err(FetchError::UnknownSource(tag)) => {
                debug!("Unknown query source '{}'", tag);
                return ResponseBuilder::error(StatusCode::NOT_IMPLEMENTED, "unknown query");
            }
            Err(err) => {
                debug!("Failed to decode proxy query: {}", err);
                return ResponseBuilder::internal_server_error(&err.to_string());
            }
        };

        self.dispatch(&client, &query).await
    }

    async fn dispatch(&self, client: &FetchClient, query: &Query) -> Response<Full<Bytes>> {
        let source = query.source.as_str();
        let (result, failure_status) = match query.source {
            QuerySource::Url => (client.get_results(query).await, StatusCode::INTERNAL_SERVER_ERROR),
            QuerySource::LocalFile => (client.get_local_file_content(query).await, StatusCode::FORBIDDEN),
        };

        match result {
            Ok(bytes) => {
                self.metrics.record_success(source, bytes.len());
                ResponseBuilder::bytes(bytes)
            }
            Err(err) => {
                self.metrics.record_failure(source);
                log_failure(client, source, &err);
                ResponseBuilder::error(failure_status, &err.to_string())
            }
        }
    }
}

fn log_failure(client: &FetchClient, source: &str, err: &FetchError) {
    let fields = &client.settings().secure_query_fields;
    warn!("{} query failed: {}", source, redact_secrets(&err.to_string(), fields));
    if let Some(cause) = std::error::Error::source(err) {
        debug!("Cause: {}", redact_secrets(&cause.to_string(), fields));
    }
}
