use crate::error::FetchError;
use crate::query::Query;
use crate::secrets::replace_secrets;
use crate::settings::ConnectionSettings;
use crate::url_builder::build_query_url;
use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use http::header::{AUTHORIZATION, CONTENT_TYPE, HeaderName, HeaderValue, USER_AGENT};
use http::{HeaderMap, Method, Request};

pub const USER_AGENT_VALUE: &str = concat!("fetch-bridge/", env!("CARGO_PKG_VERSION"));

/// Assembles the outbound request for a remote query.
///
/// Only the literal `POST` with a body produces a POST; every other method
/// value, including `POST` without a body, becomes a bodiless GET.
///
/// Headers are applied in this order, later entries replacing earlier ones
/// with the same name: basic auth, user agent, JSON content type, per-query
/// headers (secret-substituted), then the instance's custom headers.
pub fn build_request(
    settings: &ConnectionSettings,
    query: &Query,
    body: Option<Bytes>,
) -> Result<Request<Bytes>, FetchError> {
    let url = build_query_url(
        &settings.url,
        &query.url,
        &query.url_options.params,
        &settings.secure_query_fields,
    );

    let (method, body) = match (query.url_options.method.as_str(), body) {
        ("POST", Some(body)) => (Method::POST, body),
        _ => (Method::GET, Bytes::new()),
    };

    let mut request = Request::builder()
        .method(method)
        .uri(url.as_str())
        .body(body)?;

    let headers = request.headers_mut();

    if settings.basic_auth_enabled && (!settings.user_name.is_empty() || !settings.password.is_empty()) {
        let credentials = format!("{}:{}", settings.user_name, settings.password);
        let encoded = general_purpose::STANDARD.encode(credentials.as_bytes());
        headers.insert(AUTHORIZATION, header_value(&format!("Basic {}", encoded))?);
    }

    headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));

    if query.query_type.is_json_body() {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    }

    for header in &query.url_options.headers {
        let value = replace_secrets(&header.value, &settings.secure_query_fields);
        set_header(headers, &header.key, &value)?;
    }

    for (name, value) in &settings.custom_headers {
        set_header(headers, name, value)?;
    }

    Ok(request)
}

fn set_header(headers: &mut HeaderMap, name: &str, value: &str) -> Result<(), FetchError> {
    let name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| FetchError::Request(format!("invalid header name {:?}: {}", name, e)))?;
    headers.insert(name, header_value(value)?);
    Ok(())
}

// Values may carry secrets, so they never appear in the error text.
fn header_value(value: &str) -> Result<HeaderValue, FetchError> {
    HeaderValue::from_str(value).map_err(|e| FetchError::Request(format!("invalid header value: {}", e)))
}
