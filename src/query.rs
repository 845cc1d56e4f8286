use crate::error::FetchError;
use serde::{Deserialize, Serialize};

/// Where a query fetches its bytes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum QuerySource {
    #[serde(rename = "url")]
    Url,
    #[serde(rename = "local-file")]
    LocalFile,
}

impl QuerySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuerySource::Url => "url",
            QuerySource::LocalFile => "local-file",
        }
    }
}

impl std::str::FromStr for QuerySource {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "url" => Ok(QuerySource::Url),
            "local-file" => Ok(QuerySource::LocalFile),
            other => Err(FetchError::UnknownSource(other.to_string())),
        }
    }
}

/// Format hint for the fetched payload. Only `json` and `graphql` change how
/// the outbound request is shaped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    Json,
    Graphql,
    Csv,
    Xml,
    Html,
    #[default]
    #[serde(other)]
    Other,
}

impl QueryType {
    pub fn is_json_body(&self) -> bool {
        matches!(self, QueryType::Json | QueryType::Graphql)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub value: String,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlOptions {
    /// Kept verbatim so an unsupported value can be reported as sent.
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub params: Vec<KeyValue>,
    #[serde(default)]
    pub headers: Vec<KeyValue>,
}

/// One declarative fetch, decoded from an inbound proxy call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Query {
    pub source: QuerySource,
    pub url: String,
    #[serde(rename = "type")]
    pub query_type: QueryType,
    #[serde(rename = "urlOptions")]
    pub url_options: UrlOptions,
}

// Wire shape; the source tag is validated separately so an unknown tag can be
// told apart from a malformed body. Explicit nulls read as absent.
#[derive(Debug, Deserialize)]
struct RawQuery {
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(rename = "type", default)]
    query_type: Option<QueryType>,
    #[serde(rename = "urlOptions", default)]
    url_options: Option<UrlOptions>,
}

impl TryFrom<RawQuery> for Query {
    type Error = FetchError;

    fn try_from(raw: RawQuery) -> Result<Self, Self::Error> {
        Ok(Query {
            source: raw.source.unwrap_or_default().parse()?,
            url: raw.url.unwrap_or_default(),
            query_type: raw.query_type.unwrap_or_default(),
            url_options: raw.url_options.unwrap_or_default(),
        })
    }
}

impl Query {
    pub fn remote(path: impl Into<String>) -> Self {
        Self {
            source: QuerySource::Url,
            url: path.into(),
            query_type: QueryType::Other,
            url_options: UrlOptions {
                method: "GET".to_string(),
                ..UrlOptions::default()
            },
        }
    }

    pub fn local_file(path: impl Into<String>) -> Self {
        Self {
            source: QuerySource::LocalFile,
            url: path.into(),
            query_type: QueryType::Other,
            url_options: UrlOptions::default(),
        }
    }

    pub fn with_type(mut self, query_type: QueryType) -> Self {
        self.query_type = query_type;
        self
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.url_options.method = method.into();
        self
    }

    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.url_options.data = data.into();
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.url_options.params.push(KeyValue::new(key, value));
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.url_options.headers.push(KeyValue::new(key, value));
        self
    }

    /// Decodes an inbound body. Malformed JSON is a `Decode` error; a
    /// well-formed body with an unrecognized source is `UnknownSource`.
    pub fn decode(body: &[u8]) -> Result<Self, FetchError> {
        let raw: RawQuery = serde_json::from_slice(body)?;
        Query::try_from(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_full_url_query() {
        let body = br#"{
            "source": "url",
            "url": "/users",
            "type": "json",
            "urlOptions": {
                "method": "POST",
                "data": "{}",
                "params": [{"key": "page", "value": "2"}],
                "headers": [{"key": "X-Trace", "value": "abc"}]
            }
        }"#;
        let query = Query::decode(body).unwrap();
        assert_eq!(query.source, QuerySource::Url);
        assert_eq!(query.url, "/users");
        assert_eq!(query.query_type, QueryType::Json);
        assert_eq!(query.url_options.method, "POST");
        assert_eq!(query.url_options.params, vec![KeyValue::new("page", "2")]);
        assert_eq!(query.url_options.headers, vec![KeyValue::new("X-Trace", "abc")]);
    }

    #[test]
    fn decodes_local_file_without_options() {
        let query = Query::decode(br#"{"source":"local-file","url":" /tmp/data.csv ","type":"csv"}"#).unwrap();
        assert_eq!(query.source, QuerySource::LocalFile);
        assert_eq!(query.query_type, QueryType::Csv);
        assert_eq!(query.url_options, UrlOptions::default());
    }

    #[test]
    fn unknown_type_falls_back_to_other() {
        let query = Query::decode(br#"{"source":"url","url":"/","type":"series"}"#).unwrap();
        assert_eq!(query.query_type, QueryType::Other);
        assert!(!query.query_type.is_json_body());
    }

    #[test]
    fn unknown_source_is_rejected() {
        let err = Query::decode(br#"{"source":"ftp","url":"/"}"#).unwrap_err();
        assert!(matches!(err, FetchError::UnknownSource(ref tag) if tag == "ftp"));
        assert_eq!(err.to_string(), "unknown query");
    }

    #[test]
    fn missing_source_is_rejected() {
        let err = Query::decode(br#"{"url":"/"}"#).unwrap_err();
        assert!(matches!(err, FetchError::UnknownSource(_)));
    }

    #[test]
    fn null_fields_read_as_absent() {
        let err = Query::decode(br#"{"source":null,"url":"/"}"#).unwrap_err();
        assert!(matches!(err, FetchError::UnknownSource(ref tag) if tag.is_empty()));

        let query = Query::decode(br#"{"source":"url","url":null,"type":null,"urlOptions":null}"#).unwrap();
        assert_eq!(query.url, "");
        assert_eq!(query.query_type, QueryType::Other);
        assert_eq!(query.url_options, UrlOptions::default());
    }

    #[test]
    fn malformed_body_is_decode_error() {
        let err = Query::decode(b"{not json").unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
    }
}
