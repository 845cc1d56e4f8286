use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-instance connection settings.
///
/// Built once when an instance is registered and shared read-only (behind an
/// `Arc`) by every call that targets the instance. Both mappings are ordered
/// so that header application and secret substitution are reproducible.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionSettings {
    /// Base URL every remote query path is appended to.
    #[serde(default)]
    pub url: String,

    #[serde(default)]
    pub tls_skip_verify: bool,
    /// Overrides the URL host as the TLS server name when non-empty.
    #[serde(default)]
    pub server_name: String,
    #[serde(default)]
    pub tls_client_auth: bool,
    #[serde(default)]
    pub tls_client_cert: String,
    #[serde(default)]
    pub tls_client_key: String,
    #[serde(default)]
    pub tls_auth_with_ca_cert: bool,
    #[serde(default)]
    pub tls_ca_cert: String,

    #[serde(default)]
    pub basic_auth_enabled: bool,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub password: String,

    /// Headers sent with every request. These win over per-query headers.
    #[serde(default)]
    pub custom_headers: BTreeMap<String, String>,
    /// Secret values addressable from queries as `${__qs.<key>}`.
    #[serde(default)]
    pub secure_query_fields: BTreeMap<String, String>,

    /// Deadline for each outbound execution and local file read.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl ConnectionSettings {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_basic_auth(mut self, user_name: impl Into<String>, password: impl Into<String>) -> Self {
        self.basic_auth_enabled = true;
        self.user_name = user_name.into();
        self.password = password.into();
        self
    }

    pub fn with_custom_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_headers.insert(name.into(), value.into());
        self
    }

    pub fn with_secure_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.secure_query_fields.insert(key.into(), value.into());
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }
}
