use crate::error::FetchError;
use crate::settings::ConnectionSettings;
use rustls::client::WebPkiServerVerifier;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, verify_tls12_signature, verify_tls13_signature};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, ServerConfig, SignatureScheme};
use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;

/// Builds the outbound TLS configuration. Pure validation, no network I/O.
///
/// Client-auth material is checked first, then the CA pool. Both are
/// validated even when verification is skipped. A non-empty `server_name`
/// replaces the URL host when the peer certificate is verified.
pub fn client_tls_config(settings: &ConnectionSettings) -> Result<ClientConfig, FetchError> {
    let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());

    let client_auth = if settings.tls_client_auth {
        if settings.tls_client_cert.is_empty() || settings.tls_client_key.is_empty() {
            return Err(FetchError::Configuration("invalid client cert or key".to_string()));
        }
        Some(client_key_pair(&settings.tls_client_cert, &settings.tls_client_key)?)
    } else {
        None
    };

    let custom_roots = ca_roots(settings)?;

    let server_name = if settings.server_name.is_empty() {
        None
    } else {
        Some(
            ServerName::try_from(settings.server_name.clone())
                .map_err(|e| FetchError::Configuration(format!("invalid server name: {}", e)))?,
        )
    };

    let builder = ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()
        .map_err(|e| FetchError::Configuration(format!("Failed to create TLS config: {}", e)))?;

    let builder = match (settings.tls_skip_verify, server_name) {
        (true, _) => builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert { provider })),
        (false, Some(server_name)) => {
            let roots = custom_roots.unwrap_or_else(native_roots);
            let inner = WebPkiServerVerifier::builder_with_provider(Arc::new(roots), provider)
                .build()
                .map_err(|e| FetchError::Configuration(format!("Failed to create TLS config: {}", e)))?;
            builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(PinnedServerName { inner, server_name }))
        }
        (false, None) => builder.with_root_certificates(custom_roots.unwrap_or_else(native_roots)),
    };

    let mut config = match client_auth {
        Some((certs, key)) => builder
            .with_client_auth_cert(certs, key)
            .map_err(|e| FetchError::Configuration(format!("Failed to create TLS config: {}", e)))?,
        None => builder.with_no_client_auth(),
    };
    config.alpn_protocols = vec![b"http/1.1".to_vec()];

    Ok(config)
}

/// The configured CA pool, or `None` when the system roots apply.
fn ca_roots(settings: &ConnectionSettings) -> Result<Option<RootCertStore>, FetchError> {
    if !settings.tls_auth_with_ca_cert || settings.tls_ca_cert.is_empty() {
        return Ok(None);
    }

    // Unparseable blocks are skipped; only an empty result is an error.
    let mut pem = settings.tls_ca_cert.as_bytes();
    let certs = rustls_pemfile::certs(&mut pem).filter_map(Result::ok);
    let mut roots = RootCertStore::empty();
    let (added, _ignored) = roots.add_parsable_certificates(certs);
    if added == 0 {
        return Err(FetchError::Configuration("invalid CA certificate".to_string()));
    }
    Ok(Some(roots))
}

fn native_roots() -> RootCertStore {
    let mut roots = RootCertStore::empty();
    let native = rustls_native_certs::load_native_certs();
    for err in &native.errors {
        log::warn!("Failed to load a native root certificate: {}", err);
    }
    roots.add_parsable_certificates(native.certs);
    roots
}

fn client_key_pair(
    cert_pem: &str,
    key_pem: &str,
) -> Result<(Vec<CertificateDer<'static>>, PrivateKeyDer<'static>), FetchError> {
    let certs = rustls_pemfile::certs(&mut cert_pem.as_bytes())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| FetchError::Configuration(format!("Failed to read client certificate: {}", e)))?;

    if certs.is_empty() {
        return Err(FetchError::Configuration("No valid client certificate found".to_string()));
    }

    let key = rustls_pemfile::private_key(&mut key_pem.as_bytes())
        .map_err(|e| FetchError::Configuration(format!("Failed to read client key: {}", e)))?
        .ok_or_else(|| FetchError::Configuration("No valid client key found".to_string()))?;

    Ok((certs, key))
}

/// Verifies the peer against a fixed name instead of the URL host.
#[derive(Debug)]
struct PinnedServerName {
    inner: Arc<WebPkiServerVerifier>,
    server_name: ServerName<'static>,
}

impl ServerCertVerifier for PinnedServerName {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        self.inner
            .verify_server_cert(end_entity, intermediates, &self.server_name, ocsp_response, now)
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }
}

/// Accepts any server certificate. Handshake signatures are still verified
/// so the peer must hold the key for the certificate it presents.
#[derive(Debug)]
struct AcceptAnyServerCert {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider.signature_verification_algorithms.supported_schemes()
    }
}

/// Creates the listener's TLS configuration from certificate and key files.
pub fn server_tls_config(private_key_path: &str, cert_path: &str) -> Result<ServerConfig, FetchError> {
    let mut private_key_file = BufReader::new(
        File::open(private_key_path)
            .map_err(|e| FetchError::Configuration(format!("Failed to open private key file: {}", e)))?
    );

    let mut cert_file = BufReader::new(
        File::open(cert_path)
            .map_err(|e| FetchError::Configuration(format!("Failed to open certificate file: {}", e)))?
    );

    let certs = rustls_pemfile::certs(&mut cert_file)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| FetchError::Configuration(format!("Failed to read certificate: {}", e)))?;

    if certs.is_empty() {
        return Err(FetchError::Configuration("No valid certificate found".to_string()));
    }

    let private_key = rustls_pemfile::private_key(&mut private_key_file)
        .map_err(|e| FetchError::Configuration(format!("Failed to read private key: {}", e)))?
        .ok_or_else(|| FetchError::Configuration("No valid private key found".to_string()))?;

    let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
    let mut config = ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| FetchError::Configuration(format!("Failed to create TLS config: {}", e)))?
        .with_no_client_auth()
        .with_single_cert(certs, private_key)
        .map_err(|e| FetchError::Configuration(format!("Failed to create TLS config: {}", e)))?;
    config.alpn_protocols = vec![b"http/1.1".to_vec()];

    Ok(config)
}
