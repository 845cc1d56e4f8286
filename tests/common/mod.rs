//! Shared helpers: local upstream servers that record what they receive.

#![allow(dead_code)]

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1::Builder as ServerBuilder;
use hyper::service::service_fn;
use hyper::{HeaderMap, Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use rustls::server::WebPkiClientVerifier;
use rustls::{RootCertStore, ServerConfig};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

/// One request as seen by the upstream.
#[derive(Debug, Clone)]
pub struct Captured {
    pub method: Method,
    pub uri: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Builds the upstream's answer to a captured request.
pub type Responder = Arc<dyn Fn(&Captured) -> Response<Full<Bytes>> + Send + Sync>;

#[derive(Clone)]
pub struct Upstream {
    pub addr: SocketAddr,
    captured: Arc<Mutex<Vec<Captured>>>,
}

impl Upstream {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<Captured> {
        self.captured.lock().unwrap().clone()
    }

    pub fn last(&self) -> Captured {
        self.requests().pop().expect("upstream received no request")
    }
}

pub fn respond(status: StatusCode, body: &'static str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from_static(body.as_bytes())));
    *response.status_mut() = status;
    response
}

fn fixed(status: StatusCode, body: &'static str) -> Responder {
    Arc::new(move |_| respond(status, body))
}

/// Starts an HTTP upstream answering every request with `status` and `body`.
pub async fn spawn_upstream(status: StatusCode, body: &'static str) -> Upstream {
    spawn(None, fixed(status, body)).await
}

/// Starts an HTTP upstream whose answers depend on the request.
pub async fn spawn_routed_upstream(responder: Responder) -> Upstream {
    spawn(None, responder).await
}

/// Same as [`spawn_upstream`] but over TLS with the fixture server certificate.
pub async fn spawn_tls_upstream(status: StatusCode, body: &'static str) -> Upstream {
    let dir = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures");
    let config = fetch_bridge::tls::server_tls_config(
        &format!("{}/server.key", dir),
        &format!("{}/server.pem", dir),
    )
    .unwrap();
    spawn(Some(TlsAcceptor::from(Arc::new(config))), fixed(status, body)).await
}

/// TLS upstream that refuses clients without a certificate from the fixture CA.
pub async fn spawn_mtls_upstream(status: StatusCode, body: &'static str) -> Upstream {
    let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());

    let ca = fixture("ca.pem");
    let mut roots = RootCertStore::empty();
    for cert in rustls_pemfile::certs(&mut ca.as_bytes()) {
        roots.add(cert.unwrap()).unwrap();
    }
    let verifier = WebPkiClientVerifier::builder_with_provider(Arc::new(roots), provider.clone())
        .build()
        .unwrap();

    let server_pem = fixture("server.pem");
    let certs = rustls_pemfile::certs(&mut server_pem.as_bytes())
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    let server_key = fixture("server.key");
    let key = rustls_pemfile::private_key(&mut server_key.as_bytes()).unwrap().unwrap();

    let mut config = ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_client_cert_verifier(verifier)
        .with_single_cert(certs, key)
        .unwrap();
    config.alpn_protocols = vec![b"http/1.1".to_vec()];

    spawn(Some(TlsAcceptor::from(Arc::new(config))), fixed(status, body)).await
}

async fn spawn(acceptor: Option<TlsAcceptor>, responder: Responder) -> Upstream {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let captured = Arc::new(Mutex::new(Vec::new()));
    let upstream = Upstream {
        addr,
        captured: captured.clone(),
    };

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let captured = captured.clone();
            let acceptor = acceptor.clone();
            let responder = responder.clone();
            tokio::spawn(async move {
                let service = service_fn(move |req: Request<Incoming>| {
                    let captured = captured.clone();
                    let responder = responder.clone();
                    async move {
                        let (parts, incoming) = req.into_parts();
                        let body_bytes = incoming.collect().await.unwrap().to_bytes();
                        let request = Captured {
                            method: parts.method,
                            uri: parts.uri.to_string(),
                            headers: parts.headers,
                            body: body_bytes,
                        };
                        let response = responder(&request);
                        captured.lock().unwrap().push(request);
                        Ok::<_, Infallible>(response)
                    }
                });
                match acceptor {
                    Some(acceptor) => {
                        if let Ok(tls) = acceptor.accept(stream).await {
                            let _ = ServerBuilder::new().serve_connection(TokioIo::new(tls), service).await;
                        }
                    }
                    None => {
                        let _ = ServerBuilder::new().serve_connection(TokioIo::new(stream), service).await;
                    }
                }
            });
        }
    });

    upstream
}

/// Accepts connections and never answers them.
pub async fn spawn_silent_upstream() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });
    addr
}

/// Returns an address nothing is listening on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

pub fn fixture(name: &str) -> String {
    std::fs::read_to_string(format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name)).unwrap()
}
