use crate::config::Config;
use crate::error::FetchError;
use crate::handler::{ProxyHandler, ResponseBuilder};
use crate::instance::InstanceManager;
use crate::metrics::ProxyMetrics;
use crate::tls::server_tls_config;
use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderValue};
use http_body_util::Full;
use hyper::body::Body;
use hyper::server::conn::http1::Builder as ServerBuilder;
use hyper::service::service_fn;
use hyper::{Method, Request, Response};
use hyper_util::rt::TokioIo;
use log::{debug, error, info, warn};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

const METRICS_PATH: &str = "/metrics";

struct ServerState {
    handler: ProxyHandler,
    proxy_path: String,
}

impl ServerState {
    async fn route<B>(&self, req: Request<B>) -> Response<Full<Bytes>>
    where
        B: Body,
        B::Error: std::fmt::Display,
    {
        let path = req.uri().path();
        if path == self.proxy_path {
            return self.handler.handle(req).await;
        }
        if path == METRICS_PATH && req.method() == Method::GET {
            return match self.handler.metrics().render() {
                Ok(text) => {
                    let mut response = Response::new(Full::new(Bytes::from(text)));
                    response.headers_mut().insert(
                        CONTENT_TYPE,
                        HeaderValue::from_static("text/plain; version=0.0.4"),
                    );
                    response
                }
                Err(e) => ResponseBuilder::internal_server_error(&e.to_string()),
            };
        }
        ResponseBuilder::not_found()
    }
}

/// HTTP(S) listener serving the proxy endpoint.
pub struct ProxyServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
    private_key: Option<String>,
    certificate: Option<String>,
}

impl ProxyServer {
    pub fn new(config: Config) -> Result<Self, FetchError> {
        config.validate()?;

        let default_timeout = config.request_timeout_secs.map(Duration::from_secs);
        let instances = InstanceManager::new(config.instances, default_timeout);
        info!("Configured instances: {:?}", instances.instance_ids());

        let metrics = ProxyMetrics::new()
            .map_err(|e| FetchError::Configuration(format!("Failed to register metrics: {}", e)))?;

        Ok(Self {
            addr: config.listen_addr,
            state: Arc::new(ServerState {
                handler: ProxyHandler::new(Arc::new(instances), metrics),
                proxy_path: config.proxy_path,
            }),
            private_key: config.private_key,
            certificate: config.certificate,
        })
    }

    pub async fn run(self) -> Result<(), FetchError> {
        info!("Binding listener to: {}", self.addr);
        let listener = TcpListener::bind(self.addr).await?;
        self.serve(listener).await
    }

    /// Serves connections from an already bound listener until it fails.
    pub async fn serve(self, listener: TcpListener) -> Result<(), FetchError> {
        let acceptor = match (&self.private_key, &self.certificate) {
            (Some(private_key_path), Some(cert_path)) => {
                debug!("Loading TLS certificate from: {}", cert_path);
                debug!("Loading TLS private key from: {}", private_key_path);
                let tls_config = server_tls_config(private_key_path, cert_path)?;
                Some(TlsAcceptor::from(Arc::new(tls_config)))
            }
            _ => None,
        };

        let local_addr = listener.local_addr()?;
        let scheme = if acceptor.is_some() { "https" } else { "http" };
        info!(
            "Proxy endpoint listening on: {}://{}{}",
            scheme, local_addr, self.state.proxy_path
        );

        loop {
            let (tcp_stream, remote_addr) = listener.accept().await?;
            let state = self.state.clone();
            let acceptor = acceptor.clone();

            tokio::spawn(async move {
                match acceptor {
                    Some(acceptor) => match acceptor.accept(tcp_stream).await {
                        Ok(tls_stream) => serve_connection(TokioIo::new(tls_stream), state, remote_addr).await,
                        Err(e) => warn!("Error establishing TLS connection from {}: {}", remote_addr, e),
                    },
                    None => serve_connection(TokioIo::new(tcp_stream), state, remote_addr).await,
                }
            });
        }
    }
}

async fn serve_connection<T>(io: T, state: Arc<ServerState>, remote_addr: SocketAddr)
where
    T: hyper::rt::Read + hyper::rt::Write + Unpin + Send + 'static,
{
    let service = service_fn(move |req| {
        let state = state.clone();
        async move { Ok::<_, Infallible>(state.route(req).await) }
    });

    if let Err(e) = ServerBuilder::new()
        .keep_alive(true)
        .serve_connection(io, service)
        .await
    {
        error!("Error serving connection from {}: {}", remote_addr, e);
    }
}
