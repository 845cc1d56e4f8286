use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

/// Counters for proxy calls, exported in the Prometheus text format.
#[derive(Clone)]
pub struct ProxyMetrics {
    registry: Registry,
    requests: IntCounterVec,
    fetched_bytes: IntCounter,
}

impl ProxyMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let requests = IntCounterVec::new(
            Opts::new("proxy_requests_total", "Proxy calls by query source and outcome")
                .namespace("fetch_bridge"),
            &["source", "outcome"],
        )?;
        let fetched_bytes = IntCounter::with_opts(
            Opts::new("fetched_bytes_total", "Bytes returned to callers by successful fetches")
                .namespace("fetch_bridge"),
        )?;

        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(fetched_bytes.clone()))?;

        Ok(Self {
            registry,
            requests,
            fetched_bytes,
        })
    }

    pub fn record_success(&self, source: &str, bytes: usize) {
        self.requests.with_label_values(&[source, "success"]).inc();
        self.fetched_bytes.inc_by(bytes as u64);
    }

    pub fn record_failure(&self, source: &str) {
        self.requests.with_label_values(&[source, "failure"]).inc();
    }

    pub fn request_count(&self, source: &str, outcome: &str) -> u64 {
        self.requests.with_label_values(&[source, outcome]).get()
    }

    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
