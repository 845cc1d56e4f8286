pub mod client;
pub mod config;
pub mod error;
pub mod handler;
pub mod instance;
pub mod local_file;
pub mod logging;
pub mod metrics;
pub mod query;
pub mod request;
pub mod secrets;
pub mod server;
pub mod settings;
pub mod tls;
pub mod url_builder;

pub use client::FetchClient;
pub use config::Config;
pub use error::FetchError;
pub use handler::ProxyHandler;
pub use query::{Query, QuerySource, QueryType};
pub use server::ProxyServer;
pub use settings::ConnectionSettings;
