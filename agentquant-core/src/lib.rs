pub mod config;
pub mod error;
pub mod http_client;
pub mod model;
pub mod normalizer;
pub mod payload;
pub mod provider;
pub mod providers;
pub mod proxy;
pub mod record;
pub mod results;
pub mod session;
pub mod stream;
pub mod telemetry;
pub mod transcoder;
