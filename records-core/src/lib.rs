pub mod config;
pub mod connection;
pub mod credentials;
pub mod data_api;
pub mod error;
pub mod executor;
pub mod handlers;
pub mod postgres;
pub mod record;
pub mod response;

pub use config::Settings;
pub use error::RecordError;
pub use executor::Executor;
