//! Scoreline Server
//!
//! HTTP host process for the scoring service. Loads the model artifacts once
//! at startup and answers `POST /score` with a prediction or `"error"`.

pub mod cli;
pub mod config;
pub mod routes;
pub mod state;

pub use cli::Cli;
pub use config::ServerConfig;
pub use routes::{create_router, ERROR_KIND_HEADER};
pub use state::AppState;
