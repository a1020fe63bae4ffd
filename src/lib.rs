pub mod config;
pub mod core;
pub mod resolve;
pub mod services;

pub use config::{ConfigError, SessionConfig};
pub use resolve::{find_candidates, resolve, ResolveError};
