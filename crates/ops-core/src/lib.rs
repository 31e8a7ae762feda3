pub mod command;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod model;
pub mod roles;
pub mod rules;
pub mod store;
pub mod types;

pub use command::{normalize, Command, CommandError, Normalizer};
pub use config::Config;
pub use error::{OpsError, Result};
pub use store::Store;
pub use types::Role;
