pub mod agent;
pub mod chat;
pub mod roles;
pub mod rpc;
pub mod serve;
pub mod workbench;

use anyhow::Context;
use ops_core::Store;

/// Open the local database named by `--database-url`.
pub fn open_store(database_url: &str) -> anyhow::Result<Store> {
    Store::from_database_url(database_url)
        .with_context(|| format!("failed to open database '{database_url}'"))
}
