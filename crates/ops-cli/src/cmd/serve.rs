use anyhow::Context;
use ops_core::Config;

/// Start the server in the foreground. Flags override the environment.
pub fn run(database_url: &str, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let mut config = Config::from_env().context("invalid environment configuration")?;
    config.database_url = database_url.to_string();
    if let Some(host) = host {
        config.host = host;
    }
    if let Some(port) = port {
        config.port = port;
    }

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let listener = tokio::net::TcpListener::bind(config.bind_addr())
            .await
            .with_context(|| format!("failed to bind {}", config.bind_addr()))?;
        ops_server::serve_on(config, listener).await
    })
}
