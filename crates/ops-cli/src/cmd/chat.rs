use crate::cmd::open_store;
use crate::output::print_json;
use ops_core::{dispatch, normalize};
use serde_json::json;

/// Normalize `text` with the rule table and execute it locally.
///
/// No LLM is involved here; the server's chat endpoints add that layer.
pub fn run(database_url: &str, user: &str, text: &str, json: bool) -> anyhow::Result<()> {
    let command = match normalize(text) {
        Ok(command) => command,
        Err(e) => {
            if json {
                print_json(&dispatch::command_error(&e))?;
            }
            anyhow::bail!("{e}");
        }
    };

    let store = open_store(database_url)?;
    tracing::debug!(command = %command.canonical(), "executing chat command");
    let result = dispatch::execute(&store, &command, user);

    let failure = result.get("error").and_then(|e| e.as_str()).map(str::to_string);
    if json {
        print_json(&json!({ "command": command.canonical(), "result": result }))?;
    } else if failure.is_none() {
        println!("> {}", command.canonical());
        print_json(&result)?;
    }
    match failure {
        Some(err) => anyhow::bail!("{err}"),
        None => Ok(()),
    }
}
