use crate::output::print_json;
use anyhow::Context;
use serde_json::{json, Value};
use std::time::Duration;

const RPC_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the JSON-RPC 2.0 envelope. `params` must be an object or array.
pub fn request_body(method: &str, params: Option<&str>) -> anyhow::Result<Value> {
    let params = match params {
        Some(raw) => {
            let value: Value =
                serde_json::from_str(raw).context("--params is not valid JSON")?;
            if !(value.is_object() || value.is_array()) {
                anyhow::bail!("--params must be a JSON object or array");
            }
            value
        }
        None => json!({}),
    };
    Ok(json!({ "jsonrpc": "2.0", "method": method, "params": params, "id": 1 }))
}

/// POST one call to `{server}/rpc` and print its result.
pub fn run(server: &str, method: &str, params: Option<&str>, json: bool) -> anyhow::Result<()> {
    let body = request_body(method, params)?;
    let url = format!("{}/rpc", server.trim_end_matches('/'));
    tracing::debug!(%url, method, "calling rpc");

    let agent = ureq::AgentBuilder::new().timeout(RPC_TIMEOUT).build();
    let response: Value = agent
        .post(&url)
        .send_json(body)
        .with_context(|| format!("request to {url} failed"))?
        .into_json()
        .context("server returned a non-JSON body")?;

    if json {
        print_json(&response)?;
    }
    if let Some(err) = response.get("error").filter(|e| !e.is_null()) {
        let code = err.get("code").and_then(Value::as_i64).unwrap_or_default();
        let message = err.get("message").and_then(Value::as_str).unwrap_or("unknown error");
        anyhow::bail!("rpc error {code}: {message}");
    }
    if !json {
        print_json(&response["result"])?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_params_are_empty_object() {
        let body = request_body("list_agents", None).unwrap();
        assert_eq!(body["params"], json!({}));
        assert_eq!(body["jsonrpc"], "2.0");
        assert_eq!(body["method"], "list_agents");
    }

    #[test]
    fn params_must_be_structured() {
        assert!(request_body("x", Some("42")).is_err());
        assert!(request_body("x", Some("{not json")).is_err());
        let body = request_body("x", Some(r#"[1, "a"]"#)).unwrap();
        assert_eq!(body["params"], json!([1, "a"]));
    }
}
