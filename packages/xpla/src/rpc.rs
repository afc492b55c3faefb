//! Raw JSON-RPC plumbing shared by the Tendermint RPC and EVM RPC paths.

use serde_json::Value;

use crate::error::{Error, TransportError};
use crate::registry::Transport;

#[derive(serde::Serialize)]
struct Request<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    id: u64,
    params: Value,
}

#[derive(serde::Deserialize)]
struct Response {
    result: Option<Value>,
    error: Option<RpcError>,
}

#[derive(serde::Deserialize, Debug)]
struct RpcError {
    code: i64,
    message: String,
}

pub(crate) async fn jsonrpc_request(
    client: &reqwest::Client,
    endpoint: &str,
    method: &str,
    params: Value,
    transport: Transport,
    action: &str,
) -> Result<Value, Error> {
    let id = rand::random();

    let req = Request {
        jsonrpc: "2.0",
        method,
        id,
        params,
    };

    let transport_err = |source: TransportError| Error::Transport {
        transport,
        action: action.to_owned(),
        source,
    };

    tracing::debug!("JSON-RPC {method} against {endpoint}");
    let raw_body: String = client
        .post(endpoint)
        .json(&req)
        .send()
        .await
        .map_err(|e| transport_err(e.into()))?
        .error_for_status()
        .map_err(|e| transport_err(e.into()))?
        .text()
        .await
        .map_err(|e| transport_err(e.into()))?;

    let res = serde_json::from_str::<Response>(&raw_body).map_err(|_| {
        transport_err(TransportError::MalformedResponse(format!(
            "unable to parse JSON-RPC response: {raw_body}"
        )))
    })?;

    if let Some(RpcError { code, message }) = res.error {
        return Err(transport_err(TransportError::JsonRpc { code, message }));
    }
    res.result.ok_or_else(|| {
        transport_err(TransportError::MalformedResponse(
            "JSON-RPC response carried neither result nor error".to_owned(),
        ))
    })
}
