//! Per-module adapters implementing the tx/query router contract.

pub mod bank;
pub mod base;
pub mod evm;
pub mod feegrant;
pub mod mint;
pub mod params;
pub mod upgrade;
pub mod wasm;

use cosmos_sdk_proto::cosmos::base::v1beta1::Coin;
use serde_json::{json, Value};

/// Shape a coin list the way the REST gateway renders it.
pub(crate) fn coins_json(coins: &[Coin]) -> Value {
    Value::Array(
        coins
            .iter()
            .map(|Coin { denom, amount }| json!({ "denom": denom, "amount": amount }))
            .collect(),
    )
}

/// Shape a protobuf `Any` for JSON output.
pub(crate) fn any_json(any: &cosmos_sdk_proto::Any) -> Value {
    use base64::Engine;
    json!({
        "@type": any.type_url,
        "value": base64::engine::general_purpose::STANDARD.encode(&any.value),
    })
}
