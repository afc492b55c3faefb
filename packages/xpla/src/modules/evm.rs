//! EVM module: queries against the Ethereum JSON-RPC endpoint.
//!
//! The EVM layer is not exposed over gRPC or the LCD gateway, so every
//! operation here goes through the JSON-RPC transport and requires an EVM
//! RPC URL on the connection.

use serde_json::{json, Value};
use tonic::async_trait;

use crate::client::XplaClient;
use crate::error::Error;
use crate::msg::ModuleMsg;
use crate::registry::{marshal, ModuleAdapter, QueryContext, Transport};
use crate::rpc::jsonrpc_request;
use crate::txbuilder::TxBuilder;

pub const MODULE_NAME: &str = "evm";

pub const ETH_CHAIN_ID: &str = "eth-chain-id";
pub const ETH_BLOCK_NUMBER: &str = "eth-block-number";
pub const ETH_GET_BALANCE: &str = "eth-get-balance";
pub const ETH_GET_TRANSACTION_COUNT: &str = "eth-get-transaction-count";

/// Operations of the EVM module. Addresses are 0x-prefixed hex.
#[derive(Clone, Debug)]
pub enum EvmMsg {
    ChainId,
    BlockNumber,
    GetBalance { address: String },
    GetTransactionCount { address: String },
}

impl EvmMsg {
    pub(crate) fn msg_type(&self) -> &'static str {
        match self {
            EvmMsg::ChainId => ETH_CHAIN_ID,
            EvmMsg::BlockNumber => ETH_BLOCK_NUMBER,
            EvmMsg::GetBalance { .. } => ETH_GET_BALANCE,
            EvmMsg::GetTransactionCount { .. } => ETH_GET_TRANSACTION_COUNT,
        }
    }
}

#[derive(Debug)]
pub(crate) struct EvmModule;

fn resolve(msg_type: &str, payload: Option<&ModuleMsg>) -> Result<EvmMsg, Error> {
    if let Some(msg) = payload {
        return match msg {
            ModuleMsg::Evm(msg) => Ok(msg.clone()),
            other => Err(Error::InvalidRequest(format!(
                "payload for module {:?} routed to {MODULE_NAME}",
                other.module()
            ))),
        };
    }
    match msg_type {
        ETH_CHAIN_ID => Ok(EvmMsg::ChainId),
        ETH_BLOCK_NUMBER => Ok(EvmMsg::BlockNumber),
        ETH_GET_BALANCE | ETH_GET_TRANSACTION_COUNT => {
            Err(Error::insufficient_params(msg_type, "address"))
        }
        _ => Err(Error::invalid_msg_type(MODULE_NAME, msg_type)),
    }
}

/// JSON-RPC method and positional params for an operation.
fn rpc_call(msg: &EvmMsg) -> (&'static str, Value) {
    match msg {
        EvmMsg::ChainId => ("eth_chainId", json!([])),
        EvmMsg::BlockNumber => ("eth_blockNumber", json!([])),
        EvmMsg::GetBalance { address } => ("eth_getBalance", json!([address, "latest"])),
        EvmMsg::GetTransactionCount { address } => {
            ("eth_getTransactionCount", json!([address, "latest"]))
        }
    }
}

#[async_trait]
impl ModuleAdapter for EvmModule {
    fn name(&self) -> &'static str {
        MODULE_NAME
    }

    fn msg_types(&self) -> &'static [&'static str] {
        &[
            ETH_CHAIN_ID,
            ETH_BLOCK_NUMBER,
            ETH_GET_BALANCE,
            ETH_GET_TRANSACTION_COUNT,
        ]
    }

    fn build_tx(
        &self,
        _builder: &mut TxBuilder,
        _msg_type: &str,
        _msg: Option<&ModuleMsg>,
    ) -> Result<(), Error> {
        Err(Error::InvalidRequest(
            "module evm has no transaction messages".to_owned(),
        ))
    }

    async fn run_query(&self, ctx: QueryContext<'_>) -> Result<String, Error> {
        let msg = resolve(ctx.msg_type, ctx.msg)?;
        if ctx.transport != Transport::EvmRpc {
            return Err(ctx.not_supported(MODULE_NAME));
        }
        let action = format!("{MODULE_NAME}/{}", msg.msg_type());
        let (method, params) = rpc_call(&msg);
        let result = jsonrpc_request(
            ctx.chain.http(),
            ctx.chain.evm_rpc_url()?,
            method,
            params,
            Transport::EvmRpc,
            &action,
        )
        .await?;
        marshal(&action, &result)
    }
}

impl XplaClient {
    /// Query the EVM chain ID.
    pub fn eth_chain_id(&mut self) -> &mut Self {
        self.with_msg(ModuleMsg::Evm(EvmMsg::ChainId))
    }

    /// Query the latest EVM block number.
    pub fn eth_block_number(&mut self) -> &mut Self {
        self.with_msg(ModuleMsg::Evm(EvmMsg::BlockNumber))
    }

    /// Query the EVM balance of a 0x address at the latest block.
    pub fn eth_get_balance(&mut self, address: impl Into<String>) -> &mut Self {
        self.with_msg(ModuleMsg::Evm(EvmMsg::GetBalance {
            address: address.into(),
        }))
    }

    /// Query the nonce of a 0x address at the latest block.
    pub fn eth_get_transaction_count(&mut self, address: impl Into<String>) -> &mut Self {
        self.with_msg(ModuleMsg::Evm(EvmMsg::GetTransactionCount {
            address: address.into(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::XplaBuilder;

    #[test]
    fn rpc_methods() {
        assert_eq!(rpc_call(&EvmMsg::ChainId).0, "eth_chainId");
        let (method, params) = rpc_call(&EvmMsg::GetBalance {
            address: "0xabc".to_owned(),
        });
        assert_eq!(method, "eth_getBalance");
        assert_eq!(params, json!(["0xabc", "latest"]));
    }

    #[test]
    fn balance_without_address_is_insufficient_params() {
        let err = resolve(ETH_GET_BALANCE, None).unwrap_err();
        assert!(matches!(err, Error::InsufficientParams { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn requires_evm_rpc_url() {
        // evm queries always select the EVM JSON-RPC transport; without a
        // configured URL the dispatch fails before any network traffic.
        let chain = XplaBuilder::new("cube_47-5").build().unwrap();
        let mut client = XplaClient::new(chain);
        let err = client.eth_chain_id().query().await.unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)), "got {err:?}");
    }
}
