//! Base module: node and block queries against the tendermint service.
//!
//! Block queries have three transports. The LCD and gRPC paths go through
//! the usual dispatch, but when a Tendermint RPC URL is configured the raw
//! `block` RPC is preferred, because the gRPC service cannot represent the
//! full node block response.

use chrono::{TimeZone, Utc};
use cosmos_sdk_proto::cosmos::base::tendermint::v1beta1::{
    service_client::ServiceClient, GetBlockByHeightRequest, GetLatestBlockRequest,
    GetNodeInfoRequest, GetSyncingRequest,
};
use cosmos_sdk_proto::tendermint::types::{Block, BlockId};
use serde_json::{json, Value};
use tonic::async_trait;

use crate::client::XplaClient;
use crate::error::{Error, TransportError};
use crate::msg::ModuleMsg;
use crate::registry::{marshal, ModuleAdapter, QueryContext, Transport};
use crate::rpc::jsonrpc_request;
use crate::txbuilder::TxBuilder;

pub const MODULE_NAME: &str = "base";

pub const NODE_INFO: &str = "node-info";
pub const SYNCING: &str = "syncing";
pub const LATEST_BLOCK: &str = "latest-block";
pub const BLOCK_BY_HEIGHT: &str = "block-by-height";

/// True for the two block-shaped queries that prefer the raw RPC transport.
pub(crate) fn is_block_query(module: &str, msg_type: &str) -> bool {
    module == MODULE_NAME && (msg_type == LATEST_BLOCK || msg_type == BLOCK_BY_HEIGHT)
}

/// Operations of the base module.
#[derive(Clone, Debug)]
pub enum BaseMsg {
    NodeInfo,
    Syncing,
    LatestBlock,
    BlockByHeight { height: i64 },
}

impl BaseMsg {
    pub(crate) fn msg_type(&self) -> &'static str {
        match self {
            BaseMsg::NodeInfo => NODE_INFO,
            BaseMsg::Syncing => SYNCING,
            BaseMsg::LatestBlock => LATEST_BLOCK,
            BaseMsg::BlockByHeight { .. } => BLOCK_BY_HEIGHT,
        }
    }
}

#[derive(Debug)]
pub(crate) struct BaseModule;

fn resolve(msg_type: &str, payload: Option<&ModuleMsg>) -> Result<BaseMsg, Error> {
    if let Some(msg) = payload {
        return match msg {
            ModuleMsg::Base(msg) => Ok(msg.clone()),
            other => Err(Error::InvalidRequest(format!(
                "payload for module {:?} routed to {MODULE_NAME}",
                other.module()
            ))),
        };
    }
    match msg_type {
        NODE_INFO => Ok(BaseMsg::NodeInfo),
        SYNCING => Ok(BaseMsg::Syncing),
        LATEST_BLOCK => Ok(BaseMsg::LatestBlock),
        BLOCK_BY_HEIGHT => Err(Error::insufficient_params(msg_type, "height")),
        _ => Err(Error::invalid_msg_type(MODULE_NAME, msg_type)),
    }
}

fn lcd_path(msg: &BaseMsg) -> String {
    match msg {
        BaseMsg::NodeInfo => "/cosmos/base/tendermint/v1beta1/node_info".to_owned(),
        BaseMsg::Syncing => "/cosmos/base/tendermint/v1beta1/syncing".to_owned(),
        BaseMsg::LatestBlock => "/cosmos/base/tendermint/v1beta1/blocks/latest".to_owned(),
        BaseMsg::BlockByHeight { height } => {
            format!("/cosmos/base/tendermint/v1beta1/blocks/{height}")
        }
    }
}

#[async_trait]
impl ModuleAdapter for BaseModule {
    fn name(&self) -> &'static str {
        MODULE_NAME
    }

    fn msg_types(&self) -> &'static [&'static str] {
        &[NODE_INFO, SYNCING, LATEST_BLOCK, BLOCK_BY_HEIGHT]
    }

    fn build_tx(
        &self,
        _builder: &mut TxBuilder,
        _msg_type: &str,
        _msg: Option<&ModuleMsg>,
    ) -> Result<(), Error> {
        Err(Error::InvalidRequest(
            "module base has no transaction messages".to_owned(),
        ))
    }

    async fn run_query(&self, ctx: QueryContext<'_>) -> Result<String, Error> {
        let msg = resolve(ctx.msg_type, ctx.msg)?;
        let action = format!("{MODULE_NAME}/{}", msg.msg_type());
        match ctx.transport {
            Transport::Grpc => grpc_query(&ctx, &msg).await,
            Transport::Lcd => ctx.chain.lcd_get(&lcd_path(&msg), &action).await,
            Transport::Rpc => rpc_query(&ctx, &msg, &action).await,
            Transport::EvmRpc => Err(ctx.not_supported(MODULE_NAME)),
        }
    }
}

async fn rpc_query(ctx: &QueryContext<'_>, msg: &BaseMsg, action: &str) -> Result<String, Error> {
    let params = match msg {
        BaseMsg::LatestBlock => json!({}),
        BaseMsg::BlockByHeight { height } => json!({ "height": height.to_string() }),
        // Only block queries are routed here by the selection policy.
        _ => return Err(ctx.not_supported(MODULE_NAME)),
    };
    let result = jsonrpc_request(
        ctx.chain.http(),
        ctx.chain.rpc_url()?,
        "block",
        params,
        Transport::Rpc,
        action,
    )
    .await?;
    marshal(action, &result)
}

async fn grpc_query(ctx: &QueryContext<'_>, msg: &BaseMsg) -> Result<String, Error> {
    let mut client = ServiceClient::new(ctx.chain.grpc_channel()?);
    let action = format!("{MODULE_NAME}/{}", msg.msg_type());
    let value: Value = match msg {
        BaseMsg::NodeInfo => {
            let res = client
                .get_node_info(GetNodeInfoRequest {})
                .await
                .map_err(|s| ctx.grpc_err("cosmos.base.tendermint.v1beta1.Service/GetNodeInfo", s))?
                .into_inner();
            let node = res.default_node_info;
            let app = res.application_version;
            json!({
                "default_node_info": node.map(|n| json!({
                    "default_node_id": n.default_node_id,
                    "network": n.network,
                    "moniker": n.moniker,
                    "version": n.version,
                })),
                "application_version": app.map(|a| json!({
                    "name": a.name,
                    "app_name": a.app_name,
                    "version": a.version,
                    "cosmos_sdk_version": a.cosmos_sdk_version,
                })),
            })
        }
        BaseMsg::Syncing => {
            let res = client
                .get_syncing(GetSyncingRequest {})
                .await
                .map_err(|s| ctx.grpc_err("cosmos.base.tendermint.v1beta1.Service/GetSyncing", s))?
                .into_inner();
            json!({ "syncing": res.syncing })
        }
        BaseMsg::LatestBlock => {
            let res = client
                .get_latest_block(GetLatestBlockRequest {})
                .await
                .map_err(|s| {
                    ctx.grpc_err("cosmos.base.tendermint.v1beta1.Service/GetLatestBlock", s)
                })?
                .into_inner();
            block_json(&action, res.block_id, res.block)?
        }
        BaseMsg::BlockByHeight { height } => {
            let res = client
                .get_block_by_height(GetBlockByHeightRequest { height: *height })
                .await
                .map_err(|s| {
                    ctx.grpc_err("cosmos.base.tendermint.v1beta1.Service/GetBlockByHeight", s)
                })?
                .into_inner();
            block_json(&action, res.block_id, res.block)?
        }
    };
    marshal(&action, &value)
}

/// Summarize a block response: height, hash, chain ID, timestamp, and the
/// sha256 hashes of the raw transactions.
fn block_json(action: &str, block_id: Option<BlockId>, block: Option<Block>) -> Result<Value, Error> {
    let malformed = |what: String| Error::Transport {
        transport: Transport::Grpc,
        action: action.to_owned(),
        source: TransportError::MalformedResponse(what),
    };
    let missing = |what: &str| malformed(format!("missing {what} in block response"));

    let block_id = block_id.ok_or_else(|| missing("block_id"))?;
    let block = block.ok_or_else(|| missing("block"))?;
    let header = block.header.ok_or_else(|| missing("header"))?;
    let time = header.time.ok_or_else(|| missing("time"))?;
    let data = block.data.ok_or_else(|| missing("data"))?;

    // Node-supplied; reject instead of trusting it into chrono's panicking
    // constructors.
    let nanos = u32::try_from(time.nanos)
        .map_err(|_| malformed(format!("negative nanos {} in block timestamp", time.nanos)))?;
    let timestamp = Utc
        .timestamp_opt(time.seconds, nanos)
        .single()
        .ok_or_else(|| malformed(format!("out-of-range block timestamp {}s", time.seconds)))?;

    let mut txhashes = vec![];
    for tx in data.txs {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(tx);
        let digest = hasher.finalize();
        txhashes.push(hex::encode_upper(digest));
    }

    Ok(json!({
        "height": header.height,
        "block_hash": hex::encode_upper(block_id.hash),
        "chain_id": header.chain_id,
        "timestamp": timestamp.to_rfc3339(),
        "txhashes": txhashes,
    }))
}

impl XplaClient {
    /// Query the node's p2p and application version info.
    pub fn base_node_info(&mut self) -> &mut Self {
        self.with_msg(ModuleMsg::Base(BaseMsg::NodeInfo))
    }

    /// Query whether the node is still syncing.
    pub fn base_syncing(&mut self) -> &mut Self {
        self.with_msg(ModuleMsg::Base(BaseMsg::Syncing))
    }

    /// Query a block: no argument for the latest block, one argument for a
    /// specific height. More than one height is an invalid request, recorded
    /// without touching the transport.
    pub fn block(&mut self, heights: &[i64]) -> &mut Self {
        match heights {
            [] => self.with_msg(ModuleMsg::Base(BaseMsg::LatestBlock)),
            [height] => self.with_msg(ModuleMsg::Base(BaseMsg::BlockByHeight { height: *height })),
            _ => self.fail(Error::InvalidRequest(format!(
                "block accepts at most one height argument, got {}",
                heights.len()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::XplaBuilder;

    fn offline_client() -> XplaClient {
        XplaClient::new(XplaBuilder::new("cube_47-5").build().unwrap())
    }

    #[test]
    fn block_query_detection() {
        assert!(is_block_query("base", LATEST_BLOCK));
        assert!(is_block_query("base", BLOCK_BY_HEIGHT));
        assert!(!is_block_query("base", NODE_INFO));
        assert!(!is_block_query("bank", LATEST_BLOCK));
    }

    #[test]
    fn lcd_paths() {
        assert_eq!(
            lcd_path(&BaseMsg::LatestBlock),
            "/cosmos/base/tendermint/v1beta1/blocks/latest"
        );
        assert_eq!(
            lcd_path(&BaseMsg::BlockByHeight { height: 42 }),
            "/cosmos/base/tendermint/v1beta1/blocks/42"
        );
    }

    #[tokio::test]
    async fn block_arity() {
        let mut client = offline_client();

        // Zero arguments selects the latest block.
        client.block(&[]);
        let err = client.query().await.unwrap_err();
        // No transport configured, so dispatch reaches the LCD arm and fails
        // on the missing base URL, proving the tag resolved.
        assert!(matches!(err, Error::InvalidRequest(_)), "got {err:?}");

        // Two or more heights fail before any dispatch.
        let err = client.block(&[1, 2]).query().await.unwrap_err();
        match err {
            Error::InvalidRequest(message) => {
                assert!(message.contains("at most one height"), "got {message}")
            }
            other => panic!("expected InvalidRequest, got {other:?}"),
        }
    }

    #[test]
    fn no_tx_surface() {
        let mut client = offline_client();
        let err = client
            .with_msg(ModuleMsg::Base(BaseMsg::LatestBlock))
            .create_tx()
            .unwrap_err();
        match err {
            Error::InvalidRequest(message) => {
                assert!(message.contains("no transaction messages"), "got {message}")
            }
            other => panic!("expected InvalidRequest, got {other:?}"),
        }
    }

    #[test]
    fn block_summary_shape() {
        let mut block = Block::default();
        let mut header = cosmos_sdk_proto::tendermint::types::Header::default();
        header.height = 7;
        header.chain_id = "cube_47-5".to_owned();
        header.time = Some(Default::default());
        if let Some(time) = header.time.as_mut() {
            time.seconds = 1_700_000_000;
        }
        block.header = Some(header);
        block.data = Some(cosmos_sdk_proto::tendermint::types::Data {
            txs: vec![b"rawtx".to_vec()],
        });
        let mut block_id = BlockId::default();
        block_id.hash = vec![0xAB; 32];

        let value = block_json("base/latest-block", Some(block_id), Some(block)).unwrap();
        assert_eq!(value["height"], 7);
        assert_eq!(value["chain_id"], "cube_47-5");
        assert!(value["block_hash"].as_str().unwrap().starts_with("ABAB"));
        assert_eq!(value["txhashes"].as_array().unwrap().len(), 1);
        assert!(value["timestamp"].as_str().unwrap().starts_with("2023-11-14"));
    }

    #[test]
    fn extreme_timestamps_are_malformed_not_panics() {
        let build = |seconds: i64, nanos: i32| {
            let mut block = Block::default();
            let mut header = cosmos_sdk_proto::tendermint::types::Header::default();
            header.time = Some(Default::default());
            if let Some(time) = header.time.as_mut() {
                time.seconds = seconds;
                time.nanos = nanos;
            }
            block.header = Some(header);
            block.data = Some(cosmos_sdk_proto::tendermint::types::Data { txs: vec![] });
            block_json("base/latest-block", Some(BlockId::default()), Some(block))
        };
        let err = build(i64::MAX, 0).unwrap_err();
        assert!(matches!(err, Error::Transport { .. }), "got {err:?}");
        let err = build(1_700_000_000, -1).unwrap_err();
        assert!(matches!(err, Error::Transport { .. }), "got {err:?}");
    }

    #[test]
    fn missing_header_is_malformed_response() {
        let err = block_json("base/latest-block", Some(BlockId::default()), Some(Block::default()))
            .unwrap_err();
        assert!(matches!(err, Error::Transport { .. }), "got {err:?}");
    }
}
