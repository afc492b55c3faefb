//! Module registry and the two routers built on top of it.
//!
//! Every chain module plugs into the same contract: a [ModuleAdapter] can
//! attach its transaction messages to a [TxBuilder] and can answer queries
//! over whichever transport the dispatcher selects. The registry maps module
//! names to adapters and is populated once at first use.

use std::collections::HashMap;
use std::fmt::Display;

use once_cell::sync::Lazy;
use tonic::async_trait;

use crate::chain::Xpla;
use crate::error::Error;
use crate::modules;
use crate::msg::ModuleMsg;
use crate::txbuilder::TxBuilder;

/// The transport a query is dispatched over.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transport {
    /// Generated query client over the shared gRPC channel.
    Grpc,
    /// HTTP GET against the LCD (REST gateway) base URL.
    Lcd,
    /// Tendermint JSON-RPC, used for block-shaped queries.
    Rpc,
    /// Ethereum-compatible JSON-RPC endpoint.
    EvmRpc,
}

impl Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(match self {
            Transport::Grpc => "gRPC",
            Transport::Lcd => "LCD",
            Transport::Rpc => "RPC",
            Transport::EvmRpc => "EVM JSON-RPC",
        })
    }
}

/// Everything an adapter needs to run one query. Built fresh per
/// [crate::XplaClient::query] call and never persisted.
pub(crate) struct QueryContext<'a> {
    pub(crate) chain: &'a Xpla,
    pub(crate) msg_type: &'a str,
    pub(crate) msg: Option<&'a ModuleMsg>,
    pub(crate) transport: Transport,
}

impl QueryContext<'_> {
    /// Wrap a gRPC status with the method that produced it.
    pub(crate) fn grpc_err(&self, method: &'static str, status: tonic::Status) -> Error {
        Error::Transport {
            transport: Transport::Grpc,
            action: method.to_owned(),
            source: status.into(),
        }
    }

    pub(crate) fn not_supported(&self, module: &str) -> Error {
        Error::not_supported(format!("{module}/{}", self.msg_type), self.transport)
    }
}

/// Per-module pluggability unit. One shared instance per module, stateless,
/// safe for concurrent reuse.
#[async_trait]
pub(crate) trait ModuleAdapter: Send + Sync + std::fmt::Debug {
    /// Module name, the first half of the public (module, msg-type) vocabulary.
    fn name(&self) -> &'static str;

    /// Every message type tag this module answers to, for both routers.
    fn msg_types(&self) -> &'static [&'static str];

    /// Attach the message for `msg_type` to the transaction builder.
    ///
    /// Exactly one message is attached per call. Modules without a
    /// transaction surface return [Error::InvalidRequest] unconditionally,
    /// whether or not a payload was supplied; a tx tag invoked without its
    /// payload reports the missing parameter.
    fn build_tx(
        &self,
        builder: &mut TxBuilder,
        msg_type: &str,
        msg: Option<&ModuleMsg>,
    ) -> Result<(), Error>;

    /// Execute the query over the transport chosen in `ctx` and return the
    /// normalized JSON response.
    async fn run_query(&self, ctx: QueryContext<'_>) -> Result<String, Error>;
}

static REGISTRY: Lazy<HashMap<&'static str, &'static dyn ModuleAdapter>> = Lazy::new(|| {
    let mut m: HashMap<&'static str, &'static dyn ModuleAdapter> = HashMap::new();
    m.insert(modules::bank::MODULE_NAME, &modules::bank::BankModule);
    m.insert(modules::base::MODULE_NAME, &modules::base::BaseModule);
    m.insert(modules::evm::MODULE_NAME, &modules::evm::EvmModule);
    m.insert(
        modules::feegrant::MODULE_NAME,
        &modules::feegrant::FeegrantModule,
    );
    m.insert(modules::mint::MODULE_NAME, &modules::mint::MintModule);
    m.insert(modules::params::MODULE_NAME, &modules::params::ParamsModule);
    m.insert(
        modules::upgrade::MODULE_NAME,
        &modules::upgrade::UpgradeModule,
    );
    m.insert(modules::wasm::MODULE_NAME, &modules::wasm::WasmModule);
    m
});

/// Resolve the adapter for a module name.
pub(crate) fn lookup(module: &str) -> Result<&'static dyn ModuleAdapter, Error> {
    REGISTRY
        .get(module)
        .copied()
        .ok_or_else(|| Error::InvalidRequest(format!("unknown module {module:?}")))
}

/// Transport selection policy, evaluated once per query.
///
/// gRPC wins over LCD whenever an endpoint is configured. Tendermint RPC is
/// preferred over gRPC for the two block-shaped queries only, because the
/// gRPC tendermint service cannot represent the full node block response.
/// That precedence is deliberately not generalized to other operations.
pub(crate) fn select_transport(chain: &Xpla, module: &str, msg_type: &str) -> Transport {
    if module == modules::evm::MODULE_NAME {
        return Transport::EvmRpc;
    }
    if chain.has_rpc() && modules::base::is_block_query(module, msg_type) {
        return Transport::Rpc;
    }
    if chain.has_grpc() {
        Transport::Grpc
    } else {
        Transport::Lcd
    }
}

/// Serialize a shaped response value, tagging failures with the operation.
pub(crate) fn marshal(action: &str, value: &serde_json::Value) -> Result<String, Error> {
    serde_json::to_string(value).map_err(|source| Error::Marshal {
        action: action.to_owned(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::XplaBuilder;

    #[test]
    fn all_modules_resolvable() {
        for module in [
            "bank", "base", "evm", "feegrant", "mint", "params", "upgrade", "wasm",
        ] {
            let adapter = lookup(module).unwrap();
            assert_eq!(adapter.name(), module);
        }
    }

    #[test]
    fn unknown_module_is_invalid_request() {
        let err = lookup("staking").unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)), "got {err:?}");
    }

    #[test]
    fn msg_type_tags_are_unique_per_module() {
        for adapter in REGISTRY.values() {
            let tags = adapter.msg_types();
            for (i, tag) in tags.iter().enumerate() {
                assert!(
                    !tags[i + 1..].contains(tag),
                    "duplicate tag {tag} in module {}",
                    adapter.name()
                );
            }
        }
    }

    #[tokio::test]
    async fn grpc_wins_over_lcd() {
        let mut builder = XplaBuilder::new("dimension_37-1");
        builder.set_grpc_url("http://localhost:9090");
        builder.set_lcd_url("http://localhost:1317");
        let chain = builder.build().unwrap();
        assert_eq!(
            select_transport(&chain, "mint", "mint-query-params"),
            Transport::Grpc
        );
    }

    #[test]
    fn lcd_is_the_fallback() {
        let mut builder = XplaBuilder::new("dimension_37-1");
        builder.set_lcd_url("http://localhost:1317");
        let chain = builder.build().unwrap();
        assert_eq!(
            select_transport(&chain, "mint", "mint-query-params"),
            Transport::Lcd
        );
    }

    #[tokio::test]
    async fn rpc_wins_for_block_queries_only() {
        let mut builder = XplaBuilder::new("dimension_37-1");
        builder.set_grpc_url("http://localhost:9090");
        builder.set_rpc_url("http://localhost:26657");
        let chain = builder.build().unwrap();
        assert_eq!(
            select_transport(&chain, "base", "latest-block"),
            Transport::Rpc
        );
        assert_eq!(
            select_transport(&chain, "base", "block-by-height"),
            Transport::Rpc
        );
        assert_eq!(
            select_transport(&chain, "base", "node-info"),
            Transport::Grpc
        );
        assert_eq!(
            select_transport(&chain, "bank", "query-bank-balances"),
            Transport::Grpc
        );
    }
}
