//! Connection handling to an XPLA node across all configured transports.

use std::sync::Arc;
use std::time::Duration;

use cosmos_sdk_proto::cosmos::auth::v1beta1::{BaseAccount, QueryAccountRequest};
use cosmos_sdk_proto::cosmos::base::abci::v1beta1::TxResponse;
use cosmos_sdk_proto::cosmos::tx::v1beta1::{BroadcastMode, BroadcastTxRequest};
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};

use crate::error::{ConnectionError, Error, TransportError};
use crate::registry::Transport;

/// A connection to an XPLA chain, cheap to clone and share.
#[derive(Clone)]
pub struct Xpla {
    inner: Arc<XplaInner>,
}

struct XplaInner {
    builder: XplaBuilder,
    grpc_channel: Option<Channel>,
    http: reqwest::Client,
    /// Serializes LCD requests so concurrent queries never interleave on the
    /// shared connection state. Held across the request, so this must be the
    /// async mutex.
    lcd_lock: tokio::sync::Mutex<()>,
}

/// Used to build an [Xpla] connection.
#[derive(Clone, Debug)]
pub struct XplaBuilder {
    chain_id: String,
    grpc_url: Option<String>,
    lcd_url: Option<String>,
    rpc_url: Option<String>,
    evm_rpc_url: Option<String>,

    // Values with defaults
    gas_coin: Option<String>,
    gas_limit: Option<u64>,
    gas_price: Option<f64>,
    query_timeout_seconds: Option<u32>,
}

impl XplaBuilder {
    /// Create a new [XplaBuilder] with default options where possible.
    ///
    /// No endpoints are configured initially; set at least one of the gRPC,
    /// LCD, or RPC URLs before issuing queries.
    pub fn new(chain_id: impl Into<String>) -> XplaBuilder {
        XplaBuilder {
            chain_id: chain_id.into(),
            grpc_url: None,
            lcd_url: None,
            rpc_url: None,
            evm_rpc_url: None,
            gas_coin: None,
            gas_limit: None,
            gas_price: None,
            query_timeout_seconds: None,
        }
    }

    /// Chain ID we want to communicate with
    pub fn chain_id(&self) -> &str {
        self.chain_id.as_ref()
    }

    /// gRPC endpoint, e.g. `https://cube-grpc.xpla.dev`
    pub fn grpc_url(&self) -> Option<&str> {
        self.grpc_url.as_deref()
    }

    /// See [Self::grpc_url]
    pub fn set_grpc_url(&mut self, grpc_url: impl Into<String>) {
        self.grpc_url = Some(grpc_url.into());
    }

    /// LCD (REST gateway) base URL, e.g. `https://cube-lcd.xpla.dev`
    pub fn lcd_url(&self) -> Option<&str> {
        self.lcd_url.as_deref()
    }

    /// See [Self::lcd_url]
    pub fn set_lcd_url(&mut self, lcd_url: impl Into<String>) {
        self.lcd_url = Some(lcd_url.into());
    }

    /// Tendermint RPC URL, preferred for block queries when set
    pub fn rpc_url(&self) -> Option<&str> {
        self.rpc_url.as_deref()
    }

    /// See [Self::rpc_url]
    pub fn set_rpc_url(&mut self, rpc_url: impl Into<String>) {
        self.rpc_url = Some(rpc_url.into());
    }

    /// Ethereum-compatible JSON-RPC URL, required for the evm module
    pub fn evm_rpc_url(&self) -> Option<&str> {
        self.evm_rpc_url.as_deref()
    }

    /// See [Self::evm_rpc_url]
    pub fn set_evm_rpc_url(&mut self, evm_rpc_url: impl Into<String>) {
        self.evm_rpc_url = Some(evm_rpc_url.into());
    }

    /// Native coin used for gas payments
    ///
    /// Defaults to `axpla`.
    pub fn gas_coin(&self) -> &str {
        self.gas_coin.as_deref().unwrap_or("axpla")
    }

    /// See [Self::gas_coin]
    pub fn set_gas_coin(&mut self, gas_coin: impl Into<String>) {
        self.gas_coin = Some(gas_coin.into());
    }

    /// Gas limit requested when signing a transaction
    ///
    /// Defaults to 300,000.
    pub fn gas_limit(&self) -> u64 {
        self.gas_limit.unwrap_or(300_000)
    }

    /// See [Self::gas_limit]
    pub fn set_gas_limit(&mut self, gas_limit: Option<u64>) {
        self.gas_limit = gas_limit;
    }

    /// Amount of gas coin to send per unit of gas.
    ///
    /// Defaults to 850,000,000,000, the chain's published minimum
    /// (axpla has 18 decimal places).
    pub fn gas_price(&self) -> f64 {
        self.gas_price.unwrap_or(850_000_000_000.0)
    }

    /// See [Self::gas_price]
    pub fn set_gas_price(&mut self, gas_price: Option<f64>) {
        self.gas_price = gas_price;
    }

    /// Sets the number of seconds before timing out an LCD or RPC query
    ///
    /// Defaults to 5 seconds
    pub fn query_timeout_seconds(&self) -> u32 {
        self.query_timeout_seconds.unwrap_or(5)
    }

    /// See [Self::query_timeout_seconds]
    pub fn set_query_timeout_seconds(&mut self, query_timeout_seconds: Option<u32>) {
        self.query_timeout_seconds = query_timeout_seconds;
    }

    /// Build the connection.
    ///
    /// The gRPC channel connects lazily, so no network traffic occurs until
    /// the first query.
    pub fn build(self) -> Result<Xpla, ConnectionError> {
        let grpc_channel = match self.grpc_url() {
            Some(url) => {
                let endpoint = Endpoint::from_shared(url.to_owned()).map_err(|source| {
                    ConnectionError::InvalidGrpcEndpoint {
                        url: url.to_owned(),
                        source,
                    }
                })?;
                let endpoint = if url.starts_with("https://") {
                    endpoint
                        .tls_config(ClientTlsConfig::new())
                        .map_err(|source| ConnectionError::TlsConfig {
                            url: url.to_owned(),
                            source,
                        })?
                } else {
                    endpoint
                };
                Some(endpoint.connect_lazy())
            }
            None => None,
        };

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.query_timeout_seconds().into()))
            .build()
            .map_err(|source| ConnectionError::HttpClient { source })?;

        Ok(Xpla {
            inner: Arc::new(XplaInner {
                builder: self,
                grpc_channel,
                http,
                lcd_lock: tokio::sync::Mutex::new(()),
            }),
        })
    }
}

impl Xpla {
    pub fn get_builder(&self) -> &XplaBuilder {
        &self.inner.builder
    }

    pub fn chain_id(&self) -> &str {
        self.inner.builder.chain_id()
    }

    pub(crate) fn has_grpc(&self) -> bool {
        self.inner.grpc_channel.is_some()
    }

    pub(crate) fn has_rpc(&self) -> bool {
        self.inner.builder.rpc_url().is_some()
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.inner.http
    }

    /// The shared channel the per-module generated clients are built against.
    pub(crate) fn grpc_channel(&self) -> Result<Channel, Error> {
        self.inner.grpc_channel.clone().ok_or_else(|| {
            Error::InvalidRequest("no gRPC endpoint configured for this connection".to_owned())
        })
    }

    pub(crate) fn rpc_url(&self) -> Result<&str, Error> {
        self.inner
            .builder
            .rpc_url()
            .ok_or_else(|| Error::InvalidRequest("no RPC URL configured for this connection".to_owned()))
    }

    pub(crate) fn evm_rpc_url(&self) -> Result<&str, Error> {
        self.inner.builder.evm_rpc_url().ok_or_else(|| {
            Error::InvalidRequest("no EVM JSON-RPC URL configured for this connection".to_owned())
        })
    }

    /// Issue an LCD GET for the given path (including any query string) and
    /// return the raw response body. The gateway already returns canonical
    /// JSON, so the body passes through untouched.
    pub(crate) async fn lcd_get(&self, path: &str, action: &str) -> Result<String, Error> {
        let base = self.inner.builder.lcd_url().ok_or_else(|| {
            Error::InvalidRequest("no LCD base URL configured for this connection".to_owned())
        })?;
        let url = format!("{}{}", base.trim_end_matches('/'), path);

        let transport_err = |source: TransportError| Error::Transport {
            transport: Transport::Lcd,
            action: action.to_owned(),
            source,
        };

        let _guard = self.inner.lcd_lock.lock().await;
        tracing::debug!("LCD GET {url}");
        let res = self
            .inner
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| transport_err(e.into()))?;
        let status = res.status();
        let body = res.text().await.map_err(|e| transport_err(e.into()))?;
        if !status.is_success() {
            return Err(transport_err(TransportError::HttpStatus { status, body }));
        }
        Ok(body)
    }

    /// Look up the [BaseAccount] for an address, unwrapping the chain's
    /// EthAccount envelope when present.
    pub async fn get_base_account(&self, address: impl Into<String>) -> Result<BaseAccount, Error> {
        use cosmos_sdk_proto::cosmos::auth::v1beta1::query_client::QueryClient;

        let address = address.into();
        let mut client = QueryClient::new(self.grpc_channel()?);
        let res = client
            .account(QueryAccountRequest { address })
            .await
            .map_err(|status| Error::Transport {
                transport: Transport::Grpc,
                action: "cosmos.auth.v1beta1.Query/Account".to_owned(),
                source: status.into(),
            })?
            .into_inner();

        let any = res.account.ok_or_else(|| Error::Transport {
            transport: Transport::Grpc,
            action: "cosmos.auth.v1beta1.Query/Account".to_owned(),
            source: TransportError::MalformedResponse("missing account in response".to_owned()),
        })?;

        let malformed = |message: String| Error::Transport {
            transport: Transport::Grpc,
            action: "cosmos.auth.v1beta1.Query/Account".to_owned(),
            source: TransportError::MalformedResponse(message),
        };

        // XPLA wraps accounts in ethermint's EthAccount
        if any.type_url.ends_with("EthAccount") {
            let eth: EthAccount = prost::Message::decode(any.value.as_ref())
                .map_err(|e| malformed(format!("invalid EthAccount: {e}")))?;
            eth.base_account
                .ok_or_else(|| malformed("EthAccount without base account".to_owned()))
        } else {
            prost::Message::decode(any.value.as_ref())
                .map_err(|e| malformed(format!("invalid BaseAccount: {e}")))
        }
    }

    /// Broadcast signed transaction bytes in sync mode.
    pub async fn broadcast_tx(&self, tx_bytes: Vec<u8>) -> Result<TxResponse, Error> {
        use cosmos_sdk_proto::cosmos::tx::v1beta1::service_client::ServiceClient;

        let mut client = ServiceClient::new(self.grpc_channel()?);
        let res = client
            .broadcast_tx(BroadcastTxRequest {
                tx_bytes,
                mode: BroadcastMode::Sync as i32,
            })
            .await
            .map_err(|status| Error::Transport {
                transport: Transport::Grpc,
                action: "cosmos.tx.v1beta1.Service/BroadcastTx".to_owned(),
                source: status.into(),
            })?
            .into_inner();
        res.tx_response.ok_or_else(|| Error::Transport {
            transport: Transport::Grpc,
            action: "cosmos.tx.v1beta1.Service/BroadcastTx".to_owned(),
            source: TransportError::MalformedResponse("missing tx_response".to_owned()),
        })
    }
}

/// Ethermint account wrapper used by the chain's auth module.
#[derive(Clone, PartialEq, prost::Message)]
pub struct EthAccount {
    #[prost(message, optional, tag = "1")]
    pub base_account: Option<BaseAccount>,
    #[prost(string, tag = "2")]
    pub code_hash: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let builder = XplaBuilder::new("dimension_37-1");
        assert_eq!(builder.chain_id(), "dimension_37-1");
        assert_eq!(builder.gas_coin(), "axpla");
        assert_eq!(builder.gas_limit(), 300_000);
        assert_eq!(builder.query_timeout_seconds(), 5);
        assert!(builder.grpc_url().is_none());
    }

    #[test]
    fn build_without_endpoints_is_fine() {
        let chain = XplaBuilder::new("cube_47-5").build().unwrap();
        assert!(!chain.has_grpc());
        assert!(!chain.has_rpc());
        assert!(chain.grpc_channel().is_err());
    }

    #[tokio::test]
    async fn lcd_without_base_url_is_invalid_request() {
        let chain = XplaBuilder::new("cube_47-5").build().unwrap();
        let err = chain
            .lcd_get("/cosmos/mint/v1beta1/params", "mint/mint-query-params")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)), "got {err:?}");
    }
}
