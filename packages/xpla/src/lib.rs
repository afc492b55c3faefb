//! Fluent client library for the XPLA blockchain.
//!
//! XPLA is a Cosmos SDK chain with an Ethereum-compatible layer: standard
//! Cosmos modules served over gRPC and the LCD REST gateway, plus an EVM
//! exposed over Ethereum JSON-RPC, with eth_secp256k1 accounts throughout.
//!
//! The entrypoints are [XplaBuilder] for configuring a connection and
//! [XplaClient] for issuing requests against it:
//!
//! ```rust,no_run
//! use xpla::{XplaBuilder, XplaClient};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let mut builder = XplaBuilder::new("dimension_37-1");
//! builder.set_grpc_url("https://dimension-grpc.xpla.dev");
//! let chain = builder.build()?;
//!
//! let mut client = XplaClient::new(chain);
//! let balances = client.bank_balances("xpla1...").query().await?;
//! let latest = client.block(&[]).query().await?;
//! # Ok(())
//! # }
//! ```
//!
//! Requests can equally be phrased through the untyped setters
//! ([XplaClient::with_module] and [XplaClient::with_msg_type]) when the
//! module and message type come from configuration rather than code.

mod chain;
mod client;
mod error;
mod modules;
mod msg;
mod registry;
mod rpc;
mod txbuilder;
mod wallet;

pub use chain::{Xpla, XplaBuilder};
pub use client::XplaClient;
pub use error::{ConnectionError, Error, TransportError, WalletError};
pub use modules::bank::BankMsg;
pub use modules::base::BaseMsg;
pub use modules::evm::EvmMsg;
pub use modules::feegrant::{basic_allowance, FeegrantMsg};
pub use modules::mint::MintMsg;
pub use modules::params::ParamsMsg;
pub use modules::upgrade::UpgradeMsg;
pub use modules::wasm::WasmMsg;
pub use msg::ModuleMsg;
pub use registry::Transport;
pub use txbuilder::{MsgStoreCodeHelper, TxBuilder, TxMessage};
pub use wallet::{SeedPhrase, Wallet, ADDRESS_HRP};

pub use cosmos_sdk_proto as proto;
