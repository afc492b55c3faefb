//! The fluent client facade.
//!
//! An [XplaClient] is a local, sequential builder object: chained setters
//! fill in the request state, and a terminal call (`query`, `create_tx`,
//! `create_and_sign_tx`) consumes it. Errors recorded mid-chain are sticky
//! and surface unchanged at the terminal call; terminal calls always clear
//! the state so nothing leaks into the next request.

use crate::chain::Xpla;
use crate::error::Error;
use crate::msg::ModuleMsg;
use crate::registry::{self, QueryContext};
use crate::txbuilder::TxBuilder;
use crate::wallet::Wallet;

/// Fluent request builder over a chain connection.
pub struct XplaClient {
    chain: Xpla,
    state: RequestState,
}

#[derive(Default)]
struct RequestState {
    module: Option<String>,
    msg_type: Option<String>,
    msg: Option<ModuleMsg>,
    pending_error: Option<Error>,
}

impl XplaClient {
    /// Wrap a connection in a fresh request builder.
    pub fn new(chain: Xpla) -> XplaClient {
        XplaClient {
            chain,
            state: RequestState::default(),
        }
    }

    /// The underlying connection.
    pub fn chain(&self) -> &Xpla {
        &self.chain
    }

    /// Select the module for the next request.
    pub fn with_module(&mut self, module: impl Into<String>) -> &mut Self {
        if self.state.pending_error.is_none() {
            self.state.module = Some(module.into());
        }
        self
    }

    /// Select the message type tag for the next request.
    pub fn with_msg_type(&mut self, msg_type: impl Into<String>) -> &mut Self {
        if self.state.pending_error.is_none() {
            self.state.msg_type = Some(msg_type.into());
        }
        self
    }

    /// Attach a typed payload. Also selects its module and message type, so
    /// this is the one call the typed per-module helpers go through.
    pub fn with_msg(&mut self, msg: ModuleMsg) -> &mut Self {
        if self.state.pending_error.is_none() {
            self.state.module = Some(msg.module().to_owned());
            self.state.msg_type = Some(msg.msg_type().to_owned());
            self.state.msg = Some(msg);
        }
        self
    }

    /// Record a deferred error. Subsequent setters are no-ops; the error is
    /// returned by the next terminal call.
    pub(crate) fn fail(&mut self, err: Error) -> &mut Self {
        if self.state.pending_error.is_none() {
            self.state.pending_error = Some(err);
        }
        self
    }

    /// Clear all request state, abandoning any chain in progress.
    pub fn reset(&mut self) {
        self.state = RequestState::default();
    }

    /// Run the pending request as a query and return the JSON response.
    pub async fn query(&mut self) -> Result<String, Error> {
        let (module, msg_type, msg) = self.consume()?;
        let adapter = registry::lookup(&module)?;
        let transport = registry::select_transport(&self.chain, &module, &msg_type);
        tracing::debug!("dispatching query {module}/{msg_type} over {transport}");
        adapter
            .run_query(QueryContext {
                chain: &self.chain,
                msg_type: &msg_type,
                msg: msg.as_ref(),
                transport,
            })
            .await
    }

    /// Route the pending request into a transaction builder with exactly one
    /// message attached.
    pub fn create_tx(&mut self) -> Result<TxBuilder, Error> {
        let (module, msg_type, msg) = self.consume()?;
        let adapter = registry::lookup(&module)?;
        if !adapter.msg_types().contains(&msg_type.as_str()) {
            return Err(Error::invalid_msg_type(&module, &msg_type));
        }
        let mut builder = TxBuilder::default();
        adapter.build_tx(&mut builder, &msg_type, msg.as_ref())?;
        Ok(builder)
    }

    /// Route the pending request into a transaction, sign it with the
    /// wallet, and return the raw bytes ready for [Xpla::broadcast_tx].
    pub async fn create_and_sign_tx(&mut self, wallet: &Wallet) -> Result<Vec<u8>, Error> {
        let builder = self.create_tx()?;
        builder.sign(&self.chain, wallet).await
    }

    /// Take the request state, leaving the facade reset, and validate its
    /// shape. A payload that disagrees with the selected module or tag can
    /// only come from misuse of the raw setters, and fails loudly.
    fn consume(&mut self) -> Result<(String, String, Option<ModuleMsg>), Error> {
        let state = std::mem::take(&mut self.state);
        if let Some(err) = state.pending_error {
            return Err(err);
        }
        let module = state
            .module
            .ok_or_else(|| Error::InvalidRequest("no module selected".to_owned()))?;
        let msg_type = state.msg_type.ok_or_else(|| {
            Error::InvalidRequest(format!("no message type selected for module {module:?}"))
        })?;
        if let Some(msg) = &state.msg {
            if msg.module() != module || msg.msg_type() != msg_type {
                return Err(Error::InvalidRequest(format!(
                    "payload for {}/{} does not match selected request {module}/{msg_type}",
                    msg.module(),
                    msg.msg_type(),
                )));
            }
        }
        Ok((module, msg_type, state.msg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::XplaBuilder;

    fn offline_client() -> XplaClient {
        XplaClient::new(XplaBuilder::new("cube_47-5").build().unwrap())
    }

    #[tokio::test]
    async fn missing_module_is_invalid_request() {
        let mut client = offline_client();
        let err = client.query().await.unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn missing_msg_type_is_invalid_request() {
        let mut client = offline_client();
        let err = client.with_module("bank").query().await.unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn unknown_msg_type_names_the_tag() {
        let mut client = offline_client();
        let err = client
            .with_module("mint")
            .with_msg_type("mint-query-bogus")
            .query()
            .await
            .unwrap_err();
        match err {
            Error::InvalidMsgType { module, msg_type } => {
                assert_eq!(module, "mint");
                assert_eq!(msg_type, "mint-query-bogus");
            }
            other => panic!("expected InvalidMsgType, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn pending_error_is_sticky() {
        let mut client = offline_client();
        client.fail(Error::InvalidRequest("first failure".to_owned()));
        // Later setters must not displace the recorded error.
        let err = client
            .with_module("mint")
            .with_msg_type("mint-query-params")
            .query()
            .await
            .unwrap_err();
        match err {
            Error::InvalidRequest(message) => assert_eq!(message, "first failure"),
            other => panic!("expected InvalidRequest, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn terminal_call_clears_state() {
        let mut client = offline_client();
        client.fail(Error::InvalidRequest("first failure".to_owned()));
        let _ = client.query().await.unwrap_err();
        // State was consumed; the next call starts from scratch.
        let err = client.query().await.unwrap_err();
        match err {
            Error::InvalidRequest(message) => assert_eq!(message, "no module selected"),
            other => panic!("expected InvalidRequest, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn mismatched_payload_fails_loudly() {
        use crate::modules::mint::MintMsg;
        let mut client = offline_client();
        let err = client
            .with_msg(ModuleMsg::Mint(MintMsg::Params))
            .with_module("bank")
            .query()
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)), "got {err:?}");
    }

    #[test]
    fn unknown_tag_in_tx_router_names_the_tag() {
        let mut client = offline_client();
        let err = client
            .with_module("bank")
            .with_msg_type("bank-burn")
            .create_tx()
            .unwrap_err();
        match err {
            Error::InvalidMsgType { module, msg_type } => {
                assert_eq!(module, "bank");
                assert_eq!(msg_type, "bank-burn");
            }
            other => panic!("expected InvalidMsgType, got {other:?}"),
        }
    }

    #[test]
    fn tx_less_module_reports_no_tx_surface_without_payload() {
        let mut client = offline_client();
        let err = client
            .with_module("mint")
            .with_msg_type("mint-inflation")
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
    fn tx_tag_without_payload_is_insufficient_params() {
        let mut client = offline_client();
        let err = client
            .with_module("bank")
            .with_msg_type("bank-send")
            .create_tx()
            .unwrap_err();
        assert!(matches!(err, Error::InsufficientParams { .. }), "got {err:?}");
    }

    #[test]
    fn tx_for_query_only_module_is_rejected() {
        use crate::modules::mint::MintMsg;
        let mut client = offline_client();
        let err = client
            .with_msg(ModuleMsg::Mint(MintMsg::Params))
            .create_tx()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)), "got {err:?}");
    }
}
