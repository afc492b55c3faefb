//! Params module: raw subspace parameter lookups. Query-only.

use cosmos_sdk_proto::cosmos::params::v1beta1::{query_client::QueryClient, QueryParamsRequest};
use serde_json::{json, Value};
use tonic::async_trait;
use url::form_urlencoded;

use crate::client::XplaClient;
use crate::error::Error;
use crate::msg::ModuleMsg;
use crate::registry::{marshal, ModuleAdapter, QueryContext, Transport};
use crate::txbuilder::TxBuilder;

pub const MODULE_NAME: &str = "params";

pub const PARAMS_QUERY_SUBSPACE: &str = "params-query-subspace";

/// Operations of the params module.
#[derive(Clone, Debug)]
pub enum ParamsMsg {
    Subspace { subspace: String, key: String },
}

impl ParamsMsg {
    pub(crate) fn msg_type(&self) -> &'static str {
        match self {
            ParamsMsg::Subspace { .. } => PARAMS_QUERY_SUBSPACE,
        }
    }
}

#[derive(Debug)]
pub(crate) struct ParamsModule;

fn resolve(msg_type: &str, payload: Option<&ModuleMsg>) -> Result<ParamsMsg, Error> {
    if let Some(msg) = payload {
        return match msg {
            ModuleMsg::Params(msg) => Ok(msg.clone()),
            other => Err(Error::InvalidRequest(format!(
                "payload for module {:?} routed to {MODULE_NAME}",
                other.module()
            ))),
        };
    }
    match msg_type {
        PARAMS_QUERY_SUBSPACE => Err(Error::insufficient_params(msg_type, "subspace")),
        _ => Err(Error::invalid_msg_type(MODULE_NAME, msg_type)),
    }
}

fn lcd_path(msg: &ParamsMsg) -> String {
    match msg {
        ParamsMsg::Subspace { subspace, key } => {
            // Keys are caller-supplied strings; encode so reserved characters
            // never restructure the query.
            let query: String = form_urlencoded::Serializer::new(String::new())
                .append_pair("subspace", subspace)
                .append_pair("key", key)
                .finish();
            format!("/cosmos/params/v1beta1/params?{query}")
        }
    }
}

#[async_trait]
impl ModuleAdapter for ParamsModule {
    fn name(&self) -> &'static str {
        MODULE_NAME
    }

    fn msg_types(&self) -> &'static [&'static str] {
        &[PARAMS_QUERY_SUBSPACE]
    }

    fn build_tx(
        &self,
        _builder: &mut TxBuilder,
        _msg_type: &str,
        _msg: Option<&ModuleMsg>,
    ) -> Result<(), Error> {
        Err(Error::InvalidRequest(
            "module params has no transaction messages".to_owned(),
        ))
    }

    async fn run_query(&self, ctx: QueryContext<'_>) -> Result<String, Error> {
        let msg = resolve(ctx.msg_type, ctx.msg)?;
        match ctx.transport {
            Transport::Grpc => grpc_query(&ctx, &msg).await,
            Transport::Lcd => {
                ctx.chain
                    .lcd_get(&lcd_path(&msg), &format!("{MODULE_NAME}/{}", msg.msg_type()))
                    .await
            }
            Transport::Rpc | Transport::EvmRpc => Err(ctx.not_supported(MODULE_NAME)),
        }
    }
}

async fn grpc_query(ctx: &QueryContext<'_>, msg: &ParamsMsg) -> Result<String, Error> {
    let ParamsMsg::Subspace { subspace, key } = msg;
    let mut client = QueryClient::new(ctx.chain.grpc_channel()?);
    let res = client
        .params(QueryParamsRequest {
            subspace: subspace.clone(),
            key: key.clone(),
        })
        .await
        .map_err(|s| ctx.grpc_err("cosmos.params.v1beta1.Query/Params", s))?
        .into_inner();
    let value: Value = match res.param {
        Some(param) => json!({
            "param": {
                "subspace": param.subspace,
                "key": param.key,
                "value": param.value,
            }
        }),
        None => json!({ "param": Value::Null }),
    };
    marshal(&format!("{MODULE_NAME}/{}", msg.msg_type()), &value)
}

impl XplaClient {
    /// Query a raw parameter by subspace and key.
    pub fn params_subspace(
        &mut self,
        subspace: impl Into<String>,
        key: impl Into<String>,
    ) -> &mut Self {
        self.with_msg(ModuleMsg::Params(ParamsMsg::Subspace {
            subspace: subspace.into(),
            key: key.into(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lcd_path_carries_query_string() {
        assert_eq!(
            lcd_path(&ParamsMsg::Subspace {
                subspace: "staking".to_owned(),
                key: "MaxValidators".to_owned()
            }),
            "/cosmos/params/v1beta1/params?subspace=staking&key=MaxValidators"
        );
    }

    #[test]
    fn lcd_path_percent_encodes_values() {
        let path = lcd_path(&ParamsMsg::Subspace {
            subspace: "staking".to_owned(),
            key: "Max Validators&key=evil".to_owned(),
        });
        assert_eq!(
            path,
            "/cosmos/params/v1beta1/params?subspace=staking&key=Max+Validators%26key%3Devil"
        );
    }

    #[test]
    fn subspace_without_params_is_insufficient_params() {
        let err = resolve(PARAMS_QUERY_SUBSPACE, None).unwrap_err();
        assert!(matches!(err, Error::InsufficientParams { .. }), "got {err:?}");
    }
}
