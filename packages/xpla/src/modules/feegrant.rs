//! Feegrant module: fee allowance grants between accounts.

use cosmos_sdk_proto::cosmos::base::v1beta1::Coin;
use cosmos_sdk_proto::cosmos::feegrant::v1beta1::{
    query_client::QueryClient, BasicAllowance, Grant, MsgGrantAllowance, MsgRevokeAllowance,
    QueryAllowanceRequest, QueryAllowancesByGranterRequest, QueryAllowancesRequest,
};
use prost::Message;
use serde_json::{json, Value};
use tonic::async_trait;

use crate::client::XplaClient;
use crate::error::Error;
use crate::msg::ModuleMsg;
use crate::registry::{marshal, ModuleAdapter, QueryContext, Transport};
use crate::txbuilder::TxBuilder;

use super::any_json;

pub const MODULE_NAME: &str = "feegrant";

pub const GRANT_FEE_ALLOWANCE: &str = "grant-fee-allowance";
pub const REVOKE_FEE_ALLOWANCE: &str = "revoke-fee-allowance";
pub const QUERY_FEE_GRANTS: &str = "query-fee-grants";
pub const QUERY_FEE_GRANT: &str = "query-fee-grant";
pub const FEE_GRANTS_BY_GRANTER: &str = "fee-grants-by-granter";

/// Operations of the feegrant module.
#[derive(Clone, Debug)]
pub enum FeegrantMsg {
    GrantAllowance(MsgGrantAllowance),
    RevokeAllowance(MsgRevokeAllowance),
    Allowances { grantee: String },
    Allowance { granter: String, grantee: String },
    AllowancesByGranter { granter: String },
}

impl FeegrantMsg {
    pub(crate) fn msg_type(&self) -> &'static str {
        match self {
            FeegrantMsg::GrantAllowance(_) => GRANT_FEE_ALLOWANCE,
            FeegrantMsg::RevokeAllowance(_) => REVOKE_FEE_ALLOWANCE,
            FeegrantMsg::Allowances { .. } => QUERY_FEE_GRANTS,
            FeegrantMsg::Allowance { .. } => QUERY_FEE_GRANT,
            FeegrantMsg::AllowancesByGranter { .. } => FEE_GRANTS_BY_GRANTER,
        }
    }
}

#[derive(Debug)]
pub(crate) struct FeegrantModule;

fn resolve(msg_type: &str, payload: Option<&ModuleMsg>) -> Result<FeegrantMsg, Error> {
    if let Some(msg) = payload {
        return match msg {
            ModuleMsg::Feegrant(msg) => Ok(msg.clone()),
            other => Err(Error::InvalidRequest(format!(
                "payload for module {:?} routed to {MODULE_NAME}",
                other.module()
            ))),
        };
    }
    match msg_type {
        GRANT_FEE_ALLOWANCE | REVOKE_FEE_ALLOWANCE => {
            Err(Error::insufficient_params(msg_type, "msg"))
        }
        QUERY_FEE_GRANTS => Err(Error::insufficient_params(msg_type, "grantee")),
        QUERY_FEE_GRANT => Err(Error::insufficient_params(msg_type, "granter")),
        FEE_GRANTS_BY_GRANTER => Err(Error::insufficient_params(msg_type, "granter")),
        _ => Err(Error::invalid_msg_type(MODULE_NAME, msg_type)),
    }
}

/// LCD route for a query, or None when the operation is gRPC-only.
fn lcd_path(msg: &FeegrantMsg) -> Option<String> {
    match msg {
        FeegrantMsg::GrantAllowance(_) | FeegrantMsg::RevokeAllowance(_) => None,
        FeegrantMsg::Allowances { grantee } => {
            Some(format!("/cosmos/feegrant/v1beta1/allowances/{grantee}"))
        }
        FeegrantMsg::Allowance { granter, grantee } => Some(format!(
            "/cosmos/feegrant/v1beta1/allowance/{granter}/{grantee}"
        )),
        // AllowancesByGranter has no REST route on the chain's gateway.
        FeegrantMsg::AllowancesByGranter { .. } => None,
    }
}

#[async_trait]
impl ModuleAdapter for FeegrantModule {
    fn name(&self) -> &'static str {
        MODULE_NAME
    }

    fn msg_types(&self) -> &'static [&'static str] {
        &[
            GRANT_FEE_ALLOWANCE,
            REVOKE_FEE_ALLOWANCE,
            QUERY_FEE_GRANTS,
            QUERY_FEE_GRANT,
            FEE_GRANTS_BY_GRANTER,
        ]
    }

    fn build_tx(
        &self,
        builder: &mut TxBuilder,
        msg_type: &str,
        msg: Option<&ModuleMsg>,
    ) -> Result<(), Error> {
        match (msg_type, msg) {
            (GRANT_FEE_ALLOWANCE, Some(ModuleMsg::Feegrant(FeegrantMsg::GrantAllowance(grant)))) => {
                builder.add_message(grant.clone());
                Ok(())
            }
            (
                REVOKE_FEE_ALLOWANCE,
                Some(ModuleMsg::Feegrant(FeegrantMsg::RevokeAllowance(revoke))),
            ) => {
                builder.add_message(revoke.clone());
                Ok(())
            }
            (GRANT_FEE_ALLOWANCE | REVOKE_FEE_ALLOWANCE, None) => {
                Err(Error::insufficient_params(msg_type, "msg"))
            }
            _ => Err(Error::invalid_msg_type(MODULE_NAME, msg_type)),
        }
    }

    async fn run_query(&self, ctx: QueryContext<'_>) -> Result<String, Error> {
        let msg = resolve(ctx.msg_type, ctx.msg)?;
        match ctx.transport {
            Transport::Grpc => grpc_query(&ctx, &msg).await,
            Transport::Lcd => match lcd_path(&msg) {
                Some(path) => {
                    ctx.chain
                        .lcd_get(&path, &format!("{MODULE_NAME}/{}", msg.msg_type()))
                        .await
                }
                None => Err(ctx.not_supported(MODULE_NAME)),
            },
            Transport::Rpc | Transport::EvmRpc => Err(ctx.not_supported(MODULE_NAME)),
        }
    }
}

fn grants_json(grants: &[Grant]) -> Value {
    Value::Array(
        grants
            .iter()
            .map(|grant| {
                json!({
                    "granter": grant.granter,
                    "grantee": grant.grantee,
                    "allowance": grant.allowance.as_ref().map(any_json),
                })
            })
            .collect(),
    )
}

async fn grpc_query(ctx: &QueryContext<'_>, msg: &FeegrantMsg) -> Result<String, Error> {
    let mut client = QueryClient::new(ctx.chain.grpc_channel()?);
    let value: Value = match msg {
        FeegrantMsg::Allowances { grantee } => {
            let res = client
                .allowances(QueryAllowancesRequest {
                    grantee: grantee.clone(),
                    pagination: None,
                })
                .await
                .map_err(|s| ctx.grpc_err("cosmos.feegrant.v1beta1.Query/Allowances", s))?
                .into_inner();
            json!({ "allowances": grants_json(&res.allowances), "pagination": Value::Null })
        }
        FeegrantMsg::Allowance { granter, grantee } => {
            let res = client
                .allowance(QueryAllowanceRequest {
                    granter: granter.clone(),
                    grantee: grantee.clone(),
                })
                .await
                .map_err(|s| ctx.grpc_err("cosmos.feegrant.v1beta1.Query/Allowance", s))?
                .into_inner();
            match res.allowance {
                Some(grant) => json!({
                    "allowance": {
                        "granter": grant.granter,
                        "grantee": grant.grantee,
                        "allowance": grant.allowance.as_ref().map(any_json),
                    }
                }),
                None => json!({ "allowance": Value::Null }),
            }
        }
        FeegrantMsg::AllowancesByGranter { granter } => {
            let res = client
                .allowances_by_granter(QueryAllowancesByGranterRequest {
                    granter: granter.clone(),
                    pagination: None,
                })
                .await
                .map_err(|s| ctx.grpc_err("cosmos.feegrant.v1beta1.Query/AllowancesByGranter", s))?
                .into_inner();
            json!({ "allowances": grants_json(&res.allowances), "pagination": Value::Null })
        }
        FeegrantMsg::GrantAllowance(_) | FeegrantMsg::RevokeAllowance(_) => {
            return Err(Error::invalid_msg_type(MODULE_NAME, msg.msg_type()))
        }
    };
    marshal(&format!("{MODULE_NAME}/{}", msg.msg_type()), &value)
}

/// Pack a basic (spend-limit only) allowance into the `Any` that
/// [MsgGrantAllowance] carries.
pub fn basic_allowance(spend_limit: Vec<Coin>) -> cosmos_sdk_proto::Any {
    let allowance = BasicAllowance {
        spend_limit,
        expiration: None,
    };
    cosmos_sdk_proto::Any {
        type_url: "/cosmos.feegrant.v1beta1.BasicAllowance".to_owned(),
        value: allowance.encode_to_vec(),
    }
}

impl XplaClient {
    /// Grant a fee allowance from granter to grantee.
    pub fn feegrant_grant_allowance(
        &mut self,
        granter: impl Into<String>,
        grantee: impl Into<String>,
        allowance: cosmos_sdk_proto::Any,
    ) -> &mut Self {
        self.with_msg(ModuleMsg::Feegrant(FeegrantMsg::GrantAllowance(
            MsgGrantAllowance {
                granter: granter.into(),
                grantee: grantee.into(),
                allowance: Some(allowance),
            },
        )))
    }

    /// Revoke a previously granted fee allowance.
    pub fn feegrant_revoke_allowance(
        &mut self,
        granter: impl Into<String>,
        grantee: impl Into<String>,
    ) -> &mut Self {
        self.with_msg(ModuleMsg::Feegrant(FeegrantMsg::RevokeAllowance(
            MsgRevokeAllowance {
                granter: granter.into(),
                grantee: grantee.into(),
            },
        )))
    }

    /// Query all fee allowances granted to an account.
    pub fn feegrant_grants(&mut self, grantee: impl Into<String>) -> &mut Self {
        self.with_msg(ModuleMsg::Feegrant(FeegrantMsg::Allowances {
            grantee: grantee.into(),
        }))
    }

    /// Query one fee allowance by granter and grantee.
    pub fn feegrant_grant(
        &mut self,
        granter: impl Into<String>,
        grantee: impl Into<String>,
    ) -> &mut Self {
        self.with_msg(ModuleMsg::Feegrant(FeegrantMsg::Allowance {
            granter: granter.into(),
            grantee: grantee.into(),
        }))
    }

    /// Query all fee allowances issued by an account. Only served over gRPC.
    pub fn feegrant_grants_by_granter(&mut self, granter: impl Into<String>) -> &mut Self {
        self.with_msg(ModuleMsg::Feegrant(FeegrantMsg::AllowancesByGranter {
            granter: granter.into(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::XplaBuilder;

    #[test]
    fn lcd_paths() {
        assert_eq!(
            lcd_path(&FeegrantMsg::Allowances {
                grantee: "xpla1grantee".to_owned()
            })
            .unwrap(),
            "/cosmos/feegrant/v1beta1/allowances/xpla1grantee"
        );
        assert_eq!(
            lcd_path(&FeegrantMsg::Allowance {
                granter: "xpla1granter".to_owned(),
                grantee: "xpla1grantee".to_owned()
            })
            .unwrap(),
            "/cosmos/feegrant/v1beta1/allowance/xpla1granter/xpla1grantee"
        );
        assert!(lcd_path(&FeegrantMsg::AllowancesByGranter {
            granter: "xpla1granter".to_owned()
        })
        .is_none());
    }

    #[tokio::test]
    async fn by_granter_is_grpc_only() {
        let mut builder = XplaBuilder::new("cube_47-5");
        builder.set_lcd_url("http://localhost:1317");
        let chain = builder.build().unwrap();
        let mut client = XplaClient::new(chain);
        let err = client
            .feegrant_grants_by_granter("xpla1granter")
            .query()
            .await
            .unwrap_err();
        match err {
            Error::NotSupported { operation, .. } => {
                assert_eq!(operation, "feegrant/fee-grants-by-granter")
            }
            other => panic!("expected NotSupported, got {other:?}"),
        }
    }

    #[test]
    fn grant_routes_one_message() {
        let chain = XplaBuilder::new("cube_47-5").build().unwrap();
        let mut client = XplaClient::new(chain);
        let allowance = basic_allowance(vec![Coin {
            denom: "axpla".to_owned(),
            amount: "5000".to_owned(),
        }]);
        let builder = client
            .feegrant_grant_allowance("xpla1granter", "xpla1grantee", allowance)
            .create_tx()
            .unwrap();
        assert_eq!(builder.messages().len(), 1);
        assert_eq!(
            builder.messages()[0].type_url,
            "/cosmos.feegrant.v1beta1.MsgGrantAllowance"
        );
        let decoded = MsgGrantAllowance::decode(builder.messages()[0].value.as_slice()).unwrap();
        assert_eq!(decoded.granter, "xpla1granter");
        assert_eq!(
            decoded.allowance.unwrap().type_url,
            "/cosmos.feegrant.v1beta1.BasicAllowance"
        );
    }

    #[test]
    fn grants_without_grantee_is_insufficient_params() {
        let err = resolve(QUERY_FEE_GRANTS, None).unwrap_err();
        assert!(matches!(err, Error::InsufficientParams { .. }), "got {err:?}");
    }
}
