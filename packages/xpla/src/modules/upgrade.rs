//! Upgrade module: chain upgrade plans and module versions. Query-only.

use cosmos_sdk_proto::cosmos::upgrade::v1beta1::{
    query_client::QueryClient, Plan, QueryAppliedPlanRequest, QueryCurrentPlanRequest,
    QueryModuleVersionsRequest,
};
use serde_json::{json, Value};
use tonic::async_trait;

use crate::client::XplaClient;
use crate::error::Error;
use crate::msg::ModuleMsg;
use crate::registry::{marshal, ModuleAdapter, QueryContext, Transport};
use crate::txbuilder::TxBuilder;

pub const MODULE_NAME: &str = "upgrade";

pub const UPGRADE_PLAN: &str = "upgrade-plan";
pub const UPGRADE_APPLIED: &str = "upgrade-applied";
pub const UPGRADE_MODULE_VERSIONS: &str = "upgrade-module-versions";

/// Operations of the upgrade module.
#[derive(Clone, Debug)]
pub enum UpgradeMsg {
    CurrentPlan,
    AppliedPlan { name: String },
    ModuleVersions { module_name: Option<String> },
}

impl UpgradeMsg {
    pub(crate) fn msg_type(&self) -> &'static str {
        match self {
            UpgradeMsg::CurrentPlan => UPGRADE_PLAN,
            UpgradeMsg::AppliedPlan { .. } => UPGRADE_APPLIED,
            UpgradeMsg::ModuleVersions { .. } => UPGRADE_MODULE_VERSIONS,
        }
    }
}

#[derive(Debug)]
pub(crate) struct UpgradeModule;

fn resolve(msg_type: &str, payload: Option<&ModuleMsg>) -> Result<UpgradeMsg, Error> {
    if let Some(msg) = payload {
        return match msg {
            ModuleMsg::Upgrade(msg) => Ok(msg.clone()),
            other => Err(Error::InvalidRequest(format!(
                "payload for module {:?} routed to {MODULE_NAME}",
                other.module()
            ))),
        };
    }
    match msg_type {
        UPGRADE_PLAN => Ok(UpgradeMsg::CurrentPlan),
        UPGRADE_APPLIED => Err(Error::insufficient_params(msg_type, "name")),
        UPGRADE_MODULE_VERSIONS => Ok(UpgradeMsg::ModuleVersions { module_name: None }),
        _ => Err(Error::invalid_msg_type(MODULE_NAME, msg_type)),
    }
}

fn lcd_path(msg: &UpgradeMsg) -> String {
    match msg {
        UpgradeMsg::CurrentPlan => "/cosmos/upgrade/v1beta1/current_plan".to_owned(),
        UpgradeMsg::AppliedPlan { name } => {
            format!("/cosmos/upgrade/v1beta1/applied_plan/{name}")
        }
        UpgradeMsg::ModuleVersions { module_name } => match module_name {
            Some(name) => format!("/cosmos/upgrade/v1beta1/module_versions?module_name={name}"),
            None => "/cosmos/upgrade/v1beta1/module_versions".to_owned(),
        },
    }
}

#[async_trait]
impl ModuleAdapter for UpgradeModule {
    fn name(&self) -> &'static str {
        MODULE_NAME
    }

    fn msg_types(&self) -> &'static [&'static str] {
        &[UPGRADE_PLAN, UPGRADE_APPLIED, UPGRADE_MODULE_VERSIONS]
    }

    fn build_tx(
        &self,
        _builder: &mut TxBuilder,
        _msg_type: &str,
        _msg: Option<&ModuleMsg>,
    ) -> Result<(), Error> {
        Err(Error::InvalidRequest(
            "module upgrade has no transaction messages".to_owned(),
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

fn plan_json(plan: &Plan) -> Value {
    json!({
        "name": plan.name,
        "height": plan.height.to_string(),
        "info": plan.info,
    })
}

async fn grpc_query(ctx: &QueryContext<'_>, msg: &UpgradeMsg) -> Result<String, Error> {
    let mut client = QueryClient::new(ctx.chain.grpc_channel()?);
    let value: Value = match msg {
        UpgradeMsg::CurrentPlan => {
            let res = client
                .current_plan(QueryCurrentPlanRequest {})
                .await
                .map_err(|s| ctx.grpc_err("cosmos.upgrade.v1beta1.Query/CurrentPlan", s))?
                .into_inner();
            json!({ "plan": res.plan.as_ref().map(plan_json) })
        }
        UpgradeMsg::AppliedPlan { name } => {
            let res = client
                .applied_plan(QueryAppliedPlanRequest { name: name.clone() })
                .await
                .map_err(|s| ctx.grpc_err("cosmos.upgrade.v1beta1.Query/AppliedPlan", s))?
                .into_inner();
            json!({ "height": res.height.to_string() })
        }
        UpgradeMsg::ModuleVersions { module_name } => {
            let res = client
                .module_versions(QueryModuleVersionsRequest {
                    module_name: module_name.clone().unwrap_or_default(),
                })
                .await
                .map_err(|s| ctx.grpc_err("cosmos.upgrade.v1beta1.Query/ModuleVersions", s))?
                .into_inner();
            json!({
                "module_versions": res
                    .module_versions
                    .iter()
                    .map(|mv| json!({ "name": mv.name, "version": mv.version.to_string() }))
                    .collect::<Vec<_>>(),
            })
        }
    };
    marshal(&format!("{MODULE_NAME}/{}", msg.msg_type()), &value)
}

impl XplaClient {
    /// Query the currently scheduled upgrade plan, if any.
    pub fn upgrade_plan(&mut self) -> &mut Self {
        self.with_msg(ModuleMsg::Upgrade(UpgradeMsg::CurrentPlan))
    }

    /// Query the height at which a named upgrade was applied.
    pub fn upgrade_applied(&mut self, name: impl Into<String>) -> &mut Self {
        self.with_msg(ModuleMsg::Upgrade(UpgradeMsg::AppliedPlan {
            name: name.into(),
        }))
    }

    /// Query consensus module versions, optionally filtered to one module.
    pub fn upgrade_module_versions(&mut self, module_name: Option<String>) -> &mut Self {
        self.with_msg(ModuleMsg::Upgrade(UpgradeMsg::ModuleVersions { module_name }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lcd_paths() {
        assert_eq!(
            lcd_path(&UpgradeMsg::CurrentPlan),
            "/cosmos/upgrade/v1beta1/current_plan"
        );
        assert_eq!(
            lcd_path(&UpgradeMsg::AppliedPlan {
                name: "v1.5".to_owned()
            }),
            "/cosmos/upgrade/v1beta1/applied_plan/v1.5"
        );
        assert_eq!(
            lcd_path(&UpgradeMsg::ModuleVersions {
                module_name: Some("bank".to_owned())
            }),
            "/cosmos/upgrade/v1beta1/module_versions?module_name=bank"
        );
    }

    #[test]
    fn plan_shape() {
        #[allow(deprecated)]
        let plan = Plan {
            name: "v1.5".to_owned(),
            time: None,
            height: 1_000_000,
            info: "{}".to_owned(),
            upgraded_client_state: None,
        };
        let value = plan_json(&plan);
        assert_eq!(value["name"], "v1.5");
        assert_eq!(value["height"], "1000000");
    }

    #[test]
    fn applied_without_name_is_insufficient_params() {
        let err = resolve(UPGRADE_APPLIED, None).unwrap_err();
        assert!(matches!(err, Error::InsufficientParams { .. }), "got {err:?}");
    }
}
