//! Mint module: inflation parameters and provisions. Query-only.

use cosmos_sdk_proto::cosmos::mint::v1beta1::{
    query_client::QueryClient, QueryAnnualProvisionsRequest, QueryInflationRequest,
    QueryParamsRequest,
};
use serde_json::{json, Value};
use tonic::async_trait;

use crate::client::XplaClient;
use crate::error::Error;
use crate::msg::ModuleMsg;
use crate::registry::{marshal, ModuleAdapter, QueryContext, Transport};
use crate::txbuilder::TxBuilder;

pub const MODULE_NAME: &str = "mint";

pub const MINT_QUERY_PARAMS: &str = "mint-query-params";
pub const MINT_INFLATION: &str = "mint-inflation";
pub const MINT_ANNUAL_PROVISIONS: &str = "mint-annual-provisions";

/// Operations of the mint module.
#[derive(Clone, Debug)]
pub enum MintMsg {
    Params,
    Inflation,
    AnnualProvisions,
}

impl MintMsg {
    pub(crate) fn msg_type(&self) -> &'static str {
        match self {
            MintMsg::Params => MINT_QUERY_PARAMS,
            MintMsg::Inflation => MINT_INFLATION,
            MintMsg::AnnualProvisions => MINT_ANNUAL_PROVISIONS,
        }
    }
}

#[derive(Debug)]
pub(crate) struct MintModule;

fn resolve(msg_type: &str, payload: Option<&ModuleMsg>) -> Result<MintMsg, Error> {
    if let Some(msg) = payload {
        return match msg {
            ModuleMsg::Mint(msg) => Ok(msg.clone()),
            other => Err(Error::InvalidRequest(format!(
                "payload for module {:?} routed to {MODULE_NAME}",
                other.module()
            ))),
        };
    }
    match msg_type {
        MINT_QUERY_PARAMS => Ok(MintMsg::Params),
        MINT_INFLATION => Ok(MintMsg::Inflation),
        MINT_ANNUAL_PROVISIONS => Ok(MintMsg::AnnualProvisions),
        _ => Err(Error::invalid_msg_type(MODULE_NAME, msg_type)),
    }
}

fn lcd_path(msg: &MintMsg) -> String {
    match msg {
        MintMsg::Params => "/cosmos/mint/v1beta1/params".to_owned(),
        MintMsg::Inflation => "/cosmos/mint/v1beta1/inflation".to_owned(),
        MintMsg::AnnualProvisions => "/cosmos/mint/v1beta1/annual_provisions".to_owned(),
    }
}

#[async_trait]
impl ModuleAdapter for MintModule {
    fn name(&self) -> &'static str {
        MODULE_NAME
    }

    fn msg_types(&self) -> &'static [&'static str] {
        &[MINT_QUERY_PARAMS, MINT_INFLATION, MINT_ANNUAL_PROVISIONS]
    }

    fn build_tx(
        &self,
        _builder: &mut TxBuilder,
        _msg_type: &str,
        _msg: Option<&ModuleMsg>,
    ) -> Result<(), Error> {
        Err(Error::InvalidRequest(
            "module mint has no transaction messages".to_owned(),
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

/// Render an sdk.Dec's raw integer digits (scaled by 10^18) the way the REST
/// gateway renders it, e.g. `70000000000000000` -> `0.070000000000000000`.
fn format_dec(raw: &str) -> String {
    let (sign, digits) = match raw.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", raw),
    };
    let digits = digits.trim_start_matches('0');
    let padded = format!("{digits:0>19}");
    let (int, frac) = padded.split_at(padded.len() - 18);
    format!("{sign}{int}.{frac}")
}

fn format_dec_bytes(raw: &[u8]) -> String {
    format_dec(String::from_utf8_lossy(raw).as_ref())
}

async fn grpc_query(ctx: &QueryContext<'_>, msg: &MintMsg) -> Result<String, Error> {
    let mut client = QueryClient::new(ctx.chain.grpc_channel()?);
    let value: Value = match msg {
        MintMsg::Params => {
            let res = client
                .params(QueryParamsRequest {})
                .await
                .map_err(|s| ctx.grpc_err("cosmos.mint.v1beta1.Query/Params", s))?
                .into_inner();
            match res.params {
                Some(params) => params_json(&params),
                None => json!({ "params": Value::Null }),
            }
        }
        MintMsg::Inflation => {
            let res = client
                .inflation(QueryInflationRequest {})
                .await
                .map_err(|s| ctx.grpc_err("cosmos.mint.v1beta1.Query/Inflation", s))?
                .into_inner();
            json!({ "inflation": format_dec_bytes(&res.inflation) })
        }
        MintMsg::AnnualProvisions => {
            let res = client
                .annual_provisions(QueryAnnualProvisionsRequest {})
                .await
                .map_err(|s| ctx.grpc_err("cosmos.mint.v1beta1.Query/AnnualProvisions", s))?
                .into_inner();
            json!({ "annual_provisions": format_dec_bytes(&res.annual_provisions) })
        }
    };
    marshal(&format!("{MODULE_NAME}/{}", msg.msg_type()), &value)
}

fn params_json(params: &cosmos_sdk_proto::cosmos::mint::v1beta1::Params) -> Value {
    json!({
        "params": {
            "mint_denom": params.mint_denom,
            "inflation_rate_change": format_dec(&params.inflation_rate_change),
            "inflation_max": format_dec(&params.inflation_max),
            "inflation_min": format_dec(&params.inflation_min),
            "goal_bonded": format_dec(&params.goal_bonded),
            "blocks_per_year": params.blocks_per_year.to_string(),
        }
    })
}

impl XplaClient {
    /// Query the mint module parameters.
    pub fn mint_params(&mut self) -> &mut Self {
        self.with_msg(ModuleMsg::Mint(MintMsg::Params))
    }

    /// Query the current inflation rate.
    pub fn mint_inflation(&mut self) -> &mut Self {
        self.with_msg(ModuleMsg::Mint(MintMsg::Inflation))
    }

    /// Query the current annual provisions.
    pub fn mint_annual_provisions(&mut self) -> &mut Self {
        self.with_msg(ModuleMsg::Mint(MintMsg::AnnualProvisions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosmos_sdk_proto::cosmos::mint::v1beta1::Params;

    #[test]
    fn dec_rendering() {
        assert_eq!(format_dec("70000000000000000"), "0.070000000000000000");
        assert_eq!(format_dec("130000000000000000"), "0.130000000000000000");
        assert_eq!(format_dec("1000000000000000000"), "1.000000000000000000");
        assert_eq!(format_dec(""), "0.000000000000000000");
        assert_eq!(format_dec("-500000000000000000"), "-0.500000000000000000");
    }

    #[test]
    fn params_shape() {
        let value = params_json(&Params {
            mint_denom: "axpla".to_owned(),
            inflation_rate_change: "130000000000000000".to_owned(),
            inflation_max: "200000000000000000".to_owned(),
            inflation_min: "70000000000000000".to_owned(),
            goal_bonded: "670000000000000000".to_owned(),
            blocks_per_year: 6_311_520,
        });
        assert_eq!(value["params"]["mint_denom"], "axpla");
        assert_eq!(value["params"]["inflation_min"], "0.070000000000000000");
        assert_eq!(value["params"]["blocks_per_year"], "6311520");
    }

    #[test]
    fn lcd_paths() {
        assert_eq!(lcd_path(&MintMsg::Inflation), "/cosmos/mint/v1beta1/inflation");
        assert_eq!(
            lcd_path(&MintMsg::AnnualProvisions),
            "/cosmos/mint/v1beta1/annual_provisions"
        );
    }

    #[test]
    fn unknown_tag() {
        let err = resolve("mint-query-bogus", None).unwrap_err();
        assert!(matches!(err, Error::InvalidMsgType { .. }), "got {err:?}");
    }
}
