//! Bank module: coin transfers and balance queries.

use cosmos_sdk_proto::cosmos::bank::v1beta1::{
    query_client::QueryClient, MsgSend, QueryAllBalancesRequest, QueryBalanceRequest,
    QueryTotalSupplyRequest,
};
use cosmos_sdk_proto::cosmos::base::v1beta1::Coin;
use serde_json::{json, Value};
use tonic::async_trait;

use crate::client::XplaClient;
use crate::error::Error;
use crate::msg::ModuleMsg;
use crate::registry::{marshal, ModuleAdapter, QueryContext, Transport};
use crate::txbuilder::TxBuilder;

use super::coins_json;

pub const MODULE_NAME: &str = "bank";

pub const BANK_SEND: &str = "bank-send";
pub const QUERY_BANK_BALANCES: &str = "query-bank-balances";
pub const BANK_BALANCE: &str = "bank-balance";
pub const BANK_TOTAL_SUPPLY: &str = "bank-total-supply";

/// Operations of the bank module.
#[derive(Clone, Debug)]
pub enum BankMsg {
    Send(MsgSend),
    AllBalances { address: String },
    Balance { address: String, denom: String },
    TotalSupply,
}

impl BankMsg {
    pub(crate) fn msg_type(&self) -> &'static str {
        match self {
            BankMsg::Send(_) => BANK_SEND,
            BankMsg::AllBalances { .. } => QUERY_BANK_BALANCES,
            BankMsg::Balance { .. } => BANK_BALANCE,
            BankMsg::TotalSupply => BANK_TOTAL_SUPPLY,
        }
    }
}

#[derive(Debug)]
pub(crate) struct BankModule;

fn resolve(msg_type: &str, payload: Option<&ModuleMsg>) -> Result<BankMsg, Error> {
    if let Some(msg) = payload {
        return match msg {
            ModuleMsg::Bank(msg) => Ok(msg.clone()),
            other => Err(Error::InvalidRequest(format!(
                "payload for module {:?} routed to {MODULE_NAME}",
                other.module()
            ))),
        };
    }
    match msg_type {
        BANK_TOTAL_SUPPLY => Ok(BankMsg::TotalSupply),
        QUERY_BANK_BALANCES => Err(Error::insufficient_params(msg_type, "address")),
        BANK_BALANCE => Err(Error::insufficient_params(msg_type, "address")),
        _ => Err(Error::invalid_msg_type(MODULE_NAME, msg_type)),
    }
}

/// LCD route for a query, or None when the operation is gRPC-only.
fn lcd_path(msg: &BankMsg) -> Option<String> {
    match msg {
        BankMsg::Send(_) => None,
        BankMsg::AllBalances { address } => {
            Some(format!("/cosmos/bank/v1beta1/balances/{address}"))
        }
        BankMsg::Balance { address, denom } => Some(format!(
            "/cosmos/bank/v1beta1/balances/{address}/by_denom?denom={denom}"
        )),
        BankMsg::TotalSupply => Some("/cosmos/bank/v1beta1/supply".to_owned()),
    }
}

#[async_trait]
impl ModuleAdapter for BankModule {
    fn name(&self) -> &'static str {
        MODULE_NAME
    }

    fn msg_types(&self) -> &'static [&'static str] {
        &[BANK_SEND, QUERY_BANK_BALANCES, BANK_BALANCE, BANK_TOTAL_SUPPLY]
    }

    fn build_tx(
        &self,
        builder: &mut TxBuilder,
        msg_type: &str,
        msg: Option<&ModuleMsg>,
    ) -> Result<(), Error> {
        match (msg_type, msg) {
            (BANK_SEND, Some(ModuleMsg::Bank(BankMsg::Send(send)))) => {
                builder.add_message(send.clone());
                Ok(())
            }
            (BANK_SEND, None) => Err(Error::insufficient_params(BANK_SEND, "msg")),
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

async fn grpc_query(ctx: &QueryContext<'_>, msg: &BankMsg) -> Result<String, Error> {
    let mut client = QueryClient::new(ctx.chain.grpc_channel()?);
    let value: Value = match msg {
        BankMsg::AllBalances { address } => {
            let res = client
                .all_balances(QueryAllBalancesRequest {
                    address: address.clone(),
                    pagination: None,
                })
                .await
                .map_err(|s| ctx.grpc_err("cosmos.bank.v1beta1.Query/AllBalances", s))?
                .into_inner();
            json!({ "balances": coins_json(&res.balances), "pagination": Value::Null })
        }
        BankMsg::Balance { address, denom } => {
            let res = client
                .balance(QueryBalanceRequest {
                    address: address.clone(),
                    denom: denom.clone(),
                })
                .await
                .map_err(|s| ctx.grpc_err("cosmos.bank.v1beta1.Query/Balance", s))?
                .into_inner();
            match res.balance {
                Some(Coin { denom, amount }) => {
                    json!({ "balance": { "denom": denom, "amount": amount } })
                }
                None => json!({ "balance": Value::Null }),
            }
        }
        BankMsg::TotalSupply => {
            let res = client
                .total_supply(QueryTotalSupplyRequest { pagination: None })
                .await
                .map_err(|s| ctx.grpc_err("cosmos.bank.v1beta1.Query/TotalSupply", s))?
                .into_inner();
            json!({ "supply": coins_json(&res.supply), "pagination": Value::Null })
        }
        BankMsg::Send(_) => return Err(Error::invalid_msg_type(MODULE_NAME, BANK_SEND)),
    };
    marshal(&format!("{MODULE_NAME}/{}", msg.msg_type()), &value)
}

impl XplaClient {
    /// Send coins from one account to another.
    pub fn bank_send(
        &mut self,
        from: impl Into<String>,
        to: impl Into<String>,
        amount: Vec<Coin>,
    ) -> &mut Self {
        self.with_msg(ModuleMsg::Bank(BankMsg::Send(MsgSend {
            from_address: from.into(),
            to_address: to.into(),
            amount,
        })))
    }

    /// Query all coin balances of an account.
    pub fn bank_balances(&mut self, address: impl Into<String>) -> &mut Self {
        self.with_msg(ModuleMsg::Bank(BankMsg::AllBalances {
            address: address.into(),
        }))
    }

    /// Query one denom's balance of an account.
    pub fn bank_balance(
        &mut self,
        address: impl Into<String>,
        denom: impl Into<String>,
    ) -> &mut Self {
        self.with_msg(ModuleMsg::Bank(BankMsg::Balance {
            address: address.into(),
            denom: denom.into(),
        }))
    }

    /// Query the total supply of all denoms.
    pub fn bank_total_supply(&mut self) -> &mut Self {
        self.with_msg(ModuleMsg::Bank(BankMsg::TotalSupply))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::XplaBuilder;
    use prost::Message;

    #[test]
    fn lcd_paths() {
        assert_eq!(
            lcd_path(&BankMsg::AllBalances {
                address: "xpla1abc".to_owned()
            })
            .unwrap(),
            "/cosmos/bank/v1beta1/balances/xpla1abc"
        );
        assert_eq!(
            lcd_path(&BankMsg::Balance {
                address: "xpla1abc".to_owned(),
                denom: "axpla".to_owned()
            })
            .unwrap(),
            "/cosmos/bank/v1beta1/balances/xpla1abc/by_denom?denom=axpla"
        );
        assert_eq!(
            lcd_path(&BankMsg::TotalSupply).unwrap(),
            "/cosmos/bank/v1beta1/supply"
        );
    }

    #[test]
    fn send_routes_one_message() {
        let chain = XplaBuilder::new("cube_47-5").build().unwrap();
        let mut client = XplaClient::new(chain);
        let builder = client
            .bank_send(
                "xpla1from",
                "xpla1to",
                vec![Coin {
                    denom: "axpla".to_owned(),
                    amount: "1000".to_owned(),
                }],
            )
            .create_tx()
            .unwrap();
        assert_eq!(builder.messages().len(), 1);
        let any = &builder.messages()[0];
        assert_eq!(any.type_url, "/cosmos.bank.v1beta1.MsgSend");
        let decoded = MsgSend::decode(any.value.as_slice()).unwrap();
        assert_eq!(decoded.from_address, "xpla1from");
        assert_eq!(decoded.amount[0].amount, "1000");
    }

    #[test]
    fn balances_without_address_is_insufficient_params() {
        let err = resolve(QUERY_BANK_BALANCES, None).unwrap_err();
        assert!(matches!(err, Error::InsufficientParams { .. }), "got {err:?}");
    }
}
