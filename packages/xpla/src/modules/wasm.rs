//! Wasm module: contract lifecycle transactions and state queries.

use base64::Engine;
use cosmos_sdk_proto::cosmos::base::v1beta1::Coin;
use cosmos_sdk_proto::cosmwasm::wasm::v1::{
    query_client::QueryClient, ContractCodeHistoryOperationType, MsgExecuteContract,
    MsgInstantiateContract, MsgMigrateContract, MsgUpdateAdmin, QueryCodeRequest,
    QueryContractHistoryRequest, QueryContractInfoRequest, QuerySmartContractStateRequest,
};
use serde_json::{json, Value};
use tonic::async_trait;

use crate::client::XplaClient;
use crate::error::Error;
use crate::msg::ModuleMsg;
use crate::registry::{marshal, ModuleAdapter, QueryContext, Transport};
use crate::txbuilder::{MsgStoreCodeHelper, TxBuilder};

pub const MODULE_NAME: &str = "wasm";

pub const STORE_CODE: &str = "store-code";
pub const INSTANTIATE_CONTRACT: &str = "instantiate-contract";
pub const EXECUTE_CONTRACT: &str = "execute-contract";
pub const MIGRATE_CONTRACT: &str = "migrate-contract";
pub const UPDATE_CONTRACT_ADMIN: &str = "update-contract-admin";
pub const QUERY_CONTRACT: &str = "query-contract";
pub const CONTRACT_INFO: &str = "contract-info";
pub const CONTRACT_HISTORY: &str = "contract-history";
pub const DOWNLOAD_CODE: &str = "download-code";

/// Operations of the wasm module.
#[derive(Clone, Debug)]
pub enum WasmMsg {
    /// Uncompressed byte code; compression happens when the message is
    /// attached to a transaction.
    StoreCode {
        sender: String,
        wasm_byte_code: Vec<u8>,
    },
    Instantiate(MsgInstantiateContract),
    Execute(MsgExecuteContract),
    Migrate(MsgMigrateContract),
    UpdateAdmin(MsgUpdateAdmin),
    /// Smart query with raw JSON query bytes.
    SmartQuery { address: String, query: Vec<u8> },
    ContractInfo { address: String },
    ContractHistory { address: String },
    DownloadCode { code_id: u64 },
}

impl WasmMsg {
    pub(crate) fn msg_type(&self) -> &'static str {
        match self {
            WasmMsg::StoreCode { .. } => STORE_CODE,
            WasmMsg::Instantiate(_) => INSTANTIATE_CONTRACT,
            WasmMsg::Execute(_) => EXECUTE_CONTRACT,
            WasmMsg::Migrate(_) => MIGRATE_CONTRACT,
            WasmMsg::UpdateAdmin(_) => UPDATE_CONTRACT_ADMIN,
            WasmMsg::SmartQuery { .. } => QUERY_CONTRACT,
            WasmMsg::ContractInfo { .. } => CONTRACT_INFO,
            WasmMsg::ContractHistory { .. } => CONTRACT_HISTORY,
            WasmMsg::DownloadCode { .. } => DOWNLOAD_CODE,
        }
    }
}

#[derive(Debug)]
pub(crate) struct WasmModule;

fn resolve(msg_type: &str, payload: Option<&ModuleMsg>) -> Result<WasmMsg, Error> {
    if let Some(msg) = payload {
        return match msg {
            ModuleMsg::Wasm(msg) => Ok(msg.clone()),
            other => Err(Error::InvalidRequest(format!(
                "payload for module {:?} routed to {MODULE_NAME}",
                other.module()
            ))),
        };
    }
    match msg_type {
        STORE_CODE | INSTANTIATE_CONTRACT | EXECUTE_CONTRACT | MIGRATE_CONTRACT
        | UPDATE_CONTRACT_ADMIN => Err(Error::insufficient_params(msg_type, "msg")),
        QUERY_CONTRACT => Err(Error::insufficient_params(msg_type, "address")),
        CONTRACT_INFO | CONTRACT_HISTORY => Err(Error::insufficient_params(msg_type, "address")),
        DOWNLOAD_CODE => Err(Error::insufficient_params(msg_type, "code_id")),
        _ => Err(Error::invalid_msg_type(MODULE_NAME, msg_type)),
    }
}

/// LCD route for a query, or None when the operation is gRPC-only.
fn lcd_path(msg: &WasmMsg) -> Option<String> {
    match msg {
        WasmMsg::StoreCode { .. }
        | WasmMsg::Instantiate(_)
        | WasmMsg::Execute(_)
        | WasmMsg::Migrate(_)
        | WasmMsg::UpdateAdmin(_) => None,
        WasmMsg::SmartQuery { address, query } => {
            let encoded = base64::engine::general_purpose::URL_SAFE.encode(query);
            Some(format!("/cosmwasm/wasm/v1/contract/{address}/smart/{encoded}"))
        }
        WasmMsg::ContractInfo { address } => Some(format!("/cosmwasm/wasm/v1/contract/{address}")),
        WasmMsg::ContractHistory { address } => {
            Some(format!("/cosmwasm/wasm/v1/contract/{address}/history"))
        }
        // Raw byte code is only served over gRPC.
        WasmMsg::DownloadCode { .. } => None,
    }
}

#[async_trait]
impl ModuleAdapter for WasmModule {
    fn name(&self) -> &'static str {
        MODULE_NAME
    }

    fn msg_types(&self) -> &'static [&'static str] {
        &[
            STORE_CODE,
            INSTANTIATE_CONTRACT,
            EXECUTE_CONTRACT,
            MIGRATE_CONTRACT,
            UPDATE_CONTRACT_ADMIN,
            QUERY_CONTRACT,
            CONTRACT_INFO,
            CONTRACT_HISTORY,
            DOWNLOAD_CODE,
        ]
    }

    fn build_tx(
        &self,
        builder: &mut TxBuilder,
        msg_type: &str,
        msg: Option<&ModuleMsg>,
    ) -> Result<(), Error> {
        match (msg_type, msg) {
            (
                STORE_CODE,
                Some(ModuleMsg::Wasm(WasmMsg::StoreCode {
                    sender,
                    wasm_byte_code,
                })),
            ) => {
                builder.add_message(MsgStoreCodeHelper {
                    sender: sender.clone(),
                    wasm_byte_code: wasm_byte_code.clone(),
                });
                Ok(())
            }
            (INSTANTIATE_CONTRACT, Some(ModuleMsg::Wasm(WasmMsg::Instantiate(m)))) => {
                builder.add_message(m.clone());
                Ok(())
            }
            (EXECUTE_CONTRACT, Some(ModuleMsg::Wasm(WasmMsg::Execute(m)))) => {
                builder.add_message(m.clone());
                Ok(())
            }
            (MIGRATE_CONTRACT, Some(ModuleMsg::Wasm(WasmMsg::Migrate(m)))) => {
                builder.add_message(m.clone());
                Ok(())
            }
            (UPDATE_CONTRACT_ADMIN, Some(ModuleMsg::Wasm(WasmMsg::UpdateAdmin(m)))) => {
                builder.add_message(m.clone());
                Ok(())
            }
            (
                STORE_CODE | INSTANTIATE_CONTRACT | EXECUTE_CONTRACT | MIGRATE_CONTRACT
                | UPDATE_CONTRACT_ADMIN,
                None,
            ) => Err(Error::insufficient_params(msg_type, "msg")),
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

async fn grpc_query(ctx: &QueryContext<'_>, msg: &WasmMsg) -> Result<String, Error> {
    let mut client = QueryClient::new(ctx.chain.grpc_channel()?);
    let action = format!("{MODULE_NAME}/{}", msg.msg_type());
    let value: Value = match msg {
        WasmMsg::SmartQuery { address, query } => {
            let res = client
                .smart_contract_state(QuerySmartContractStateRequest {
                    address: address.clone(),
                    query_data: query.clone(),
                })
                .await
                .map_err(|s| ctx.grpc_err("cosmwasm.wasm.v1.Query/SmartContractState", s))?
                .into_inner();
            // Contracts answer smart queries with JSON.
            let data: Value =
                serde_json::from_slice(&res.data).map_err(|e| Error::Convert {
                    action: action.clone(),
                    field: "data",
                    message: format!("contract returned invalid JSON: {e}"),
                })?;
            json!({ "data": data })
        }
        WasmMsg::ContractInfo { address } => {
            let res = client
                .contract_info(QueryContractInfoRequest {
                    address: address.clone(),
                })
                .await
                .map_err(|s| ctx.grpc_err("cosmwasm.wasm.v1.Query/ContractInfo", s))?
                .into_inner();
            json!({
                "address": res.address,
                "contract_info": res.contract_info.map(|info| json!({
                    "code_id": info.code_id.to_string(),
                    "creator": info.creator,
                    "admin": info.admin,
                    "label": info.label,
                    "ibc_port_id": info.ibc_port_id,
                })),
            })
        }
        WasmMsg::ContractHistory { address } => {
            let res = client
                .contract_history(QueryContractHistoryRequest {
                    address: address.clone(),
                    pagination: None,
                })
                .await
                .map_err(|s| ctx.grpc_err("cosmwasm.wasm.v1.Query/ContractHistory", s))?
                .into_inner();
            let entries: Vec<Value> = res
                .entries
                .iter()
                .map(|entry| {
                    let operation = ContractCodeHistoryOperationType::from_i32(entry.operation)
                        .unwrap_or(ContractCodeHistoryOperationType::Unspecified);
                    // Init and migrate messages are JSON; fall back to base64
                    // for anything else.
                    let msg: Value = serde_json::from_slice(&entry.msg).unwrap_or_else(|_| {
                        Value::String(
                            base64::engine::general_purpose::STANDARD.encode(&entry.msg),
                        )
                    });
                    json!({
                        "operation": operation.as_str_name(),
                        "code_id": entry.code_id.to_string(),
                        "msg": msg,
                    })
                })
                .collect();
            json!({ "entries": entries, "pagination": Value::Null })
        }
        WasmMsg::DownloadCode { code_id } => {
            let res = client
                .code(QueryCodeRequest { code_id: *code_id })
                .await
                .map_err(|s| ctx.grpc_err("cosmwasm.wasm.v1.Query/Code", s))?
                .into_inner();
            json!({
                "code_id": code_id.to_string(),
                "data": base64::engine::general_purpose::STANDARD.encode(res.data),
            })
        }
        _ => return Err(Error::invalid_msg_type(MODULE_NAME, msg.msg_type())),
    };
    marshal(&action, &value)
}

impl XplaClient {
    /// Store WASM byte code on chain. The code is gzip-compressed before it
    /// goes into the message.
    pub fn wasm_store_code(
        &mut self,
        sender: impl Into<String>,
        wasm_byte_code: Vec<u8>,
    ) -> &mut Self {
        self.with_msg(ModuleMsg::Wasm(WasmMsg::StoreCode {
            sender: sender.into(),
            wasm_byte_code,
        }))
    }

    /// Instantiate a contract from a stored code ID.
    #[allow(clippy::too_many_arguments)]
    pub fn wasm_instantiate(
        &mut self,
        sender: impl Into<String>,
        admin: impl Into<String>,
        code_id: u64,
        label: impl Into<String>,
        init_msg: Vec<u8>,
        funds: Vec<Coin>,
    ) -> &mut Self {
        self.with_msg(ModuleMsg::Wasm(WasmMsg::Instantiate(
            MsgInstantiateContract {
                sender: sender.into(),
                admin: admin.into(),
                code_id,
                label: label.into(),
                msg: init_msg,
                funds,
            },
        )))
    }

    /// Execute a contract with a JSON message and optional attached funds.
    pub fn wasm_execute(
        &mut self,
        sender: impl Into<String>,
        contract: impl Into<String>,
        msg: Vec<u8>,
        funds: Vec<Coin>,
    ) -> &mut Self {
        self.with_msg(ModuleMsg::Wasm(WasmMsg::Execute(MsgExecuteContract {
            sender: sender.into(),
            contract: contract.into(),
            msg,
            funds,
        })))
    }

    /// Migrate a contract to a new code ID.
    pub fn wasm_migrate(
        &mut self,
        sender: impl Into<String>,
        contract: impl Into<String>,
        code_id: u64,
        migrate_msg: Vec<u8>,
    ) -> &mut Self {
        self.with_msg(ModuleMsg::Wasm(WasmMsg::Migrate(MsgMigrateContract {
            sender: sender.into(),
            contract: contract.into(),
            code_id,
            msg: migrate_msg,
        })))
    }

    /// Change the admin of a contract.
    pub fn wasm_update_admin(
        &mut self,
        sender: impl Into<String>,
        contract: impl Into<String>,
        new_admin: impl Into<String>,
    ) -> &mut Self {
        self.with_msg(ModuleMsg::Wasm(WasmMsg::UpdateAdmin(MsgUpdateAdmin {
            sender: sender.into(),
            new_admin: new_admin.into(),
            contract: contract.into(),
        })))
    }

    /// Run a smart query against a contract with raw JSON query bytes.
    pub fn wasm_query(
        &mut self,
        address: impl Into<String>,
        query: impl Into<Vec<u8>>,
    ) -> &mut Self {
        self.with_msg(ModuleMsg::Wasm(WasmMsg::SmartQuery {
            address: address.into(),
            query: query.into(),
        }))
    }

    /// Query contract metadata.
    pub fn wasm_contract_info(&mut self, address: impl Into<String>) -> &mut Self {
        self.with_msg(ModuleMsg::Wasm(WasmMsg::ContractInfo {
            address: address.into(),
        }))
    }

    /// Query the code history of a contract.
    pub fn wasm_contract_history(&mut self, address: impl Into<String>) -> &mut Self {
        self.with_msg(ModuleMsg::Wasm(WasmMsg::ContractHistory {
            address: address.into(),
        }))
    }

    /// Download stored byte code by code ID. Only served over gRPC.
    pub fn wasm_download_code(&mut self, code_id: u64) -> &mut Self {
        self.with_msg(ModuleMsg::Wasm(WasmMsg::DownloadCode { code_id }))
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
            lcd_path(&WasmMsg::ContractInfo {
                address: "xpla1contract".to_owned()
            })
            .unwrap(),
            "/cosmwasm/wasm/v1/contract/xpla1contract"
        );
        let smart = lcd_path(&WasmMsg::SmartQuery {
            address: "xpla1contract".to_owned(),
            query: br#"{"config":{}}"#.to_vec(),
        })
        .unwrap();
        assert!(smart.starts_with("/cosmwasm/wasm/v1/contract/xpla1contract/smart/"));
        // URL-safe alphabet keeps the encoded query out of path semantics.
        assert!(!smart.contains('+'));
        assert!(lcd_path(&WasmMsg::DownloadCode { code_id: 7 }).is_none());
    }

    #[test]
    fn execute_routes_one_message() {
        let chain = XplaBuilder::new("cube_47-5").build().unwrap();
        let mut client = XplaClient::new(chain);
        let builder = client
            .wasm_execute(
                "xpla1sender",
                "xpla1contract",
                br#"{"increment":{}}"#.to_vec(),
                vec![],
            )
            .create_tx()
            .unwrap();
        assert_eq!(builder.messages().len(), 1);
        let any = &builder.messages()[0];
        assert_eq!(any.type_url, "/cosmwasm.wasm.v1.MsgExecuteContract");
        let decoded = MsgExecuteContract::decode(any.value.as_slice()).unwrap();
        assert_eq!(decoded.contract, "xpla1contract");
    }

    #[test]
    fn store_code_compresses_via_tx_router() {
        use cosmos_sdk_proto::cosmwasm::wasm::v1::MsgStoreCode;
        let chain = XplaBuilder::new("cube_47-5").build().unwrap();
        let mut client = XplaClient::new(chain);
        let builder = client
            .wasm_store_code("xpla1sender", b"\0asm fake module".to_vec())
            .create_tx()
            .unwrap();
        let stored = MsgStoreCode::decode(builder.messages()[0].value.as_slice()).unwrap();
        assert_eq!(&stored.wasm_byte_code[..2], &[0x1f, 0x8b]);
    }

    #[tokio::test]
    async fn download_code_is_grpc_only() {
        let mut builder = XplaBuilder::new("cube_47-5");
        builder.set_lcd_url("http://localhost:1317");
        let chain = builder.build().unwrap();
        let mut client = XplaClient::new(chain);
        let err = client.wasm_download_code(7).query().await.unwrap_err();
        assert!(matches!(err, Error::NotSupported { .. }), "got {err:?}");
    }

    #[test]
    fn query_without_address_is_insufficient_params() {
        let err = resolve(QUERY_CONTRACT, None).unwrap_err();
        assert!(matches!(err, Error::InsufficientParams { .. }), "got {err:?}");
    }
}
