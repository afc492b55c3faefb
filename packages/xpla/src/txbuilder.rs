//! Transaction builder and the message wrappers that feed it.

use std::fmt::Display;
use std::io::Write;

use cosmos_sdk_proto::cosmos::bank::v1beta1::MsgSend;
use cosmos_sdk_proto::cosmos::base::v1beta1::Coin;
use cosmos_sdk_proto::cosmos::feegrant::v1beta1::{MsgGrantAllowance, MsgRevokeAllowance};
use cosmos_sdk_proto::cosmos::tx::v1beta1::{
    mode_info, AuthInfo, Fee, ModeInfo, SignDoc, SignerInfo, Tx, TxBody,
};
use cosmos_sdk_proto::cosmwasm::wasm::v1::{
    MsgExecuteContract, MsgInstantiateContract, MsgMigrateContract, MsgStoreCode, MsgUpdateAdmin,
};
use flate2::{write::GzEncoder, Compression};
use prost::Message;

use crate::chain::Xpla;
use crate::error::Error;
use crate::wallet::Wallet;

/// Transaction builder
///
/// Accumulates messages before signing. The transaction router attaches
/// exactly one message per routed call; composing more is the caller's job.
#[derive(Default, Clone, Debug)]
pub struct TxBuilder {
    messages: Vec<cosmos_sdk_proto::Any>,
    memo: Option<String>,
}

impl TxBuilder {
    /// Add a message to this transaction.
    pub fn add_message(&mut self, msg: impl Into<TxMessage>) -> &mut Self {
        self.messages.push(msg.into().msg);
        self
    }

    /// Set the memo field.
    pub fn set_memo(&mut self, memo: impl Into<String>) -> &mut Self {
        self.memo = Some(memo.into());
        self
    }

    /// Either set or clear the memo field.
    pub fn set_optional_memo(&mut self, memo: impl Into<Option<String>>) -> &mut Self {
        self.memo = memo.into();
        self
    }

    /// Messages attached so far.
    pub fn messages(&self) -> &[cosmos_sdk_proto::Any] {
        &self.messages
    }

    /// Make a [TxBody] for this builder
    pub fn make_tx_body(&self) -> TxBody {
        TxBody {
            messages: self.messages.clone(),
            memo: self.memo.as_deref().unwrap_or_default().to_owned(),
            timeout_height: 0,
            extension_options: vec![],
            non_critical_extension_options: vec![],
        }
    }

    /// Sign this transaction and return the raw bytes ready for broadcast.
    ///
    /// Looks up the account number and sequence over gRPC; fee amount is
    /// gas limit times the configured gas price.
    pub async fn sign(&self, chain: &Xpla, wallet: &Wallet) -> Result<Vec<u8>, Error> {
        let account = chain.get_base_account(wallet.address()).await?;
        let builder = chain.get_builder();

        let gas_limit = builder.gas_limit();
        let fee_amount = (gas_limit as f64 * builder.gas_price()) as u128;

        let auth_info = AuthInfo {
            signer_infos: vec![SignerInfo {
                public_key: Some(cosmos_sdk_proto::Any {
                    type_url: "/ethermint.crypto.v1.ethsecp256k1.PubKey".to_owned(),
                    value: cosmos_sdk_proto::cosmos::crypto::secp256k1::PubKey {
                        key: wallet.public_key_bytes().to_owned(),
                    }
                    .encode_to_vec(),
                }),
                mode_info: Some(ModeInfo {
                    sum: Some(mode_info::Sum::Single(mode_info::Single { mode: 1 })),
                }),
                sequence: account.sequence,
            }],
            fee: Some(Fee {
                amount: vec![Coin {
                    denom: builder.gas_coin().to_owned(),
                    amount: fee_amount.to_string(),
                }],
                gas_limit,
                payer: "".to_owned(),
                granter: "".to_owned(),
            }),
            tip: None,
        };

        let sign_doc = SignDoc {
            body_bytes: self.make_tx_body().encode_to_vec(),
            auth_info_bytes: auth_info.encode_to_vec(),
            chain_id: chain.chain_id().to_owned(),
            account_number: account.account_number,
        };
        let signature = wallet.sign_bytes(&sign_doc.encode_to_vec());

        let tx = Tx {
            body: Some(self.make_tx_body()),
            auth_info: Some(auth_info),
            signatures: vec![signature.serialize_compact().to_vec()],
        };
        Ok(tx.encode_to_vec())
    }
}

impl Display for TxBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        for (idx, msg) in self.messages.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{}: {}", idx, msg.type_url)?;
        }
        Ok(())
    }
}

/// A message to include in a transaction, with a human description for
/// diagnostics.
pub struct TxMessage {
    msg: cosmos_sdk_proto::Any,
    description: String,
}

impl TxMessage {
    /// Build from the raw protobuf pieces.
    pub fn new(type_url: impl Into<String>, value: Vec<u8>, description: impl Into<String>) -> Self {
        TxMessage {
            msg: cosmos_sdk_proto::Any {
                type_url: type_url.into(),
                value,
            },
            description: description.into(),
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn into_protobuf(self) -> cosmos_sdk_proto::Any {
        self.msg
    }
}

impl From<MsgSend> for TxMessage {
    fn from(msg: MsgSend) -> Self {
        TxMessage::new(
            "/cosmos.bank.v1beta1.MsgSend",
            msg.encode_to_vec(),
            format!(
                "{} sending {} to {}",
                msg.from_address,
                PrettyCoins(msg.amount.as_slice()),
                msg.to_address,
            ),
        )
    }
}

impl From<MsgGrantAllowance> for TxMessage {
    fn from(msg: MsgGrantAllowance) -> Self {
        TxMessage::new(
            "/cosmos.feegrant.v1beta1.MsgGrantAllowance",
            msg.encode_to_vec(),
            format!("{} granting a fee allowance to {}", msg.granter, msg.grantee),
        )
    }
}

impl From<MsgRevokeAllowance> for TxMessage {
    fn from(msg: MsgRevokeAllowance) -> Self {
        TxMessage::new(
            "/cosmos.feegrant.v1beta1.MsgRevokeAllowance",
            msg.encode_to_vec(),
            format!(
                "{} revoking the fee allowance of {}",
                msg.granter, msg.grantee
            ),
        )
    }
}

impl From<MsgInstantiateContract> for TxMessage {
    fn from(msg: MsgInstantiateContract) -> Self {
        TxMessage::new(
            "/cosmwasm.wasm.v1.MsgInstantiateContract",
            msg.encode_to_vec(),
            format!(
                "{} instantiating code ID {} with label {}",
                msg.sender, msg.code_id, msg.label,
            ),
        )
    }
}

impl From<MsgExecuteContract> for TxMessage {
    fn from(msg: MsgExecuteContract) -> Self {
        TxMessage::new(
            "/cosmwasm.wasm.v1.MsgExecuteContract",
            msg.encode_to_vec(),
            format!("{} executing contract {}", msg.sender, msg.contract),
        )
    }
}

impl From<MsgMigrateContract> for TxMessage {
    fn from(msg: MsgMigrateContract) -> Self {
        TxMessage::new(
            "/cosmwasm.wasm.v1.MsgMigrateContract",
            msg.encode_to_vec(),
            format!(
                "{} migrating contract {} to code ID {}",
                msg.sender, msg.contract, msg.code_id,
            ),
        )
    }
}

impl From<MsgUpdateAdmin> for TxMessage {
    fn from(msg: MsgUpdateAdmin) -> Self {
        TxMessage::new(
            "/cosmwasm.wasm.v1.MsgUpdateAdmin",
            msg.encode_to_vec(),
            format!(
                "{} updating admin on {} to {}",
                msg.sender, msg.contract, msg.new_admin
            ),
        )
    }
}

/// A helper for [MsgStoreCode] that gzip-compresses the byte code.
pub struct MsgStoreCodeHelper {
    /// See [MsgStoreCode::sender]
    pub sender: String,
    /// Uncompressed WASM byte code
    pub wasm_byte_code: Vec<u8>,
}

impl From<MsgStoreCodeHelper> for TxMessage {
    fn from(
        MsgStoreCodeHelper {
            sender,
            wasm_byte_code,
        }: MsgStoreCodeHelper,
    ) -> Self {
        // Same compression settings cosmjs uses when storing code.
        let mut e = GzEncoder::new(Vec::new(), Compression::new(9));
        e.write_all(&wasm_byte_code).unwrap();
        let output = e.finish().unwrap();
        TxMessage::new(
            "/cosmwasm.wasm.v1.MsgStoreCode",
            MsgStoreCode {
                sender: sender.clone(),
                wasm_byte_code: output,
                instantiate_permission: None,
            }
            .encode_to_vec(),
            format!("{sender} storing WASM code"),
        )
    }
}

struct PrettyCoins<'a>(&'a [Coin]);
impl Display for PrettyCoins<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        for (idx, Coin { denom, amount }) in self.0.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{amount}{denom}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tx_body_carries_messages_and_memo() {
        let mut builder = TxBuilder::default();
        builder.add_message(MsgSend {
            from_address: "xpla1sender".to_owned(),
            to_address: "xpla1dest".to_owned(),
            amount: vec![Coin {
                denom: "axpla".to_owned(),
                amount: "1000".to_owned(),
            }],
        });
        builder.set_memo("hello");
        let body = builder.make_tx_body();
        assert_eq!(body.messages.len(), 1);
        assert_eq!(body.messages[0].type_url, "/cosmos.bank.v1beta1.MsgSend");
        assert_eq!(body.memo, "hello");
    }

    #[test]
    fn store_code_is_gzipped() {
        let msg: TxMessage = MsgStoreCodeHelper {
            sender: "xpla1sender".to_owned(),
            wasm_byte_code: b"\0asm fake module".to_vec(),
        }
        .into();
        let any = msg.into_protobuf();
        let stored = MsgStoreCode::decode(any.value.as_slice()).unwrap();
        assert_eq!(&stored.wasm_byte_code[..2], &[0x1f, 0x8b]);
    }
}
