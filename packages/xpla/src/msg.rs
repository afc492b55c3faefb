//! The typed payload attached to a request.
//!
//! Dispatch is always module-then-type, so the payload is a sum type keyed
//! the same way: the outer enum selects the module, each inner enum selects
//! the operation. This makes the adapter-side payload check a compile-time
//! guarantee rather than a runtime type assertion.

use crate::modules::bank::BankMsg;
use crate::modules::base::BaseMsg;
use crate::modules::evm::EvmMsg;
use crate::modules::feegrant::FeegrantMsg;
use crate::modules::mint::MintMsg;
use crate::modules::params::ParamsMsg;
use crate::modules::upgrade::UpgradeMsg;
use crate::modules::wasm::WasmMsg;

/// A fully typed (module, operation, payload) triple.
#[derive(Clone, Debug)]
pub enum ModuleMsg {
    Bank(BankMsg),
    Base(BaseMsg),
    Evm(EvmMsg),
    Feegrant(FeegrantMsg),
    Mint(MintMsg),
    Params(ParamsMsg),
    Upgrade(UpgradeMsg),
    Wasm(WasmMsg),
}

impl ModuleMsg {
    /// The module this payload belongs to.
    pub fn module(&self) -> &'static str {
        match self {
            ModuleMsg::Bank(_) => crate::modules::bank::MODULE_NAME,
            ModuleMsg::Base(_) => crate::modules::base::MODULE_NAME,
            ModuleMsg::Evm(_) => crate::modules::evm::MODULE_NAME,
            ModuleMsg::Feegrant(_) => crate::modules::feegrant::MODULE_NAME,
            ModuleMsg::Mint(_) => crate::modules::mint::MODULE_NAME,
            ModuleMsg::Params(_) => crate::modules::params::MODULE_NAME,
            ModuleMsg::Upgrade(_) => crate::modules::upgrade::MODULE_NAME,
            ModuleMsg::Wasm(_) => crate::modules::wasm::MODULE_NAME,
        }
    }

    /// The message type tag this payload answers to.
    pub fn msg_type(&self) -> &'static str {
        match self {
            ModuleMsg::Bank(msg) => msg.msg_type(),
            ModuleMsg::Base(msg) => msg.msg_type(),
            ModuleMsg::Evm(msg) => msg.msg_type(),
            ModuleMsg::Feegrant(msg) => msg.msg_type(),
            ModuleMsg::Mint(msg) => msg.msg_type(),
            ModuleMsg::Params(msg) => msg.msg_type(),
            ModuleMsg::Upgrade(msg) => msg.msg_type(),
            ModuleMsg::Wasm(msg) => msg.msg_type(),
        }
    }
}
