//! Error types exposed by this package.

use crate::registry::Transport;

/// Errors produced by the query dispatcher and transaction router.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The message type tag is not part of the selected module's vocabulary.
    #[error("Unknown message type {msg_type:?} for module {module:?}")]
    InvalidMsgType {
        module: String,
        msg_type: String,
    },
    /// The call shape itself is malformed, e.g. the wrong number of optional
    /// arguments, a module with no transaction surface, or a transport that
    /// cannot express the query.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    /// A required field is missing before the message can be built.
    #[error("Missing required parameter {field:?} for {msg_type:?}")]
    InsufficientParams {
        msg_type: String,
        field: &'static str,
    },
    /// The operation has no implementation on the selected transport.
    #[error("{operation} is not supported over {transport}")]
    NotSupported {
        operation: String,
        transport: Transport,
    },
    /// The network call itself failed, or returned a transport-level error.
    #[error("{transport} request failed during {action}: {source}")]
    Transport {
        transport: Transport,
        action: String,
        source: TransportError,
    },
    /// A payload field could not be converted to its wire representation.
    #[error("Unable to convert {field:?} during {action}: {message}")]
    Convert {
        action: String,
        field: &'static str,
        message: String,
    },
    /// The response could not be serialized for return to the caller.
    #[error("Unable to serialize response for {action}: {source}")]
    Marshal {
        action: String,
        source: serde_json::Error,
    },
}

impl Error {
    pub(crate) fn invalid_msg_type(module: &str, msg_type: &str) -> Error {
        Error::InvalidMsgType {
            module: module.to_owned(),
            msg_type: msg_type.to_owned(),
        }
    }

    pub(crate) fn insufficient_params(msg_type: &str, field: &'static str) -> Error {
        Error::InsufficientParams {
            msg_type: msg_type.to_owned(),
            field,
        }
    }

    pub(crate) fn not_supported(operation: impl Into<String>, transport: Transport) -> Error {
        Error::NotSupported {
            operation: operation.into(),
            transport,
        }
    }
}

/// The underlying cause of an [Error::Transport].
#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error(transparent)]
    Status(#[from] tonic::Status),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("endpoint returned HTTP {status}: {body}")]
    HttpStatus {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("JSON-RPC error {code}: {message}")]
    JsonRpc { code: i64, message: String },
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

/// Errors from establishing a connection.
#[derive(thiserror::Error, Debug)]
pub enum ConnectionError {
    #[error("Invalid gRPC endpoint {url:?}: {source}")]
    InvalidGrpcEndpoint {
        url: String,
        source: tonic::transport::Error,
    },
    #[error("Unable to configure TLS for {url:?}: {source}")]
    TlsConfig {
        url: String,
        source: tonic::transport::Error,
    },
    #[error("Unable to build HTTP client: {source}")]
    HttpClient { source: reqwest::Error },
}

/// Errors from parsing seed phrases and deriving keys.
#[derive(thiserror::Error, Debug)]
pub enum WalletError {
    #[error("Invalid seed phrase")]
    InvalidPhrase,
    #[error("Invalid derivation path {path:?}: {source}")]
    InvalidDerivationPath {
        path: String,
        source: bitcoin::util::bip32::Error,
    },
    #[error("Key derivation failed: {source}")]
    Derivation {
        source: bitcoin::util::bip32::Error,
    },
}
