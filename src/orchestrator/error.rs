use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use super::operation::OperationKind;
use crate::client::error::{ClientError, DeserializeError};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("error reading wasm_dir")]
    WasmDirRead { source: std::io::Error },

    #[error("wasm contract file name was not valid utf8 or malformed")]
    InvalidWasmFileName,

    #[error(transparent)]
    Operation(#[from] OpError),
}

impl StoreError {
    pub fn wasmdir(e: std::io::Error) -> StoreError {
        StoreError::WasmDirRead { source: e }
    }
}

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("contract artifact not found: {path:?}")]
    ArtifactNotFound {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("error reading contract artifact: {path:?}")]
    ArtifactRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("upload rejected: {log}")]
    UploadRejected { log: String },

    #[error("instantiate rejected: {log}")]
    InstantiateRejected { log: String },

    #[error("execute rejected: {log}")]
    ExecuteRejected { log: String },

    #[error("query rejected: {log}")]
    QueryRejected { log: String },

    #[error("migrate rejected: {log}")]
    MigrateRejected { log: String },

    #[error("send rejected: {log}")]
    SendRejected { log: String },

    #[error("insufficient funds: {log}")]
    InsufficientFunds { log: String },

    #[error("{operation} is not a transaction")]
    NotATransaction { operation: OperationKind },

    #[error("operation timed out after {after:?}")]
    OperationTimeout { after: Duration },

    #[error("serde json serialization error")]
    JsonSerialize { source: serde_json::Error },

    #[error("invalid query response")]
    JsonDeserialize { source: DeserializeError },

    #[error(transparent)]
    ContractMapError(#[from] ContractMapError),

    #[error(transparent)]
    ArtifactError(#[from] ArtifactError),

    #[error(transparent)]
    ClientError(#[from] ClientError),
}

impl ProcessError {
    pub fn json(e: serde_json::Error) -> ProcessError {
        ProcessError::JsonSerialize { source: e }
    }

    /// Maps a chain rejection to the rejection variant of `kind`, keeping the
    /// raw chain log. Non rejection errors pass through unchanged.
    pub fn from_client(kind: OperationKind, e: ClientError) -> ProcessError {
        let log = match e.chain_log().map(str::to_string) {
            Some(log) => log,
            None => return ProcessError::ClientError(e),
        };

        if log.contains("insufficient funds") {
            return ProcessError::InsufficientFunds { log };
        }

        match kind {
            OperationKind::Upload => ProcessError::UploadRejected { log },
            OperationKind::Instantiate => ProcessError::InstantiateRejected { log },
            OperationKind::Execute => ProcessError::ExecuteRejected { log },
            OperationKind::Query => ProcessError::QueryRejected { log },
            OperationKind::Migrate => ProcessError::MigrateRejected { log },
            OperationKind::Send => ProcessError::SendRejected { log },
        }
    }
}

/// A failed operation, attributed to the identity that issued it.
#[derive(Error, Debug)]
#[error("{operation} by {identity} failed: {source}")]
pub struct OpError {
    pub identity: String,
    pub operation: OperationKind,
    pub source: ProcessError,
}

impl OpError {
    pub fn new<I: ToString, E: Into<ProcessError>>(
        identity: I,
        operation: OperationKind,
        source: E,
    ) -> Self {
        Self {
            identity: identity.to_string(),
            operation,
            source: source.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("batch concurrency_limit must be at least 1")]
    ConcurrencyLimit,

    #[error("batch item {index} failed: {source}")]
    Operation { index: usize, source: OpError },

    #[error("batch window {window} failed twice, {identity} marked failed")]
    WindowFailed { window: usize, identity: String },
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ContractMapError {
    #[error("smart contract not stored on chain: {name:?}")]
    NotStored { name: String },

    #[error("smart contract with addr not initialized on chain: {name:?}")]
    NotDeployed { name: String },
}

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("existing artifact file is not valid json: {path:?}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("error reading artifact file: {path:?}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("error serializing deployment artifacts")]
    Serialize { source: serde_json::Error },

    #[error("error writing artifact file: {path:?}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum PollBlockError {
    #[error("timed out waiting for blocks")]
    Timeout(#[from] tokio::time::error::Elapsed),

    #[error(transparent)]
    ClientError(#[from] ClientError),
}
