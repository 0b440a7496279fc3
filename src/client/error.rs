use cosmrs::rpc::error::ErrorDetail;
use cosmrs::ErrorReport;
use prost::{DecodeError, EncodeError};
use std::time::Duration;
use thiserror::Error;

use super::chain_res::ChainResponse;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("malformed rpc url")]
    InvalidURL { source: tendermint_rpc::Error },

    #[error("endpoint unreachable: {endpoint}: {reason}")]
    EndpointUnreachable { endpoint: String, reason: String },

    #[error("timed out connecting to {endpoint} after {after:?}")]
    ConnectTimeout { endpoint: String, after: Duration },

    #[error("chain id mismatch: configured {expected:?}, endpoint reports {actual:?}")]
    ChainIdMismatch { expected: String, actual: String },

    #[error("identity prefix {actual:?} does not match chain prefix {expected:?}")]
    PrefixMismatch { expected: String, actual: String },

    #[error("client was connected without a signing identity")]
    ReadOnly,

    #[error("invalid account ID: {id:?}")]
    AccountId { id: String },

    #[error("invalid address prefix: {prefix:?}")]
    AccountPrefix { prefix: String },

    #[error("invalid contract or recipient address: {addr:?}")]
    Address { addr: String },

    #[error("cryptographic error")]
    Crypto { source: ErrorReport },

    #[error("invalid denomination: {name:?}")]
    Denom { name: String },

    #[error("invalid chainId: {chain_id:?}")]
    ChainId { chain_id: String },

    #[error("invalid seed phrase")]
    InvalidSeedPhrase,

    #[error("seed phrase environment variable not set: {var:?}")]
    MissingSeedEnv { var: String },

    #[error("invalid derivation path")]
    DerivationPath,

    #[error("invalid abci query path: {path:?}")]
    QueryPath { path: String },

    #[error("tx response is missing the {attribute:?} attribute")]
    MissingAttribute { attribute: String },

    #[error("simulation returned no gas info")]
    MissingGasInfo,

    #[error("proto encoding error")]
    ProtoEncoding { source: ErrorReport },

    #[error("proto decoding error")]
    ProtoDecoding { source: ErrorReport },

    #[error("CosmosSDK error: {}", res.log)]
    CosmosSdk { res: ChainResponse },

    #[error(transparent)]
    RPC(tendermint_rpc::Error),
}

#[derive(Error, Debug)]
pub enum DeserializeError {
    #[error("Raw chain response is empty")]
    EmptyResponse,

    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

impl ClientError {
    pub fn crypto(e: ErrorReport) -> ClientError {
        ClientError::Crypto { source: e }
    }

    pub fn proto_encoding(e: ErrorReport) -> ClientError {
        ClientError::ProtoEncoding { source: e }
    }

    pub fn prost_proto_en(e: EncodeError) -> ClientError {
        ClientError::ProtoEncoding { source: e.into() }
    }

    pub fn prost_proto_de(e: DecodeError) -> ClientError {
        ClientError::ProtoDecoding { source: e.into() }
    }

    /// Classifies an rpc error raised while talking to `endpoint`.
    ///
    /// Errors the node itself answered with are kept as `RPC`, everything
    /// else (connect, transport, timeouts) is `EndpointUnreachable`.
    pub fn rpc(endpoint: &str, e: tendermint_rpc::Error) -> ClientError {
        match e.detail() {
            ErrorDetail::Response(_) | ErrorDetail::Serde(_) => ClientError::RPC(e),
            _ => ClientError::EndpointUnreachable {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            },
        }
    }

    /// Transient errors are worth one resubmission, chain rejections never are.
    pub fn is_transient(&self) -> bool {
        matches!(self, ClientError::EndpointUnreachable { .. })
    }

    /// Raw chain log of a rejected tx or query.
    pub fn chain_log(&self) -> Option<&str> {
        match self {
            ClientError::CosmosSdk { res } => Some(&res.log),
            _ => None,
        }
    }
}
