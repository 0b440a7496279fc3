use async_trait::async_trait;

use super::chain_res::{ChainResponse, ChainTxResponse};
use super::error::ClientError;
use crate::config::cfg::{ChainCfg, Coin, FixedFee};
use crate::config::key::Identity;

/// Chain agnostic transaction message.
///
/// Connectors translate these into whatever envelope their chain expects.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TxMsg {
    StoreCode {
        wasm_byte_code: Vec<u8>,
    },
    Instantiate {
        code_id: u64,
        msg: Vec<u8>,
        label: String,
        admin: Option<String>,
        funds: Vec<Coin>,
    },
    Execute {
        contract: String,
        msg: Vec<u8>,
        funds: Vec<Coin>,
    },
    Migrate {
        contract: String,
        code_id: u64,
        msg: Vec<u8>,
    },
    Send {
        to_address: String,
        amount: Vec<Coin>,
    },
}

/// Connection to a single chain endpoint.
///
/// Implementations must serialize broadcasts signed by the same identity,
/// since every tx consumes the account sequence the next one depends on.
#[async_trait]
pub trait ChainClient: Send + Sync {
    fn chain_cfg(&self) -> &ChainCfg;

    /// Signs `msg` with `signer` and waits for it to be committed.
    /// A `None` fee is estimated by simulation.
    async fn broadcast(
        &self,
        signer: &Identity,
        msg: TxMsg,
        fee: Option<FixedFee>,
    ) -> Result<ChainTxResponse, ClientError>;

    /// Smart query against `address`, returning the raw json response.
    async fn query_smart(
        &self,
        address: &str,
        payload: Vec<u8>,
    ) -> Result<ChainResponse, ClientError>;

    async fn latest_height(&self) -> Result<u64, ClientError>;
}
