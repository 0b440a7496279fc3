use config::Config as _Config;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use tendermint_rpc::error::ErrorDetail::UnsupportedScheme;
use tendermint_rpc::{Error, Url};

use super::error::ConfigError;
use super::key::{Identity, SigningKey};
use crate::client::error::ClientError;
use crate::orchestrator::operation::OperationKind;

/// Environment variables prefixed with this override values from the yaml file,
/// e.g. `COSM_OPS_CHAIN_CFG__RPC_ENDPOINT`.
pub const ENV_PREFIX: &str = "COSM_OPS";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    pub chain_cfg: ChainCfg,
    // json file holding code ids and contract addresses keyed by chain id
    #[serde(default)]
    pub artifact_path: Option<String>,
    #[serde(default)]
    pub batch: BatchCfg,
    // overall deadline applied to every chain operation
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub signers: Vec<SigningKey>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChainCfg {
    pub denom: String,
    pub prefix: String,
    pub chain_id: String,
    pub rpc_endpoint: String,
    pub gas_prices: f64,
    pub gas_adjustment: f64,
    #[serde(default)]
    pub fees: FeeTable,
}

/// Fixed fee in the chain's fee denom.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct FixedFee {
    pub amount: u64,
    pub gas_limit: u64,
}

/// Per operation fees. Operations without an entry get their fee
/// from a simulation of the transaction.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct FeeTable {
    #[serde(default)]
    pub upload: Option<FixedFee>,
    #[serde(default)]
    pub init: Option<FixedFee>,
    #[serde(default)]
    pub exec: Option<FixedFee>,
    #[serde(default)]
    pub migrate: Option<FixedFee>,
    #[serde(default)]
    pub send: Option<FixedFee>,
}

impl FeeTable {
    pub fn for_operation(&self, kind: OperationKind) -> Option<FixedFee> {
        match kind {
            OperationKind::Upload => self.upload,
            OperationKind::Instantiate => self.init,
            OperationKind::Execute => self.exec,
            OperationKind::Migrate => self.migrate,
            OperationKind::Send => self.send,
            OperationKind::Query => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct BatchCfg {
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: usize,
    #[serde(default)]
    pub per_item_delay_ms: u64,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_concurrency_limit() -> usize {
    3
}

fn default_retry_backoff_ms() -> u64 {
    10_000
}

impl Default for BatchCfg {
    fn default() -> Self {
        Self {
            concurrency_limit: default_concurrency_limit(),
            per_item_delay_ms: 0,
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Coin {
    pub denom: String,
    pub amount: u64,
}

impl Coin {
    pub fn new<S: Into<String>>(amount: u64, denom: S) -> Self {
        Self {
            denom: denom.into(),
            amount,
        }
    }
}

impl TryFrom<Coin> for cosmrs::Coin {
    type Error = ClientError;

    fn try_from(coin: Coin) -> Result<cosmrs::Coin, ClientError> {
        Ok(cosmrs::Coin {
            denom: coin
                .denom
                .parse()
                .map_err(|_| ClientError::Denom { name: coin.denom })?,
            amount: coin.amount.into(),
        })
    }
}

impl Config {
    /// Loads the yaml config `file`, applying `COSM_OPS_*` environment overrides.
    pub fn from_yaml(file: &str) -> Result<Config, ConfigError> {
        let settings = _Config::builder()
            .add_source(config::File::with_name(file))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let mut cfg = settings.try_deserialize::<Config>()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if self.batch.concurrency_limit == 0 {
            return Err(ConfigError::ConcurrencyLimit);
        }
        if self.chain_cfg.gas_adjustment <= 0.0 {
            return Err(ConfigError::GasAdjustment {
                value: self.chain_cfg.gas_adjustment,
            });
        }
        self.chain_cfg.rpc_endpoint = parse_url(&self.chain_cfg.rpc_endpoint)?;
        Ok(())
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Derives every configured signer for the chain's address prefix.
    pub fn identities(&self) -> Result<Vec<Identity>, ClientError> {
        self.signers
            .iter()
            .map(|s| s.to_identity(&self.chain_cfg.prefix))
            .collect()
    }
}

// Attempt to parse the configured url to ensure that it is valid.
// If url is missing the Scheme then default to https.
pub(crate) fn parse_url(url: &str) -> Result<String, Error> {
    let u = Url::from_str(url);

    if let Err(Error(UnsupportedScheme(detail), report)) = u {
        if !url.contains("://") {
            return Ok(format!("https://{}", url));
        }

        return Err(Error(UnsupportedScheme(detail), report));
    }

    Ok(u?.to_string())
}
