use config::ConfigError as _ConfigError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("batch concurrency_limit must be at least 1")]
    ConcurrencyLimit,

    #[error("gas_adjustment must be positive, got {value}")]
    GasAdjustment { value: f64 },

    #[error("Error parsing url")]
    UrlParse(#[from] tendermint_rpc::Error),

    #[error(transparent)]
    Config(#[from] _ConfigError),
}
