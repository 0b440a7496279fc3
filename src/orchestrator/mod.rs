pub mod batch;

pub mod cosm_ops;

pub mod deploy;

pub mod error;

pub mod executor;

pub mod gas_profiler;

pub mod operation;

#[cfg(test)]
pub(crate) mod mock;

pub use crate::client::chain_res::{ChainResponse, ChainTxResponse, Event};
pub use crate::client::Code;
pub use crate::config::cfg::{Coin, FixedFee};
pub use crate::config::key::{Identity, Key, SigningKey};
