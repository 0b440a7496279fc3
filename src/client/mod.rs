pub mod chain;

pub mod chain_res;

pub(crate) mod cosmos;

pub mod cosmwasm;

pub mod error;

pub use cosmrs::tendermint::abci::Code;
