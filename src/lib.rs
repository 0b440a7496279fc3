//! Scripted Cosmwasm contract operations
//!
//! Upload, instantiate, execute, query and migrate [Cosmwasm] smart contracts against a configured [Cosmos] based chain,
//! and fan a single operation out over many signing identities in bounded concurrent windows.
//! Code ids and contract addresses are recorded per chain id in a json artifact file.
//!
//! Potential uses:
//! * Deployments / Bootstrapping environments
//! * Load testing with many wallets
//! * Gas profiling
//!
//! [cosmwasm]: https://github.com/CosmWasm/cosmwasm
//! [Cosmos]: https://github.com/cosmos/cosmos-sdk
//!
//!
//! # Quick Start
//!
//! ```ignore
//! use cosm_ops::config::cfg::{Coin, Config};
//! use cosm_ops::orchestrator::cosm_ops::CosmOps;
//! use cosm_ops::orchestrator::operation::OperationRequest;
//! use serde_json::json;
//!
//! let cfg = Config::from_yaml("config.yaml")?;
//! let identities = cfg.identities()?;
//! let deployer = &identities[0];
//!
//! let mut ops = CosmOps::new(cfg, Some(deployer), true).await?;
//!
//! // uploads and instantiates only what the artifact file doesn't know about yet
//! ops.deploy("counter", "artifacts/counter.wasm", &json!({"count": 0}), deployer, None)
//!     .await?;
//!
//! // every wallet increments the counter, three at a time
//! let addr = ops.contract_map.address("counter")?;
//! let job = ops.batch_job(identities[1..].to_vec())?;
//! let incr = OperationRequest::execute(addr, &json!({"increment": {}}), vec![])?;
//! let results = ops.run_batch(&job, &incr).await;
//!
//! let res = ops.query("counter", &json!({"get_count": {}})).await?;
//! ```

pub mod client;

pub mod config;

pub mod orchestrator;
