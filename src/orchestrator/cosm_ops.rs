use log::{debug, info};
use serde::Serialize;
use std::env::consts::ARCH;
use std::ffi::OsStr;
use std::fmt::{self, Debug};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::batch::{self, BatchJob};
use super::deploy::{ArtifactStore, ContractMap};
use super::error::{BatchError, OpError, PollBlockError, ProcessError, StoreError};
use super::executor::{self, READ_ONLY};
use super::gas_profiler::{GasProfiler, Report};
use super::operation::{OperationKind, OperationRequest, OperationResult};
use crate::client::chain::ChainClient;
use crate::client::cosmwasm::CosmWasmClient;
use crate::client::error::ClientError;
use crate::config::cfg::{BatchCfg, Coin, Config};
use crate::config::key::Identity;

/// Stores cosmwasm contracts and runs their operations against the configured chain.
///
/// Code ids and addresses are tracked by contract name in `contract_map` and,
/// when an artifact path is configured, persisted after every upload,
/// instantiate and migrate.
pub struct CosmOps<C = CosmWasmClient> {
    pub contract_map: ContractMap,
    client: C,
    artifacts: Option<ArtifactStore>,
    gas_profiler: Option<GasProfiler>,
    timeout: Option<Duration>,
    batch_cfg: BatchCfg,
}

impl<C> Debug for CosmOps<C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self.contract_map)
    }
}

impl CosmOps<CosmWasmClient> {
    /// Connects to the chain in `cfg`, optionally using a gas profiler.
    ///
    /// `signer` is only used to check the chain's address prefix; without one
    /// the connection can only query. A silent endpoint fails with
    /// `ProcessError::OperationTimeout` once the configured timeout elapses.
    pub async fn new(
        cfg: Config,
        signer: Option<&Identity>,
        use_gas_profiler: bool,
    ) -> Result<Self, ProcessError> {
        let client = CosmWasmClient::connect(cfg.chain_cfg.clone(), signer, cfg.timeout())
            .await
            .map_err(|e| match e {
                ClientError::ConnectTimeout { after, .. } => ProcessError::OperationTimeout { after },
                e => ProcessError::ClientError(e),
            })?;
        Ok(Self::with_client(client, &cfg, use_gas_profiler))
    }
}

impl<C: ChainClient> CosmOps<C> {
    pub fn with_client(client: C, cfg: &Config, use_gas_profiler: bool) -> Self {
        let artifacts = cfg.artifact_path.as_ref().map(ArtifactStore::new);
        let contract_map = artifacts
            .as_ref()
            .map(|a| a.read(&client.chain_cfg().chain_id))
            .unwrap_or_default();

        Self {
            contract_map,
            client,
            artifacts,
            gas_profiler: use_gas_profiler.then(GasProfiler::new),
            timeout: cfg.timeout(),
            batch_cfg: cfg.batch.clone(),
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Reloads `contract_map` from the artifact file, if one is configured.
    pub fn refresh(&mut self) {
        if let Some(store) = &self.artifacts {
            self.contract_map = store.read(&self.client.chain_cfg().chain_id);
        }
    }

    /// Writes `contract_map` to the artifact file, if one is configured.
    pub fn save(&self) -> Result<(), ProcessError> {
        if let Some(store) = &self.artifacts {
            store.write(&self.client.chain_cfg().chain_id, &self.contract_map)?;
        }
        Ok(())
    }

    /// Uploads the optimized contracts in `wasm_dir` to the configured chain
    /// saving the resulting contract ids in `contract_map`.
    ///
    /// NOTE: The name of the wasm files in `wasm_dir` will be used as the
    /// `contract_name` parameter to `instantiate()`, `query()` and `execute()`.
    pub async fn store_contracts(
        &mut self,
        wasm_dir: &str,
        identity: &Identity,
    ) -> Result<Vec<OperationResult>, StoreError> {
        let mut responses = vec![];

        for wasm in fs::read_dir(Path::new(wasm_dir)).map_err(StoreError::wasmdir)? {
            let wasm_path = wasm.map_err(StoreError::wasmdir)?.path();
            if wasm_path.extension() != Some(OsStr::new("wasm")) {
                continue;
            }

            let mut contract = wasm_path
                .file_stem()
                .and_then(OsStr::to_str)
                .ok_or(StoreError::InvalidWasmFileName)?;

            // parse out OS architecture if optimizoor was used:
            let arch_suffix = format!("-{}", ARCH);
            if contract.ends_with(&arch_suffix) {
                contract = contract.trim_end_matches(&arch_suffix);
            }

            let res = self
                .store_contract(contract.to_string(), &wasm_path, identity)
                .await?;
            responses.push(res);
        }

        Ok(responses)
    }

    /// Uploads a single wasm file and records its code id under `contract_name`.
    pub async fn store_contract<S: Into<String>, P: AsRef<Path>>(
        &mut self,
        contract_name: S,
        wasm_path: P,
        identity: &Identity,
    ) -> Result<OperationResult, OpError> {
        let contract_name = contract_name.into();
        let res = self.upload(&contract_name, wasm_path.as_ref(), identity).await?;

        if let Some(code_id) = res.code_id {
            self.contract_map.register_contract(&contract_name, code_id);
        }
        self.persist(identity, OperationKind::Upload)?;

        Ok(res)
    }

    /// Initializes a smart contract against the configured chain.
    ///
    /// # Arguments
    /// * `contract_name` - Stored smart contract name for the corresponding `msg`.
    /// * `op_name` - Human readable operation name for profiling bookkeeping usage.
    /// * `msg` - InstantiateMsg that `contract_name` supports.
    /// * `identity` - Identity used to sign the tx.
    /// * `admin` - Optional admin address for contract migration.
    /// * `funds` - Optional tokens transferred to the contract after instantiation.
    ///
    /// # Errors
    /// * If `contract_name` has not been stored through [Self::store_contracts()]
    ///   or recorded in the artifact file `ContractMapError::NotStored` is returned.
    pub async fn instantiate<S, T>(
        &mut self,
        contract_name: S,
        op_name: &str,
        msg: &T,
        identity: &Identity,
        admin: Option<String>,
        funds: Vec<Coin>,
    ) -> Result<OperationResult, OpError>
    where
        S: Into<String>,
        T: Serialize,
    {
        let contract_name = contract_name.into();
        let kind = OperationKind::Instantiate;
        let fail = |e: ProcessError| OpError::new(identity, kind, e);

        let code_id = self.contract_map.code_id(&contract_name).map_err(|e| fail(e.into()))?;
        let request = OperationRequest::instantiate(code_id, msg, &contract_name, admin, funds)
            .map_err(fail)?;

        let res = self.run(identity, &request).await?;

        if let Some(addr) = &res.contract_address {
            self.contract_map.add_address(&contract_name, addr);
        }
        self.persist(identity, kind)?;
        self.profile(contract_name, op_name, kind, &res);

        Ok(res)
    }

    /// Executes a smart contract operation against the configured chain.
    ///
    /// # Errors
    /// * If `contract_name` has not been instantiated via [Self::instantiate()]
    ///   `ContractMapError::NotDeployed` is returned.
    pub async fn execute<S, T>(
        &mut self,
        contract_name: S,
        op_name: &str,
        msg: &T,
        identity: &Identity,
        funds: Vec<Coin>,
    ) -> Result<OperationResult, OpError>
    where
        S: Into<String>,
        T: Serialize,
    {
        let contract_name = contract_name.into();
        let kind = OperationKind::Execute;
        let fail = |e: ProcessError| OpError::new(identity, kind, e);

        let addr = self.contract_map.address(&contract_name).map_err(|e| fail(e.into()))?;
        let request = OperationRequest::execute(addr, msg, funds).map_err(fail)?;

        let res = self.run(identity, &request).await?;
        self.profile(contract_name, op_name, kind, &res);

        Ok(res)
    }

    /// Queries a deployed smart contract. Needs no signer.
    pub async fn query<S, T>(&self, contract_name: S, msg: &T) -> Result<OperationResult, OpError>
    where
        S: Into<String>,
        T: Serialize,
    {
        let contract_name = contract_name.into();
        let fail = |e: ProcessError| OpError::new(READ_ONLY, OperationKind::Query, e);

        let addr = self.contract_map.address(&contract_name).map_err(|e| fail(e.into()))?;
        let msg = serde_json::to_value(msg).map_err(|e| fail(ProcessError::json(e)))?;

        executor::query(&self.client, &addr, &msg, self.timeout).await
    }

    /// Migrates the contract deployed at `contract_name` to `new_code_id`.
    ///
    /// `identity` must be the contract's admin.
    pub async fn migrate<S, T>(
        &mut self,
        contract_name: S,
        new_code_id: u64,
        op_name: &str,
        msg: &T,
        identity: &Identity,
    ) -> Result<OperationResult, OpError>
    where
        S: Into<String>,
        T: Serialize,
    {
        let contract_name = contract_name.into();
        let kind = OperationKind::Migrate;
        let fail = |e: ProcessError| OpError::new(identity, kind, e);

        let addr = self.contract_map.address(&contract_name).map_err(|e| fail(e.into()))?;
        let request = OperationRequest::migrate(addr, new_code_id, msg).map_err(fail)?;

        let res = self.run(identity, &request).await?;

        self.contract_map.register_contract(&contract_name, new_code_id);
        self.persist(identity, kind)?;
        self.profile(contract_name, op_name, kind, &res);

        Ok(res)
    }

    /// Transfers native tokens from `identity` to `to_address`.
    pub async fn send<S: Into<String>>(
        &self,
        to_address: S,
        amount: Vec<Coin>,
        identity: &Identity,
    ) -> Result<OperationResult, OpError> {
        self.run(identity, &OperationRequest::send(to_address, amount))
            .await
    }

    /// Uploads and instantiates `contract_name` unless the artifact record
    /// already has its code id or address. Returns the contract address.
    pub async fn deploy<S, P, T>(
        &mut self,
        contract_name: S,
        wasm_path: P,
        init_msg: &T,
        identity: &Identity,
        admin: Option<String>,
    ) -> Result<String, OpError>
    where
        S: Into<String>,
        P: AsRef<Path>,
        T: Serialize,
    {
        let contract_name = contract_name.into();
        self.refresh();

        if self.contract_map.code_id(&contract_name).is_err() {
            self.store_contract(&contract_name, wasm_path, identity)
                .await?;
        } else {
            info!("{} already stored, skipping upload", contract_name);
        }

        if let Ok(addr) = self.contract_map.address(&contract_name) {
            info!("{} already deployed at {}", contract_name, addr);
            return Ok(addr);
        }

        let res = self
            .instantiate(&contract_name, "deploy", init_msg, identity, admin, vec![])
            .await?;

        res.contract_address.ok_or_else(|| {
            OpError::new(
                identity,
                OperationKind::Instantiate,
                ClientError::MissingAttribute {
                    attribute: "_contract_address".to_string(),
                },
            )
        })
    }

    /// Uploads new code for `contract_name` and migrates the recorded
    /// contract to it. The record only moves to the new code id once the
    /// migration succeeds.
    pub async fn upgrade<S, P, T>(
        &mut self,
        contract_name: S,
        wasm_path: P,
        migrate_msg: &T,
        identity: &Identity,
    ) -> Result<OperationResult, OpError>
    where
        S: Into<String>,
        P: AsRef<Path>,
        T: Serialize,
    {
        let contract_name = contract_name.into();

        let uploaded = self
            .upload(&contract_name, wasm_path.as_ref(), identity)
            .await?;
        let new_code_id = uploaded.code_id.ok_or_else(|| {
            OpError::new(
                identity,
                OperationKind::Upload,
                ClientError::MissingAttribute {
                    attribute: "code_id".to_string(),
                },
            )
        })?;

        self.migrate(&contract_name, new_code_id, "upgrade", migrate_msg, identity)
            .await
    }

    /// Batch job over `identities` with the configured window settings.
    pub fn batch_job(&self, identities: Vec<Identity>) -> Result<BatchJob, BatchError> {
        BatchJob::from_cfg(identities, &self.batch_cfg)
    }

    /// Runs `request` once per identity of `job`. Results follow the job's
    /// identity order.
    pub async fn run_batch(
        &self,
        job: &BatchJob,
        request: &OperationRequest,
    ) -> Vec<Result<OperationResult, BatchError>> {
        batch::run_batch_request(&self.client, job, request, None, self.timeout).await
    }

    /// Sends `amount` from `funder` to each of `recipients`, one after another.
    pub async fn fund(
        &self,
        funder: &Identity,
        recipients: &[Identity],
        amount: Vec<Coin>,
    ) -> Result<Vec<OperationResult>, OpError> {
        let mut responses = Vec::with_capacity(recipients.len());
        for recipient in recipients {
            responses.push(self.send(recipient.address(), amount.clone(), funder).await?);
        }
        Ok(responses)
    }

    /// Waits until `n` blocks have been produced.
    /// Returns `PollBlockError::Timeout` once `timeout` has elapsed.
    pub async fn poll_for_n_blocks<T: Into<Duration>>(
        &self,
        n: u64,
        timeout: T,
    ) -> Result<(), PollBlockError> {
        executor::poll_for_n_blocks(&self.client, n, timeout.into()).await
    }

    /// Get gas usage report
    pub fn gas_profiler_report(&self) -> Option<&Report> {
        self.gas_profiler.as_ref().map(|p| p.report())
    }

    async fn upload(
        &mut self,
        contract_name: &str,
        wasm_path: &Path,
        identity: &Identity,
    ) -> Result<OperationResult, OpError> {
        info!("Storing {:?} as {}", wasm_path, contract_name);

        let request = OperationRequest::upload(PathBuf::from(wasm_path));
        let res = self.run(identity, &request).await?;
        self.profile(contract_name, "store", OperationKind::Upload, &res);

        Ok(res)
    }

    async fn run(
        &self,
        identity: &Identity,
        request: &OperationRequest,
    ) -> Result<OperationResult, OpError> {
        let res = executor::execute(&self.client, identity, request, None, self.timeout).await?;
        debug!("{:?}", res);
        Ok(res)
    }

    fn persist(&self, identity: &Identity, kind: OperationKind) -> Result<(), OpError> {
        self.save().map_err(|e| OpError::new(identity, kind, e))
    }

    fn profile<S: Into<String>>(
        &mut self,
        contract_name: S,
        op_name: &str,
        kind: OperationKind,
        res: &OperationResult,
    ) {
        if let Some(p) = &mut self.gas_profiler {
            p.instrument(contract_name, op_name, kind, res);
        }
    }
}
