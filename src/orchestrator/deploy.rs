use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use super::error::{ArtifactError, ContractMapError};

pub type ContractName = String;

/// Code ids and addresses of the contracts deployed on one chain.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContractMap {
    map: BTreeMap<ContractName, DeployInfo>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_address: Option<String>,
}

impl ContractMap {
    /// Creates a new ContractMap from already known deploys
    pub fn new(contract_deploys: BTreeMap<ContractName, DeployInfo>) -> Self {
        Self {
            map: contract_deploys,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Registers a new code id and contract name with the contract map
    pub fn register_contract<S: Into<String>>(&mut self, name: S, code_id: u64) {
        self.map.entry(name.into()).or_default().code_id = Some(code_id);
    }

    /// Returns the stored code id for a given contract name
    pub fn code_id(&self, name: &str) -> Result<u64, ContractMapError> {
        self.map
            .get(name)
            .and_then(|info| info.code_id)
            .ok_or(ContractMapError::NotStored { name: name.into() })
    }

    /// Returns the stored contract address for a given contract name
    pub fn address(&self, name: &str) -> Result<String, ContractMapError> {
        self.map
            .get(name)
            .ok_or(ContractMapError::NotStored { name: name.into() })?
            .contract_address
            .clone()
            .ok_or(ContractMapError::NotDeployed { name: name.into() })
    }

    /// Registers a contract address, with or without a known code id
    pub fn add_address<S: Into<String>>(&mut self, name: &str, address: S) {
        self.map.entry(name.into()).or_default().contract_address = Some(address.into());
    }

    /// Returns current deploy info
    pub fn deploy_info(&self) -> &BTreeMap<ContractName, DeployInfo> {
        &self.map
    }
}

/// Json file of [ContractMap]s keyed by chain id:
///
/// ```json
/// {
///   "uni-5": {
///     "counter": { "code_id": 1250, "contract_address": "juno1..." }
///   }
/// }
/// ```
#[derive(Clone, Debug)]
pub struct ArtifactStore {
    path: PathBuf,
}

type Artifacts = BTreeMap<String, ContractMap>;

impl ArtifactStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Deploy record of `chain_id`.
    ///
    /// Never fails: a missing or unreadable file yields an empty map.
    pub fn read(&self, chain_id: &str) -> ContractMap {
        match self.load() {
            Ok(mut artifacts) => artifacts.remove(chain_id).unwrap_or_default(),
            Err(e) => {
                warn!("ignoring deploy artifacts at {:?}: {}", self.path, e);
                ContractMap::default()
            }
        }
    }

    /// Replaces the record of `chain_id`, keeping other chains' records.
    ///
    /// The file is written to a sibling temp file first and renamed into
    /// place, so readers see either the old or the new content.
    pub fn write(&self, chain_id: &str, contracts: &ContractMap) -> Result<(), ArtifactError> {
        let mut artifacts = self.load()?;
        artifacts.insert(chain_id.to_string(), contracts.clone());

        let json = serde_json::to_vec_pretty(&artifacts)
            .map_err(|e| ArtifactError::Serialize { source: e })?;

        let write_err = |source| ArtifactError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(dir) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(write_err)?;
        }

        let tmp = self.tmp_path();
        let mut file = File::create(&tmp).map_err(write_err)?;
        file.write_all(&json).map_err(write_err)?;
        file.sync_all().map_err(write_err)?;
        fs::rename(&tmp, &self.path).map_err(write_err)?;

        debug!("saved {} deploys for {} to {:?}", contracts.map.len(), chain_id, self.path);
        Ok(())
    }

    fn load(&self) -> Result<Artifacts, ArtifactError> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Artifacts::new()),
            Err(e) => {
                return Err(ArtifactError::Read {
                    path: self.path.clone(),
                    source: e,
                })
            }
        };

        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(Artifacts::new());
        }

        serde_json::from_slice(&raw).map_err(|e| ArtifactError::Corrupt {
            path: self.path.clone(),
            source: e,
        })
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
