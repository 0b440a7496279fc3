use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;

use super::error::ProcessError;
use crate::client::chain_res::{ChainTxResponse, Event};
use crate::client::error::DeserializeError;
use crate::config::cfg::Coin;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OperationKind {
    Upload,
    Instantiate,
    Execute,
    Query,
    Migrate,
    Send,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            OperationKind::Upload => "upload",
            OperationKind::Instantiate => "instantiate",
            OperationKind::Execute => "execute",
            OperationKind::Query => "query",
            OperationKind::Migrate => "migrate",
            OperationKind::Send => "send",
        };
        f.write_str(name)
    }
}

/// A single contract lifecycle operation. Payloads are plain json owned by
/// the target contract's schema.
#[derive(Clone, Debug, PartialEq)]
pub enum OperationRequest {
    Upload {
        path: PathBuf,
    },
    Instantiate {
        code_id: u64,
        msg: Value,
        label: String,
        admin: Option<String>,
        funds: Vec<Coin>,
    },
    Execute {
        contract: String,
        msg: Value,
        funds: Vec<Coin>,
    },
    Query {
        contract: String,
        msg: Value,
    },
    Migrate {
        contract: String,
        new_code_id: u64,
        msg: Value,
    },
    Send {
        to_address: String,
        amount: Vec<Coin>,
    },
}

fn to_json<T: Serialize>(msg: &T) -> Result<Value, ProcessError> {
    serde_json::to_value(msg).map_err(ProcessError::json)
}

impl OperationRequest {
    pub fn kind(&self) -> OperationKind {
        match self {
            OperationRequest::Upload { .. } => OperationKind::Upload,
            OperationRequest::Instantiate { .. } => OperationKind::Instantiate,
            OperationRequest::Execute { .. } => OperationKind::Execute,
            OperationRequest::Query { .. } => OperationKind::Query,
            OperationRequest::Migrate { .. } => OperationKind::Migrate,
            OperationRequest::Send { .. } => OperationKind::Send,
        }
    }

    pub fn upload<P: Into<PathBuf>>(path: P) -> Self {
        OperationRequest::Upload { path: path.into() }
    }

    pub fn instantiate<T: Serialize, S: Into<String>>(
        code_id: u64,
        msg: &T,
        label: S,
        admin: Option<String>,
        funds: Vec<Coin>,
    ) -> Result<Self, ProcessError> {
        Ok(OperationRequest::Instantiate {
            code_id,
            msg: to_json(msg)?,
            label: label.into(),
            admin,
            funds,
        })
    }

    pub fn execute<T: Serialize, S: Into<String>>(
        contract: S,
        msg: &T,
        funds: Vec<Coin>,
    ) -> Result<Self, ProcessError> {
        Ok(OperationRequest::Execute {
            contract: contract.into(),
            msg: to_json(msg)?,
            funds,
        })
    }

    pub fn query<T: Serialize, S: Into<String>>(contract: S, msg: &T) -> Result<Self, ProcessError> {
        Ok(OperationRequest::Query {
            contract: contract.into(),
            msg: to_json(msg)?,
        })
    }

    pub fn migrate<T: Serialize, S: Into<String>>(
        contract: S,
        new_code_id: u64,
        msg: &T,
    ) -> Result<Self, ProcessError> {
        Ok(OperationRequest::Migrate {
            contract: contract.into(),
            new_code_id,
            msg: to_json(msg)?,
        })
    }

    pub fn send<S: Into<String>>(to_address: S, amount: Vec<Coin>) -> Self {
        OperationRequest::Send {
            to_address: to_address.into(),
            amount,
        }
    }
}

/// Outcome of an operation. Tx operations carry the hash and emitted events,
/// queries carry the decoded json response.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OperationResult {
    pub tx_hash: Option<String>,
    pub height: Option<u64>,
    pub query_response: Option<Value>,
    pub events: Vec<Event>,
    pub code_id: Option<u64>,
    pub contract_address: Option<String>,
    pub gas_wanted: u64,
    pub gas_used: u64,
}

impl OperationResult {
    /// Deserializes the query response into `T`.
    pub fn data<T: DeserializeOwned>(&self) -> Result<T, DeserializeError> {
        let value = self
            .query_response
            .clone()
            .ok_or(DeserializeError::EmptyResponse)?;
        Ok(serde_json::from_value(value)?)
    }
}

impl From<ChainTxResponse> for OperationResult {
    fn from(res: ChainTxResponse) -> OperationResult {
        OperationResult {
            tx_hash: Some(res.tx_hash),
            height: Some(res.height),
            events: res.events,
            gas_wanted: res.res.gas_wanted,
            gas_used: res.res.gas_used,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Serialize)]
    #[serde(rename_all = "snake_case")]
    enum ExecuteMsg {
        CreatePool { pool_type: String },
    }

    #[test]
    fn typed_msgs_become_json() {
        let req = OperationRequest::execute(
            "juno1pool",
            &ExecuteMsg::CreatePool {
                pool_type: "H2H".to_string(),
            },
            vec![],
        )
        .unwrap();

        assert_eq!(req.kind(), OperationKind::Execute);
        assert_eq!(
            req,
            OperationRequest::Execute {
                contract: "juno1pool".to_string(),
                msg: json!({"create_pool": {"pool_type": "H2H"}}),
                funds: vec![],
            }
        );
        assert_eq!(OperationKind::Migrate.to_string(), "migrate");
    }

    #[test]
    fn query_data_decodes() {
        #[derive(Deserialize)]
        struct CountResponse {
            count: u64,
        }

        let res = OperationResult {
            query_response: Some(json!({"count": 4})),
            ..Default::default()
        };
        assert_eq!(res.data::<CountResponse>().unwrap().count, 4);
        assert!(OperationResult::default().data::<Value>().is_err());
    }
}
