use cosmos_sdk_proto::cosmwasm::wasm::v1::QuerySmartContractStateResponse;
use cosmrs::rpc::endpoint::broadcast::tx_commit::{Response, TxResult};
use cosmrs::tendermint::abci::Code;
use serde::{Deserialize, Serialize};
use tendermint_rpc::endpoint::abci_query::AbciQuery;

use super::error::DeserializeError;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChainResponse {
    pub code: Code,
    pub data: Option<Vec<u8>>,
    pub log: String,
    pub gas_wanted: u64,
    pub gas_used: u64,
}

impl From<TxResult> for ChainResponse {
    fn from(res: TxResult) -> ChainResponse {
        ChainResponse {
            code: res.code,
            data: res.data.map(|d| d.into()),
            log: res.log.to_string(),
            gas_wanted: res.gas_wanted.into(),
            gas_used: res.gas_used.into(),
        }
    }
}

impl From<AbciQuery> for ChainResponse {
    fn from(res: AbciQuery) -> ChainResponse {
        ChainResponse {
            code: res.code,
            data: Some(res.value),
            log: res.log.to_string(),
            gas_wanted: 0,
            gas_used: 0,
        }
    }
}

impl From<QuerySmartContractStateResponse> for ChainResponse {
    fn from(res: QuerySmartContractStateResponse) -> ChainResponse {
        ChainResponse {
            code: Code::Ok,
            data: Some(res.data),
            ..Default::default()
        }
    }
}

impl ChainResponse {
    pub fn data<'a, T: Deserialize<'a>>(&'a self) -> Result<T, DeserializeError> {
        let r: T = serde_json::from_slice(
            self.data
                .as_ref()
                .ok_or(DeserializeError::EmptyResponse)?
                .as_slice(),
        )?;
        Ok(r)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub key: String,
    pub value: String,
}

/// An event emitted by a committed tx, attributes kept in emission order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: String,
    pub attributes: Vec<Attribute>,
}

impl Event {
    pub fn new<S: Into<String>>(kind: S, attributes: &[(&str, &str)]) -> Self {
        Self {
            kind: kind.into(),
            attributes: attributes
                .iter()
                .map(|(k, v)| Attribute {
                    key: k.to_string(),
                    value: v.to_string(),
                })
                .collect(),
        }
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.key == key)
            .map(|a| a.value.as_str())
    }
}

impl From<&cosmrs::tendermint::abci::Event> for Event {
    fn from(e: &cosmrs::tendermint::abci::Event) -> Event {
        Event {
            kind: e.type_str.clone(),
            attributes: e
                .attributes
                .iter()
                .map(|tag| Attribute {
                    key: tag.key.to_string(),
                    value: tag.value.to_string(),
                })
                .collect(),
        }
    }
}

/// A committed transaction.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChainTxResponse {
    pub res: ChainResponse,
    pub tx_hash: String,
    pub height: u64,
    pub events: Vec<Event>,
}

impl From<Response> for ChainTxResponse {
    fn from(res: Response) -> ChainTxResponse {
        let events = res.deliver_tx.events.iter().map(Event::from).collect();
        ChainTxResponse {
            tx_hash: res.hash.to_string(),
            height: res.height.into(),
            events,
            res: res.deliver_tx.into(),
        }
    }
}

impl ChainTxResponse {
    /// First value of `key` across all events, in emission order.
    ///
    /// Looked up by key rather than position since event ordering is
    /// not stable across chain versions.
    pub fn find_attribute(&self, key: &str) -> Option<&str> {
        self.events.iter().find_map(|e| e.attribute(key))
    }

    /// First value of any of `keys`, in emission order.
    pub fn find_any_attribute(&self, keys: &[&str]) -> Option<&str> {
        self.events
            .iter()
            .flat_map(|e| e.attributes.iter())
            .find(|a| keys.contains(&a.key.as_str()))
            .map(|a| a.value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::error::DeserializeError;
    use assert_matches::assert_matches;

    fn tx_with_events(events: Vec<Event>) -> ChainTxResponse {
        ChainTxResponse {
            events,
            ..Default::default()
        }
    }

    #[test]
    fn attribute_lookup_is_by_key_not_position() {
        let tx = tx_with_events(vec![
            Event::new("message", &[("action", "instantiate"), ("module", "wasm")]),
            Event::new(
                "instantiate",
                &[("code_id", "7"), ("_contract_address", "juno1first")],
            ),
            Event::new("wasm", &[("_contract_address", "juno1second")]),
        ]);

        assert_eq!(tx.find_attribute("code_id"), Some("7"));
        assert_eq!(tx.find_attribute("_contract_address"), Some("juno1first"));
        assert_eq!(
            tx.find_any_attribute(&["contract_address", "_contract_address"]),
            Some("juno1first")
        );
        assert_eq!(tx.find_attribute("missing"), None);
    }

    #[test]
    fn decodes_json_data() {
        let res = ChainResponse {
            data: Some(br#"{"count":3}"#.to_vec()),
            ..Default::default()
        };
        let v: serde_json::Value = res.data().unwrap();
        assert_eq!(v["count"], 3);

        let empty = ChainResponse::default();
        assert_matches!(
            empty.data::<serde_json::Value>(),
            Err(DeserializeError::EmptyResponse)
        );
    }
}
