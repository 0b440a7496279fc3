//! In-memory chain used by the unit tests.
//!
//! Hosts a counter contract for every stored code id: instantiate with
//! `{"count": n}`, execute `{"increment": {}}` or `{"reset": {"count": n}}`,
//! query `{"get_count": {}}`.

use async_trait::async_trait;
use cosmrs::tendermint::abci::Code;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex as AsyncMutex;

use crate::client::chain::{ChainClient, TxMsg};
use crate::client::chain_res::{ChainResponse, ChainTxResponse, Event};
use crate::client::error::ClientError;
use crate::config::cfg::{ChainCfg, Coin, FeeTable, FixedFee};
use crate::config::key::Identity;

pub(crate) const TEST_MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

const DEFAULT_BALANCE: u64 = 1_000_000_000;

pub(crate) fn test_identity(index: u32) -> Identity {
    Identity::resolve_hd(TEST_MNEMONIC, "wasm", index).unwrap()
}

pub(crate) fn test_chain_cfg() -> ChainCfg {
    ChainCfg {
        denom: "ucosm".to_string(),
        prefix: "wasm".to_string(),
        chain_id: "testing".to_string(),
        rpc_endpoint: "http://localhost:26657/".to_string(),
        gas_prices: 0.025,
        gas_adjustment: 1.3,
        fees: FeeTable::default(),
    }
}

/// Rpc endpoint that accepts connections and never answers.
pub(crate) async fn silent_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = vec![];
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    format!("http://{}", addr)
}

/// Rpc endpoint answering every request with a `/status` reporting `network`.
pub(crate) async fn status_endpoint(network: &str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let network = network.to_string();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let id = read_rpc_id(&mut socket).await;
            let body = status_body(&id, &network);
            let res = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            let _ = socket.write_all(res.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });
    format!("http://{}", addr)
}

/// Reads one http request and returns its json-rpc id.
async fn read_rpc_id(socket: &mut TcpStream) -> Value {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = socket.read(&mut chunk).await.unwrap_or_default();
        if n == 0 {
            return Value::Null;
        }
        buf.extend_from_slice(&chunk[..n]);

        let text = String::from_utf8_lossy(&buf).to_string();
        let end = match text.find("\r\n\r\n") {
            Some(end) => end + 4,
            None => continue,
        };
        let len = text[..end]
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(k, _)| k.trim().eq_ignore_ascii_case("content-length"))
            .and_then(|(_, v)| v.trim().parse::<usize>().ok())
            .unwrap_or_default();
        if buf.len() >= end + len {
            let req: Value = serde_json::from_slice(&buf[end..end + len]).unwrap_or_default();
            return req["id"].clone();
        }
    }
}

fn status_body(id: &Value, network: &str) -> String {
    let hash = "0".repeat(64);
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": {
            "node_info": {
                "protocol_version": {"p2p": "8", "block": "11", "app": "0"},
                "id": "5576458aef205977e18fd50b274e9b5d9014525a",
                "listen_addr": "tcp://0.0.0.0:26656",
                "network": network,
                "version": "0.34.21",
                "channels": "40202122233038606100",
                "moniker": "mock",
                "other": {"tx_index": "on", "rpc_address": "tcp://0.0.0.0:26657"}
            },
            "sync_info": {
                "latest_block_hash": hash,
                "latest_app_hash": hash,
                "latest_block_height": "100",
                "latest_block_time": "2022-08-01T00:00:00Z",
                "earliest_block_hash": hash,
                "earliest_app_hash": hash,
                "earliest_block_height": "1",
                "earliest_block_time": "2022-07-01T00:00:00Z",
                "catching_up": false
            },
            "validator_info": {
                "address": "0000000000000000000000000000000000000000",
                "pub_key": {
                    "type": "tendermint/PubKeyEd25519",
                    "value": "WGZmZmZmZmZmZmZmZmZmZmZmZmZmZmZmZmZmZmZmZmY="
                },
                "voting_power": "0",
                "proposer_priority": "0"
            }
        }
    })
    .to_string()
}

pub(crate) enum Failure {
    Unreachable,
    Reject(String),
}

struct MockContract {
    code_id: u64,
    admin: Option<String>,
    state: Value,
}

#[derive(Default)]
struct State {
    codes: Vec<Vec<u8>>,
    contracts: HashMap<String, MockContract>,
    balances: HashMap<String, u64>,
    failures: HashMap<String, VecDeque<Failure>>,
    delays: HashMap<String, Duration>,
    calls: HashMap<String, usize>,
    in_flight: HashMap<String, usize>,
    max_in_flight: HashMap<String, usize>,
    completed: Vec<String>,
    scripted_events: Option<Vec<Event>>,
    fees_seen: Vec<Option<FixedFee>>,
    last_msg: Option<TxMsg>,
    height: u64,
    tx_count: u64,
}

pub(crate) struct MockChain {
    cfg: ChainCfg,
    state: Mutex<State>,
    // one tx at a time per signer, like the sequence locks of the rpc client
    sequence_locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

fn reject(log: &str) -> ClientError {
    ClientError::CosmosSdk {
        res: ChainResponse {
            code: Code::Err(5),
            log: log.to_string(),
            ..Default::default()
        },
    }
}

impl MockChain {
    pub fn new() -> Self {
        Self::with_cfg(test_chain_cfg())
    }

    pub fn with_cfg(cfg: ChainCfg) -> Self {
        Self {
            cfg,
            state: Mutex::new(State {
                height: 1,
                ..Default::default()
            }),
            sequence_locks: Mutex::new(HashMap::new()),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Queues a failure for the next call signed by (or querying) `address`.
    pub fn fail_next(&self, address: &str, failure: Failure) {
        self.state()
            .failures
            .entry(address.to_string())
            .or_default()
            .push_back(failure);
    }

    /// Delays every call signed by `address`.
    pub fn delay(&self, address: &str, delay: Duration) {
        self.state().delays.insert(address.to_string(), delay);
    }

    /// Events returned verbatim by the next broadcast, skipping execution.
    pub fn script_events(&self, events: Vec<Event>) {
        self.state().scripted_events = Some(events);
    }

    pub fn set_balance(&self, address: &str, amount: u64) {
        self.state().balances.insert(address.to_string(), amount);
    }

    pub fn balance(&self, address: &str) -> u64 {
        self.state()
            .balances
            .get(address)
            .copied()
            .unwrap_or(DEFAULT_BALANCE)
    }

    pub fn calls(&self, address: &str) -> usize {
        self.state().calls.get(address).copied().unwrap_or_default()
    }

    /// Most txs `address` ever had in flight at once.
    pub fn max_in_flight(&self, address: &str) -> usize {
        self.state()
            .max_in_flight
            .get(address)
            .copied()
            .unwrap_or_default()
    }

    /// Signers in the order their txs were committed.
    pub fn completed(&self) -> Vec<String> {
        self.state().completed.clone()
    }

    pub fn fees_seen(&self) -> Vec<Option<FixedFee>> {
        self.state().fees_seen.clone()
    }

    pub fn last_msg(&self) -> Option<TxMsg> {
        self.state().last_msg.clone()
    }

    pub fn code_count(&self) -> usize {
        self.state().codes.len()
    }

    pub fn code_id_of(&self, contract: &str) -> Option<u64> {
        self.state().contracts.get(contract).map(|c| c.code_id)
    }

    pub fn contract_state(&self, contract: &str) -> Option<Value> {
        self.state().contracts.get(contract).map(|c| c.state.clone())
    }

    pub fn store_code(&self, wasm: Vec<u8>) -> u64 {
        let mut state = self.state();
        state.codes.push(wasm);
        state.codes.len() as u64
    }

    /// Stores and instantiates a counter owned by `admin`, bypassing txs.
    pub fn deploy_counter(&self, admin: &Identity, count: u64) -> String {
        let code_id = self.store_code(b"counter".to_vec());
        let mut state = self.state();
        let addr = format!("wasm1contract{:04}", state.contracts.len() + 1);
        state.contracts.insert(
            addr.clone(),
            MockContract {
                code_id,
                admin: Some(admin.address()),
                state: json!({ "count": count }),
            },
        );
        addr
    }

    async fn before_call(&self, key: &str) -> Result<(), ClientError> {
        let delay = {
            let mut state = self.state();
            *state.calls.entry(key.to_string()).or_default() += 1;
            state.delays.get(key).copied()
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failure = self
            .state()
            .failures
            .get_mut(key)
            .and_then(|queue| queue.pop_front());

        match failure {
            Some(Failure::Unreachable) => Err(ClientError::EndpointUnreachable {
                endpoint: self.cfg.rpc_endpoint.clone(),
                reason: "connection refused".to_string(),
            }),
            Some(Failure::Reject(log)) => Err(reject(&log)),
            None => Ok(()),
        }
    }
}

impl State {
    fn debit(&mut self, address: &str, funds: &[Coin]) -> Result<(), ClientError> {
        let total: u64 = funds.iter().map(|c| c.amount).sum();
        let balance = self
            .balances
            .entry(address.to_string())
            .or_insert(DEFAULT_BALANCE);
        if *balance < total {
            return Err(reject(&format!(
                "{}ucosm is smaller than {}ucosm: insufficient funds",
                balance, total
            )));
        }
        *balance -= total;
        Ok(())
    }

    fn credit(&mut self, address: &str, funds: &[Coin]) {
        let total: u64 = funds.iter().map(|c| c.amount).sum();
        *self
            .balances
            .entry(address.to_string())
            .or_insert(DEFAULT_BALANCE) += total;
    }

    fn apply(&mut self, sender: &str, msg: TxMsg) -> Result<Vec<Event>, ClientError> {
        let message = |action: &str| {
            Event::new(
                "message",
                &[("action", action), ("module", "wasm"), ("sender", sender)],
            )
        };

        match msg {
            TxMsg::StoreCode { wasm_byte_code } => {
                self.codes.push(wasm_byte_code);
                let code_id = self.codes.len().to_string();
                Ok(vec![
                    message("/cosmwasm.wasm.v1.MsgStoreCode"),
                    Event::new("store_code", &[("code_id", code_id.as_str())]),
                ])
            }
            TxMsg::Instantiate {
                code_id,
                msg,
                admin,
                funds,
                ..
            } => {
                if code_id == 0 || code_id as usize > self.codes.len() {
                    return Err(reject(&format!("no such code: {}", code_id)));
                }
                let init: Value = serde_json::from_slice(&msg)
                    .map_err(|e| reject(&format!("Error parsing into type: {}", e)))?;
                self.debit(sender, &funds)?;

                let addr = format!("wasm1contract{:04}", self.contracts.len() + 1);
                self.contracts.insert(
                    addr.clone(),
                    MockContract {
                        code_id,
                        admin,
                        state: json!({ "count": init["count"].as_u64().unwrap_or_default() }),
                    },
                );
                let code_id = code_id.to_string();
                Ok(vec![
                    message("/cosmwasm.wasm.v1.MsgInstantiateContract"),
                    Event::new(
                        "instantiate",
                        &[("_contract_address", addr.as_str()), ("code_id", code_id.as_str())],
                    ),
                ])
            }
            TxMsg::Execute {
                contract,
                msg,
                funds,
            } => {
                let exec: Value = serde_json::from_slice(&msg)
                    .map_err(|e| reject(&format!("Error parsing into type: {}", e)))?;
                if !self.contracts.contains_key(&contract) {
                    return Err(reject(&format!("{}: contract: not found", contract)));
                }
                self.debit(sender, &funds)?;

                let target = self
                    .contracts
                    .get_mut(&contract)
                    .ok_or_else(|| reject("contract: not found"))?;
                let count = target.state["count"].as_u64().unwrap_or_default();
                let action = if exec.get("increment").is_some() {
                    target.state = json!({ "count": count + 1 });
                    "increment"
                } else if let Some(n) = exec.pointer("/reset/count").and_then(Value::as_u64) {
                    target.state = json!({ "count": n });
                    "reset"
                } else {
                    return Err(reject(&format!(
                        "execute wasm contract failed: unknown variant in {}",
                        exec
                    )));
                };

                Ok(vec![
                    message("/cosmwasm.wasm.v1.MsgExecuteContract"),
                    Event::new(
                        "wasm",
                        &[("_contract_address", contract.as_str()), ("action", action)],
                    ),
                ])
            }
            TxMsg::Migrate {
                contract,
                code_id,
                ..
            } => {
                if code_id == 0 || code_id as usize > self.codes.len() {
                    return Err(reject(&format!("no such code: {}", code_id)));
                }
                let target = self
                    .contracts
                    .get_mut(&contract)
                    .ok_or_else(|| reject(&format!("{}: contract: not found", contract)))?;
                if target.admin.as_deref() != Some(sender) {
                    return Err(reject("migrate wasm contract failed: unauthorized"));
                }
                target.code_id = code_id;
                let code_id = code_id.to_string();
                Ok(vec![
                    message("/cosmwasm.wasm.v1.MsgMigrateContract"),
                    Event::new(
                        "migrate",
                        &[("_contract_address", contract.as_str()), ("code_id", code_id.as_str())],
                    ),
                ])
            }
            TxMsg::Send { to_address, amount } => {
                self.debit(sender, &amount)?;
                self.credit(&to_address, &amount);
                Ok(vec![Event::new(
                    "transfer",
                    &[("recipient", to_address.as_str()), ("sender", sender)],
                )])
            }
        }
    }
}

#[async_trait]
impl ChainClient for MockChain {
    fn chain_cfg(&self) -> &ChainCfg {
        &self.cfg
    }

    async fn broadcast(
        &self,
        signer: &Identity,
        msg: TxMsg,
        fee: Option<FixedFee>,
    ) -> Result<ChainTxResponse, ClientError> {
        let sender = signer.address();
        let lock = self
            .sequence_locks
            .lock()
            .unwrap()
            .entry(sender.clone())
            .or_default()
            .clone();
        let _guard = lock.lock().await;

        {
            let mut state = self.state();
            let in_flight = state.in_flight.entry(sender.clone()).or_default();
            *in_flight += 1;
            let now = *in_flight;
            let max = state.max_in_flight.entry(sender.clone()).or_default();
            *max = (*max).max(now);
        }
        let called = self.before_call(&sender).await;
        *self.state().in_flight.entry(sender.clone()).or_default() -= 1;
        called?;

        let mut state = self.state();
        state.fees_seen.push(fee);
        state.last_msg = Some(msg.clone());

        let events = match state.scripted_events.take() {
            Some(events) => events,
            None => state.apply(&sender, msg)?,
        };

        state.completed.push(sender);
        state.height += 1;
        state.tx_count += 1;

        Ok(ChainTxResponse {
            res: ChainResponse {
                code: Code::Ok,
                gas_wanted: 200_000,
                gas_used: 150_000,
                ..Default::default()
            },
            tx_hash: format!("{:064X}", state.tx_count),
            height: state.height,
            events,
        })
    }

    async fn query_smart(
        &self,
        address: &str,
        payload: Vec<u8>,
    ) -> Result<ChainResponse, ClientError> {
        self.before_call(address).await?;

        let query: Value = serde_json::from_slice(&payload)
            .map_err(|e| reject(&format!("Error parsing into type: {}", e)))?;

        let state = self.state();
        let contract = state
            .contracts
            .get(address)
            .ok_or_else(|| reject(&format!("{}: contract: not found", address)))?;

        if query.get("get_count").is_none() {
            return Err(reject("query wasm contract failed: unknown variant"));
        }

        Ok(ChainResponse {
            code: Code::Ok,
            data: Some(serde_json::to_vec(&contract.state).unwrap()),
            ..Default::default()
        })
    }

    async fn latest_height(&self) -> Result<u64, ClientError> {
        let mut state = self.state();
        state.height += 1;
        Ok(state.height)
    }
}
