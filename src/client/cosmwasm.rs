use async_trait::async_trait;
use cosmos_sdk_proto::cosmwasm::wasm::v1::{
    QuerySmartContractStateRequest, QuerySmartContractStateResponse,
};
use cosmrs::bank::MsgSend;
use cosmrs::cosmwasm::{MsgExecuteContract, MsgInstantiateContract, MsgMigrateContract};
use cosmrs::rpc::Client;
use cosmrs::tx::Msg;
use cosmrs::{cosmwasm::MsgStoreCode, rpc::HttpClient};
use cosmrs::{AccountId, Any};
use log::{debug, info};
use prost::Message;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;

use super::chain::{ChainClient, TxMsg};
use super::chain_res::{ChainResponse, ChainTxResponse};
use super::cosmos::{abci_query, send_tx};
use super::error::ClientError;
use crate::config::cfg::{ChainCfg, Coin, FixedFee};
use crate::config::key::Identity;

/// Tendermint RPC backed [ChainClient] for wasmd based chains.
///
/// Clones share the underlying http client and the per signer sequence locks,
/// so a single connection can be reused across a whole batch run.
#[derive(Clone, Debug)]
pub struct CosmWasmClient {
    // http tendermint RPC client
    rpc_client: HttpClient,
    cfg: ChainCfg,
    signing: bool,
    // held from account lookup until the tx is committed
    sequence_locks: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl CosmWasmClient {
    /// Connects to `cfg.rpc_endpoint` and checks it serves `cfg.chain_id`.
    ///
    /// Passing an `identity` yields a signing client, otherwise the client
    /// only serves queries. Gives up with `ClientError::ConnectTimeout` once
    /// `deadline` has elapsed without a status answer.
    pub async fn connect(
        cfg: ChainCfg,
        identity: Option<&Identity>,
        deadline: Option<Duration>,
    ) -> Result<Self, ClientError> {
        let rpc_client = HttpClient::new(cfg.rpc_endpoint.as_str())
            .map_err(|e| ClientError::InvalidURL { source: e })?;

        let status = match deadline {
            Some(after) => tokio::time::timeout(after, rpc_client.status())
                .await
                .map_err(|_| ClientError::ConnectTimeout {
                    endpoint: cfg.rpc_endpoint.clone(),
                    after,
                })?,
            None => rpc_client.status().await,
        }
        .map_err(|e| ClientError::rpc(&cfg.rpc_endpoint, e))?;

        check_chain_id(&cfg, &status.node_info.network.to_string())?;

        if let Some(identity) = identity {
            check_prefix(&cfg, identity)?;
        }

        info!("connected to {} ({})", cfg.rpc_endpoint, cfg.chain_id);

        Ok(Self {
            rpc_client,
            cfg,
            signing: identity.is_some(),
            sequence_locks: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    pub fn is_signing(&self) -> bool {
        self.signing
    }

    fn sequence_lock(&self, address: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self
            .sequence_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        locks.entry(address.to_string()).or_default().clone()
    }
}

#[async_trait]
impl ChainClient for CosmWasmClient {
    fn chain_cfg(&self) -> &ChainCfg {
        &self.cfg
    }

    async fn broadcast(
        &self,
        signer: &Identity,
        msg: TxMsg,
        fee: Option<FixedFee>,
    ) -> Result<ChainTxResponse, ClientError> {
        if !self.signing {
            return Err(ClientError::ReadOnly);
        }
        check_prefix(&self.cfg, signer)?;

        let any = encode_msg(msg, signer.account_id())?;

        let lock = self.sequence_lock(&signer.address());
        let _guard = lock.lock().await;

        let res = send_tx(&self.rpc_client, any, signer, &self.cfg, fee).await?;

        Ok(res.into())
    }

    async fn query_smart(
        &self,
        address: &str,
        payload: Vec<u8>,
    ) -> Result<ChainResponse, ClientError> {
        let res = abci_query(
            &self.rpc_client,
            QuerySmartContractStateRequest {
                address: address.to_string(),
                query_data: payload,
            },
            "/cosmwasm.wasm.v1.Query/SmartContractState",
            &self.cfg,
        )
        .await?;

        let res = QuerySmartContractStateResponse::decode(res.value.as_slice())
            .map_err(ClientError::prost_proto_de)?;

        debug!("query {} returned {} bytes", address, res.data.len());

        Ok(res.into())
    }

    async fn latest_height(&self) -> Result<u64, ClientError> {
        let block = self
            .rpc_client
            .latest_block()
            .await
            .map_err(|e| ClientError::rpc(&self.cfg.rpc_endpoint, e))?;

        Ok(block.block.header.height.into())
    }
}

fn check_chain_id(cfg: &ChainCfg, actual: &str) -> Result<(), ClientError> {
    if actual != cfg.chain_id {
        return Err(ClientError::ChainIdMismatch {
            expected: cfg.chain_id.clone(),
            actual: actual.to_string(),
        });
    }
    Ok(())
}

fn check_prefix(cfg: &ChainCfg, identity: &Identity) -> Result<(), ClientError> {
    let actual = identity.prefix();
    if actual != cfg.prefix {
        return Err(ClientError::PrefixMismatch {
            expected: cfg.prefix.clone(),
            actual,
        });
    }
    Ok(())
}

fn parse_addr(addr: &str) -> Result<AccountId, ClientError> {
    addr.parse().map_err(|_| ClientError::Address {
        addr: addr.to_string(),
    })
}

fn to_cosm_funds(funds: Vec<Coin>) -> Result<Vec<cosmrs::Coin>, ClientError> {
    funds.into_iter().map(cosmrs::Coin::try_from).collect()
}

/// Translates a [TxMsg] into the protobuf `Any` wasmd expects.
pub(crate) fn encode_msg(msg: TxMsg, sender: &AccountId) -> Result<Any, ClientError> {
    let sender = sender.clone();

    match msg {
        TxMsg::StoreCode { wasm_byte_code } => MsgStoreCode {
            sender,
            wasm_byte_code,
            instantiate_permission: None,
        }
        .to_any(),
        TxMsg::Instantiate {
            code_id,
            msg,
            label,
            admin,
            funds,
        } => MsgInstantiateContract {
            sender,
            admin: admin.as_deref().map(parse_addr).transpose()?,
            code_id,
            label: Some(label),
            msg,
            funds: to_cosm_funds(funds)?,
        }
        .to_any(),
        TxMsg::Execute {
            contract,
            msg,
            funds,
        } => MsgExecuteContract {
            sender,
            contract: parse_addr(&contract)?,
            msg,
            funds: to_cosm_funds(funds)?,
        }
        .to_any(),
        TxMsg::Migrate {
            contract,
            code_id,
            msg,
        } => MsgMigrateContract {
            sender,
            contract: parse_addr(&contract)?,
            code_id,
            msg,
        }
        .to_any(),
        TxMsg::Send { to_address, amount } => MsgSend {
            from_address: sender,
            to_address: parse_addr(&to_address)?,
            amount: to_cosm_funds(amount)?,
        }
        .to_any(),
    }
    .map_err(ClientError::proto_encoding)
}
