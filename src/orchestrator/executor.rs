use log::{debug, info, warn};
use serde_json::Value;
use std::fs;
use std::future::Future;
use std::io::ErrorKind;
use std::time::Duration;
use tokio::time;

use super::error::{OpError, PollBlockError, ProcessError};
use super::operation::{OperationKind, OperationRequest, OperationResult};
use crate::client::chain::{ChainClient, TxMsg};
use crate::client::error::ClientError;
use crate::config::cfg::FixedFee;
use crate::config::key::Identity;

pub(crate) const READ_ONLY: &str = "read-only";

/// Performs a single operation signed by `identity`.
///
/// `fee` overrides the configured fee table entry for the operation. A transient
/// endpoint failure is retried once, chain rejections never are. When `deadline`
/// elapses the operation is abandoned with `OperationTimeout`; a tx that was
/// already broadcast is not rolled back.
pub async fn execute<C>(
    client: &C,
    identity: &Identity,
    request: &OperationRequest,
    fee: Option<FixedFee>,
    deadline: Option<Duration>,
) -> Result<OperationResult, OpError>
where
    C: ChainClient + ?Sized,
{
    info!("{} by {}", request.kind(), identity);

    with_deadline(deadline, run(client, Some(identity), request, fee))
        .await
        .map_err(|e| OpError::new(identity, request.kind(), e))
}

/// Smart query that needs no signer.
pub async fn query<C>(
    client: &C,
    contract: &str,
    msg: &Value,
    deadline: Option<Duration>,
) -> Result<OperationResult, OpError>
where
    C: ChainClient + ?Sized,
{
    let request = OperationRequest::Query {
        contract: contract.to_string(),
        msg: msg.clone(),
    };

    with_deadline(deadline, run(client, None, &request, None))
        .await
        .map_err(|e| OpError::new(READ_ONLY, OperationKind::Query, e))
}

/// Waits until the chain has produced `n` more blocks.
pub async fn poll_for_n_blocks<C>(
    client: &C,
    n: u64,
    timeout: Duration,
) -> Result<(), PollBlockError>
where
    C: ChainClient + ?Sized,
{
    time::timeout(timeout, async {
        let target_height = client.latest_height().await? + n;
        while client.latest_height().await? < target_height {
            time::sleep(Duration::from_millis(500)).await;
        }
        Ok::<(), ClientError>(())
    })
    .await??;

    Ok(())
}

async fn with_deadline<F>(deadline: Option<Duration>, fut: F) -> Result<OperationResult, ProcessError>
where
    F: Future<Output = Result<OperationResult, ProcessError>>,
{
    match deadline {
        Some(after) => time::timeout(after, fut)
            .await
            .unwrap_or(Err(ProcessError::OperationTimeout { after })),
        None => fut.await,
    }
}

async fn run<C>(
    client: &C,
    identity: Option<&Identity>,
    request: &OperationRequest,
    fee: Option<FixedFee>,
) -> Result<OperationResult, ProcessError>
where
    C: ChainClient + ?Sized,
{
    let kind = request.kind();

    if let OperationRequest::Query { contract, msg } = request {
        let payload = serde_json::to_vec(msg).map_err(ProcessError::json)?;
        let res = retry_once(kind, || client.query_smart(contract, payload.clone()))
            .await
            .map_err(|e| ProcessError::from_client(kind, e))?;

        debug!("{:?}", res);

        let value: Value = res
            .data()
            .map_err(|e| ProcessError::JsonDeserialize { source: e })?;

        return Ok(OperationResult {
            query_response: Some(value),
            ..Default::default()
        });
    }

    let identity = identity.ok_or(ClientError::ReadOnly)?;
    let fee = fee.or_else(|| client.chain_cfg().fees.for_operation(kind));
    let msg = tx_msg(request)?;

    let res = retry_once(kind, || client.broadcast(identity, msg.clone(), fee))
        .await
        .map_err(|e| ProcessError::from_client(kind, e))?;

    debug!("{:?}", res);

    let code_id = match kind {
        OperationKind::Upload => Some(
            res.find_attribute("code_id")
                .and_then(|v| v.parse::<u64>().ok())
                .ok_or(ClientError::MissingAttribute {
                    attribute: "code_id".to_string(),
                })?,
        ),
        _ => None,
    };
    // first occurrence wins when one tx instantiates several contracts
    let contract_address = match kind {
        OperationKind::Instantiate => Some(
            res.find_any_attribute(&["_contract_address", "contract_address"])
                .map(str::to_string)
                .ok_or(ClientError::MissingAttribute {
                    attribute: "_contract_address".to_string(),
                })?,
        ),
        _ => None,
    };

    Ok(OperationResult {
        code_id,
        contract_address,
        ..OperationResult::from(res)
    })
}

fn tx_msg(request: &OperationRequest) -> Result<TxMsg, ProcessError> {
    let to_vec = |msg: &Value| serde_json::to_vec(msg).map_err(ProcessError::json);

    let msg = match request {
        OperationRequest::Upload { path } => {
            let wasm_byte_code = fs::read(path).map_err(|e| match e.kind() {
                ErrorKind::NotFound => ProcessError::ArtifactNotFound {
                    path: path.clone(),
                    source: e,
                },
                _ => ProcessError::ArtifactRead {
                    path: path.clone(),
                    source: e,
                },
            })?;
            TxMsg::StoreCode { wasm_byte_code }
        }
        OperationRequest::Instantiate {
            code_id,
            msg,
            label,
            admin,
            funds,
        } => TxMsg::Instantiate {
            code_id: *code_id,
            msg: to_vec(msg)?,
            label: label.clone(),
            admin: admin.clone(),
            funds: funds.clone(),
        },
        OperationRequest::Execute {
            contract,
            msg,
            funds,
        } => TxMsg::Execute {
            contract: contract.clone(),
            msg: to_vec(msg)?,
            funds: funds.clone(),
        },
        OperationRequest::Migrate {
            contract,
            new_code_id,
            msg,
        } => TxMsg::Migrate {
            contract: contract.clone(),
            code_id: *new_code_id,
            msg: to_vec(msg)?,
        },
        OperationRequest::Send { to_address, amount } => TxMsg::Send {
            to_address: to_address.clone(),
            amount: amount.clone(),
        },
        OperationRequest::Query { .. } => {
            return Err(ProcessError::NotATransaction {
                operation: request.kind(),
            })
        }
    };

    Ok(msg)
}

async fn retry_once<F, Fut, T>(kind: OperationKind, mut f: F) -> Result<T, ClientError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ClientError>>,
{
    match f().await {
        Err(e) if e.is_transient() => {
            warn!("{} hit a transient error, retrying once: {}", kind, e);
            f().await
        }
        res => res,
    }
}
