use cosmos_sdk_proto::cosmos::auth::v1beta1::{
    BaseAccount, QueryAccountRequest, QueryAccountResponse,
};
use cosmos_sdk_proto::cosmos::tx::v1beta1::{SimulateRequest, SimulateResponse};
use cosmrs::rpc::endpoint::broadcast::tx_commit::Response;
use cosmrs::rpc::Client;
use cosmrs::tendermint::abci::Code;
use cosmrs::tendermint::chain;
use cosmrs::tx::{Fee, SignDoc, SignerInfo};
use cosmrs::{
    rpc::HttpClient,
    tx::{self},
};
use cosmrs::{AccountId, Any, Coin, Denom};
use log::debug;
use prost::Message;
use tendermint_rpc::endpoint::abci_query::AbciQuery;

use super::error::ClientError;
use crate::config::cfg::{ChainCfg, FixedFee};
use crate::config::key::Identity;

// Tx plumbing shared by the tendermint rpc backed clients

pub(crate) async fn send_tx(
    client: &HttpClient,
    msg: Any,
    signer: &Identity,
    cfg: &ChainCfg,
    fee: Option<FixedFee>,
) -> Result<Response, ClientError> {
    let timeout_height = 0u16;
    let account = account(client, signer.account_id().clone(), cfg).await?;

    let tx_body = tx::Body::new(vec![msg], "", timeout_height);

    let fee = match fee {
        Some(fee) => fixed_fee(fee, cfg)?,
        None => simulate_gas_fee(client, &tx_body, &account, signer, cfg).await?,
    };

    let auth_info =
        SignerInfo::single_direct(Some(signer.public_key()), account.sequence).auth_info(fee);

    let sign_doc = SignDoc::new(
        &tx_body,
        &auth_info,
        &chain_id(cfg)?,
        account.account_number,
    )
    .map_err(ClientError::proto_encoding)?;

    let tx_raw = signer.sign(sign_doc)?;
    let tx_bytes = tx_raw.to_bytes().map_err(ClientError::proto_encoding)?;

    let tx_commit_response = client
        .broadcast_tx_commit(tx_bytes.into())
        .await
        .map_err(|e| ClientError::rpc(&cfg.rpc_endpoint, e))?;

    if tx_commit_response.check_tx.code.is_err() {
        return Err(ClientError::CosmosSdk {
            res: tx_commit_response.check_tx.into(),
        });
    }
    if tx_commit_response.deliver_tx.code.is_err() {
        return Err(ClientError::CosmosSdk {
            res: tx_commit_response.deliver_tx.into(),
        });
    }

    debug!(
        "committed tx {} at height {}",
        tx_commit_response.hash, tx_commit_response.height
    );

    Ok(tx_commit_response)
}

pub(crate) async fn abci_query<T: Message>(
    client: &HttpClient,
    req: T,
    path: &str,
    cfg: &ChainCfg,
) -> Result<AbciQuery, ClientError> {
    let mut buf = Vec::with_capacity(req.encoded_len());
    req.encode(&mut buf).map_err(ClientError::prost_proto_en)?;

    let query_path = path.parse().map_err(|_| ClientError::QueryPath {
        path: path.to_string(),
    })?;

    let res = client
        .abci_query(Some(query_path), buf, None, false)
        .await
        .map_err(|e| ClientError::rpc(&cfg.rpc_endpoint, e))?;

    if res.code != Code::Ok {
        return Err(ClientError::CosmosSdk { res: res.into() });
    }

    Ok(res)
}

pub(crate) fn chain_id(cfg: &ChainCfg) -> Result<chain::Id, ClientError> {
    cfg.chain_id.parse().map_err(|_| ClientError::ChainId {
        chain_id: cfg.chain_id.to_string(),
    })
}

async fn account(
    client: &HttpClient,
    account_id: AccountId,
    cfg: &ChainCfg,
) -> Result<BaseAccount, ClientError> {
    let res = abci_query(
        client,
        QueryAccountRequest {
            address: account_id.as_ref().into(),
        },
        "/cosmos.auth.v1beta1.Query/Account",
        cfg,
    )
    .await?;

    let res = QueryAccountResponse::decode(res.value.as_slice())
        .map_err(ClientError::prost_proto_de)?
        .account
        .ok_or(ClientError::AccountId {
            id: account_id.to_string(),
        })?;

    let base_account =
        BaseAccount::decode(res.value.as_slice()).map_err(ClientError::prost_proto_de)?;

    Ok(base_account)
}

fn denom(cfg: &ChainCfg) -> Result<Denom, ClientError> {
    cfg.denom.parse().map_err(|_| ClientError::Denom {
        name: cfg.denom.clone(),
    })
}

fn fixed_fee(fee: FixedFee, cfg: &ChainCfg) -> Result<Fee, ClientError> {
    let amount = Coin {
        denom: denom(cfg)?,
        amount: fee.amount.into(),
    };
    Ok(Fee::from_amount_and_gas(amount, fee.gas_limit))
}

#[allow(deprecated)]
async fn simulate_gas_fee(
    client: &HttpClient,
    tx: &tx::Body,
    account: &BaseAccount,
    signer: &Identity,
    cfg: &ChainCfg,
) -> Result<Fee, ClientError> {
    let denom = denom(cfg)?;

    let signer_info = SignerInfo::single_direct(Some(signer.public_key()), account.sequence);
    let auth_info = signer_info.auth_info(Fee::from_amount_and_gas(
        Coin {
            denom: denom.clone(),
            amount: 0u64.into(),
        },
        0u64,
    ));

    let sign_doc = SignDoc::new(tx, &auth_info, &chain_id(cfg)?, account.account_number)
        .map_err(ClientError::proto_encoding)?;

    let tx_raw = signer.sign(sign_doc)?;

    let res = abci_query(
        client,
        SimulateRequest {
            tx: None,
            tx_bytes: tx_raw.to_bytes().map_err(ClientError::proto_encoding)?,
        },
        "/cosmos.tx.v1beta1.Service/Simulate",
        cfg,
    )
    .await?;

    let gas_info = SimulateResponse::decode(res.value.as_slice())
        .map_err(ClientError::prost_proto_de)?
        .gas_info
        .ok_or(ClientError::MissingGasInfo)?;

    let gas_limit = (gas_info.gas_used as f64 * cfg.gas_adjustment).ceil();
    let amount = Coin {
        denom,
        amount: ((gas_limit * cfg.gas_prices).ceil() as u64).into(),
    };

    Ok(Fee::from_amount_and_gas(amount, gas_limit as u64))
}
