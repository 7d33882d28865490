// Copyright 2025 chenjjiaa
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use ethabi::{Function, Param, ParamType, StateMutability, Token as AbiToken};
use ethers::types::{Address, Bytes, Eip1559TransactionRequest, TxHash, U64};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::amount::RawAmount;
use crate::error::SwapError;
use crate::signer::TransactionSigner;
use crate::token::Token;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalReceipt {
    pub tx_hash: TxHash,
    pub block_number: Option<U64>,
}

fn create_approve_function() -> Function {
    Function {
        name: "approve".to_string(),
        inputs: vec![
            Param {
                name: "spender".to_string(),
                kind: ParamType::Address,
                internal_type: None,
            },
            Param {
                name: "amount".to_string(),
                kind: ParamType::Uint(256),
                internal_type: None,
            },
        ],
        outputs: vec![Param {
            name: "".to_string(),
            kind: ParamType::Bool,
            internal_type: None,
        }],
        constant: None,
        state_mutability: StateMutability::NonPayable,
    }
}

pub fn encode_approve(spender: Address, amount: RawAmount) -> Result<Bytes, SwapError> {
    create_approve_function()
        .encode_input(&[AbiToken::Address(spender), AbiToken::Uint(amount)])
        .map(Bytes::from)
        .map_err(|e| SwapError::ApprovalFailed(format!("Failed to encode approve call: {}", e)))
}

/// Authorizes `spender` to move `raw_amount_in` of `token` from `owner` and
/// waits for the approval to be mined.
///
/// Always sends a fresh approval; the existing allowance is not consulted.
#[instrument(skip(signer, token), fields(token = %token.symbol))]
pub async fn ensure_approval(
    signer: &dyn TransactionSigner,
    token: &Token,
    spender: Address,
    raw_amount_in: RawAmount,
    owner: Address,
) -> Result<ApprovalReceipt, SwapError> {
    let data = encode_approve(spender, raw_amount_in)?;
    let request = Eip1559TransactionRequest::new()
        .chain_id(U64::from(token.chain_id))
        .from(owner)
        .to(token.address)
        .data(data);

    info!(
        "Approving {:?} to spend {} raw units of {}",
        spender, raw_amount_in, token.symbol
    );

    let tx_hash = signer
        .send_transaction(request.into())
        .await
        .map_err(|e| {
            SwapError::ApprovalFailed(format!(
                "approve({:?}, {}) on {} was rejected: {:#}",
                spender, raw_amount_in, token.symbol, e
            ))
        })?
        .ok_or_else(|| {
            SwapError::ApprovalFailed(format!(
                "approve on {} returned no transaction reference",
                token.symbol
            ))
        })?;

    let receipt = signer
        .confirm(tx_hash)
        .await
        .map_err(|e| {
            SwapError::ApprovalFailed(format!("could not confirm approval {:?}: {:#}", tx_hash, e))
        })?
        .ok_or_else(|| {
            SwapError::ApprovalFailed(format!("approval {:?} was dropped", tx_hash))
        })?;

    if receipt.status != Some(U64::from(1u64)) {
        warn!("Approval {:?} reverted", tx_hash);
        return Err(SwapError::ApprovalFailed(format!(
            "approval {:?} reverted",
            tx_hash
        )));
    }

    info!(
        "Approval confirmed: {:?} in block {:?}",
        tx_hash, receipt.block_number
    );

    Ok(ApprovalReceipt {
        tx_hash,
        block_number: receipt.block_number,
    })
}
