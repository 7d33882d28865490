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

use ethers::types::{
    transaction::eip2718::TypedTransaction, Address, Bytes, Eip1559TransactionRequest, U256, U64,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::chain::FeeQuote;
use crate::error::SwapError;
use crate::route::Route;

/// Deterministic EIP-1559 fee policy. No gas estimation happens per
/// transaction: the limit is a fixed ceiling and the max fee is a multiple of
/// the last base fee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeePolicy {
    pub base_fee_multiplier: u64,
    pub max_priority_fee_per_gas: U256,
    /// Used as `maxFeePerGas` when the node reports no base fee.
    pub fallback_max_fee_per_gas: U256,
    pub gas_limit: U256,
}

impl Default for FeePolicy {
    fn default() -> Self {
        Self {
            base_fee_multiplier: 2,
            max_priority_fee_per_gas: U256::from(100_000_000u64), // 0.1 gwei
            fallback_max_fee_per_gas: U256::from(1_000_000_000u64), // 1 gwei
            gas_limit: U256::from(400_000u64),
        }
    }
}

impl FeePolicy {
    pub fn max_fee_per_gas(&self, quote: &FeeQuote) -> U256 {
        match quote.base_fee_per_gas {
            Some(base_fee) if !base_fee.is_zero() => {
                base_fee.saturating_mul(U256::from(self.base_fee_multiplier))
            }
            _ => self.fallback_max_fee_per_gas,
        }
    }
}

/// Fully assembled outbound swap transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapTransaction {
    pub chain_id: u64,
    pub from: Address,
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    pub max_fee_per_gas: U256,
    pub max_priority_fee_per_gas: U256,
    pub gas_limit: U256,
}

impl SwapTransaction {
    pub fn to_typed(&self) -> TypedTransaction {
        Eip1559TransactionRequest::new()
            .chain_id(U64::from(self.chain_id))
            .from(self.from)
            .to(self.to)
            .data(self.data.clone())
            .value(self.value)
            .max_fee_per_gas(self.max_fee_per_gas)
            .max_priority_fee_per_gas(self.max_priority_fee_per_gas)
            .gas(self.gas_limit)
            .into()
    }
}

/// Builds swap transactions aimed at a fixed router contract.
#[derive(Debug, Clone)]
pub struct TransactionAssembler {
    router: Address,
    chain_id: u64,
    policy: FeePolicy,
}

impl TransactionAssembler {
    pub fn new(router: Address, chain_id: u64, policy: FeePolicy) -> Self {
        Self {
            router,
            chain_id,
            policy,
        }
    }

    /// Combines the route's call data and value with the fee policy applied
    /// to `fee_quote`.
    pub fn assemble(
        &self,
        route: &Route,
        fee_quote: &FeeQuote,
        sender: Address,
    ) -> Result<SwapTransaction, SwapError> {
        let parameters = route
            .method_parameters
            .as_ref()
            .filter(|p| !p.calldata.is_empty())
            .ok_or(SwapError::MissingRouteParameters)?;

        let max_fee_per_gas = self.policy.max_fee_per_gas(fee_quote);
        let max_priority_fee_per_gas = self.policy.max_priority_fee_per_gas;

        // maxFeePerGas ignores the suggested gas price; surface spikes instead of repricing.
        if let Some(gas_price) = fee_quote.gas_price {
            if gas_price > max_fee_per_gas {
                warn!(
                    "Suggested gas price {} exceeds max fee per gas {}; inclusion may be delayed",
                    gas_price, max_fee_per_gas
                );
            }
        }
        if max_priority_fee_per_gas > max_fee_per_gas {
            warn!(
                "Priority fee {} exceeds max fee per gas {}",
                max_priority_fee_per_gas, max_fee_per_gas
            );
        }

        let tx = SwapTransaction {
            chain_id: self.chain_id,
            from: sender,
            to: self.router,
            data: parameters.calldata.clone(),
            value: parameters.value,
            max_fee_per_gas,
            max_priority_fee_per_gas,
            gas_limit: self.policy.gas_limit,
        };

        info!(
            "Assembled swap transaction: to={:?}, from={:?}, value={}, data_len={}, max_fee={}, priority_fee={}, gas_limit={}",
            tx.to,
            tx.from,
            tx.value,
            tx.data.len(),
            tx.max_fee_per_gas,
            tx.max_priority_fee_per_gas,
            tx.gas_limit
        );

        Ok(tx)
    }
}
