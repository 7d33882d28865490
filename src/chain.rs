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

use anyhow::{Context, Result};
use async_trait::async_trait;
use ethers::{
    providers::{Http, Middleware, Provider},
    types::{Address, BlockNumber, Bytes, TransactionRequest, U256},
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::amount::to_display_amount;

/// Network fee snapshot, in wei. Read fresh for every swap and never cached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeQuote {
    /// Base fee of the latest block, absent on pre-London chains.
    pub base_fee_per_gas: Option<U256>,
    /// Legacy `eth_gasPrice` suggestion.
    pub gas_price: Option<U256>,
}

/// Read-only access to the chain RPC.
#[async_trait]
pub trait ChainReader: Send + Sync {
    async fn fee_quote(&self) -> Result<FeeQuote>;

    /// Executes an `eth_call` against `to` at the latest block.
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes>;
}

#[derive(Clone)]
pub struct EthersChainReader {
    provider: Arc<Provider<Http>>,
}

impl EthersChainReader {
    pub fn new(rpc_url: &str) -> Result<Self> {
        let provider =
            Provider::<Http>::try_from(rpc_url).context("Failed to create HTTP provider")?;
        Ok(Self::from_provider(Arc::new(provider)))
    }

    pub fn from_provider(provider: Arc<Provider<Http>>) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> Arc<Provider<Http>> {
        self.provider.clone()
    }
}

#[async_trait]
impl ChainReader for EthersChainReader {
    #[instrument(skip(self))]
    async fn fee_quote(&self) -> Result<FeeQuote> {
        let block = self
            .provider
            .get_block(BlockNumber::Latest)
            .await
            .context("Failed to fetch latest block")?;
        let base_fee_per_gas = block.and_then(|b| b.base_fee_per_gas);

        let gas_price = self
            .provider
            .get_gas_price()
            .await
            .context("Failed to get gas price")?;

        let quote = FeeQuote {
            base_fee_per_gas,
            gas_price: Some(gas_price),
        };

        info!(
            "Current baseFeePerGas: {} wei = {} gwei",
            quote.base_fee_per_gas.unwrap_or_default(),
            to_display_amount(quote.base_fee_per_gas.unwrap_or_default(), 9)
        );
        info!(
            "Suggested gasPrice: {} wei = {} gwei",
            gas_price,
            to_display_amount(gas_price, 9)
        );

        Ok(quote)
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes> {
        let tx_request = TransactionRequest::new().to(to).data(data);
        self.provider
            .call(&tx_request.into(), None)
            .await
            .with_context(|| format!("eth_call to {:?} failed", to))
    }
}
