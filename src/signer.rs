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
    providers::{Http, PendingTransaction, Provider},
    types::{transaction::eip2718::TypedTransaction, TransactionReceipt, TxHash},
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument};

/// Custody boundary: signs and broadcasts transactions on our behalf. Key
/// material never crosses this interface.
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    /// Signs and broadcasts `tx`. `Ok(None)` means the custodian accepted the
    /// request but returned no transaction reference.
    async fn send_transaction(&self, tx: TypedTransaction) -> Result<Option<TxHash>>;

    /// Waits for `tx_hash` to be mined. `Ok(None)` when the transaction was
    /// dropped.
    async fn confirm(&self, tx_hash: TxHash) -> Result<Option<TransactionReceipt>>;
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    result: Option<TxHash>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// Remote custody gateway exposing `eth_sendTransaction` behind bearer auth.
/// Confirmations are read from the chain RPC.
#[derive(Clone)]
pub struct RpcSigner {
    client: reqwest::Client,
    endpoint: String,
    api_token: String,
    chain: Arc<Provider<Http>>,
}

impl RpcSigner {
    pub fn new(
        endpoint: impl Into<String>,
        api_token: impl Into<String>,
        chain: Arc<Provider<Http>>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_token: api_token.into(),
            chain,
        }
    }
}

#[async_trait]
impl TransactionSigner for RpcSigner {
    #[instrument(skip(self, tx))]
    async fn send_transaction(&self, tx: TypedTransaction) -> Result<Option<TxHash>> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_sendTransaction",
            "params": [tx],
        });

        info!(
            "Sending transaction to custody gateway: to={:?}, from={:?}",
            tx.to(),
            tx.from()
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_token)
            .json(&payload)
            .send()
            .await
            .context("Failed to send request to custody gateway")?;

        if !response.status().is_success() {
            anyhow::bail!("Custody gateway returned error: {}", response.status());
        }

        let body: JsonRpcResponse = response
            .json()
            .await
            .context("Failed to parse custody gateway response")?;

        if let Some(err) = body.error {
            anyhow::bail!("Custody gateway rejected transaction ({}): {}", err.code, err.message);
        }

        Ok(body.result)
    }

    #[instrument(skip(self))]
    async fn confirm(&self, tx_hash: TxHash) -> Result<Option<TransactionReceipt>> {
        info!("Waiting for confirmation of {:?}", tx_hash);
        PendingTransaction::new(tx_hash, &*self.chain)
            .confirmations(1)
            .await
            .with_context(|| format!("Failed to await receipt for {:?}", tx_hash))
    }
}
