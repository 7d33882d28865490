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

//! Sequences one swap: resolve route, approve, assemble, submit.
//!
//! Every step runs strictly after the previous one resolves and any failure
//! ends the run. Nothing is retried here.

use ethers::types::TxHash;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

use crate::amount::display_trade;
use crate::approval::{ensure_approval, ApprovalReceipt};
use crate::assembler::{SwapTransaction, TransactionAssembler};
use crate::chain::{ChainReader, EthersChainReader};
use crate::config::SwapConfig;
use crate::error::SwapError;
use crate::route::{
    find_route, HttpRouteProvider, Route, RouteOptions, RouteProvider, SlippageTolerance,
    SwapVariant, TradeType,
};
use crate::signer::{RpcSigner, TransactionSigner};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PipelineStage {
    Idle,
    RouteResolved,
    Approved,
    Assembled,
    Submitted,
    Succeeded,
    Failed,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Everything produced by a successful run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapReceipt {
    pub tx_hash: TxHash,
    pub approval: ApprovalReceipt,
    pub transaction: SwapTransaction,
    pub route: Route,
    pub trade: String,
}

/// Terminal result of one run. Never mutated after the driver returns it.
#[derive(Debug)]
pub enum SwapOutcome {
    Succeeded {
        receipt: SwapReceipt,
        history: Vec<PipelineStage>,
    },
    Failed {
        /// Last stage reached before the failure.
        failed_at: PipelineStage,
        error: SwapError,
        history: Vec<PipelineStage>,
    },
}

impl SwapOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SwapOutcome::Succeeded { .. })
    }

    pub fn history(&self) -> &[PipelineStage] {
        match self {
            SwapOutcome::Succeeded { history, .. } | SwapOutcome::Failed { history, .. } => history,
        }
    }

    pub fn final_stage(&self) -> PipelineStage {
        match self {
            SwapOutcome::Succeeded { .. } => PipelineStage::Succeeded,
            SwapOutcome::Failed { .. } => PipelineStage::Failed,
        }
    }

    pub fn into_result(self) -> Result<SwapReceipt, SwapError> {
        match self {
            SwapOutcome::Succeeded { receipt, .. } => Ok(receipt),
            SwapOutcome::Failed { error, .. } => Err(error),
        }
    }
}

/// Serializable view of a [`SwapOutcome`] for tool and CLI output.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapReport {
    pub status: PipelineStage,
    pub history: Vec<PipelineStage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<SwapReceipt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<PipelineStage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&SwapOutcome> for SwapReport {
    fn from(outcome: &SwapOutcome) -> Self {
        match outcome {
            SwapOutcome::Succeeded { receipt, history } => SwapReport {
                status: PipelineStage::Succeeded,
                history: history.clone(),
                receipt: Some(receipt.clone()),
                failed_at: None,
                error: None,
            },
            SwapOutcome::Failed {
                failed_at,
                error,
                history,
            } => SwapReport {
                status: PipelineStage::Failed,
                history: history.clone(),
                receipt: None,
                failed_at: Some(*failed_at),
                error: Some(error.to_string()),
            },
        }
    }
}

struct StageTracker {
    history: Vec<PipelineStage>,
}

impl StageTracker {
    fn new() -> Self {
        Self {
            history: vec![PipelineStage::Idle],
        }
    }

    fn current(&self) -> PipelineStage {
        self.history
            .last()
            .copied()
            .unwrap_or(PipelineStage::Idle)
    }

    fn advance(&mut self, stage: PipelineStage) {
        debug!("Pipeline stage: {} -> {}", self.current(), stage);
        self.history.push(stage);
    }
}

/// Runs the configured swap against injected collaborators.
#[derive(Clone)]
pub struct ExecutionDriver {
    config: Arc<SwapConfig>,
    router: Arc<dyn RouteProvider>,
    chain: Arc<dyn ChainReader>,
    signer: Arc<dyn TransactionSigner>,
    assembler: TransactionAssembler,
}

impl ExecutionDriver {
    pub fn new(
        config: Arc<SwapConfig>,
        router: Arc<dyn RouteProvider>,
        chain: Arc<dyn ChainReader>,
        signer: Arc<dyn TransactionSigner>,
    ) -> Self {
        let assembler = TransactionAssembler::new(
            config.swap_router,
            config.chain_id,
            config.fee_policy.clone(),
        );
        Self {
            config,
            router,
            chain,
            signer,
            assembler,
        }
    }

    /// Wires the HTTP routing API, the chain RPC and the custody gateway
    /// named in `config`.
    pub fn connect(config: Arc<SwapConfig>) -> anyhow::Result<Self> {
        let chain = EthersChainReader::new(&config.rpc_url)?;
        let signer = RpcSigner::new(
            config.signer_rpc_url.clone(),
            config.signer_api_token.clone(),
            chain.provider(),
        );
        let router = HttpRouteProvider::new(config.routing_api_url.clone());

        info!(
            "Connected collaborators: rpc={}, routing={}, signer={}",
            config.rpc_url, config.routing_api_url, config.signer_rpc_url
        );

        Ok(Self::new(
            config,
            Arc::new(router),
            Arc::new(chain),
            Arc::new(signer),
        ))
    }

    pub fn config(&self) -> &SwapConfig {
        &self.config
    }

    pub fn chain(&self) -> Arc<dyn ChainReader> {
        self.chain.clone()
    }

    /// Same collaborators, different configuration.
    pub fn with_config(&self, config: Arc<SwapConfig>) -> Self {
        Self::new(
            config,
            self.router.clone(),
            self.chain.clone(),
            self.signer.clone(),
        )
    }

    /// Executes exactly one swap attempt.
    #[instrument(skip(self), fields(token_in = %self.config.token_in.symbol, token_out = %self.config.token_out.symbol))]
    pub async fn execute(&self) -> SwapOutcome {
        let mut tracker = StageTracker::new();

        match self.run(&mut tracker).await {
            Ok(receipt) => {
                tracker.advance(PipelineStage::Succeeded);
                info!("Swap successful: {} ({:?})", receipt.trade, receipt.tx_hash);
                SwapOutcome::Succeeded {
                    receipt,
                    history: tracker.history,
                }
            }
            Err(err) => {
                let failed_at = tracker.current();
                tracker.advance(PipelineStage::Failed);
                error!("Swap failed after {}: {}", failed_at, err);
                SwapOutcome::Failed {
                    failed_at,
                    error: err,
                    history: tracker.history,
                }
            }
        }
    }

    async fn run(&self, tracker: &mut StageTracker) -> Result<SwapReceipt, SwapError> {
        let config = &self.config;
        let sender = config.signer_address;

        info!("Token in -> {}", config.token_in);
        info!("Token out -> {}", config.token_out);

        let raw_amount_in = config.raw_amount_in()?;

        let options = RouteOptions::expiring_in(
            sender,
            SlippageTolerance::from_bps(config.slippage_bps),
            config.deadline_secs,
            SwapVariant::SwapRouter02,
        );
        let route = find_route(
            self.router.as_ref(),
            &config.token_in,
            &config.token_out,
            raw_amount_in,
            TradeType::ExactInput,
            options,
        )
        .await?;
        tracker.advance(PipelineStage::RouteResolved);

        let approval = ensure_approval(
            self.signer.as_ref(),
            &config.token_in,
            config.swap_router,
            raw_amount_in,
            sender,
        )
        .await?;
        tracker.advance(PipelineStage::Approved);

        // Fetched only now so the quote is as fresh as possible at submission.
        let fee_quote = self.chain.fee_quote().await.map_err(SwapError::FeeData)?;
        let transaction = self.assembler.assemble(&route, &fee_quote, sender)?;
        tracker.advance(PipelineStage::Assembled);

        tracker.advance(PipelineStage::Submitted);
        let tx_hash = self
            .signer
            .send_transaction(transaction.to_typed())
            .await
            .map_err(|e| SwapError::SubmissionFailed(format!("{:#}", e)))?
            .ok_or_else(|| {
                SwapError::SubmissionFailed("signer returned no transaction reference".to_string())
            })?;

        info!("Tx response -> {:?}", tx_hash);

        let trade = display_trade(
            route.amount_in,
            &config.token_in,
            route.quote,
            &config.token_out,
        );

        Ok(SwapReceipt {
            tx_hash,
            approval,
            transaction,
            route,
            trade,
        })
    }
}
