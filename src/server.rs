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

use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};

use crate::amount::parse_amount;
use crate::config::{validate_amount, validate_slippage_bps, SwapConfig};
use crate::driver::{ExecutionDriver, SwapReport};
use crate::pool::{fetch_pool_state, PoolState};
use crate::token::FeeTier;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExecuteSwapInput {
    /// Amount of the input token in human-readable format (e.g., "1.5"). Defaults to the configured amount
    #[serde(default)]
    pub amount: Option<String>,
    /// Slippage tolerance in basis points (100 = 1%). Defaults to the configured slippage
    #[serde(default)]
    pub slippage_bps: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GetPoolInfoInput {
    /// Pool fee tier (100, 500, 3000 or 10000). Defaults to the configured fee tier
    #[serde(default)]
    pub fee: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PoolInfoOutput {
    pub token_in: String,
    pub token_out: String,
    pub fee: u32,
    /// Null when no pool exists at this fee tier
    pub pool: Option<PoolState>,
}

#[derive(Clone)]
pub struct SwapMcpServer {
    driver: ExecutionDriver,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl SwapMcpServer {
    pub fn new(driver: ExecutionDriver) -> Self {
        let tool_router = Self::tool_router();
        info!("Tool router initialized");

        Self {
            driver,
            tool_router,
        }
    }

    #[tool(
        description = "Execute one token swap for the configured pair: find a route, approve the router, and submit the swap through the custody signer. Returns the pipeline report."
    )]
    #[instrument(skip(self))]
    async fn execute_swap(
        &self,
        params: Parameters<ExecuteSwapInput>,
    ) -> Result<CallToolResult, McpError> {
        info!("execute_swap called with params: {:?}", params.0);
        let config = self.apply_overrides(params.0)?;

        let outcome = self.driver.with_config(Arc::new(config)).execute().await;
        let report = SwapReport::from(&outcome);

        info!("Swap pipeline finished, serializing report");
        let json_result = serde_json::to_string_pretty(&report).map_err(|e| {
            McpError::internal_error(format!("Error serializing result: {}", e), None)
        })?;

        if outcome.is_success() {
            Ok(CallToolResult::success(vec![Content::text(json_result)]))
        } else {
            Ok(CallToolResult::error(vec![Content::text(json_result)]))
        }
    }

    #[tool(description = "Read the Uniswap V3 pool state (tokens, fee, liquidity, price, tick) for the configured token pair")]
    #[instrument(skip(self))]
    async fn get_pool_info(
        &self,
        params: Parameters<GetPoolInfoInput>,
    ) -> Result<CallToolResult, McpError> {
        info!("get_pool_info called with params: {:?}", params.0);
        let config = self.driver.config();

        let fee = match params.0.fee {
            Some(raw) => FeeTier::try_from(raw).map_err(|e| McpError::invalid_params(e, None))?,
            None => config.pool_fee,
        };

        let chain = self.driver.chain();
        let pool = fetch_pool_state(
            chain.as_ref(),
            config.v3_factory,
            &config.token_in,
            &config.token_out,
            fee,
        )
        .await
        .map_err(|e| McpError::internal_error(format!("Failed to read pool: {}", e), None))?;

        let result = PoolInfoOutput {
            token_in: config.token_in.symbol.clone(),
            token_out: config.token_out.symbol.clone(),
            fee: fee.as_u32(),
            pool,
        };

        info!("Pool query completed, serializing result");
        let json_result = serde_json::to_string_pretty(&result).map_err(|e| {
            McpError::internal_error(format!("Error serializing result: {}", e), None)
        })?;

        Ok(CallToolResult::success(vec![Content::text(json_result)]))
    }

    fn apply_overrides(&self, input: ExecuteSwapInput) -> Result<SwapConfig, McpError> {
        let mut config = self.driver.config().clone();

        if let Some(amount) = input.amount {
            let amount = parse_amount(&amount)
                .map_err(|e| McpError::invalid_params(e.to_string(), None))?;
            validate_amount(amount, &config.token_in)
                .map_err(|e| McpError::invalid_params(e.to_string(), None))?;
            config.amount_in = amount;
        }

        if let Some(slippage_bps) = input.slippage_bps {
            validate_slippage_bps(slippage_bps)
                .map_err(|e| McpError::invalid_params(e.to_string(), None))?;
            config.slippage_bps = slippage_bps;
        }

        Ok(config)
    }
}

#[tool_handler]
impl ServerHandler for SwapMcpServer {
    fn get_info(&self) -> ServerInfo {
        let tools = self.tool_router.list_all();
        info!("get_info called, router has {} tools", tools.len());
        for tool in &tools {
            info!(
                "Tool registered: {} - {}",
                tool.name,
                tool.description.as_deref().unwrap_or("")
            );
        }
        ServerInfo {
            instructions: Some(
                "Uniswap swap executor: runs one approve-then-swap per call and inspects V3 pools"
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
