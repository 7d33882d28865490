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
use ethers::types::{Address, Bytes, U256};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, instrument, warn};

use crate::amount::RawAmount;
use crate::error::SwapError;
use crate::token::Token;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeType {
    ExactInput,
    ExactOutput,
}

impl TradeType {
    fn as_query(self) -> &'static str {
        match self {
            TradeType::ExactInput => "exactIn",
            TradeType::ExactOutput => "exactOut",
        }
    }
}

/// Which router contract the returned call data must target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwapVariant {
    SwapRouter02,
    UniversalRouter,
}

impl SwapVariant {
    fn as_query(self) -> &'static str {
        match self {
            SwapVariant::SwapRouter02 => "SWAP_ROUTER_02",
            SwapVariant::UniversalRouter => "UNIVERSAL_ROUTER",
        }
    }
}

/// Slippage as a ratio, e.g. 1% is 100/10000.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SlippageTolerance {
    pub numerator: u32,
    pub denominator: u32,
}

impl SlippageTolerance {
    pub fn from_bps(bps: u32) -> Self {
        Self {
            numerator: bps,
            denominator: 10_000,
        }
    }

    pub fn as_percent(&self) -> Decimal {
        (Decimal::from(self.numerator) * Decimal::from(100) / Decimal::from(self.denominator))
            .normalize()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteOptions {
    pub recipient: Address,
    pub slippage: SlippageTolerance,
    /// Absolute unix timestamp after which the swap reverts on-chain.
    pub deadline: u64,
    pub variant: SwapVariant,
}

impl RouteOptions {
    /// Options whose deadline is `window_secs` from now.
    pub fn expiring_in(
        recipient: Address,
        slippage: SlippageTolerance,
        window_secs: u64,
        variant: SwapVariant,
    ) -> Self {
        Self {
            recipient,
            slippage,
            deadline: unix_now().saturating_add(window_secs),
            variant,
        }
    }
}

/// Everything the routing collaborator is told about a trade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRequest {
    pub token_in: Token,
    pub token_out: Token,
    pub amount: RawAmount,
    pub trade_type: TradeType,
    pub options: RouteOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MethodParameters {
    pub calldata: Bytes,
    pub value: U256,
}

/// Best execution path found by the routing collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub amount_in: RawAmount,
    /// Estimated output in raw units of the output token.
    pub quote: RawAmount,
    pub method_parameters: Option<MethodParameters>,
    pub gas_use_estimate: Option<U256>,
}

/// Path search across pools is delegated entirely to the implementor.
#[async_trait]
pub trait RouteProvider: Send + Sync {
    /// `Ok(None)` means no viable path exists.
    async fn route(&self, request: &RouteRequest) -> Result<Option<Route>>;
}

/// Resolves a route for `raw_amount_in`. An absent route is terminal.
pub async fn find_route(
    provider: &dyn RouteProvider,
    token_in: &Token,
    token_out: &Token,
    raw_amount_in: RawAmount,
    trade_type: TradeType,
    options: RouteOptions,
) -> Result<Route, SwapError> {
    let request = RouteRequest {
        token_in: token_in.clone(),
        token_out: token_out.clone(),
        amount: raw_amount_in,
        trade_type,
        options,
    };

    info!(
        "Requesting route: {} -> {} (raw amount: {}, slippage: {}%, deadline: {})",
        token_in.symbol,
        token_out.symbol,
        raw_amount_in,
        request.options.slippage.as_percent(),
        request.options.deadline
    );

    match provider.route(&request).await.map_err(SwapError::Routing)? {
        Some(route) => {
            info!(
                "Route found: quote={}, has_calldata={}",
                route.quote,
                route.method_parameters.is_some()
            );
            Ok(route)
        }
        None => {
            warn!("No route found for {} -> {}", token_in.symbol, token_out.symbol);
            Err(SwapError::NoRouteFound {
                token_in: token_in.symbol.clone(),
                token_out: token_out.symbol.clone(),
            })
        }
    }
}

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Routing collaborator reached over the Uniswap-style `/quote` HTTP API.
#[derive(Clone)]
pub struct HttpRouteProvider {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteResponse {
    quote: Option<String>,
    amount: Option<String>,
    method_parameters: Option<QuoteMethodParameters>,
    gas_use_estimate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QuoteMethodParameters {
    calldata: String,
    value: String,
}

impl HttpRouteProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn quote_url(&self) -> String {
        format!("{}/quote", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl RouteProvider for HttpRouteProvider {
    #[instrument(skip(self, request))]
    async fn route(&self, request: &RouteRequest) -> Result<Option<Route>> {
        let url = self.quote_url();
        info!("Fetching route from routing API: {}", url);

        let query = [
            ("tokenInAddress", format!("{:?}", request.token_in.address)),
            ("tokenInChainId", request.token_in.chain_id.to_string()),
            ("tokenOutAddress", format!("{:?}", request.token_out.address)),
            ("tokenOutChainId", request.token_out.chain_id.to_string()),
            ("amount", request.amount.to_string()),
            ("type", request.trade_type.as_query().to_string()),
            ("recipient", format!("{:?}", request.options.recipient)),
            (
                "slippageTolerance",
                request.options.slippage.as_percent().to_string(),
            ),
            ("deadline", request.options.deadline.to_string()),
            ("swapType", request.options.variant.as_query().to_string()),
        ];

        let response = self
            .client
            .get(&url)
            .query(&query)
            .send()
            .await
            .context("Failed to send request to routing API")?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            anyhow::bail!("Routing API returned error: {}", response.status());
        }

        let body: QuoteResponse = response
            .json()
            .await
            .context("Failed to parse routing API response")?;

        parse_quote_response(body, request.amount)
    }
}

fn parse_quote_response(body: QuoteResponse, requested: RawAmount) -> Result<Option<Route>> {
    let quote = match body.quote {
        Some(q) => U256::from_dec_str(&q).context("Invalid quote amount")?,
        None => return Ok(None),
    };

    let amount_in = match body.amount {
        Some(a) => U256::from_dec_str(&a).context("Invalid input amount")?,
        None => requested,
    };

    let method_parameters = body
        .method_parameters
        .map(|p| -> Result<MethodParameters> {
            let calldata = hex::decode(strip_hex_prefix(&p.calldata))
                .context("Invalid calldata hex")?;
            Ok(MethodParameters {
                calldata: Bytes::from(calldata),
                value: parse_hex_u256(&p.value).context("Invalid value hex")?,
            })
        })
        .transpose()?;

    let gas_use_estimate = body
        .gas_use_estimate
        .map(|g| U256::from_dec_str(&g))
        .transpose()
        .context("Invalid gas estimate")?;

    Ok(Some(Route {
        amount_in,
        quote,
        method_parameters,
        gas_use_estimate,
    }))
}

fn strip_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x").unwrap_or(s)
}

fn parse_hex_u256(s: &str) -> Result<U256> {
    let digits = strip_hex_prefix(s.trim());
    if digits.is_empty() {
        return Ok(U256::zero());
    }
    U256::from_str_radix(digits, 16).map_err(|e| anyhow::anyhow!("{:?}: {:?}", s, e))
}
