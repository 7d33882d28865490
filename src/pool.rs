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
use ethabi::{Function, Param, ParamType, StateMutability, Token as AbiToken};
use ethers::types::{Address, Bytes, U256};
use serde::Serialize;
use tracing::{info, instrument};

use crate::chain::ChainReader;
use crate::error::SwapError;
use crate::token::{FeeTier, Token};

/// Snapshot of a Uniswap V3 pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolState {
    pub address: Address,
    pub token0: Address,
    pub token1: Address,
    pub fee: u32,
    pub liquidity: U256,
    pub sqrt_price_x96: U256,
    pub tick: i32,
}

fn view_function(name: &str, inputs: Vec<(&str, ParamType)>, outputs: Vec<ParamType>) -> Function {
    Function {
        name: name.to_string(),
        inputs: inputs
            .into_iter()
            .map(|(name, kind)| Param {
                name: name.to_string(),
                kind,
                internal_type: None,
            })
            .collect(),
        outputs: outputs
            .into_iter()
            .map(|kind| Param {
                name: "".to_string(),
                kind,
                internal_type: None,
            })
            .collect(),
        constant: None,
        state_mutability: StateMutability::View,
    }
}

fn get_pool_function() -> Function {
    view_function(
        "getPool",
        vec![
            ("tokenA", ParamType::Address),
            ("tokenB", ParamType::Address),
            ("fee", ParamType::Uint(24)),
        ],
        vec![ParamType::Address],
    )
}

fn slot0_function() -> Function {
    view_function(
        "slot0",
        vec![],
        vec![
            ParamType::Uint(160),
            ParamType::Int(24),
            ParamType::Uint(16),
            ParamType::Uint(16),
            ParamType::Uint(16),
            ParamType::Uint(8),
            ParamType::Bool,
        ],
    )
}

async fn read(
    reader: &dyn ChainReader,
    to: Address,
    function: Function,
    args: &[AbiToken],
) -> Result<Vec<AbiToken>> {
    let input = function
        .encode_input(args)
        .with_context(|| format!("Failed to encode {} call", function.name))?;
    let output = reader
        .call(to, Bytes::from(input))
        .await
        .with_context(|| format!("Failed to call {}", function.name))?;
    function
        .decode_output(&output)
        .with_context(|| format!("Failed to decode {} result", function.name))
}

fn first_address(tokens: &[AbiToken], what: &str) -> Result<Address> {
    match tokens.first() {
        Some(AbiToken::Address(addr)) => Ok(*addr),
        _ => anyhow::bail!("Unexpected {} result format", what),
    }
}

fn first_uint(tokens: &[AbiToken], what: &str) -> Result<U256> {
    match tokens.first() {
        Some(AbiToken::Uint(val)) => Ok(*val),
        _ => anyhow::bail!("Unexpected {} result format", what),
    }
}

/// Reads the V3 pool for `token_a`/`token_b` at `fee`. `Ok(None)` when the
/// factory has no such pool.
#[instrument(skip(reader, token_a, token_b))]
pub async fn fetch_pool_state(
    reader: &dyn ChainReader,
    factory: Address,
    token_a: &Token,
    token_b: &Token,
    fee: FeeTier,
) -> Result<Option<PoolState>, SwapError> {
    let pool = read(
        reader,
        factory,
        get_pool_function(),
        &[
            AbiToken::Address(token_a.address),
            AbiToken::Address(token_b.address),
            AbiToken::Uint(U256::from(fee.as_u32())),
        ],
    )
    .await
    .and_then(|t| first_address(&t, "getPool"))
    .map_err(SwapError::PoolRead)?;

    if pool.is_zero() {
        info!(
            "No {} / {} pool at fee tier {}",
            token_a.symbol,
            token_b.symbol,
            fee.as_u32()
        );
        return Ok(None);
    }

    // Independent reads; safe to run together.
    let (token0, token1, pool_fee, liquidity, slot0) = tokio::try_join!(
        read(reader, pool, view_function("token0", vec![], vec![ParamType::Address]), &[]),
        read(reader, pool, view_function("token1", vec![], vec![ParamType::Address]), &[]),
        read(reader, pool, view_function("fee", vec![], vec![ParamType::Uint(24)]), &[]),
        read(reader, pool, view_function("liquidity", vec![], vec![ParamType::Uint(128)]), &[]),
        read(reader, pool, slot0_function(), &[]),
    )
    .map_err(SwapError::PoolRead)?;

    let tick = match slot0.get(1) {
        // int24 arrives sign-extended to 256 bits.
        Some(AbiToken::Int(raw)) => raw.low_u32() as i32,
        _ => return Err(SwapError::PoolRead(anyhow::anyhow!("Unexpected slot0 tick format"))),
    };

    let state = PoolState {
        address: pool,
        token0: first_address(&token0, "token0").map_err(SwapError::PoolRead)?,
        token1: first_address(&token1, "token1").map_err(SwapError::PoolRead)?,
        fee: first_uint(&pool_fee, "fee")
            .map_err(SwapError::PoolRead)?
            .low_u32(),
        liquidity: first_uint(&liquidity, "liquidity").map_err(SwapError::PoolRead)?,
        sqrt_price_x96: first_uint(&slot0, "slot0").map_err(SwapError::PoolRead)?,
        tick,
    };

    info!(
        "Pool {:?}: liquidity={}, sqrtPriceX96={}, tick={}",
        state.address, state.liquidity, state.sqrt_price_x96, state.tick
    );

    Ok(Some(state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use crate::chain::FeeQuote;

    const POOL: [u8; 20] = [0x88; 20];

    /// Answers eth_calls by function selector.
    struct SelectorReader {
        responses: HashMap<[u8; 4], Vec<u8>>,
        calls: Mutex<Vec<(Address, [u8; 4])>>,
    }

    impl SelectorReader {
        fn new() -> Self {
            Self {
                responses: HashMap::new(),
                calls: Mutex::new(vec![]),
            }
        }

        fn respond(mut self, function: Function, output: Vec<AbiToken>) -> Self {
            self.responses
                .insert(function.short_signature(), ethabi::encode(&output));
            self
        }
    }

    #[async_trait]
    impl ChainReader for SelectorReader {
        async fn fee_quote(&self) -> Result<FeeQuote> {
            Ok(FeeQuote::default())
        }

        async fn call(&self, to: Address, data: Bytes) -> Result<Bytes> {
            let mut selector = [0u8; 4];
            selector.copy_from_slice(&data[..4]);
            self.calls.lock().unwrap().push((to, selector));
            self.responses
                .get(&selector)
                .cloned()
                .map(Bytes::from)
                .ok_or_else(|| anyhow::anyhow!("execution reverted"))
        }
    }

    fn pair() -> (Token, Token) {
        (
            Token::new(1, Address::repeat_byte(0xa0), 6, "USDC", "USD//C"),
            Token::new(1, Address::repeat_byte(0xc0), 18, "WETH", "Wrapped Ether"),
        )
    }

    fn tick_word(tick: i64) -> U256 {
        if tick >= 0 {
            U256::from(tick as u64)
        } else {
            U256::MAX - U256::from((-tick - 1) as u64)
        }
    }

    #[tokio::test]
    async fn reconstructs_pool_state() {
        let (usdc, weth) = pair();
        let pool = Address::from(POOL);
        let reader = SelectorReader::new()
            .respond(get_pool_function(), vec![AbiToken::Address(pool)])
            .respond(
                view_function("token0", vec![], vec![ParamType::Address]),
                vec![AbiToken::Address(usdc.address)],
            )
            .respond(
                view_function("token1", vec![], vec![ParamType::Address]),
                vec![AbiToken::Address(weth.address)],
            )
            .respond(
                view_function("fee", vec![], vec![ParamType::Uint(24)]),
                vec![AbiToken::Uint(U256::from(3000u64))],
            )
            .respond(
                view_function("liquidity", vec![], vec![ParamType::Uint(128)]),
                vec![AbiToken::Uint(U256::from(42_000_000_000u64))],
            )
            .respond(
                slot0_function(),
                vec![
                    AbiToken::Uint(U256::from(1u64) << 96),
                    AbiToken::Int(tick_word(-201_234)),
                    AbiToken::Uint(U256::zero()),
                    AbiToken::Uint(U256::one()),
                    AbiToken::Uint(U256::one()),
                    AbiToken::Uint(U256::zero()),
                    AbiToken::Bool(true),
                ],
            );

        let state = fetch_pool_state(&reader, Address::repeat_byte(0x1f), &usdc, &weth, FeeTier::Medium)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(state.address, pool);
        assert_eq!(state.token0, usdc.address);
        assert_eq!(state.token1, weth.address);
        assert_eq!(state.fee, 3000);
        assert_eq!(state.liquidity, U256::from(42_000_000_000u64));
        assert_eq!(state.sqrt_price_x96, U256::from(1u64) << 96);
        assert_eq!(state.tick, -201_234);

        let calls = reader.calls.lock().unwrap();
        assert_eq!(calls.len(), 6);
        assert_eq!(calls[0].0, Address::repeat_byte(0x1f));
        assert!(calls[1..].iter().all(|(to, _)| *to == pool));
    }

    #[tokio::test]
    async fn zero_address_means_no_pool() {
        let (usdc, weth) = pair();
        let reader = SelectorReader::new()
            .respond(get_pool_function(), vec![AbiToken::Address(Address::zero())]);

        let state = fetch_pool_state(&reader, Address::repeat_byte(0x1f), &usdc, &weth, FeeTier::Low)
            .await
            .unwrap();
        assert!(state.is_none());
        assert_eq!(reader.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_pool_read_is_reported() {
        let (usdc, weth) = pair();
        let reader = SelectorReader::new()
            .respond(get_pool_function(), vec![AbiToken::Address(Address::from(POOL))]);

        let err = fetch_pool_state(&reader, Address::repeat_byte(0x1f), &usdc, &weth, FeeTier::Medium)
            .await
            .unwrap_err();
        assert!(matches!(err, SwapError::PoolRead(_)));
    }
}
