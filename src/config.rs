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

use ethers::types::{Address, U256};
use rust_decimal::Decimal;
use std::env;
use std::fmt::Display;
use std::net::IpAddr;
use std::str::FromStr;

use crate::amount::{self, RawAmount};
use crate::assembler::FeePolicy;
use crate::error::{ConfigError, SwapError};
use crate::token::{FeeTier, Token, USDC_ADDRESS, WETH_ADDRESS};

pub const DEFAULT_RPC_URL: &str = "https://ethereum-rpc.publicnode.com";
pub const DEFAULT_ROUTING_API_URL: &str = "https://api.uniswap.org/v1";
/// Uniswap SwapRouter02 on Ethereum mainnet.
pub const SWAP_ROUTER_02_ADDRESS: &str = "0x68b3465833fb72A70ecDF485E0e4C7bD8665Fc45";
pub const UNISWAP_V3_FACTORY: &str = "0x1F98431c8aD98523631AE4a59f267346ea31F984";

const GWEI_DECIMALS: u8 = 9;

/// Static description of the swap, loaded once and shared read-only by every
/// pipeline component.
#[derive(Debug, Clone)]
pub struct SwapConfig {
    pub rpc_url: String,
    pub chain_id: u64,
    /// Custody vault address. Signs, sends and receives the swap.
    pub signer_address: Address,
    pub signer_rpc_url: String,
    pub signer_api_token: String,
    pub routing_api_url: String,
    pub token_in: Token,
    pub token_out: Token,
    /// Human-readable input amount, e.g. `1` for one whole USDC.
    pub amount_in: Decimal,
    pub pool_fee: FeeTier,
    pub slippage_bps: u32,
    pub deadline_secs: u64,
    pub swap_router: Address,
    pub v3_factory: Address,
    pub fee_policy: FeePolicy,
    /// MCP listener address. Port 0 selects stdio.
    pub server_host: IpAddr,
    pub server_port: u16,
}

impl SwapConfig {
    /// Loads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(&lookup);

        let chain_id: u64 = vars.parsed_or("CHAIN_ID", 1)?;
        let signer_address = parse_address("SIGNER_ADDRESS", &vars.required("SIGNER_ADDRESS")?)?;

        let token_in = vars.token("TOKEN_IN", chain_id, USDC_ADDRESS, 6, "USDC", "USD//C")?;
        let token_out = vars.token(
            "TOKEN_OUT",
            chain_id,
            WETH_ADDRESS,
            18,
            "WETH",
            "Wrapped Ether",
        )?;
        if token_in == token_out {
            return Err(ConfigError::Invalid {
                key: "TOKEN_OUT_ADDRESS",
                reason: "input and output tokens are the same".to_string(),
            });
        }

        let amount_in = vars.decimal_or("AMOUNT_IN", "1")?;
        validate_amount(amount_in, &token_in)?;

        let pool_fee_raw: u32 = vars.parsed_or("POOL_FEE", FeeTier::default().as_u32())?;
        let pool_fee = FeeTier::try_from(pool_fee_raw).map_err(|reason| ConfigError::Invalid {
            key: "POOL_FEE",
            reason,
        })?;

        let slippage_bps: u32 = vars.parsed_or("SLIPPAGE_BPS", 100)?;
        validate_slippage_bps(slippage_bps)?;

        let deadline_secs: u64 = vars.parsed_or("DEADLINE_SECS", 1800)?;
        if deadline_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "DEADLINE_SECS",
                reason: "must be greater than zero".to_string(),
            });
        }

        let gas_limit: u64 = vars.parsed_or("GAS_LIMIT", 400_000)?;
        if gas_limit == 0 {
            return Err(ConfigError::Invalid {
                key: "GAS_LIMIT",
                reason: "must be greater than zero".to_string(),
            });
        }
        let fee_policy = FeePolicy {
            max_priority_fee_per_gas: vars.gwei_or("MAX_PRIORITY_FEE_GWEI", "0.1")?,
            fallback_max_fee_per_gas: vars.gwei_or("FALLBACK_MAX_FEE_GWEI", "1")?,
            gas_limit: U256::from(gas_limit),
            ..FeePolicy::default()
        };

        Ok(Self {
            rpc_url: vars.or("ETH_RPC_URL", DEFAULT_RPC_URL),
            chain_id,
            signer_address,
            signer_rpc_url: vars.required("SIGNER_RPC_URL")?,
            signer_api_token: vars.required("SIGNER_API_TOKEN")?,
            routing_api_url: vars.or("ROUTING_API_URL", DEFAULT_ROUTING_API_URL),
            token_in,
            token_out,
            amount_in,
            pool_fee,
            slippage_bps,
            deadline_secs,
            swap_router: parse_address(
                "SWAP_ROUTER_ADDRESS",
                &vars.or("SWAP_ROUTER_ADDRESS", SWAP_ROUTER_02_ADDRESS),
            )?,
            v3_factory: parse_address(
                "V3_FACTORY_ADDRESS",
                &vars.or("V3_FACTORY_ADDRESS", UNISWAP_V3_FACTORY),
            )?,
            fee_policy,
            server_host: vars.parsed_or("SERVER_HOST", IpAddr::from([127, 0, 0, 1]))?,
            server_port: vars.parsed_or("SERVER_PORT", 0)?,
        })
    }

    /// Input amount in the input token's smallest unit.
    pub fn raw_amount_in(&self) -> Result<RawAmount, SwapError> {
        amount::to_raw_amount(self.amount_in, self.token_in.decimals)
    }
}

/// A swap amount must be positive and representable in the token's precision.
pub fn validate_amount(amount: Decimal, token: &Token) -> Result<(), ConfigError> {
    if amount <= Decimal::ZERO {
        return Err(ConfigError::Invalid {
            key: "AMOUNT_IN",
            reason: "must be greater than zero".to_string(),
        });
    }
    amount::to_raw_amount(amount, token.decimals)
        .map(|_| ())
        .map_err(|e| ConfigError::Invalid {
            key: "AMOUNT_IN",
            reason: e.to_string(),
        })
}

pub fn validate_slippage_bps(slippage_bps: u32) -> Result<(), ConfigError> {
    if slippage_bps > 10_000 {
        return Err(ConfigError::Invalid {
            key: "SLIPPAGE_BPS",
            reason: format!("{} exceeds 10000 basis points", slippage_bps),
        });
    }
    Ok(())
}

fn parse_address(key: &'static str, value: &str) -> Result<Address, ConfigError> {
    Address::from_str(value.trim()).map_err(|e| ConfigError::Invalid {
        key,
        reason: format!("{:?} is not an address: {}", value, e),
    })
}

struct Vars<'a, F>(&'a F);

impl<'a, F> Vars<'a, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, key: &'static str) -> Result<String, ConfigError> {
        self.get(key).ok_or(ConfigError::Missing(key))
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn parsed_or<T>(&self, key: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.get(key) {
            Some(value) => value.parse::<T>().map_err(|e| ConfigError::Invalid {
                key,
                reason: format!("{:?}: {}", value, e),
            }),
            None => Ok(default),
        }
    }

    fn decimal_or(&self, key: &'static str, default: &str) -> Result<Decimal, ConfigError> {
        let value = self.or(key, default);
        amount::parse_amount(&value).map_err(|e| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        })
    }

    fn gwei_or(&self, key: &'static str, default: &str) -> Result<U256, ConfigError> {
        let gwei = self.decimal_or(key, default)?;
        amount::to_raw_amount(gwei, GWEI_DECIMALS).map_err(|e| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        })
    }

    fn token(
        &self,
        prefix: &'static str,
        chain_id: u64,
        address: &str,
        decimals: u8,
        symbol: &str,
        name: &str,
    ) -> Result<Token, ConfigError> {
        let (address_key, decimals_key, symbol_key, name_key) = match prefix {
            "TOKEN_IN" => (
                "TOKEN_IN_ADDRESS",
                "TOKEN_IN_DECIMALS",
                "TOKEN_IN_SYMBOL",
                "TOKEN_IN_NAME",
            ),
            _ => (
                "TOKEN_OUT_ADDRESS",
                "TOKEN_OUT_DECIMALS",
                "TOKEN_OUT_SYMBOL",
                "TOKEN_OUT_NAME",
            ),
        };

        Ok(Token::new(
            chain_id,
            parse_address(address_key, &self.or(address_key, address))?,
            self.parsed_or(decimals_key, decimals)?,
            self.or(symbol_key, symbol),
            self.or(name_key, name),
        ))
    }
}
