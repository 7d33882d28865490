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
use dotenv::dotenv;
use eth_swap::{
    logging, pool::fetch_pool_state, ExecutionDriver, SwapConfig, SwapOutcome, SwapReport,
};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    logging::init_logging();

    let config = SwapConfig::from_env().context("Failed to load swap configuration")?;
    let driver = ExecutionDriver::connect(Arc::new(config))?;
    let config = driver.config();

    // Informational only; the routing service decides the actual path.
    let chain = driver.chain();
    match fetch_pool_state(
        chain.as_ref(),
        config.v3_factory,
        &config.token_in,
        &config.token_out,
        config.pool_fee,
    )
    .await
    {
        Ok(Some(pool)) => info!(
            "Pool {:?} at fee {}: liquidity={}, tick={}",
            pool.address, pool.fee, pool.liquidity, pool.tick
        ),
        Ok(None) => warn!(
            "No pool at configured fee tier {}",
            config.pool_fee.as_u32()
        ),
        Err(e) => warn!("Pool pre-flight failed: {}", e),
    }

    let outcome = driver.execute().await;
    let report = SwapReport::from(&outcome);
    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("Failed to serialize swap report")?
    );

    match outcome {
        SwapOutcome::Succeeded { receipt, .. } => {
            println!("Swap successful! {} ({:?})", receipt.trade, receipt.tx_hash);
            Ok(())
        }
        SwapOutcome::Failed {
            failed_at, error, ..
        } => Err(anyhow::Error::new(error).context(format!("Swap failed after {}", failed_at))),
    }
}
