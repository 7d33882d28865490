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
use eth_swap::{logging, server::SwapMcpServer, ExecutionDriver, SwapConfig};
use rmcp::ServiceExt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

async fn run_server(server: SwapMcpServer, addr: SocketAddr) -> Result<()> {
    // Determine transport mode: TCP if port is set, otherwise stdio
    if addr.port() > 0 {
        // TCP mode
        let listener = TcpListener::bind(&addr)
            .await
            .context("Failed to bind TCP listener")?;

        let actual_addr = listener
            .local_addr()
            .context("Failed to get local address")?;

        info!(
            "MCP server listening on {}:{}",
            actual_addr.ip(),
            actual_addr.port()
        );

        // Accept connections and serve each one
        loop {
            match listener.accept().await {
                Ok((stream, peer_addr)) => {
                    info!("New connection from {}", peer_addr);
                    let server_clone = server.clone();

                    tokio::spawn(async move {
                        let (read, write) = tokio::io::split(stream);
                        if let Err(e) = server_clone.serve((read, write)).await {
                            warn!("Connection {} closed with error: {}", peer_addr, e);
                        } else {
                            info!("Connection {} closed gracefully", peer_addr);
                        }
                    });
                }
                Err(e) => {
                    warn!("Failed to accept connection: {}", e);
                }
            }
        }
    } else {
        // Stdio mode (default, for MCP standard)
        info!("Starting MCP server on stdio");
        let running_service = server
            .serve((tokio::io::stdin(), tokio::io::stdout()))
            .await?;
        // Wait for the service to finish (will wait for client requests)
        running_service.waiting().await?;
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    logging::init_logging();

    let config = SwapConfig::from_env().context("Failed to load swap configuration")?;
    info!(
        "Starting swap MCP server on chain {} with RPC: {}",
        config.chain_id, config.rpc_url
    );

    let addr = SocketAddr::new(config.server_host, config.server_port);

    let driver = ExecutionDriver::connect(Arc::new(config))?;
    let server = SwapMcpServer::new(driver);

    // Run the server with the specified transport mode
    run_server(server, addr).await?;

    Ok(())
}
