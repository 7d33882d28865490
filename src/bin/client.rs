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

use anyhow::Result;
use dotenv::dotenv;
use rmcp::{
    model::{CallToolRequestParam, CallToolResult},
    service::ServiceExt,
    transport::TokioChildProcess,
};
use serde_json::json;
use std::env;
use std::path::PathBuf;
use tokio::process::Command;

fn print_result(label: &str, result: CallToolResult) {
    println!("{}:", label);
    for content in result.content {
        match content.raw {
            rmcp::model::RawContent::Text(text) => {
                println!("{}", text.text);
            }
            _ => println!("{:#?}", content),
        }
    }
    println!();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    // Swapping moves real funds, so it only runs when explicitly requested.
    let execute_swap = env::var("CLIENT_EXECUTE_SWAP").is_ok_and(|v| v == "1");
    let swap_amount = env::var("CLIENT_SWAP_AMOUNT").ok();

    // Get the path to the server binary
    let server_path = if PathBuf::from("target/debug/server").exists() {
        "target/debug/server"
    } else {
        "target/release/server"
    };

    println!("Starting MCP client...");
    println!("Connecting to server at: {}", server_path);

    let mut cmd = Command::new(server_path);
    cmd.stdin(std::process::Stdio::piped())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped());

    let service = ().serve(TokioChildProcess::new(cmd)?).await?;

    println!("\nConnected to server!");
    let server_info = service.peer_info();
    println!("Server info: {:#?}\n", server_info);

    println!("Listing available tools...");
    let tools = service.list_tools(Default::default()).await?;
    println!("Available tools:");
    for tool in tools.tools {
        println!(
            "  - {}: {}",
            tool.name,
            tool.description.unwrap_or_default()
        );
    }
    println!();

    println!("Reading pool state for the configured pair...");
    let pool_result = service
        .call_tool(CallToolRequestParam {
            name: "get_pool_info".into(),
            arguments: json!({}).as_object().cloned(),
        })
        .await?;
    print_result("Pool Info Result", pool_result);

    if execute_swap {
        println!("Executing swap...");
        let swap_result = service
            .call_tool(CallToolRequestParam {
                name: "execute_swap".into(),
                arguments: json!({ "amount": swap_amount }).as_object().cloned(),
            })
            .await?;
        print_result("Swap Result", swap_result);
    } else {
        println!("Skipping execute_swap (set CLIENT_EXECUTE_SWAP=1 to run it)\n");
    }

    service.cancel().await?;
    println!("Client disconnected.");

    Ok(())
}
