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

//! Executes a single Uniswap swap through a remote custody signer.

pub mod amount;
pub mod approval;
pub mod assembler;
pub mod chain;
pub mod config;
pub mod driver;
pub mod error;
pub mod logging;
pub mod pool;
pub mod route;
pub mod server;
pub mod signer;
pub mod token;

pub use config::SwapConfig;
pub use driver::{ExecutionDriver, PipelineStage, SwapOutcome, SwapReport};
pub use error::{ConfigError, SwapError};
