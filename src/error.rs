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

use thiserror::Error;

/// Failures while loading the static swap configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Every way a single swap run can fail. Any of these aborts the pipeline.
#[derive(Error, Debug)]
pub enum SwapError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("No route found for {token_in} -> {token_out}")]
    NoRouteFound { token_in: String, token_out: String },

    #[error("Approval failed: {0}")]
    ApprovalFailed(String),

    #[error("Route is missing executable call data")]
    MissingRouteParameters,

    #[error("Submission failed: {0}")]
    SubmissionFailed(String),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Route resolution failed: {0:#}")]
    Routing(#[source] anyhow::Error),

    #[error("Fee data read failed: {0:#}")]
    FeeData(#[source] anyhow::Error),

    #[error("Pool read failed: {0:#}")]
    PoolRead(#[source] anyhow::Error),
}

impl SwapError {
    /// True for failures caused by the caller's input or configuration rather
    /// than by a collaborator.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            SwapError::InvalidAmount(_) | SwapError::Configuration(_)
        )
    }
}
