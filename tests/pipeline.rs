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
use async_trait::async_trait;
use eth_swap::{
    assembler::SwapTransaction,
    chain::{ChainReader, FeeQuote},
    route::{unix_now, MethodParameters, Route, RouteProvider, RouteRequest},
    signer::TransactionSigner,
    ExecutionDriver, PipelineStage, SwapConfig, SwapError, SwapOutcome,
};
use ethers::types::{
    transaction::eip2718::TypedTransaction, Address, Bytes, NameOrAddress, TransactionReceipt,
    TxHash, U256, U64,
};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

const SIGNER: &str = "0x8BFCF9e2764BC84DE4BBd0a0f5AAF19F47027A73";
const ROUTER: &str = "0x68b3465833fb72A70ecDF485E0e4C7bD8665Fc45";
const CALLDATA: [u8; 8] = [0x5a, 0xe4, 0x01, 0xdc, 0, 0, 0, 1];

type EventLog = Arc<Mutex<Vec<&'static str>>>;

struct FakeRouter {
    route: Option<Route>,
    requests: Mutex<Vec<RouteRequest>>,
    log: EventLog,
}

#[async_trait]
impl RouteProvider for FakeRouter {
    async fn route(&self, request: &RouteRequest) -> Result<Option<Route>> {
        self.log.lock().unwrap().push("route");
        self.requests.lock().unwrap().push(request.clone());
        Ok(self.route.clone())
    }
}

struct FakeChain {
    quote: Option<FeeQuote>,
    log: EventLog,
}

#[async_trait]
impl ChainReader for FakeChain {
    async fn fee_quote(&self) -> Result<FeeQuote> {
        self.log.lock().unwrap().push("fee_quote");
        self.quote
            .ok_or_else(|| anyhow::anyhow!("rpc timeout"))
    }

    async fn call(&self, _to: Address, _data: Bytes) -> Result<Bytes> {
        anyhow::bail!("no contract reads expected")
    }
}

#[derive(Clone, Copy)]
enum SwapReply {
    Hash,
    NoReference,
    Rejected,
}

struct FakeSigner {
    reject_approval: bool,
    approval_status: Option<u64>,
    swap_reply: SwapReply,
    swaps: Mutex<Vec<TypedTransaction>>,
    log: EventLog,
}

#[async_trait]
impl TransactionSigner for FakeSigner {
    async fn send_transaction(&self, tx: TypedTransaction) -> Result<Option<TxHash>> {
        let router = NameOrAddress::Address(Address::from_str(ROUTER).unwrap());
        if tx.to() == Some(&router) {
            self.log.lock().unwrap().push("swap_send");
            self.swaps.lock().unwrap().push(tx);
            match self.swap_reply {
                SwapReply::Hash => Ok(Some(TxHash::repeat_byte(0x5a))),
                SwapReply::NoReference => Ok(None),
                SwapReply::Rejected => anyhow::bail!("policy denied"),
            }
        } else {
            self.log.lock().unwrap().push("approve_send");
            if self.reject_approval {
                anyhow::bail!("vault policy rejected approve");
            }
            Ok(Some(TxHash::repeat_byte(0xaa)))
        }
    }

    async fn confirm(&self, tx_hash: TxHash) -> Result<Option<TransactionReceipt>> {
        self.log.lock().unwrap().push("confirm");
        Ok(self.approval_status.map(|status| TransactionReceipt {
            transaction_hash: tx_hash,
            status: Some(U64::from(status)),
            block_number: Some(U64::from(19_000_000u64)),
            ..Default::default()
        }))
    }
}

struct Harness {
    driver: ExecutionDriver,
    router: Arc<FakeRouter>,
    signer: Arc<FakeSigner>,
    log: EventLog,
}

struct Scenario {
    route: Option<Route>,
    quote: Option<FeeQuote>,
    reject_approval: bool,
    approval_status: Option<u64>,
    swap_reply: SwapReply,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            route: Some(route(Some(CALLDATA.to_vec()))),
            quote: Some(FeeQuote {
                base_fee_per_gas: Some(U256::from(10u64)),
                gas_price: Some(U256::from(11u64)),
            }),
            reject_approval: false,
            approval_status: Some(1),
            swap_reply: SwapReply::Hash,
        }
    }
}

fn route(calldata: Option<Vec<u8>>) -> Route {
    Route {
        amount_in: U256::from(1_000_000u64),
        quote: U256::from(312_345_678_900_000u64),
        method_parameters: calldata.map(|data| MethodParameters {
            calldata: Bytes::from(data),
            value: U256::zero(),
        }),
        gas_use_estimate: Some(U256::from(113_000u64)),
    }
}

fn config() -> SwapConfig {
    let env = HashMap::from([
        ("SIGNER_ADDRESS", SIGNER),
        ("SIGNER_RPC_URL", "https://signer.invalid/rpc"),
        ("SIGNER_API_TOKEN", "test-token"),
    ]);
    SwapConfig::from_lookup(|key| env.get(key).map(|v| v.to_string())).unwrap()
}

fn harness(scenario: Scenario) -> Harness {
    let log: EventLog = Arc::new(Mutex::new(vec![]));
    let router = Arc::new(FakeRouter {
        route: scenario.route,
        requests: Mutex::new(vec![]),
        log: log.clone(),
    });
    let chain = Arc::new(FakeChain {
        quote: scenario.quote,
        log: log.clone(),
    });
    let signer = Arc::new(FakeSigner {
        reject_approval: scenario.reject_approval,
        approval_status: scenario.approval_status,
        swap_reply: scenario.swap_reply,
        swaps: Mutex::new(vec![]),
        log: log.clone(),
    });

    let driver = ExecutionDriver::new(
        Arc::new(config()),
        router.clone(),
        chain,
        signer.clone(),
    );

    Harness {
        driver,
        router,
        signer,
        log,
    }
}

fn events(h: &Harness) -> Vec<&'static str> {
    h.log.lock().unwrap().clone()
}

fn expect_failure(outcome: SwapOutcome) -> (PipelineStage, SwapError, Vec<PipelineStage>) {
    match outcome {
        SwapOutcome::Failed {
            failed_at,
            error,
            history,
        } => (failed_at, error, history),
        SwapOutcome::Succeeded { receipt, .. } => {
            panic!("expected failure, got success {:?}", receipt.tx_hash)
        }
    }
}

#[tokio::test]
async fn successful_swap_walks_every_stage_in_order() {
    let h = harness(Scenario::default());
    let outcome = h.driver.execute().await;

    assert_eq!(
        outcome.history(),
        &[
            PipelineStage::Idle,
            PipelineStage::RouteResolved,
            PipelineStage::Approved,
            PipelineStage::Assembled,
            PipelineStage::Submitted,
            PipelineStage::Succeeded,
        ]
    );
    assert_eq!(
        events(&h),
        vec!["route", "approve_send", "confirm", "fee_quote", "swap_send"]
    );

    let receipt = outcome.into_result().unwrap();
    assert_eq!(receipt.tx_hash, TxHash::repeat_byte(0x5a));
    assert_eq!(receipt.approval.tx_hash, TxHash::repeat_byte(0xaa));
    assert_eq!(receipt.trade, "1.0 USDC for 0.0003 WETH");

    let tx = &receipt.transaction;
    assert_eq!(tx.to, Address::from_str(ROUTER).unwrap());
    assert_eq!(tx.from, Address::from_str(SIGNER).unwrap());
    assert_eq!(tx.data, Bytes::from(CALLDATA.to_vec()));
    assert_eq!(tx.max_fee_per_gas, U256::from(20u64));
    assert_eq!(tx.max_priority_fee_per_gas, U256::from(100_000_000u64));
    assert_eq!(tx.gas_limit, U256::from(400_000u64));
}

#[tokio::test]
async fn routing_request_uses_raw_amount_and_fresh_deadline() {
    let h = harness(Scenario::default());
    let before = unix_now();
    h.driver.execute().await;

    let requests = h.router.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.amount, U256::from(1_000_000u64));
    assert_eq!(request.options.recipient, Address::from_str(SIGNER).unwrap());
    assert_eq!(request.options.slippage.numerator, 100);
    assert_eq!(request.options.slippage.denominator, 10_000);
    assert!(request.options.deadline >= before + 1800);
}

#[tokio::test]
async fn no_route_stops_before_approval() {
    let h = harness(Scenario {
        route: None,
        ..Scenario::default()
    });
    let (failed_at, error, history) = expect_failure(h.driver.execute().await);

    assert_eq!(failed_at, PipelineStage::Idle);
    assert!(matches!(error, SwapError::NoRouteFound { .. }));
    assert_eq!(history, vec![PipelineStage::Idle, PipelineStage::Failed]);
    assert_eq!(events(&h), vec!["route"]);
}

#[tokio::test]
async fn reverted_approval_blocks_assembly() {
    let h = harness(Scenario {
        approval_status: Some(0),
        ..Scenario::default()
    });
    let (failed_at, error, _) = expect_failure(h.driver.execute().await);

    assert_eq!(failed_at, PipelineStage::RouteResolved);
    assert!(matches!(error, SwapError::ApprovalFailed(_)));
    assert_eq!(events(&h), vec!["route", "approve_send", "confirm"]);
    assert!(h.signer.swaps.lock().unwrap().is_empty());
}

#[tokio::test]
async fn rejected_approval_blocks_assembly() {
    let h = harness(Scenario {
        reject_approval: true,
        ..Scenario::default()
    });
    let (failed_at, error, history) = expect_failure(h.driver.execute().await);

    assert_eq!(failed_at, PipelineStage::RouteResolved);
    assert!(matches!(error, SwapError::ApprovalFailed(_)));
    assert_eq!(
        history,
        vec![
            PipelineStage::Idle,
            PipelineStage::RouteResolved,
            PipelineStage::Failed
        ]
    );
    assert_eq!(events(&h), vec!["route", "approve_send"]);
    assert!(h.signer.swaps.lock().unwrap().is_empty());
}

#[tokio::test]
async fn route_without_calldata_is_not_submitted() {
    let h = harness(Scenario {
        route: Some(route(None)),
        ..Scenario::default()
    });
    let (failed_at, error, _) = expect_failure(h.driver.execute().await);

    assert_eq!(failed_at, PipelineStage::Approved);
    assert!(matches!(error, SwapError::MissingRouteParameters));
    assert!(!events(&h).contains(&"swap_send"));
}

#[tokio::test]
async fn fee_data_failure_is_reported_with_its_step() {
    let h = harness(Scenario {
        quote: None,
        ..Scenario::default()
    });
    let (failed_at, error, _) = expect_failure(h.driver.execute().await);

    assert_eq!(failed_at, PipelineStage::Approved);
    assert!(matches!(error, SwapError::FeeData(_)));
    assert!(!events(&h).contains(&"swap_send"));
}

#[tokio::test]
async fn missing_or_rejected_submission_fails() {
    for reply in [SwapReply::NoReference, SwapReply::Rejected] {
        let h = harness(Scenario {
            swap_reply: reply,
            ..Scenario::default()
        });
        let (failed_at, error, history) = expect_failure(h.driver.execute().await);

        assert_eq!(failed_at, PipelineStage::Submitted);
        assert!(matches!(error, SwapError::SubmissionFailed(_)));
        assert_eq!(history.last(), Some(&PipelineStage::Failed));
        assert_eq!(h.signer.swaps.lock().unwrap().len(), 1);
    }
}

#[tokio::test]
async fn absent_base_fee_falls_back_to_floor() {
    let h = harness(Scenario {
        quote: Some(FeeQuote {
            base_fee_per_gas: None,
            gas_price: Some(U256::from(25_000_000_000u64)),
        }),
        ..Scenario::default()
    });
    let receipt = h.driver.execute().await.into_result().unwrap();
    assert_eq!(
        receipt.transaction.max_fee_per_gas,
        U256::from(1_000_000_000u64)
    );
}

#[tokio::test]
async fn identical_inputs_produce_identical_transactions() {
    let first: SwapTransaction = harness(Scenario::default())
        .driver
        .execute()
        .await
        .into_result()
        .unwrap()
        .transaction;
    let second: SwapTransaction = harness(Scenario::default())
        .driver
        .execute()
        .await
        .into_result()
        .unwrap()
        .transaction;

    assert_eq!(first, second);
    assert_eq!(first.to_typed(), second.to_typed());
}
