// File: prober.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use crate::comparator::responses_equal;
use crate::error::TransportError;
use crate::mutations::{Mutation, MutationCatalog};
use crate::smuggle_test::{SmuggleTest, TestResult, TestStatus, BASELINE, VARIANT_A, VARIANT_B};
use crate::transport::{Endpoint, Transport};
use chrono::Utc;
use log::{debug, info, trace};
use std::sync::Arc;
use std::time::Duration;

/// Value rendered into a slot that should parse as an empty body.
pub const BASELINE_VALUE: &str = "0";
/// Value rendered into the slot under test; any layer honouring it rejects the request.
pub const PROBE_VALUE: &str = "z";

/// Runs the three-request differential exchange for one test case.
pub struct Prober {
    catalog: Arc<MutationCatalog>,
    transport: Arc<dyn Transport>,
    headers: Vec<String>,
    timeout: Duration,
    runs: u32,
}

impl Prober {
    pub fn new(
        catalog: Arc<MutationCatalog>,
        transport: Arc<dyn Transport>,
        headers: Vec<String>,
        timeout: Duration,
        runs: u32,
    ) -> Self {
        Self {
            catalog,
            transport,
            headers,
            timeout,
            runs: runs.max(1),
        }
    }

    pub fn runs(&self) -> u32 {
        self.runs
    }

    /// Renders the request with each mutation slot holding the given value.
    pub fn build_request(
        &self,
        test: &SmuggleTest,
        slots: [&Mutation; 2],
        values: [&str; 2],
    ) -> Vec<u8> {
        let mut request = format!(
            "{} {} HTTP/1.1\r\nHost: {}\r\n",
            test.method,
            test.request_path(),
            test.host()
        );
        request.push_str(&slots[0].render(values[0]));
        request.push_str("\r\n");
        request.push_str(&slots[1].render(values[1]));
        request.push_str("\r\n");

        for header in &self.headers {
            request.push_str(header);
            request.push_str("\r\n");
        }
        request.push_str("\r\n");

        request.into_bytes()
    }

    pub async fn probe(&self, mut test: SmuggleTest) -> SmuggleTest {
        test.status = TestStatus::Running;
        test.start = Some(Utc::now());
        test.runs = 0;

        let slots = match (
            self.catalog.get(&test.mutations[0]),
            self.catalog.get(&test.mutations[1]),
        ) {
            (Some(first), Some(second)) => [first, second],
            _ => {
                let error = format!(
                    "unknown mutation in pair {} / {}",
                    test.mutations[0], test.mutations[1]
                );
                test.finish(TestResult::Error, Some(error));
                return test;
            }
        };

        test.requests = [
            self.build_request(&test, slots, [BASELINE_VALUE, BASELINE_VALUE]),
            self.build_request(&test, slots, [PROBE_VALUE, BASELINE_VALUE]),
            self.build_request(&test, slots, [BASELINE_VALUE, PROBE_VALUE]),
        ];

        let endpoint = Endpoint::for_test(&test);
        trace!(
            "Probing {} via {} with {} / {}",
            test.url,
            endpoint.addr(),
            test.mutations[0],
            test.mutations[1]
        );

        for run in 1..=self.runs {
            test.runs = run;
            match self.run_once(&mut test, &endpoint).await {
                // A finding must hold on every run.
                Ok(TestResult::Vulnerable) if run < self.runs => continue,
                Ok(result) => {
                    test.finish(result, None);
                    break;
                }
                Err(e) => {
                    let result = if e.is_timeout() {
                        TestResult::Timeout
                    } else {
                        TestResult::Error
                    };
                    test.finish(result, Some(format!("{} ({})", e, test.url)));
                    break;
                }
            }
        }

        match test.result {
            Some(TestResult::Vulnerable) => info!(
                "Vulnerable: {} [{}] {} {} / {}",
                test.url, test.ip, test.method, test.mutations[0], test.mutations[1]
            ),
            Some(result) => debug!(
                "{} [{}] {} / {}: {}",
                test.url, test.ip, test.mutations[0], test.mutations[1], result
            ),
            None => {}
        }

        test
    }

    async fn run_once(
        &self,
        test: &mut SmuggleTest,
        endpoint: &Endpoint,
    ) -> Result<TestResult, TransportError> {
        test.responses = Default::default();

        for index in [BASELINE, VARIANT_A] {
            test.responses[index] = self
                .transport
                .send(endpoint, &test.requests[index], self.timeout)
                .await?;
        }

        if responses_equal(&test.responses[BASELINE], &test.responses[VARIANT_A]) {
            return Ok(TestResult::R1EqualBaseline);
        }

        test.responses[VARIANT_B] = self
            .transport
            .send(endpoint, &test.requests[VARIANT_B], self.timeout)
            .await?;

        Ok(classify_variant_b(&test.responses))
    }
}

/// Classification once all three responses exist and the first variant
/// already differs from the baseline.
fn classify_variant_b(responses: &[Vec<u8>; 3]) -> TestResult {
    if responses_equal(&responses[BASELINE], &responses[VARIANT_B]) {
        TestResult::R2EqualBaseline
    } else if responses_equal(&responses[VARIANT_A], &responses[VARIANT_B]) {
        TestResult::R1EqualR2
    } else {
        TestResult::Vulnerable
    }
}
