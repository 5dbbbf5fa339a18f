// File: scan_state.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use crate::smuggle_test::{SmuggleTest, TestResult};
use chrono::{DateTime, Utc};
use colored::*;
use std::collections::HashMap;
use std::net::IpAddr;

#[derive(Debug, Clone, PartialEq)]
pub struct Finding {
    pub url: String,
    pub ip: IpAddr,
    pub method: String,
    pub mutations: [String; 2],
}

/// Running tally of finished tests.
#[derive(Debug, Clone)]
pub struct ScanState {
    counts: HashMap<TestResult, usize>,
    findings: Vec<Finding>,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
}

impl ScanState {
    pub fn new() -> ScanState {
        ScanState {
            counts: HashMap::new(),
            findings: Vec::new(),
            start_time: Utc::now(),
            end_time: None,
        }
    }

    pub fn record(&mut self, test: &SmuggleTest) {
        let Some(result) = test.result else {
            return;
        };

        *self.counts.entry(result).or_insert(0) += 1;

        if result == TestResult::Vulnerable {
            self.findings.push(Finding {
                url: test.url.clone(),
                ip: test.ip,
                method: test.method.clone(),
                mutations: test.mutations.clone(),
            });
        }
    }

    pub fn count(&self, result: TestResult) -> usize {
        self.counts.get(&result).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn set_end_time(&mut self, end_time: DateTime<Utc>) {
        self.end_time = Some(end_time);
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    pub fn summary(&self) -> String {
        let mut out = String::new();
        let elapsed = self
            .end_time
            .unwrap_or_else(Utc::now)
            .signed_duration_since(self.start_time)
            .num_milliseconds();

        out.push_str(&format!("\n{}\n", "Scan Summary".bold()));
        out.push_str("================\n");
        out.push_str(&format!(
            "{} tests in {} ms. Started at {}.\n",
            self.total(),
            elapsed,
            self.start_time.format("%Y-%m-%d %H:%M:%S UTC")
        ));

        for result in TestResult::ALL {
            let count = self.count(result).to_string();
            let count = match result {
                TestResult::Vulnerable if self.count(result) > 0 => count.bright_red().bold(),
                TestResult::Error | TestResult::Timeout => count.yellow(),
                _ => count.normal(),
            };
            out.push_str(&format!("  {:<18} {}\n", result.as_str(), count));
        }

        if !self.findings.is_empty() {
            out.push_str(&format!("\n{}\n", "Parsing discrepancies:".bright_red().bold()));
            for finding in &self.findings {
                out.push_str(&format!(
                    "  {} [{}] {} {} / {}\n",
                    finding.url,
                    finding.ip,
                    finding.method,
                    finding.mutations[0].yellow(),
                    finding.mutations[1].yellow()
                ));
            }
        }

        out
    }
}

impl Default for ScanState {
    fn default() -> Self {
        Self::new()
    }
}
