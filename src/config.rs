// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023
// - Volker Schwaberow <volker@schwaberow.de>

use crate::error::ScanError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::num::NonZeroU32;
use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/42.0.2311.135 Safari/537.36 Edge/12.246";

static HEADER_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([!#$%&'*+.^_`|~0-9A-Za-z-]+)\s*:").unwrap());

static METHOD: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z]+$").unwrap());

/// Returns the lowercased name of a `Name: value` header line.
pub fn header_name(line: &str) -> Option<String> {
    HEADER_NAME
        .captures(line)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_ascii_lowercase())
}

#[derive(Debug, Clone)]
pub struct ScanConfig {
    no_resolve: bool,
    workers: usize,
    batch_size: usize,
    methods: Vec<String>,
    output: String,
    timeout: Duration,
    headers: Vec<String>,
    runs: u32,
    rate_limit: Option<NonZeroU32>,
    seed: Option<u64>,
    max_response_bytes: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanConfig {
    pub fn new() -> Self {
        Self {
            no_resolve: false,
            workers: 10,
            batch_size: 200,
            methods: vec!["POST".to_string()],
            output: "junker.json".to_string(),
            timeout: Duration::from_secs(5),
            headers: Vec::new(),
            runs: 1,
            rate_limit: None,
            seed: None,
            max_response_bytes: 1024 * 1024,
        }
    }

    pub fn set_no_resolve(&mut self, no_resolve: bool) {
        self.no_resolve = no_resolve;
    }

    pub fn no_resolve(&self) -> bool {
        self.no_resolve
    }

    pub fn set_workers(&mut self, workers: usize) {
        self.workers = workers;
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn set_batch_size(&mut self, batch_size: usize) {
        self.batch_size = batch_size;
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn set_methods(&mut self, methods: Vec<String>) {
        self.methods = methods;
    }

    pub fn methods(&self) -> &[String] {
        &self.methods
    }

    pub fn set_output(&mut self, output: &str) {
        self.output = output.to_string();
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn output_is_stdout(&self) -> bool {
        self.output == "-"
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn set_headers(&mut self, headers: Vec<String>) {
        self.headers = headers;
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn set_runs(&mut self, runs: u32) {
        self.runs = runs;
    }

    pub fn runs(&self) -> u32 {
        self.runs
    }

    pub fn set_rate_limit(&mut self, rate_limit: Option<NonZeroU32>) {
        self.rate_limit = rate_limit;
    }

    pub fn rate_limit(&self) -> Option<NonZeroU32> {
        self.rate_limit
    }

    pub fn set_seed(&mut self, seed: Option<u64>) {
        self.seed = seed;
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    pub fn set_max_response_bytes(&mut self, max_response_bytes: usize) {
        self.max_response_bytes = max_response_bytes;
    }

    pub fn max_response_bytes(&self) -> usize {
        self.max_response_bytes
    }

    /// Extra headers with `User-Agent` and `Connection` filled in unless the
    /// user supplied them.
    pub fn effective_headers(&self) -> Vec<String> {
        let mut headers = self.headers.clone();
        let names: Vec<String> = headers.iter().filter_map(|h| header_name(h)).collect();

        if !names.iter().any(|n| n == "user-agent") {
            headers.push(format!("User-Agent: {}", DEFAULT_USER_AGENT));
        }

        if !names.iter().any(|n| n == "connection") {
            headers.push("Connection: close".to_string());
        }

        headers
    }

    pub fn validate(&self) -> Result<(), ScanError> {
        if self.workers == 0 {
            return Err(ScanError::Config("workers must be at least 1".to_string()));
        }

        if self.batch_size == 0 {
            return Err(ScanError::Config("batch size must be at least 1".to_string()));
        }

        if self.runs == 0 {
            return Err(ScanError::Config("runs must be at least 1".to_string()));
        }

        if self.timeout.is_zero() {
            return Err(ScanError::Config("timeout must be greater than zero".to_string()));
        }

        if self.max_response_bytes == 0 {
            return Err(ScanError::Config(
                "max response size must be greater than zero".to_string(),
            ));
        }

        if self.methods.is_empty() {
            return Err(ScanError::Config("at least one method is required".to_string()));
        }

        if let Some(method) = self.methods.iter().find(|m| !METHOD.is_match(m)) {
            return Err(ScanError::Config(format!("invalid HTTP method: {:?}", method)));
        }

        if let Some(header) = self
            .headers
            .iter()
            .find(|h| header_name(h).is_none() || h.contains('\r') || h.contains('\n'))
        {
            return Err(ScanError::Config(format!("invalid header: {:?}", header)));
        }

        Ok(())
    }
}
