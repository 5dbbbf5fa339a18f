// File: cli.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use crate::config::ScanConfig;
use clap::Parser;
use log::LevelFilter;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    name = env!("CARGO_PKG_NAME"),
    version = env!("CARGO_PKG_VERSION"),
    about = env!("CARGO_PKG_DESCRIPTION"),
)]
pub struct Cli {
    #[arg(
        short = 'n',
        long = "no-resolve",
        help = "Don't resolve domains, expect input lines in the format <ip>,<url>"
    )]
    pub no_resolve: bool,

    #[arg(short = 'c', long = "workers", default_value_t = 10)]
    pub workers: usize,

    #[arg(
        short = 'b',
        long = "batch-size",
        default_value_t = 200,
        help = "Number of input lines to process at once, shuffling the tests for each batch"
    )]
    pub batch_size: usize,

    #[arg(
        short = 'm',
        long = "methods",
        value_delimiter = ',',
        default_value = "POST",
        help = "HTTP methods to test, repeat or comma-separate for several"
    )]
    pub methods: Vec<String>,

    #[arg(
        short = 'o',
        long = "output",
        default_value = "junker.json",
        help = "File to write JSON lines results to, '-' for stdout"
    )]
    pub output: String,

    #[arg(
        short = 't',
        long = "timeout",
        default_value_t = 5000,
        help = "Per request timeout in milliseconds"
    )]
    pub timeout: u64,

    #[arg(
        short = 'H',
        long = "headers",
        help = "Extra header to include in requests, repeat for several"
    )]
    pub headers: Vec<String>,

    #[arg(
        short = 'r',
        long = "runs",
        default_value_t = 1,
        help = "Times to repeat the probe; a finding must hold on every run"
    )]
    pub runs: u32,

    #[arg(long = "rate-limit", help = "Global cap on requests per second")]
    pub rate_limit: Option<u32>,

    #[arg(long = "seed", help = "Seed for the test shuffle")]
    pub seed: Option<u64>,

    #[arg(long = "max-response-bytes", default_value_t = 1024 * 1024)]
    pub max_response_bytes: usize,

    #[arg(long = "log-level", default_value = "warn")]
    pub log_level: String,

    #[arg(
        short = 'q',
        long = "quiet",
        help = "Disable the progress spinner and scan summary"
    )]
    pub quiet: bool,

    #[arg(help = "Input file with one target per line, stdin when omitted")]
    pub input: Option<PathBuf>,
}

impl Cli {
    pub fn to_config(&self) -> ScanConfig {
        let mut config = ScanConfig::new();
        config.set_no_resolve(self.no_resolve);
        config.set_workers(self.workers);
        config.set_batch_size(self.batch_size);
        config.set_methods(
            self.methods
                .iter()
                .map(|m| m.trim().to_uppercase())
                .filter(|m| !m.is_empty())
                .collect(),
        );
        config.set_output(&self.output);
        config.set_timeout(Duration::from_millis(self.timeout));
        config.set_headers(self.headers.clone());
        config.set_runs(self.runs);
        config.set_rate_limit(self.rate_limit.and_then(NonZeroU32::new));
        config.set_seed(self.seed);
        config.set_max_response_bytes(self.max_response_bytes);
        config
    }

    pub fn log_level(&self) -> Result<LevelFilter, String> {
        LevelFilter::from_str(&self.log_level)
            .map_err(|_| format!("invalid log level: {}", self.log_level))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["junker"]).unwrap();
        let config = cli.to_config();

        assert_eq!(config.workers(), 10);
        assert_eq!(config.batch_size(), 200);
        assert_eq!(config.methods(), &["POST".to_string()]);
        assert_eq!(config.output(), "junker.json");
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(config.runs(), 1);
        assert!(cli.input.is_none());
        assert_eq!(cli.log_level().unwrap(), LevelFilter::Warn);
    }

    #[test]
    fn test_flags() {
        let cli = Cli::try_parse_from([
            "junker",
            "-n",
            "-c",
            "4",
            "-b",
            "50",
            "-m",
            "post,get",
            "-m",
            "put",
            "-o",
            "-",
            "-t",
            "250",
            "-H",
            "X-A: 1, 2",
            "-H",
            "User-Agent: test",
            "--rate-limit",
            "20",
            "--seed",
            "9",
            "targets.txt",
        ])
        .unwrap();
        let config = cli.to_config();

        assert!(config.no_resolve());
        assert_eq!(config.workers(), 4);
        assert_eq!(config.batch_size(), 50);
        assert_eq!(
            config.methods(),
            &["POST".to_string(), "GET".to_string(), "PUT".to_string()]
        );
        assert!(config.output_is_stdout());
        assert_eq!(config.timeout(), Duration::from_millis(250));
        assert_eq!(config.headers().len(), 2);
        assert_eq!(config.headers()[0], "X-A: 1, 2");
        assert_eq!(config.rate_limit().map(|r| r.get()), Some(20));
        assert_eq!(config.seed(), Some(9));
        assert_eq!(cli.input, Some(PathBuf::from("targets.txt")));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_rate_limit_disables_limiter() {
        let cli = Cli::try_parse_from(["junker", "--rate-limit", "0"]).unwrap();
        assert!(cli.to_config().rate_limit().is_none());
    }

    #[test]
    fn test_bad_log_level() {
        let cli = Cli::try_parse_from(["junker", "--log-level", "loud"]).unwrap();
        assert!(cli.log_level().is_err());
    }
}
