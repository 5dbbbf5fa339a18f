// File: runner.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use crate::config::ScanConfig;
use crate::error::{ScanError, ScanResult};
use crate::mutations::MutationCatalog;
use crate::prober::Prober;
use crate::scan_state::ScanState;
use crate::scheduler::{BatchScheduler, SchedulerStats};
use crate::sink::ResultSink;
use crate::target::{Resolver, SystemResolver};
use crate::transport::{RawTransport, Transport};
use crate::worker::WorkerPool;
use indicatif::ProgressBar;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncWrite};
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub struct ScanReport {
    pub scheduler: SchedulerStats,
    pub state: ScanState,
    pub input_errors: usize,
}

/// Wires the feeder, the worker pool and the result sink together.
pub struct Scanner {
    config: ScanConfig,
    catalog: Arc<MutationCatalog>,
    transport: Arc<dyn Transport>,
    resolver: Arc<dyn Resolver>,
}

impl Scanner {
    pub fn new(config: ScanConfig) -> ScanResult<Self> {
        config.validate()?;

        let transport = Arc::new(RawTransport::new(
            config.max_response_bytes(),
            config.rate_limit(),
        ));

        Ok(Self {
            config,
            catalog: Arc::new(MutationCatalog::load()),
            transport,
            resolver: Arc::new(SystemResolver),
        })
    }

    pub fn with_catalog(mut self, catalog: MutationCatalog) -> Self {
        self.catalog = Arc::new(catalog);
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn Resolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn catalog(&self) -> &MutationCatalog {
        &self.catalog
    }

    /// Runs the whole scan and returns once every generated test has been
    /// written. Queues close in order: tests (feeder done), results (all
    /// workers done), then the sink finishes.
    pub async fn run<R, W>(
        &self,
        input: R,
        output: W,
        progress: Option<ProgressBar>,
    ) -> ScanResult<ScanReport>
    where
        R: AsyncBufRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        if self.catalog.len() < 2 {
            return Err(ScanError::Config(
                "the mutation catalog needs at least two entries".to_string(),
            ));
        }

        let rng = match self.config.seed() {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        info!(
            "Starting scan: {} workers, batch size {}, methods {:?}, {} mutations, {} runs",
            self.config.workers(),
            self.config.batch_size(),
            self.config.methods(),
            self.catalog.len(),
            self.config.runs()
        );

        let scheduler = BatchScheduler::new(
            self.config.batch_size(),
            self.config.no_resolve(),
            self.config.methods().to_vec(),
            Arc::clone(&self.catalog),
            Arc::clone(&self.resolver),
            rng,
        );
        let (tests, mut input_errors, feeder) = scheduler.spawn(input);

        let prober = Arc::new(Prober::new(
            Arc::clone(&self.catalog),
            Arc::clone(&self.transport),
            self.config.effective_headers(),
            self.config.timeout(),
            self.config.runs(),
        ));

        let (results_tx, results_rx) = mpsc::channel(self.config.workers());
        let pool = WorkerPool::spawn(self.config.workers(), prober, tests, results_tx);
        let sink = ResultSink::new(output, progress).spawn(results_rx);

        let error_log = tokio::spawn(async move {
            let mut count = 0;
            while let Some(e) = input_errors.recv().await {
                warn!("{}", e);
                count += 1;
            }
            count
        });

        let feeder_result = feeder.await?;
        let completed = pool.join().await?;
        debug!("Workers completed {:?} tests", completed);
        let state = sink.await??;
        let input_errors = error_log.await?;

        let scheduler = feeder_result?;
        info!(
            "Scan finished: {} tests, {} vulnerable, {} skipped lines",
            state.total(),
            state.findings().len(),
            input_errors
        );

        Ok(ScanReport {
            scheduler,
            state,
            input_errors,
        })
    }
}
