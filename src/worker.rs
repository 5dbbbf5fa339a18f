// File: worker.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use crate::prober::Prober;
use crate::smuggle_test::SmuggleTest;
use futures::future::join_all;
use log::{debug, trace};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

/// Fixed set of workers draining one shared test queue.
pub struct WorkerPool {
    handles: Vec<JoinHandle<usize>>,
}

impl WorkerPool {
    /// Spawns `workers` tasks. Each claims one test at a time, probes it and
    /// publishes it on `results`. A worker exits once `tests` is closed and
    /// drained; the result channel closes when the last worker drops its sender.
    pub fn spawn(
        workers: usize,
        prober: Arc<Prober>,
        tests: mpsc::Receiver<SmuggleTest>,
        results: mpsc::Sender<SmuggleTest>,
    ) -> Self {
        let tests = Arc::new(Mutex::new(tests));

        let handles = (0..workers.max(1))
            .map(|id| {
                let prober = Arc::clone(&prober);
                let tests = Arc::clone(&tests);
                let results = results.clone();
                tokio::spawn(async move { work(id, prober, tests, results).await })
            })
            .collect();

        Self { handles }
    }

    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// Waits for every worker and returns the number of tests each completed.
    pub async fn join(self) -> Result<Vec<usize>, tokio::task::JoinError> {
        join_all(self.handles).await.into_iter().collect()
    }
}

async fn work(
    id: usize,
    prober: Arc<Prober>,
    tests: Arc<Mutex<mpsc::Receiver<SmuggleTest>>>,
    results: mpsc::Sender<SmuggleTest>,
) -> usize {
    let mut completed = 0;

    loop {
        // The lock is released before probing so siblings can claim work.
        let next = tests.lock().await.recv().await;
        let Some(test) = next else {
            break;
        };

        trace!("Worker {} claimed {} {:?}", id, test.url, test.mutations);
        let test = prober.probe(test).await;
        completed += 1;

        if results.send(test).await.is_err() {
            debug!("Worker {}: result channel closed", id);
            break;
        }
    }

    debug!("Worker {} finished after {} tests", id, completed);
    completed
}
