// File: scheduler.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use crate::error::{InputError, ScanResult};
use crate::generator::expand_target;
use crate::mutations::MutationCatalog;
use crate::smuggle_test::SmuggleTest;
use crate::target::{is_target_line, resolve_line, Resolver};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::Rng;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub batches: usize,
    pub lines: usize,
    pub skipped: usize,
    pub tests: usize,
}

/// Reads targets in batches, expands each batch into its test plan and
/// hands the tests downstream in uniformly random order.
pub struct BatchScheduler {
    batch_size: usize,
    no_resolve: bool,
    methods: Vec<String>,
    catalog: Arc<MutationCatalog>,
    resolver: Arc<dyn Resolver>,
    rng: StdRng,
}

impl BatchScheduler {
    pub fn new(
        batch_size: usize,
        no_resolve: bool,
        methods: Vec<String>,
        catalog: Arc<MutationCatalog>,
        resolver: Arc<dyn Resolver>,
        rng: StdRng,
    ) -> Self {
        Self {
            batch_size: batch_size.max(1),
            no_resolve,
            methods,
            catalog,
            resolver,
            rng,
        }
    }

    /// Starts the feeder task. The test queue holds a single slot so the
    /// feeder cannot run ahead of the workers; it is closed once input is
    /// exhausted. Per-line input errors go to the error channel.
    pub fn spawn<R>(
        self,
        input: R,
    ) -> (
        mpsc::Receiver<SmuggleTest>,
        mpsc::UnboundedReceiver<InputError>,
        JoinHandle<ScanResult<SchedulerStats>>,
    )
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        let (test_tx, test_rx) = mpsc::channel(1);
        let (error_tx, error_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(self.run(input, test_tx, error_tx));
        (test_rx, error_rx, handle)
    }

    pub async fn run<R>(
        mut self,
        mut input: R,
        tests: mpsc::Sender<SmuggleTest>,
        errors: mpsc::UnboundedSender<InputError>,
    ) -> ScanResult<SchedulerStats>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut buf = Vec::new();
        let mut stats = SchedulerStats::default();
        let mut done = false;

        while !done {
            let mut batch = Vec::with_capacity(self.batch_size);
            while batch.len() < self.batch_size {
                match read_line(&mut input, &mut buf).await? {
                    Some(Ok(line)) if is_target_line(&line) => batch.push(line),
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        debug!("Skipping undecodable line: {}", e);
                        stats.skipped += 1;
                        let _ = errors.send(e);
                    }
                    None => break,
                }
            }

            if batch.len() < self.batch_size {
                done = true;
            }
            if batch.is_empty() {
                break;
            }

            stats.batches += 1;
            stats.lines += batch.len();

            let mut pool = Vec::new();
            for line in &batch {
                match resolve_line(line, self.no_resolve, self.resolver.as_ref()).await {
                    Ok(target) => pool.extend(expand_target(&target, &self.methods, &self.catalog)),
                    Err(e) => {
                        debug!("Skipping line {:?}: {}", line, e);
                        stats.skipped += 1;
                        // Nobody listening for errors is not a reason to stop.
                        let _ = errors.send(e);
                    }
                }
            }

            debug!(
                "Batch {}: {} lines, {} tests",
                stats.batches,
                batch.len(),
                pool.len()
            );

            let generated = pool.len();
            if !feed_shuffled(pool, &mut self.rng, &tests).await {
                warn!("Test queue closed, stopping input processing");
                stats.tests += generated;
                return Ok(stats);
            }
            stats.tests += generated;
        }

        info!(
            "Input exhausted: {} batches, {} lines, {} skipped, {} tests",
            stats.batches, stats.lines, stats.skipped, stats.tests
        );
        Ok(stats)
    }
}

/// Reads one line terminated by `\n` or `\r\n`. A line that is not valid
/// UTF-8 comes back as an input error; only I/O failures end the stream.
async fn read_line<R>(
    input: &mut R,
    buf: &mut Vec<u8>,
) -> std::io::Result<Option<Result<String, InputError>>>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    if input.read_until(b'\n', buf).await? == 0 {
        return Ok(None);
    }

    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }

    Ok(Some(String::from_utf8(std::mem::take(buf)).map_err(|e| {
        InputError::InvalidLine(String::from_utf8_lossy(e.as_bytes()).into_owned())
    })))
}

/// Repeatedly picks a uniformly random remaining test and sends it. Returns
/// `false` if the receiver went away.
async fn feed_shuffled<T>(mut pool: Vec<T>, rng: &mut StdRng, tx: &mpsc::Sender<T>) -> bool {
    while !pool.is_empty() {
        let index = rng.gen_range(0..pool.len());
        let item = pool.swap_remove(index);
        if tx.send(item).await.is_err() {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rand::SeedableRng;
    use rstest::*;
    use std::collections::HashMap;
    use std::net::IpAddr;

    struct FixedResolver;

    #[async_trait]
    impl Resolver for FixedResolver {
        async fn lookup(&self, host: &str) -> Result<Vec<IpAddr>, String> {
            match host {
                "two.example" => Ok(vec!["192.0.2.1".parse().unwrap(), "192.0.2.2".parse().unwrap()]),
                "bad.example" => Err("NXDOMAIN".to_string()),
                _ => Ok(vec!["192.0.2.10".parse().unwrap()]),
            }
        }
    }

    fn catalog() -> Arc<MutationCatalog> {
        Arc::new(
            MutationCatalog::from_pairs([
                ("a", "Content-Length: {v}"),
                ("b", "Content-Length : {v}"),
                ("c", "content-length: {v}"),
            ])
            .unwrap(),
        )
    }

    fn scheduler(batch_size: usize, seed: u64) -> BatchScheduler {
        BatchScheduler::new(
            batch_size,
            false,
            vec!["POST".to_string()],
            catalog(),
            Arc::new(FixedResolver),
            StdRng::seed_from_u64(seed),
        )
    }

    async fn collect(
        scheduler: BatchScheduler,
        input: &'static [u8],
    ) -> (Vec<SmuggleTest>, Vec<InputError>, SchedulerStats) {
        let (mut tests_rx, mut errors_rx, handle) = scheduler.spawn(input);
        let mut tests = Vec::new();
        while let Some(test) = tests_rx.recv().await {
            tests.push(test);
        }
        let stats = handle.await.unwrap().unwrap();
        let mut errors = Vec::new();
        while let Ok(e) = errors_rx.try_recv() {
            errors.push(e);
        }
        (tests, errors, stats)
    }

    fn key(test: &SmuggleTest) -> (String, IpAddr, [String; 2]) {
        (test.url.clone(), test.ip, test.mutations.clone())
    }

    const INPUT: &str = "http://one.example/\nhttp://two.example/\n\n# comment\nhttp://three.example/\nhttp://four.example/\nhttp://five.example/\n";

    #[rstest]
    #[case(1)]
    #[case(2)]
    #[case(3)]
    #[case(5)]
    #[case(100)]
    #[tokio::test]
    async fn test_feed_is_a_permutation(#[case] batch_size: usize) {
        let (tests, errors, stats) = collect(scheduler(batch_size, 7), INPUT.as_bytes()).await;

        assert!(errors.is_empty());
        // 5 targets, one with two addresses, 3 pairs each.
        assert_eq!(tests.len(), 6 * 3);
        assert_eq!(stats.tests, tests.len());
        assert_eq!(stats.lines, 5);

        let mut counts: HashMap<_, usize> = HashMap::new();
        for test in &tests {
            *counts.entry(key(test)).or_default() += 1;
        }
        assert_eq!(counts.len(), tests.len());
        assert!(counts.values().all(|&c| c == 1));
    }

    #[tokio::test]
    async fn test_no_shuffle_across_batches() {
        let (tests, _, stats) = collect(scheduler(2, 3), INPUT.as_bytes()).await;
        assert_eq!(stats.batches, 3);

        // First batch: one.example (3 tests) + two.example (6 tests).
        let first_batch: Vec<_> = tests[..9].iter().map(|t| t.url.as_str()).collect();
        assert!(first_batch
            .iter()
            .all(|u| *u == "http://one.example/" || *u == "http://two.example/"));
        assert!(tests[9..]
            .iter()
            .all(|t| t.url != "http://one.example/" && t.url != "http://two.example/"));
    }

    #[tokio::test]
    async fn test_seeded_order_is_reproducible() {
        let (a, _, _) = collect(scheduler(100, 42), INPUT.as_bytes()).await;
        let (b, _, _) = collect(scheduler(100, 42), INPUT.as_bytes()).await;
        let a: Vec<_> = a.iter().map(key).collect();
        let b: Vec<_> = b.iter().map(key).collect();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_bad_lines_are_skipped() {
        let input = "http://one.example/\nhttp://bad.example/\nftp://one.example/\nhttp://two.example/\n";
        let (tests, errors, stats) = collect(scheduler(2, 1), input.as_bytes()).await;

        assert_eq!(tests.len(), 3 + 6);
        assert_eq!(errors.len(), 2);
        assert_eq!(stats.skipped, 2);
        assert!(matches!(errors[0], InputError::Resolve(..)));
        assert!(matches!(errors[1], InputError::UnsupportedScheme(_)));
    }

    #[tokio::test]
    async fn test_empty_input() {
        let (tests, errors, stats) = collect(scheduler(10, 1), b"").await;
        assert!(tests.is_empty());
        assert!(errors.is_empty());
        assert_eq!(stats, SchedulerStats::default());
    }

    #[tokio::test]
    async fn test_exact_multiple_of_batch_size() {
        let input = "http://one.example/\nhttp://three.example/\n";
        let (tests, _, stats) = collect(scheduler(1, 1), input.as_bytes()).await;
        assert_eq!(tests.len(), 6);
        assert_eq!(stats.batches, 2);
    }

    #[tokio::test]
    async fn test_undecodable_line_is_skipped() {
        let input: &[u8] = b"http://one.example/\r\n\xff\xfe garbage\nhttp://three.example/\n";
        let (tests, errors, stats) = collect(scheduler(10, 1), input).await;

        assert_eq!(tests.len(), 6);
        assert!(tests.iter().any(|t| t.url == "http://one.example/"));
        assert!(tests.iter().any(|t| t.url == "http://three.example/"));
        assert_eq!(errors.len(), 1);
        assert!(matches!(&errors[0], InputError::InvalidLine(line) if line.ends_with(" garbage")));
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.lines, 2);
    }
}
