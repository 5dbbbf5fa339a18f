// File: sink.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use crate::error::{ScanError, ScanResult};
use crate::scan_state::ScanState;
use crate::smuggle_test::SmuggleTest;
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use log::error;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub type OutputWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Opens the result destination: standard output for `-`, otherwise the
/// named file, truncated.
pub async fn open_output(output: &str) -> std::io::Result<OutputWriter> {
    if output == "-" {
        return Ok(Box::new(tokio::io::stdout()));
    }

    let file = tokio::fs::File::create(output).await?;
    Ok(Box::new(tokio::io::BufWriter::new(file)))
}

pub fn progress_spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {pos} tests {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

/// Writes each completed test as one JSON line.
pub struct ResultSink<W> {
    writer: W,
    state: ScanState,
    progress: Option<ProgressBar>,
}

impl<W> ResultSink<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(writer: W, progress: Option<ProgressBar>) -> Self {
        Self {
            writer,
            state: ScanState::new(),
            progress,
        }
    }

    pub async fn emit(&mut self, test: &SmuggleTest) -> ScanResult<()> {
        self.state.record(test);

        if let Some(pb) = &self.progress {
            pb.inc(1);
            let vulnerable = self.state.findings().len();
            if vulnerable > 0 {
                pb.set_message(format!("({} vulnerable)", vulnerable));
            }
        }

        match serde_json::to_vec(test) {
            Ok(mut line) => {
                line.push(b'\n');
                self.writer.write_all(&line).await?;
            }
            Err(e) => error!("Error JSON marshalling test {} {:?}: {}", test.url, test.mutations, e),
        }

        Ok(())
    }

    /// Drains `results` until every producer is gone, then flushes.
    pub async fn drain(mut self, mut results: mpsc::Receiver<SmuggleTest>) -> ScanResult<ScanState> {
        while let Some(test) = results.recv().await {
            self.emit(&test).await?;
        }

        self.writer.flush().await.map_err(ScanError::Io)?;
        if let Some(pb) = &self.progress {
            pb.finish_and_clear();
        }

        self.state.set_end_time(Utc::now());
        Ok(self.state)
    }
}

impl<W> ResultSink<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn spawn(self, results: mpsc::Receiver<SmuggleTest>) -> JoinHandle<ScanResult<ScanState>> {
        tokio::spawn(self.drain(results))
    }
}
