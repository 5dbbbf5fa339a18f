/*
Copyright 2022 Volker Schwaberow <volker@schwaberow.de>
Permission is hereby granted, free of charge, to any person obtaining a
copy of this software and associated documentation files (the
"Software"), to deal in the Software without restriction, including without
limitation the rights to use, copy, modify, merge, publish, distribute,
sublicense, and/or sell copies of the Software, and to permit persons to whom the
Software is furnished to do so, subject to the following conditions:
The above copyright notice and this permission notice shall be
included in all copies or substantial portions of the Software.
THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS
OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF
MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT
SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR
OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE,
ARISING FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
DEALINGS IN THE SOFTWARE.
Author(s): Volker Schwaberow
*/

use clap::Parser;
use colored::*;
use junker::cli::Cli;
use junker::runner::Scanner;
use junker::sink::{open_output, progress_spinner};
use log::debug;
use simple_logger::SimpleLogger;
use tokio::io::{AsyncBufRead, BufReader};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = match cli.log_level() {
        Ok(level) => level,
        Err(e) => {
            eprintln!("{} {}", "Error:".red(), e);
            std::process::exit(2);
        }
    };

    if let Err(e) = SimpleLogger::new().with_level(level).init() {
        eprintln!("Failed to initialise logger: {}", e);
    }

    if let Err(e) = run(cli).await {
        eprintln!("{} {}", "Error:".red(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), BoxError> {
    let config = cli.to_config();
    config.validate()?;

    let input: Box<dyn AsyncBufRead + Unpin + Send> = match &cli.input {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .map_err(|e| format!("Failed to open input file {}: {}", path.display(), e))?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(BufReader::new(tokio::io::stdin())),
    };

    let output = open_output(config.output())
        .await
        .map_err(|e| format!("Failed to open output file {}: {}", config.output(), e))?;

    let scanner = Scanner::new(config)?;
    let progress = (!cli.quiet).then(progress_spinner);

    let report = scanner.run(input, output, progress).await?;
    debug!("Scheduler stats: {:?}", report.scheduler);

    if !cli.quiet {
        eprint!("{}", report.state.summary());
    }

    Ok(())
}
