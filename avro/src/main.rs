// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use avro_peek::{
    AvroResult, DispatchConfig, Dispatcher, Error, Handler, HandlerKind, OutputSink,
    dispatch::{DEFAULT_QUEUE_CAPACITY, default_script_engine},
    error::Details,
    input::expand_input,
    process_file,
};
use clap::Parser;
use log::info;
use std::{io::Write, process::ExitCode, str::FromStr};

#[derive(Parser, Debug)]
#[command(
    name = "avro-peek",
    version,
    about = "Print, select or script the records of Avro container files"
)]
struct Cli {
    /// Input file or glob pattern
    #[arg(short, long)]
    input: String,
    /// Handler: cat, json, field_print, script_inline or script_file
    #[arg(short = 'c', long = "handler", value_parser = parse_handler)]
    handler: HandlerKind,
    /// Comma separated field paths, inline script text or script file path
    #[arg(short, long)]
    param: Option<String>,
    /// Stop after this many records of each file
    #[arg(short = 'n', long)]
    count: Option<usize>,
    /// Handler threads; 1 runs the handler on the decoding thread
    #[arg(short = 'j', long, default_value_t = 1)]
    threads: usize,
    /// Records that may wait for a handler thread
    #[arg(short = 'q', long, default_value_t = DEFAULT_QUEUE_CAPACITY)]
    queue_capacity: usize,
    /// Do not print a `--- [i] path ---` line before each file
    #[arg(long)]
    no_banner: bool,
}

fn parse_handler(name: &str) -> Result<HandlerKind, String> {
    HandlerKind::from_str(name)
        .map_err(|_| Error::from(Details::UnknownHandler(name.to_string())).to_string())
}

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format(|buf, record| writeln!(buf, "[{}] {}", record.level(), record.args()))
        .init();
}

/// Runs every input file through the handler; `Ok(false)` if any file failed.
fn run(cli: &Cli) -> AvroResult<bool> {
    let handler = Handler::from_kind(cli.handler, cli.param.as_deref())?;
    let paths = expand_input(&cli.input)?;
    let sink = OutputSink::stdout();
    let config = DispatchConfig::builder()
        .threads(cli.threads)
        .queue_capacity(cli.queue_capacity)
        .build();
    let mut dispatcher = Dispatcher::new(&handler, sink.clone(), config, default_script_engine())?;

    let mut all_ok = true;
    for (i, path) in paths.iter().enumerate() {
        if !cli.no_banner {
            sink.emit(&format!("--- [{i}] {} ---\n", path.display()))?;
        }
        info!("Processing {}", path.display());
        if let Err(e) = process_file(path, cli.count, &mut dispatcher) {
            eprintln!("avro-peek: {}: {:?}", path.display(), e.details());
            all_ok = false;
        }
    }
    dispatcher.finish()?;
    Ok(all_ok)
}

fn main() -> ExitCode {
    init_logger();
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("avro-peek: {:?}", e.details());
            ExitCode::FAILURE
        }
    }
}
