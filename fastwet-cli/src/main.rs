// Copyright 2025 Janek Bevendorff
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Convert a gzip-compressed WET archive into JSON Lines.
//!
//! ```text
//! fastwet [OPTIONS] <INPUT>
//!
//!   --chunk-size <BYTES>    read size (default 4096)
//!   --ignore-key-case       fold header keys to lowercase
//!   --latin1-headers        decode header lines as Windows-1252
//!   --record-type <TYPE>    only emit records of this WARC-Type
//!   -o, --output <PATH>     write to file instead of stdout
//!   -v, --verbose           debug logging
//! ```
//!
//! Every emitted line is `{"header": {...}, "body": "..."}`. Skipped records
//! are logged as warnings and never change the exit status; fatal errors
//! exit with code 1.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser as ClapParser;
use fastwet::{
    EncodingDetector, HeaderEncoding, HeaderMap, KeyCase, Parser, ParserConfig, WarcRecordType, DEFAULT_CHUNK_SIZE,
};
use serde::Serialize;

#[derive(ClapParser, Debug)]
#[command(name = "fastwet", version, about = "Convert WET archives into JSON Lines")]
struct Cli {
    /// Path to the `.warc.wet.gz` file.
    input: PathBuf,

    /// Bytes read from the decompressed stream at a time.
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    chunk_size: usize,

    /// Fold header keys to lowercase.
    #[arg(long)]
    ignore_key_case: bool,

    /// Decode header lines as Windows-1252 instead of strict UTF-8.
    #[arg(long)]
    latin1_headers: bool,

    /// Only emit records of this WARC-Type (e.g. `conversion`).
    #[arg(long, value_parser = parse_record_type)]
    record_type: Option<WarcRecordType>,

    /// Write JSON Lines to this file instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn parser_config(&self) -> ParserConfig {
        ParserConfig::default()
            .with_chunk_size(self.chunk_size)
            .with_key_case(if self.ignore_key_case { KeyCase::Insensitive } else { KeyCase::Sensitive })
            .with_header_encoding(if self.latin1_headers { HeaderEncoding::Latin1 } else { HeaderEncoding::Unicode })
    }
}

fn parse_record_type(value: &str) -> Result<WarcRecordType, String> {
    WarcRecordType::try_from(value).map_err(|e| format!("{e} Expected one of: warcinfo, response, resource, request, metadata, revisit, conversion, continuation, unknown"))
}

#[derive(Serialize)]
struct JsonLine<'a> {
    header: &'a HeaderMap,
    body: &'a str,
}

/// Write every entry of the run matching the record-type filter as one JSON
/// line to `out`. Returns the number of lines written.
///
/// Skipped records only show up in `parser.stats()`. A fatal parse error
/// aborts with an error.
fn emit<D: EncodingDetector, W: Write>(cli: &Cli, parser: &mut Parser<D>, mut out: W) -> Result<u64> {
    let entries = parser
        .parse_path(&cli.input)
        .with_context(|| format!("cannot open {}", cli.input.display()))?;

    let mut emitted = 0u64;
    for entry in entries {
        let entry = entry.with_context(|| format!("failed to parse {}", cli.input.display()))?;
        if cli.record_type.is_some_and(|t| t != entry.record_type()) {
            continue;
        }
        serde_json::to_writer(&mut out, &JsonLine { header: entry.header(), body: entry.body() })?;
        out.write_all(b"\n")?;
        emitted += 1;
    }
    out.flush().context("cannot flush output")?;
    Ok(emitted)
}

fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    let out: Box<dyn Write> = match path {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("cannot create {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };
    Ok(out)
}

fn run(cli: &Cli) -> Result<()> {
    let started = Instant::now();
    log::info!("parsing {} (started {})", cli.input.display(), Utc::now().format("%Y-%m-%dT%H:%M:%SZ"));

    let out = open_output(cli.output.as_deref())?;
    let mut parser = Parser::with_config(cli.parser_config());
    let emitted = emit(cli, &mut parser, out)?;

    log::info!(
        "finished {} in {:.3}s, {} entries written",
        cli.input.display(),
        started.elapsed().as_secs_f64(),
        emitted
    );
    log::info!("{}", parser.stats().summary());
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    if let Err(e) = run(&cli) {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}
