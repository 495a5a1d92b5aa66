// SPDX-License-Identifier: AGPL-3.0-or-later
// LogCask - Columnar Log Archive Engine
// Copyright (C) 2026 Sushanth Reddy Vanagala (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! LogCask CLI
//!
//! ## Usage
//!
//! ```bash
//! # Compress JSON-lines log files into an archive
//! logcask compress app1.jsonl app2.jsonl --output-dir ./archives
//!
//! # Decompress an archive (unordered, or in original log order)
//! logcask decompress ./archives/<id> --output-dir ./out --ordered --chunk-size 100000
//!
//! # Search with a wildcard expression
//! logcask search ./archives/<id> "*error*connection?reset*" --ignore-case
//!
//! # Show archive statistics
//! logcask stats ./archives/<id>
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use logcask_archive::{
    decompress_ordered, ArchiveReader, ArchiveWriter, ArchiveWriterConfig,
};
use logcask_core::utf8::{filter_utf8, Utf8Policy};
use logcask_search::{search_archive, SearchConfig, StreamingOutputHandler};

/// LogCask - compressed columnar archives for JSON and unstructured logs
#[derive(Parser)]
#[command(name = "logcask")]
#[command(about = "Compress, decompress and search log archives")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress JSON-lines files into a new archive
    Compress {
        /// Input files (one JSON record per line)
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Directory to create the archive under
        #[arg(short, long, default_value = "archives")]
        output_dir: PathBuf,

        /// Dotted path of the record timestamp field
        #[arg(long, default_value = "timestamp")]
        timestamp_key: String,

        /// Zstd compression level
        #[arg(long, default_value = "3")]
        compression_level: i32,

        /// Target uncompressed bytes per segment
        #[arg(long, default_value = "268435456")]
        target_segment_size: u64,
    },

    /// Decompress an archive back to JSON lines
    Decompress {
        /// Archive directory
        archive: PathBuf,

        /// Output directory
        #[arg(short, long, default_value = "decompressed")]
        output_dir: PathBuf,

        /// Emit records in original log order
        #[arg(long)]
        ordered: bool,

        /// Records per output chunk in ordered mode (0 = one file)
        #[arg(long, default_value = "0")]
        chunk_size: u64,
    },

    /// Search an archive with a wildcard expression
    Search {
        /// Archive directory
        archive: PathBuf,

        /// Wildcard query (* any run, ? one char, \ escapes)
        query: String,

        /// Case-insensitive matching
        #[arg(short, long)]
        ignore_case: bool,

        /// Only match events at or after this epoch-ms timestamp
        #[arg(long)]
        begin_ts: Option<i64>,

        /// Only match events at or before this epoch-ms timestamp
        #[arg(long)]
        end_ts: Option<i64>,

        /// Prefix each result with its timestamp
        #[arg(short, long)]
        timestamps: bool,
    },

    /// Print archive statistics
    Stats {
        /// Archive directory
        archive: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run(cli.command) {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Compress {
            inputs,
            output_dir,
            timestamp_key,
            compression_level,
            target_segment_size,
        } => compress(
            inputs,
            output_dir,
            timestamp_key,
            compression_level,
            target_segment_size,
        ),
        Commands::Decompress {
            archive,
            output_dir,
            ordered,
            chunk_size,
        } => decompress(archive, output_dir, ordered, chunk_size),
        Commands::Search {
            archive,
            query,
            ignore_case,
            begin_ts,
            end_ts,
            timestamps,
        } => search(archive, query, ignore_case, begin_ts, end_ts, timestamps),
        Commands::Stats { archive } => stats(archive),
    }
}

fn compress(
    inputs: Vec<PathBuf>,
    output_dir: PathBuf,
    timestamp_key: String,
    compression_level: i32,
    target_segment_size: u64,
) -> Result<()> {
    let mut config = ArchiveWriterConfig::new(&output_dir);
    config.timestamp_key = Some(timestamp_key);
    config.compression_level = compression_level;
    config.target_segment_size = target_segment_size;

    let mut writer = ArchiveWriter::create(config).context("creating the archive")?;
    for input in &inputs {
        let file = File::open(input).with_context(|| format!("opening {}", input.display()))?;
        writer.start_file(&input.display().to_string())?;
        let mut reader = BufReader::new(file);
        let mut raw_line = Vec::new();
        let mut line_no = 0usize;
        loop {
            raw_line.clear();
            if reader.read_until(b'\n', &mut raw_line)? == 0 {
                break;
            }
            line_no += 1;
            // Invalid byte sequences become U+FFFD rather than aborting
            // the whole ingest.
            let line = filter_utf8(&raw_line, Utf8Policy::Substitute)
                .with_context(|| format!("{}:{}", input.display(), line_no))?;
            if line.trim().is_empty() {
                continue;
            }
            let record: serde_json::Value = serde_json::from_str(line.trim_end())
                .with_context(|| format!("{}:{}: invalid JSON", input.display(), line_no))?;
            writer
                .ingest_record(&record)
                .with_context(|| format!("{}:{}", input.display(), line_no))?;
        }
        writer.finish_file()?;
    }
    let metadata = writer.close().context("sealing the archive")?;
    println!(
        "archive {} ({} events, {} segments, {} -> {} bytes)",
        metadata.archive_id,
        metadata.num_log_events,
        metadata.num_segments,
        metadata.uncompressed_size,
        metadata.compressed_size,
    );
    Ok(())
}

fn open_archive(archive: PathBuf) -> Result<ArchiveReader> {
    let mut reader = ArchiveReader::open(archive).context("opening the archive")?;
    reader
        .read_dictionaries_and_metadata()
        .context("loading archive metadata")?;
    Ok(reader)
}

fn decompress(archive: PathBuf, output_dir: PathBuf, ordered: bool, chunk_size: u64) -> Result<()> {
    let reader = open_archive(archive)?;
    if ordered {
        let chunks = decompress_ordered(&reader, &output_dir, chunk_size, None)?;
        for chunk in chunks {
            println!("{}", chunk.display());
        }
    } else {
        std::fs::create_dir_all(&output_dir)?;
        let path = output_dir.join(format!("{}.jsonl", reader.metadata().archive_id));
        let mut out = std::io::BufWriter::new(File::create(&path)?);
        use std::io::Write;
        for mut table in reader.read_all_tables(true)? {
            while let Some((_, message)) = table.next_message()? {
                out.write_all(message.as_bytes())?;
                out.write_all(b"\n")?;
            }
        }
        out.flush()?;
        println!("{}", path.display());
    }
    Ok(())
}

fn search(
    archive: PathBuf,
    query: String,
    ignore_case: bool,
    begin_ts: Option<i64>,
    end_ts: Option<i64>,
    timestamps: bool,
) -> Result<()> {
    let reader = open_archive(archive)?;
    let config = SearchConfig {
        query,
        case_sensitive: !ignore_case,
        heuristic_substitution: false,
        begin_ts,
        end_ts,
    };
    let stdout = std::io::stdout();
    let mut handler = StreamingOutputHandler::new(stdout.lock(), timestamps);
    let cancel = AtomicBool::new(false);
    let count = search_archive(&reader, &config, &mut handler, &cancel)?;
    tracing::info!(results = count, "search finished");
    Ok(())
}

fn stats(archive: PathBuf) -> Result<()> {
    let reader = open_archive(archive)?;
    let metadata = reader.metadata();
    println!("archive:           {}", metadata.archive_id);
    println!("creator:           {}", metadata.creator_id);
    println!("format version:    {}", metadata.format_version);
    println!("log events:        {}", metadata.num_log_events);
    println!("segments:          {}", metadata.num_segments);
    println!("time range:        {} .. {}", metadata.begin_timestamp, metadata.end_timestamp);
    println!("uncompressed:      {} bytes", metadata.uncompressed_size);
    println!("compressed:        {} bytes", metadata.compressed_size);
    println!("schema tree nodes: {}", reader.schema_tree()?.size());
    println!("logtypes:          {}", reader.logtype_dict()?.len());
    println!("variables:         {}", reader.var_dict()?.len());
    println!("input files:       {}", reader.files()?.len());
    Ok(())
}
