// SPDX-License-Identifier: Apache-2.0
//! hdag developer CLI: organize adjacency text into bundle files,
//! inspect and dump them, and merge new input into a database directory.
#![allow(clippy::print_stdout)]

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hdag_core::Bundle;
use hdag_store::file::{decode_bundle, summarize, write_bundle_file};
use hdag_store::Database;
use hdag_text::{write_text, TextSource};

#[derive(Parser)]
#[command(
    name = "hdag",
    about = "Storage engine for hash-addressed directed acyclic graphs",
    version,
    disable_help_subcommand = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Organize adjacency-list text into a bundle file.
    Organize {
        /// Input text file, or `-` for standard input.
        input: PathBuf,
        /// Output bundle file.
        #[arg(short, long)]
        output: PathBuf,
        /// Hash length in bytes.
        #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
        hash_len: u16,
    },
    /// Print the counts and enumeration spread of a bundle file.
    Inspect {
        /// Bundle file to inspect.
        bundle: PathBuf,
    },
    /// Render a bundle file back into adjacency-list text.
    Dump {
        /// Bundle file to dump.
        bundle: PathBuf,
    },
    /// Merge adjacency-list text into a database directory.
    Merge {
        /// Database directory; created when missing.
        #[arg(long)]
        db: PathBuf,
        /// Input text file, or `-` for standard input.
        input: PathBuf,
        /// Hash length in bytes; required for an empty database and
        /// otherwise taken from it.
        #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
        hash_len: Option<u16>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .without_time()
        .with_writer(io::stderr)
        .init();

    match Cli::parse().command {
        Commands::Organize {
            input,
            output,
            hash_len,
        } => organize(&input, &output, hash_len),
        Commands::Inspect { bundle } => inspect(&bundle),
        Commands::Dump { bundle } => dump(&bundle),
        Commands::Merge {
            db,
            input,
            hash_len,
        } => merge(&db, &input, hash_len),
    }
}

/// Opens `path` as a buffered reader, mapping `-` to standard input.
fn open_input(path: &Path) -> Result<Box<dyn BufRead>> {
    if path.as_os_str() == "-" {
        Ok(Box::new(BufReader::new(io::stdin())))
    } else {
        let file = File::open(path)
            .with_context(|| format!("cannot open input {}", path.display()))?;
        Ok(Box::new(BufReader::new(file)))
    }
}

fn read_bundle(path: &Path) -> Result<Bundle> {
    let data =
        fs::read(path).with_context(|| format!("cannot read bundle {}", path.display()))?;
    decode_bundle(&data).with_context(|| format!("invalid bundle file {}", path.display()))
}

fn organize(input: &Path, output: &Path, hash_len: u16) -> Result<()> {
    let mut source = TextSource::new(open_input(input)?, hash_len);
    let mut bundle = Bundle::ingest(&mut source).context("cannot ingest input")?;
    bundle.organize().context("cannot organize input")?;
    write_bundle_file(output, &bundle)
        .with_context(|| format!("cannot write bundle {}", output.display()))?;
    println!(
        "organized {} nodes ({} unknown) into {}",
        bundle.len(),
        bundle.unknown_hashes().len(),
        output.display()
    );
    Ok(())
}

fn inspect(path: &Path) -> Result<()> {
    let data =
        fs::read(path).with_context(|| format!("cannot read bundle {}", path.display()))?;
    let summary =
        summarize(&data).with_context(|| format!("invalid bundle file {}", path.display()))?;
    println!("hash length:  {} bytes", summary.hash_len);
    println!("nodes:        {}", summary.node_count);
    println!("extra edges:  {}", summary.extra_edge_count);
    println!("unknown:      {}", summary.unknown_count);
    println!("file size:    {} bytes", summary.file_len);

    let bundle = decode_bundle(&data)
        .with_context(|| format!("invalid bundle file {}", path.display()))?;
    let generations = bundle.nodes().iter().map(|node| node.generation);
    let components = bundle.nodes().iter().map(|node| node.component);
    println!("generations:  {}", generations.max().unwrap_or(0));
    println!("components:   {}", components.max().unwrap_or(0));
    Ok(())
}

fn dump(path: &Path) -> Result<()> {
    let bundle = read_bundle(path)?;
    print!("{}", write_text(&bundle).context("cannot render bundle")?);
    Ok(())
}

fn merge(db_dir: &Path, input: &Path, hash_len: Option<u16>) -> Result<()> {
    let mut db = Database::open(db_dir)
        .with_context(|| format!("cannot open database {}", db_dir.display()))?;
    let hash_len = match (db.hash_len(), hash_len) {
        (Some(stored), _) => stored,
        (None, Some(given)) => given,
        (None, None) => {
            anyhow::bail!("--hash-len is required for an empty database")
        }
    };
    let mut source = TextSource::new(open_input(input)?, hash_len);
    let report = db.merge(&mut source).context("merge failed")?;
    match report.written {
        Some(path) => println!(
            "merged into {} ({} superseded file(s) removed)",
            path.display(),
            report.removed.len()
        ),
        None => println!("nothing new to merge"),
    }
    Ok(())
}
