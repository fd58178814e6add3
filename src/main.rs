//! MCDF CLI - Command-line tool for MCDF character archives.
//!
//! This is the main entry point for the `mcdf` command-line application.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use mcdf::format::{compression, ContentStore};
use mcdf::prelude::*;

/// MCDF - character data archive tool
#[derive(Parser)]
#[command(name = "mcdf")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build an archive from a character snapshot
    Pack {
        /// Snapshot JSON file
        #[arg(short, long)]
        snapshot: PathBuf,

        /// Content store directory
        #[arg(long, env = "MCDF_STORE")]
        store: PathBuf,

        /// Output archive
        #[arg(short, long)]
        output: PathBuf,

        /// Archive description
        #[arg(short, long, default_value = "")]
        description: String,

        /// Zstandard compression level
        #[arg(short, long, env = "MCDF_LEVEL", default_value_t = compression::DEFAULT_LEVEL)]
        level: i32,

        /// Fail instead of skipping files missing from the store
        #[arg(long)]
        strict: bool,
    },

    /// Show the header of an archive
    Inspect {
        /// Archive file
        #[arg(short, long)]
        input: PathBuf,

        /// Print the metadata as JSON
        #[arg(long)]
        json: bool,
    },

    /// Extract the files of an archive into a directory
    Extract {
        /// Archive file
        #[arg(short, long)]
        input: PathBuf,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,

        /// Content store; files it already holds are not extracted
        #[arg(long, env = "MCDF_STORE")]
        store: Option<PathBuf>,
    },

    /// Read a whole archive and check its body lengths
    Verify {
        /// Archive file
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Print content hashes of files
    Hash {
        /// Files to hash
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Also copy the files into this content store
        #[arg(long)]
        store: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Pack {
            snapshot,
            store,
            output,
            description,
            level,
            strict,
        } => {
            let options = ArchiveOptions {
                compression_level: level,
                strict_content: strict,
                ..Default::default()
            };
            cmd_pack(&snapshot, &store, &output, &description, &options)?;
        }
        Commands::Inspect { input, json } => {
            cmd_inspect(&input, json)?;
        }
        Commands::Extract { input, output, store } => {
            cmd_extract(&input, &output, store.as_deref())?;
        }
        Commands::Verify { input } => {
            cmd_verify(&input)?;
        }
        Commands::Hash { files, store } => {
            cmd_hash(&files, store.as_deref())?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_pack(
    snapshot_path: &Path,
    store_path: &Path,
    output: &Path,
    description: &str,
    options: &ArchiveOptions,
) -> Result<()> {
    let json = fs::read(snapshot_path).context("Failed to read snapshot file")?;
    let snapshot: CharacterSnapshot = serde_json::from_slice(&json).context("Failed to parse snapshot")?;
    let store = DirectoryStore::open(store_path).context("Failed to open content store")?;

    let plan = ArchivePlan::build(&snapshot, description, &store, options).context("Failed to plan archive")?;
    let total = plan.metadata().files.len();
    println!(
        "Packing {} files, {} swaps ({} bytes) into {}",
        total,
        plan.metadata().file_swaps.len(),
        plan.metadata().body_len(),
        output.display()
    );

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );

    let start = Instant::now();
    let report = plan
        .save_with_progress(output, options, &mut |p| pb.set_position(p.files_done as u64))
        .context("Failed to write archive")?;
    pb.finish_with_message("Done");

    println!(
        "Wrote {} bytes ({} uncompressed) in {:?}",
        report.archive_bytes,
        report.body_bytes,
        start.elapsed()
    );

    if !report.skipped.is_empty() {
        println!("Skipped {} replacements with no local file:", report.skipped.len());
        for skipped in &report.skipped {
            let hash = skipped.hash.map(|h| h.to_string()).unwrap_or_else(|| "<no hash>".to_string());
            for game_path in &skipped.game_paths {
                println!("  {} ({})", game_path, hash);
            }
        }
    }

    Ok(())
}

fn cmd_inspect(input: &Path, json: bool) -> Result<()> {
    let header = mcdf::format::read_header(input).context("Failed to read archive header")?;
    let metadata = header.metadata();

    if json {
        println!("{}", serde_json::to_string_pretty(metadata)?);
        return Ok(());
    }

    println!("Version: {}", header.version());
    println!("Description: {}", metadata.description);
    println!(
        "Customization: glamour {} bytes, body shape {} bytes, manipulation {} bytes",
        metadata.customization.glamour.len(),
        metadata.customization.body_shape.len(),
        metadata.manipulation.len()
    );

    println!("\nFiles ({}, {} bytes):", metadata.files.len(), header.expected_body_len());
    for file in &metadata.files {
        let paths: Vec<&str> = file.game_paths.iter().map(String::as_str).collect();
        println!("{:>12} {}", file.byte_length, paths.join(", "));
    }

    if !metadata.file_swaps.is_empty() {
        println!("\nSwaps ({}):", metadata.file_swaps.len());
        for swap in &metadata.file_swaps {
            for game_path in &swap.game_paths {
                println!("  {} -> {}", game_path, swap.swap_target);
            }
        }
    }

    println!("\nTotal: {} game paths", header.game_path_count());

    Ok(())
}

fn cmd_extract(input: &Path, output: &Path, store_path: Option<&Path>) -> Result<()> {
    println!("Extracting: {} -> {}", input.display(), output.display());

    let store = store_path
        .map(DirectoryStore::open)
        .transpose()
        .context("Failed to open content store")?;

    let start = Instant::now();
    let options = ArchiveOptions::default();
    let mut reader = ArchiveReader::open(input, &options).context("Failed to open archive")?;
    let extracted = reader
        .extract(output, store.as_ref().map(|s| s as &dyn ContentStore))
        .context("Failed to extract archive")?;

    for (game_path, local) in &extracted.mapping {
        println!("{} -> {}", game_path, local.display());
    }
    for conflict in &extracted.conflicts {
        eprintln!("warning: {} is claimed by more than one entry", conflict);
    }
    if extracted.trailing_bytes > 0 {
        eprintln!("warning: {} unexpected bytes after the declared body", extracted.trailing_bytes);
    }

    let kept = extracted.temp_files.keep();
    println!(
        "Extracted {} files ({} reused from store) in {:?}",
        kept.len(),
        extracted.reused,
        start.elapsed()
    );

    Ok(())
}

fn cmd_verify(input: &Path) -> Result<()> {
    let options = ArchiveOptions::default();
    let mut reader = ArchiveReader::open(input, &options).context("Failed to open archive")?;
    let expected = reader.header().expected_body_len();
    let report = reader.verify().context("Archive body is invalid")?;

    println!("{} files, {} of {} body bytes", report.files, report.body_bytes, expected);

    if report.trailing_bytes > 0 {
        anyhow::bail!("{} unexpected bytes after the declared body", report.trailing_bytes);
    }

    println!("OK");

    Ok(())
}

fn cmd_hash(files: &[PathBuf], store_path: Option<&Path>) -> Result<()> {
    let mut store = store_path
        .map(DirectoryStore::open)
        .transpose()
        .context("Failed to open content store")?;

    for file in files {
        let hash = match store.as_mut() {
            Some(store) => store.insert(file),
            None => ContentHash::of_file(file).map_err(Into::into),
        }
        .with_context(|| format!("Failed to hash {}", file.display()))?;

        println!("{}  {}", hash, file.display());
    }

    Ok(())
}
