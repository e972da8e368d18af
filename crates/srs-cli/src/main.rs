// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use url::Url;

use srs_store::{
    format_size, is_valid_srs_name, missing_names, DirSrsStore, SrsBlob, SrsMirror, SrsStore,
    REQUIRED_SRS_NAMES,
};

#[derive(Parser)]
#[command(name = "srs-cli", version, about = "Manage the SRS parameter store proving hosts read from")]
struct Cli {
    /// Store directory
    #[arg(long, env = "SRS_STORE_DIR", default_value = "./srs-store")]
    store_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List stored blobs and any required ones that are missing
    Status,
    /// Download missing required blobs from a distribution mirror
    Fetch {
        /// Mirror base URL
        #[arg(long, env = "SRS_MIRROR_URL")]
        mirror: Url,
    },
    /// Import SRS files by basename; names outside the expected SRS set
    /// are skipped
    Import { files: Vec<PathBuf> },
    /// Remove blobs by name
    Remove { names: Vec<String> },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let store = DirSrsStore::open(&cli.store_dir).await?;

    match cli.command {
        Commands::Status => status(&store).await,
        Commands::Fetch { mirror } => fetch(store, mirror).await,
        Commands::Import { files } => import(&store, files).await,
        Commands::Remove { names } => remove(&store, names).await,
    }
}

async fn status(store: &DirSrsStore) -> Result<()> {
    for entry in store.list().await? {
        println!(
            "PRESENT\t{}\t{}\t{}",
            entry.name,
            format_size(entry.size),
            entry.uploaded_at.to_rfc3339()
        );
    }
    for name in missing_names(store, &REQUIRED_SRS_NAMES).await? {
        println!("MISSING\t{name}");
    }
    Ok(())
}

async fn fetch(store: DirSrsStore, mirror: Url) -> Result<()> {
    let mirror = SrsMirror::over_http(store, mirror);
    let mut failed = 0usize;
    for result in mirror.sync_missing().await? {
        match result.outcome {
            Ok(size) => println!("FETCHED\t{}\t{}", result.name, format_size(size)),
            Err(err) => {
                failed += 1;
                println!("FAILED\t{}\t{}", result.name, err);
            }
        }
    }
    if failed > 0 {
        anyhow::bail!("{failed} download(s) failed");
    }
    Ok(())
}

async fn import(store: &DirSrsStore, files: Vec<PathBuf>) -> Result<()> {
    for file in files {
        let name = file
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string)
            .with_context(|| format!("{} has no usable file name", file.display()))?;
        if !is_valid_srs_name(&name) {
            println!("SKIPPED\t{name}\tonly SRS.CK.BIN and SRS.LK.9.BIN are accepted");
            continue;
        }
        let content = tokio::fs::read(&file)
            .await
            .with_context(|| format!("reading {}", file.display()))?;
        let size = content.len() as u64;
        store.put(SrsBlob::new(name.clone(), content.into())).await?;
        println!("IMPORTED\t{}\t{}", name.to_lowercase(), format_size(size));
    }
    Ok(())
}

async fn remove(store: &DirSrsStore, names: Vec<String>) -> Result<()> {
    for name in names {
        if store.delete(&name).await? {
            println!("REMOVED\t{name}");
        } else {
            println!("ABSENT\t{name}");
        }
    }
    Ok(())
}
