//! # proofforge-verify
//!
//! Operator CLI for checking ProofForge credentials against a node:
//! one-shot account verification, a `watch` mode that treats every stdin line
//! as a scanned QR payload, and QR code generation for verification links.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use proofforge_verifier::api::certificates::AccountCertificatesResponse;
use proofforge_verifier::config::Config;
use proofforge_verifier::error::CHAIN_FETCH_FAILED;
use proofforge_verifier::models::AccountId;
use proofforge_verifier::services::chain_session::{SessionSettings, SharedChainSession};
use proofforge_verifier::services::intake::{CredentialIntake, IntakeEvent};
use proofforge_verifier::services::orchestrator::{BatchOutcome, BatchResolver};
use proofforge_verifier::services::{presentation, qr_generator};

#[derive(Debug, Parser)]
#[command(name = "proofforge-verify", author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// URL of the node JSON-RPC endpoint (overrides NODE_URL)
    #[arg(short, long, global = true)]
    node_url: Option<String>,

    /// Assumed seconds per block used to estimate expiry dates
    #[arg(long, global = true)]
    block_interval: Option<i64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Resolve every certificate of one account
    Verify {
        /// Account address (SS58 or hex public key)
        account: String,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Read scanned payloads from stdin, one per line; newer scans supersede older ones
    Watch {
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Ask the runtime whether a single certificate is valid
    Valid {
        /// Certificate ID
        id: String,
    },

    /// Generate a QR code linking to an account's verification page
    Qr(QrArgs),
}

#[derive(Debug, Args)]
struct QrArgs {
    /// Account address to generate the QR code for
    #[arg(short, long)]
    account: String,

    /// Output PNG path
    #[arg(short, long)]
    out: PathBuf,

    /// Base URL for the verification page (overrides VERIFY_BASE_URL)
    #[arg(short, long)]
    base_url: Option<String>,

    /// Pixel size of one QR module
    #[arg(short, long, default_value_t = 8)]
    size: u32,

    /// Print the QR code to the terminal as well
    #[arg(short, long)]
    print: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut config = Config::from_env().context("Failed to load configuration")?;
    if let Some(node_url) = cli.node_url {
        config.node_url = node_url;
    }
    if let Some(interval) = cli.block_interval {
        anyhow::ensure!(interval > 0, "--block-interval must be positive");
        config.block_interval_seconds = interval;
    }

    match cli.command {
        Commands::Verify { account, json } => {
            let account = AccountId::parse(&account)?;
            let resolver = build_resolver(&config)?;
            let outcome = resolver
                .resolve_all(&account)
                .await
                .context(CHAIN_FETCH_FAILED)?;
            print_outcome(outcome, json)?;
        }
        Commands::Watch { json } => watch(build_resolver(&config)?, json).await?,
        Commands::Valid { id } => {
            let resolver = build_resolver(&config)?;
            let valid = resolver
                .is_certificate_valid(&id)
                .await
                .context("Failed to check certificate validity")?;
            println!(
                "Certificate #{} is {}",
                id,
                if valid { "valid" } else { "not valid" }
            );
        }
        Commands::Qr(args) => generate_qr(&config, args)?,
    }

    Ok(())
}

fn build_resolver(config: &Config) -> Result<BatchResolver<SharedChainSession>> {
    let settings = SessionSettings::from_config(config)?;
    Ok(
        BatchResolver::new(Arc::new(SharedChainSession::new(settings)))
            .with_block_interval(config.block_interval_seconds),
    )
}

fn print_outcome(outcome: BatchOutcome, json: bool) -> Result<()> {
    if json {
        let response = AccountCertificatesResponse::from(outcome);
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print!("{}", presentation::render_text(&outcome));
    }
    Ok(())
}

/// Continuous scanning: every accepted line starts a batch right away, and
/// only the result of the most recent scan is printed.
async fn watch(resolver: BatchResolver<SharedChainSession>, json: bool) -> Result<()> {
    let mut intake = CredentialIntake::new();
    intake.apply(IntakeEvent::Start)?;
    intake.apply(IntakeEvent::PermissionGranted)?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut in_flight = 0usize;

    eprintln!("Waiting for scans on stdin (Ctrl-D to finish)...");

    loop {
        if !stdin_open && in_flight == 0 {
            break;
        }

        tokio::select! {
            line = lines.next_line(), if stdin_open => {
                let Some(line) = line? else {
                    stdin_open = false;
                    continue;
                };
                if line.trim().is_empty() {
                    continue;
                }

                match intake.scan(&line) {
                    Ok((ticket, account)) => {
                        tracing::info!(ticket = %ticket, account = %account, "Scan accepted");
                        let resolver = resolver.clone();
                        let tx = tx.clone();
                        in_flight += 1;
                        tokio::spawn(async move {
                            let result = resolver.resolve_all(&account).await;
                            let _ = tx.send((ticket, result));
                        });
                    }
                    Err(e) => eprintln!("Ignoring scan: {}", e),
                }
            }
            Some((ticket, result)) = rx.recv(), if in_flight > 0 => {
                in_flight -= 1;
                match intake.accept(ticket, result) {
                    Some(Ok(outcome)) => print_outcome(outcome, json)?,
                    Some(Err(e)) => eprintln!("{}: {}", CHAIN_FETCH_FAILED, e),
                    None => {}
                }
            }
        }
    }

    intake.apply(IntakeEvent::Stop)?;
    Ok(())
}

fn generate_qr(config: &Config, args: QrArgs) -> Result<()> {
    let account = AccountId::parse(&args.account)?;
    let base_url = args.base_url.as_deref().unwrap_or(&config.verify_base_url);

    let url = qr_generator::verification_url(base_url, &account)?;
    println!("Creating QR code for URL: {}", url);

    if args.print {
        println!("\n{}", qr_generator::generate_qr_unicode(base_url, &account)?);
    }

    let png = qr_generator::generate_qr_png(base_url, &account, args.size)?;
    std::fs::write(&args.out, png)
        .with_context(|| format!("Failed to save QR code to {:?}", args.out))?;

    println!("QR code saved to {:?}", args.out);
    Ok(())
}
