use anyhow::Result;
use dotenvy::dotenv;
use std::io::BufRead;
use std::path::Path;
use std::sync::Arc;
use teloxide::prelude::*;
use tokio::sync::watch;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use cybertutor::cli::{Cli, Commands};
use cybertutor::conversation::{password, upload, FlowDeps};
use cybertutor::core::{config, init_logger, install_panic_hook, log_services_configuration};
use cybertutor::i18n;
use cybertutor::services::scan::{ScanJob, ScanOrchestrator, ScanProgress, ScanSettings, VirusTotalClient};
use cybertutor::services::BreachClient;
use cybertutor::storage::create_pool;
use cybertutor::telegram::{create_bot, schema, setup_bot_commands, TelegramTransport};

/// Main entry point for the bot
///
/// Parses CLI arguments and dispatches to the chosen subcommand.
///
/// # Errors
/// Returns an error if initialization fails (logging, database, bot creation).
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    install_panic_hook();

    // Load environment variables from .env if present
    let _ = dotenv();

    // Initialize logger (console + file)
    init_logger(&config::LOG_FILE_PATH)?;

    match cli.command {
        None | Some(Commands::Run) => run_bot().await,
        Some(Commands::CheckPassword) => run_check_password().await,
        Some(Commands::Scan { path }) => run_scan(&path).await,
    }
}

fn http_client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder().timeout(config::network::timeout()).build()?)
}

async fn run_bot() -> Result<()> {
    log::info!("Starting bot...");
    config::validate()?;
    log_services_configuration();

    let bot = create_bot()?;

    // Retry while the Bot API is unreachable (network still coming up)
    let me = {
        let mut attempt = 0;
        loop {
            match bot.get_me().await {
                Ok(me) => break me,
                Err(e) => {
                    attempt += 1;
                    if attempt >= config::retry::STARTUP_MAX_RETRIES {
                        return Err(anyhow::anyhow!(
                            "Failed to connect to Bot API after {} retries: {}",
                            attempt,
                            e
                        ));
                    }
                    log::warn!(
                        "Bot API not ready (attempt {}/{}): {}. Retrying in {} seconds...",
                        attempt,
                        config::retry::STARTUP_MAX_RETRIES,
                        e,
                        config::retry::STARTUP_RETRY_DELAY_SECS
                    );
                    sleep(config::retry::startup_delay()).await;
                }
            }
        }
    };
    log::info!("Bot username: {:?}, Bot ID: {}", me.username, me.id);

    if let Err(e) = setup_bot_commands(&bot).await {
        log::warn!("Failed to register bot commands: {}", e);
    }

    let db_pool = Arc::new(
        create_pool(&config::DATABASE_PATH).map_err(|e| anyhow::anyhow!("Failed to create database pool: {}", e))?,
    );

    let http = http_client()?;
    let scan_settings = Arc::new(ScanSettings::from_env());
    let scanner = ScanOrchestrator::new(
        Arc::new(VirusTotalClient::new(
            http.clone(),
            scan_settings.api_url.clone(),
            scan_settings.api_key.clone(),
        )),
        scan_settings.policy,
    );
    let deps = FlowDeps::new(
        Arc::new(TelegramTransport::new(bot.clone())),
        db_pool,
        Arc::new(BreachClient::from_env(http)),
        scanner,
        scan_settings,
    );

    log::info!("Dispatcher started, waiting for updates");
    Dispatcher::builder(bot, schema(deps))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    log::info!("Bot stopped");
    Ok(())
}

/// Reads one line from stdin and prints the breach check result.
async fn run_check_password() -> Result<()> {
    println!("Enter the password to check (input is not stored):");
    let mut secret = String::new();
    std::io::stdin().lock().read_line(&mut secret)?;
    let secret = secret.trim_end_matches(['\r', '\n']);
    if secret.trim().is_empty() {
        anyhow::bail!("empty password");
    }

    let client = BreachClient::from_env(http_client()?);
    let result = client.check_secret(secret).await;
    println!("{}", password::render_result(&i18n::DEFAULT_LANG, &result));
    result?;
    Ok(())
}

/// Scans a local file with the same orchestrator the bot uses, printing
/// every status change. Ctrl-C cancels the scan.
async fn run_scan(path: &Path) -> Result<()> {
    let lang = &*i18n::DEFAULT_LANG;
    let settings = ScanSettings::from_env();
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload.bin")
        .to_string();

    let size = tokio::fs::metadata(path).await?.len();
    if let Err(e) = ScanJob::check_declared_size(size, settings.max_file_size) {
        anyhow::bail!(upload::render_error(lang, &e));
    }
    let bytes = tokio::fs::read(path).await?;

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let mut job = ScanJob::new(bytes, &name, size, settings.max_file_size, cancel)
        .map_err(|e| anyhow::anyhow!(upload::render_error(lang, &e)))?;
    let orchestrator = ScanOrchestrator::new(
        Arc::new(VirusTotalClient::new(
            http_client()?,
            settings.api_url.clone(),
            settings.api_key.clone(),
        )),
        settings.policy,
    );

    let (tx, mut rx) = watch::channel(ScanProgress::queued(settings.policy.max_attempts));
    let started = tokio::time::Instant::now();
    let printer_name = job.filename().to_string();
    let printer_lang = lang.clone();
    let printer = tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let progress = *rx.borrow_and_update();
            println!(
                "{}",
                upload::status_reply(&printer_lang, &printer_name, &progress, started.elapsed()).text
            );
        }
    });

    let outcome = orchestrator.run(&mut job, &tx).await;
    drop(tx);
    let _ = printer.await;

    println!("{}", upload::render_outcome(lang, job.filename(), &outcome));
    Ok(())
}
