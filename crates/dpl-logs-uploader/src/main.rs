use std::{process::ExitCode, sync::Arc};

use tokio_util::sync::CancellationToken;

use dpl_core::{config::UploaderConfig, uploader::LogUploader};
use dpl_ssh::SshRemote;
use dpl_telegram::TelegramMessenger;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = dpl_core::logging::init("dpl-logs-uploader") {
        eprintln!("{e}");
    }

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report(&e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<()> {
    let cfg = UploaderConfig::load()?;
    tracing::debug!(config = ?cfg, "loaded configuration");

    let messenger = Arc::new(TelegramMessenger::from_token(cfg.bot_token.clone()));
    if cfg.configured_destination().is_none() {
        match messenger.username().await {
            Ok(name) => println!("🤖 Listening as @{name}"),
            Err(e) => tracing::warn!(error = %e, "could not identify bot"),
        }
    }
    let remote = Arc::new(SshRemote::new(cfg.strict_host_key_checking));

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    // Ctrl-C only ends the /logs wait; an upload already under way finishes.
    let report = LogUploader::new(cfg, messenger, remote).run(&cancel).await?;
    tracing::info!(
        destination = %report.destination,
        resolution = ?report.resolution,
        message_id = report.message.message_id.0,
        "upload finished"
    );
    Ok(())
}

fn report(e: &anyhow::Error) {
    match e.downcast_ref::<dpl_core::Error>() {
        Some(dpl_core::Error::MissingConfig(keys)) => {
            eprintln!("❌ Missing required environment variables:");
            for key in keys {
                eprintln!("   - {key}");
            }
        }
        Some(err) => eprintln!("❌ Error: {err}"),
        None => eprintln!("❌ Error: {e:#}"),
    }
    if let Some(hint) = e.downcast_ref::<dpl_core::Error>().and_then(|err| err.hint()) {
        eprintln!("\n{hint}");
    }
}
