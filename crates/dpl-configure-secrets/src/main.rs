use std::{process::ExitCode, sync::Arc};

use dpl_core::{config::SecretsConfig, secrets::SecretsConfigurator};
use dpl_gh::{GhCli, GitCli};

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = dpl_core::logging::init("dpl-configure-secrets") {
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
    let cfg = SecretsConfig::load()?;

    let configurator =
        SecretsConfigurator::new(Arc::new(GhCli::default()), Arc::new(GitCli::default()));
    configurator.run(&cfg).await?;

    println!("\n📝 You can now trigger the workflow: Actions → Restart API Gateway → Run workflow");
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
        Some(err) => eprintln!("❌ {err}"),
        None => eprintln!("❌ {e:#}"),
    }
    if let Some(hint) = e.downcast_ref::<dpl_core::Error>().and_then(|err| err.hint()) {
        eprintln!("\n{hint}");
    }
}
