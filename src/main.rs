//! termcore - interactive command engine on stdin/stdout.

use std::sync::Arc;

use anyhow::Context;
use semver::Version;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};

use termcore::cli::Cli;
use termcore::commands::HostVersions;
use termcore::config::{EngineConfig, StorageKind};
use termcore::input::InputHandle;
use termcore::io::SystemClipboard;
use termcore::logging::{self, LogTarget};
use termcore::persistence::{FileBackend, MemoryBackend, PersistenceBackend};
use termcore::EngineSession;

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();
    logging::init(if cli.is_one_shot() {
        LogTarget::Stderr
    } else {
        LogTarget::File
    });

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("{e:#}");
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<i32> {
    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let mut config = EngineConfig::load_from_file(&config_path)?;
    cli.apply(&mut config);

    let (mut session, handle) = EngineSession::builder()
        .backend(open_backend(&config)?)
        .clipboard(Arc::new(SystemClipboard::new()))
        .versions(host_versions(&config)?)
        .prompt(config.session.prompt.clone())
        .echo(config.session.echo)
        .builtins(config.session.builtins)
        .build()
        .await?;

    if let Some(line) = &cli.execute {
        let result = session.execute(line).await;
        return Ok(result.exit_code());
    }

    let interrupter = handle.interrupter();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            interrupter.interrupt();
        }
    });
    tokio::spawn(forward_stdin(handle));

    Ok(session.run().await)
}

fn open_backend(config: &EngineConfig) -> anyhow::Result<Arc<dyn PersistenceBackend>> {
    Ok(match (config.storage.backend, &config.storage.path) {
        (StorageKind::Memory, _) => Arc::new(MemoryBackend::new()),
        (StorageKind::File, Some(path)) => Arc::new(FileBackend::new(path)),
        (StorageKind::File, None) => {
            Arc::new(FileBackend::open_default().context("Failed to locate storage file")?)
        }
    })
}

fn host_versions(config: &EngineConfig) -> anyhow::Result<HostVersions> {
    let mut versions = HostVersions::default();
    if let Some(cli) = &config.session.cli_version {
        versions.cli =
            Version::parse(cli).with_context(|| format!("Invalid cli_version '{cli}'"))?;
    }
    Ok(versions)
}

/// Feeds stdin lines to the session. Dropping the handle at EOF closes the
/// session's input, which ends the REPL.
async fn forward_stdin(handle: InputHandle) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if !handle.send_text(&line) {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                error!("Failed to read stdin: {e}");
                break;
            }
        }
    }
}
