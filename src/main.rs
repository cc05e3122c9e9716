use anyhow::{anyhow, Context, Result};
use clap::Parser;
use log::{debug, error, info, LevelFilter};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use yunsio_translate::clipboard::{ClipboardBridge, SystemClipboard};
use yunsio_translate::input::EnigoInput;
use yunsio_translate::llm_client::{TranslationClient, Translator};
use yunsio_translate::secure_keys;
use yunsio_translate::settings::{self, LogLevel};
use yunsio_translate::trigger::run_trigger_loop;
use yunsio_translate::{PipelineCoordinator, PipelineOutcome};

/// Replace the selected text in any application with its translation.
///
/// Each line on stdin (just press Enter) translates the current selection.
/// Type `quit` or press Ctrl-C to exit.
#[derive(Parser, Debug)]
#[command(name = "yunsio-translate", version, about, long_about = None)]
struct Cli {
    /// Settings file [default: <config dir>/yunsio-translate/settings.json]
    #[arg(short, long, value_name = "PATH", env = "YUNSIO_CONFIG")]
    config: Option<PathBuf>,

    /// Translate the current selection once and exit
    #[arg(long)]
    once: bool,

    /// Log level (trace, debug, info, warn, error); overrides the settings file
    #[arg(short, long)]
    log_level: Option<LogLevel>,

    /// Translate TEXT, print the result and exit without touching the clipboard
    #[arg(short, long, value_name = "TEXT", conflicts_with_all = ["once", "store_key"])]
    translate: Option<String>,

    /// Read an API key from stdin and save it in the OS credential store
    #[arg(long, conflicts_with = "once")]
    store_key: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over everything else when set
    let rust_log_set = std::env::var_os("RUST_LOG").is_some();
    env_logger::Builder::new()
        .filter_level(LevelFilter::Trace)
        .parse_default_env()
        .init();
    if !rust_log_set {
        log::set_max_level(cli.log_level.map(Into::into).unwrap_or(LevelFilter::Info));
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    let result = runtime.block_on(run(cli, rust_log_set));
    // A pending stdin read cannot be cancelled; don't wait on it.
    runtime.shutdown_timeout(Duration::from_millis(500));
    result
}

async fn run(cli: Cli, rust_log_set: bool) -> Result<()> {
    if cli.store_key {
        return store_key().await;
    }

    let settings_path = match cli.config {
        Some(path) => path,
        None => settings::default_settings_path()
            .ok_or_else(|| anyhow!("Could not determine the config directory, pass --config"))?,
    };
    let app_settings = settings::load_or_create_app_settings(&settings_path)?;
    if !rust_log_set && cli.log_level.is_none() {
        log::set_max_level(app_settings.log_level.into());
    }
    info!("Using settings from {}", settings_path.display());
    debug!("Settings: {:?}", app_settings);

    let api_key = secure_keys::resolve_api_key()?;
    let translator = Arc::new(
        TranslationClient::new(app_settings.translation_config(api_key))
            .context("Failed to create translation client")?,
    );

    if let Some(text) = cli.translate {
        let translated = translator
            .translate(&text)
            .await
            .into_result()
            .context("Translation failed")?;
        println!("{}", translated.trim());
        return Ok(());
    }

    let clipboard = Arc::new(ClipboardBridge::new(
        SystemClipboard::new(),
        app_settings.clipboard_retry(),
    ));
    let input = Arc::new(EnigoInput::new(app_settings.input_settle()));
    let coordinator = Arc::new(PipelineCoordinator::new(
        clipboard,
        input,
        translator,
        app_settings.pipeline_timing(),
    ));

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received, shutting down");
                ctrl_c.cancel();
            }
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    info!("Ready: select text, then press Enter here to translate it");
    let summary = run_trigger_loop(
        coordinator,
        BufReader::new(tokio::io::stdin()),
        cancel,
        cli.once,
    )
    .await;

    if cli.once {
        if let Some(outcome) = summary.outcomes.first() {
            if *outcome != PipelineOutcome::Replaced {
                return Err(anyhow!("Selection was not translated: {:?}", outcome));
            }
        }
    }
    Ok(())
}

async fn store_key() -> Result<()> {
    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .context("Failed to read API key from stdin")?;

    secure_keys::set_api_key(line.trim())?;
    if line.trim().is_empty() {
        info!("Stored API key removed");
    } else {
        info!("API key stored");
    }
    Ok(())
}
