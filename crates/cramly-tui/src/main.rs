// Cramly entry point.
//
// Startup sequence:
// 1. Initialize tracing (log to file, not terminal)
// 2. Load config
// 3. Open the local database
// 4. Select the backend and restore any saved session
// 5. Create mpsc channels
// 6. Build the LLM client
// 7. Initialize AppState
// 8. Spawn app logic task
// 9. Run the TUI until the user quits
// 10. Wait for the app loop to exit

use std::sync::Arc;

use cramly_app::app;
use cramly_app::backend::Backend;
use cramly_core::config;
use cramly_core::db;
use cramly_llm::client::LlmClient;
use cramly_tui::tui;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing (log to file, not terminal)
    init_tracing()?;
    info!("Cramly starting up");

    // 2. Load config
    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: backend={:?}, autosave every {}s",
        config.backend.mode, config.editor.autosave_interval_secs
    );

    // 3. Open database
    let db_path = config.db_path.to_string_lossy().into_owned();
    let db = db::Database::open(&db_path).context("failed to open database")?;
    info!("Database opened at {db_path}");

    // 4. Backend (local store, hosted REST store, or unconfigured stand-in)
    let backend = Backend::from_config(&config, Arc::new(db)).await;

    // 5. Create mpsc channels (before AppState so llm_tx can be passed in)
    let (llm_tx, llm_rx) = mpsc::channel(256);
    let (cmd_tx, cmd_rx) = mpsc::channel(64);
    let (ui_tx, ui_rx) = mpsc::channel(256);

    // 6. Build the LLM client from config
    let llm_client = LlmClient::from_config(&config);
    match &llm_client {
        LlmClient::Active(_) => info!("LLM client initialized ({})", config.ai.endpoint),
        LlmClient::Disabled => info!("LLM client disabled (no AI endpoint)"),
    }

    // 7. Create the application state
    let app_state = app::AppState::new(config, backend, llm_client, llm_tx.clone());

    // 8. Spawn app logic task
    let app_handle = tokio::spawn(async move {
        if let Err(e) = app::run(llm_rx, cmd_rx, ui_tx, app_state).await {
            error!("Application loop error: {:#}", e);
        }
    });

    // 9. TUI until quit; only AppState keeps an LLM sender from here on
    info!("Application ready");
    drop(llm_tx);

    if let Err(e) = tui::run(ui_rx, cmd_tx).await {
        error!("TUI error: {:#}", e);
    }

    // 10. Give the app loop a moment to abort its AI tasks and exit.
    // Unsaved edits are not written; the quit dialog warns about them.
    let _ = tokio::time::timeout(std::time::Duration::from_secs(5), async {
        let _ = app_handle.await;
    })
    .await;

    info!("Cramly shut down cleanly");
    Ok(())
}

/// Log to `logs/cramly.log`; the terminal belongs to the TUI.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("cramly.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cramly=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
