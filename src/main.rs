use anyhow::{Context, Result};
use secrecy::ExposeSecret;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use teloxide::prelude::*;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use smm_order_bot::bot::{self, AdminPolicy, AppState, FlowController};
use smm_order_bot::catalog::Catalog;
use smm_order_bot::commerce::SmmPanelClient;
use smm_order_bot::config::BotConfig;
use smm_order_bot::health;
use smm_order_bot::localization::init_localization;
use smm_order_bot::session_store::ConversationStore;

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Resolve on SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

async fn write_snapshot(sessions: &ConversationStore, path: &Path) {
    match sessions.write_snapshot(path).await {
        Ok(count) => debug!(sessions = count, path = %path.display(), "Session snapshot written"),
        Err(e) => error!(error = %e, path = %path.display(), "Failed to write session snapshot"),
    }
}

/// Prune idle sessions and write the snapshot every `period` until shutdown
async fn maintain_sessions(
    sessions: Arc<ConversationStore>,
    snapshot_path: Option<PathBuf>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                sessions.prune_idle();
                if let Some(path) = &snapshot_path {
                    write_snapshot(&sessions, path).await;
                }
            }
            _ = shutdown.changed() => break,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = BotConfig::from_env()?;
    init_tracing(config.json_logs);

    std::panic::set_hook(Box::new(|info| {
        error!("Bot panic: {info}");
    }));

    info!("Starting SMM order bot");

    init_localization().context("Failed to load message catalogs")?;

    let catalog = Catalog::load(config.catalog_path.as_deref()).context("Failed to load service catalog")?;
    info!(version = catalog.version, platforms = catalog.platforms.len(), "Service catalog loaded");

    let commerce = SmmPanelClient::new(config.commerce.clone(), config.api_key)
        .context("Failed to build SMM panel client")?;

    if config.admin_ids.is_empty() {
        warn!("ADMIN_IDS is empty, the admin menu is unreachable");
    }
    let controller = FlowController::new(
        Arc::new(commerce),
        Arc::new(catalog),
        AdminPolicy::new(config.admin_ids.iter().copied()),
        config.support_contact.clone(),
    );
    let sessions = Arc::clone(controller.sessions());
    let app = Arc::new(AppState {
        controller,
        notification_chat: config.channel_id,
    });

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let health_task = {
        let mut rx = shutdown_rx.clone();
        let port = config.port;
        tokio::spawn(async move {
            let stop = async move {
                let _ = rx.changed().await;
            };
            if let Err(e) = health::serve(port, stop).await {
                error!(error = %e, port, "Health endpoint failed");
            }
        })
    };

    let maintenance_task = tokio::spawn(maintain_sessions(
        Arc::clone(&sessions),
        config.snapshot_path.clone(),
        config.snapshot_interval,
        shutdown_rx.clone(),
    ));

    let bot = Bot::new(config.bot_token.expose_secret());

    let mut dispatcher = Dispatcher::builder(bot, bot::schema())
        .dependencies(dptree::deps![Arc::clone(&app)])
        .default_handler(|upd| async move {
            debug!(update = ?upd, "Unhandled update");
        })
        .error_handler(LoggingErrorHandler::with_custom_text(
            "An error has occurred in the dispatcher",
        ))
        .build();

    let token = dispatcher.shutdown_token();
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
        match token.shutdown() {
            Ok(stopped) => stopped.await,
            Err(e) => warn!(error = ?e, "Dispatcher was not running at shutdown"),
        }
    });

    info!("Bot initialized, starting dispatcher");
    dispatcher.dispatch().await;
    info!("Dispatcher stopped");

    let _ = health_task.await;
    let _ = maintenance_task.await;

    if let Some(path) = &config.snapshot_path {
        write_snapshot(&sessions, path).await;
    }

    info!("Shutdown complete");
    Ok(())
}
