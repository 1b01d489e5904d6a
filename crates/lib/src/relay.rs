//! Startup wiring: Telegram poller, callback server and session loop in one process.

use crate::bridge;
use crate::channels::{ChatMessage, TelegramChannel};
use crate::config::{self, Config};
use crate::forwarder::Forwarder;
use crate::listener::Session;
use crate::receiver;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::mpsc;

const INBOUND_QUEUE: usize = 64;

/// Run the relay until Ctrl+C / SIGTERM or until a component stops.
/// A missing bot token aborts before anything is started. Pending bridged sends
/// are dropped on shutdown.
pub async fn run_relay(config: Config) -> Result<()> {
    let token = config::resolve_telegram_token(&config).context(
        "telegram bot token not configured (set TELEGRAM_BOT_TOKEN or telegram.botToken)",
    )?;

    let bind_addr = format!("{}:{}", config.callback.bind.trim(), config.callback.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding callback server to {}", bind_addr))?;

    let telegram = Arc::new(TelegramChannel::new(
        Some(token),
        config.telegram.api_base.clone(),
    ));
    let trigger_url = config.workflow.trigger_url();
    log::info!(
        "forwarding telegram messages to {} ({:?} mode)",
        trigger_url,
        config.workflow.mode
    );
    let session = Session::new(
        telegram.clone(),
        Forwarder::new(trigger_url),
        config.replies.clone(),
        config.workflow.echo_response,
    );

    let (bridge_handle, bridge_queue) = bridge::channel();
    let (inbound_tx, inbound_rx) = mpsc::channel::<ChatMessage>(INBOUND_QUEUE);

    let server = tokio::spawn(receiver::serve(listener, bridge_handle));
    let poller = telegram.clone().start_inbound(inbound_tx);

    let result = tokio::select! {
        _ = session.run(inbound_rx, bridge_queue) => {
            log::warn!("session loop ended");
            Ok(())
        }
        res = server => match res {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e),
            Err(e) => Err(anyhow::anyhow!("callback server task failed: {}", e)),
        },
        _ = shutdown_signal() => {
            log::info!("shutdown signal received, stopping relay");
            Ok(())
        }
    };

    telegram.stop();
    poller.abort();
    log::info!("relay stopped");
    result
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::warn!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                log::warn!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
