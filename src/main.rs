//! estude-monitor entry point.
//!
//! Signs in as the configured user, watches the configured class-subjects
//! and logs every real-time notification until Ctrl-C.

use anyhow::Context;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

use estude_realtime::config::RealtimeConfig;
use estude_realtime::feed::{FeedSeed, NotificationBus};
use estude_realtime::lifecycle::UserSession;
use estude_realtime::StompClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = RealtimeConfig::from_env().context("loading configuration")?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let url = config.ws_url()?;
    let user = config
        .user_id
        .context("ESTUDE_USER_ID must be set for the monitor")?;
    tracing::info!(
        %url,
        %user,
        viewer = ?config.viewer,
        sockjs = config.sockjs,
        class_subjects = config.class_subject_ids.len(),
        "starting estude-monitor"
    );

    let options = config
        .connect_options()?
        .on_connect(|| tracing::info!("connected"))
        .on_error(|err| tracing::error!(code = err.error_code(), error = %err, "real-time error"))
        .on_disconnect(|reason| tracing::warn!(reason, "connection dropped"));

    let client = StompClient::new(config.connector());
    let bus = NotificationBus::new(config.notification_capacity);
    let session = UserSession::new(client, options, bus);
    let mut notifications = session.notifications();

    session.set_user(
        Some(user),
        FeedSeed {
            viewer: config.viewer,
            ..FeedSeed::with_class_subjects(config.class_subject_ids.iter().copied())
        },
    );

    loop {
        tokio::select! {
            received = notifications.recv() => match received {
                Ok(toast) => tracing::info!(
                    kind = ?toast.kind,
                    session = ?toast.session_id,
                    title = %toast.title,
                    "{}",
                    toast.message
                ),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "notification receiver lagged");
                }
                Err(RecvError::Closed) => break,
            },
            signal = tokio::signal::ctrl_c() => {
                signal.context("waiting for Ctrl-C")?;
                tracing::info!("shutting down");
                break;
            }
        }
    }

    session.shutdown();
    Ok(())
}
