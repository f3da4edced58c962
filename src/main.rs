mod achievements;
mod auth;
mod booking;
mod config;
mod database;
mod entities;
mod error;
mod outbound;
mod rooms;
mod router;
mod routes;
#[cfg(test)]
mod test_util;

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    achievements::{AchievementEngine, detect_granter},
    booking::BookingService,
    config::Config,
    database::setup_database,
    outbound::{
        Dispatcher,
        email::{HttpMail, LogMail, MailTransport},
        push::{HttpPush, LogPush, PushTransport},
    },
    router::{AppState, create_router, shutdown_signal},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.rust_log))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let db = setup_database(&config.database_url).await?;

    let push: Arc<dyn PushTransport> = match &config.push {
        Some(push) => Arc::new(HttpPush::new(push.endpoint.clone(), push.api_key.clone())),
        None => {
            info!("PUSH_ENDPOINT not set, pushes are only logged");
            Arc::new(LogPush)
        }
    };
    let mail: Arc<dyn MailTransport> = match &config.mail {
        Some(mail) => Arc::new(HttpMail::new(
            mail.endpoint.clone(),
            mail.api_key.clone(),
            mail.from.clone(),
        )),
        None => {
            info!("MAIL_ENDPOINT not set, e-mails are only logged");
            Arc::new(LogMail)
        }
    };

    let (notifier, outbox) = outbound::channel(config.outbox_capacity);
    let dispatcher = Arc::new(Dispatcher::new(db.clone(), push, mail, config.retry_policy()));
    let outbound_task = tokio::spawn(outbound::run(dispatcher, outbox));

    let granter = detect_granter(&db).await;
    let achievements = AchievementEngine::new(db.clone(), granter, notifier.clone());
    info!(granter = achievements.granter_name(), "achievement engine ready");

    let state = AppState {
        db: db.clone(),
        bookings: Arc::new(BookingService::new(
            db.clone(),
            notifier,
            config.side_effect_timeout,
        )),
        achievements: Arc::new(achievements),
    };

    let app = create_router(state);
    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("cannot bind {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Dropping the router dropped every Notifier, so the outbound worker
    // finishes once the queue is drained.
    outbound_task.await?;

    Ok(())
}
