//! Best-effort side channel: user notifications and confirmation e-mails.
//!
//! Request handlers only ever enqueue. A background worker drains the queue,
//! writes the notification inbox row, and delivers through the configured
//! transports with bounded retries. Nothing here can fail a booking or a grant.

pub mod email;
pub mod push;
pub mod retry;

use std::sync::Arc;

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, DatabaseConnection, DbErr};
use tokio::{
    sync::mpsc::{self, Receiver, Sender, error::TrySendError},
    task::JoinSet,
};
use tracing::{debug, warn};

use crate::entities::notification;
use email::{EmailMessage, MailTransport};
use push::{PushPayload, PushTransport};
use retry::{RetryPolicy, with_retry};

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("transport answered with status {0}")]
    Status(u16),

    #[error(transparent)]
    Encode(#[from] serde_json::Error),
}

/// A user-facing notification before it has an inbox id.
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub title: String,
    pub body: String,
    pub kind: String,
}

impl Notice {
    pub fn new(kind: &str, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            kind: kind.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    Push { user_id: i32, notice: Notice },
    Email(EmailMessage),
}

/// Cheap, cloneable handle used by request paths to queue side effects.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: Sender<Dispatch>,
}

pub fn channel(capacity: usize) -> (Notifier, Receiver<Dispatch>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (Notifier { tx }, rx)
}

impl Notifier {
    /// Queues one push per target. Never blocks and never fails; a full or
    /// closed queue drops the notice with a warning.
    pub fn notify(&self, targets: &[i32], notice: Notice) {
        for &user_id in targets {
            self.enqueue(Dispatch::Push {
                user_id,
                notice: notice.clone(),
            });
        }
    }

    pub fn email(&self, message: EmailMessage) {
        self.enqueue(Dispatch::Email(message));
    }

    fn enqueue(&self, dispatch: Dispatch) {
        match self.tx.try_send(dispatch) {
            Ok(()) => {}
            Err(TrySendError::Full(dropped)) => {
                warn!(?dropped, "outbound queue is full, dropping side effect");
            }
            Err(TrySendError::Closed(dropped)) => {
                warn!(?dropped, "outbound queue is closed, dropping side effect");
            }
        }
    }
}

pub struct Dispatcher {
    db: DatabaseConnection,
    push: Arc<dyn PushTransport>,
    mail: Arc<dyn MailTransport>,
    policy: RetryPolicy,
}

impl Dispatcher {
    pub fn new(
        db: DatabaseConnection,
        push: Arc<dyn PushTransport>,
        mail: Arc<dyn MailTransport>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            db,
            push,
            mail,
            policy,
        }
    }

    /// Delivers one side effect. All failures are logged here and go no further.
    pub async fn deliver(&self, dispatch: Dispatch) {
        match dispatch {
            Dispatch::Push { user_id, notice } => {
                let payload = match self.store_inbox_row(user_id, &notice).await {
                    Ok(payload) => payload,
                    Err(e) => {
                        warn!(user_id, kind = %notice.kind, error = %e, "failed to store notification");
                        return;
                    }
                };
                let push = self.push.clone();
                let result = with_retry(&self.policy, "push", || {
                    let push = push.clone();
                    let payload = payload.clone();
                    async move { push.push(user_id, &payload).await }
                })
                .await;
                match result {
                    Ok(()) => debug!(user_id, id = payload.id, "notification pushed"),
                    Err(e) => warn!(user_id, id = payload.id, error = %e, "giving up on push"),
                }
            }
            Dispatch::Email(message) => {
                let mail = self.mail.clone();
                let result = with_retry(&self.policy, "email", || {
                    let mail = mail.clone();
                    let message = message.clone();
                    async move { mail.send(&message).await }
                })
                .await;
                match result {
                    Ok(()) => debug!(to = %message.to, "email sent"),
                    Err(e) => warn!(to = %message.to, error = %e, "giving up on email"),
                }
            }
        }
    }

    async fn store_inbox_row(&self, user_id: i32, notice: &Notice) -> Result<PushPayload, DbErr> {
        let row = notification::ActiveModel {
            user_id: Set(user_id),
            title: Set(notice.title.clone()),
            body: Set(notice.body.clone()),
            kind: Set(notice.kind.clone()),
            is_read: Set(false),
            created_at: Set(Utc::now().naive_utc()),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        Ok(PushPayload {
            id: row.id,
            title: row.title,
            body: row.body,
            kind: row.kind,
            created_at: row.created_at,
        })
    }
}

/// Drains the queue until every [`Notifier`] is dropped. Each delivery runs on
/// its own task so one slow transport does not hold up the rest. Returns only
/// after the deliveries already taken off the queue have finished.
pub async fn run(dispatcher: Arc<Dispatcher>, mut rx: Receiver<Dispatch>) {
    let mut deliveries = JoinSet::new();
    loop {
        tokio::select! {
            received = rx.recv() => {
                let Some(dispatch) = received else { break };
                let dispatcher = dispatcher.clone();
                deliveries.spawn(async move { dispatcher.deliver(dispatch).await });
            }
            Some(finished) = deliveries.join_next() => {
                if let Err(e) = finished {
                    warn!(error = %e, "delivery task failed");
                }
            }
        }
    }

    debug!(in_flight = deliveries.len(), "outbound queue closed, finishing deliveries");
    while let Some(finished) = deliveries.join_next().await {
        if let Err(e) = finished {
            warn!(error = %e, "delivery task failed");
        }
    }
}
