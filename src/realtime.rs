//! Realtime fan-out.
//!
//! Services hand notifications to a [`Notifier`]; the default
//! [`BroadcastNotifier`] publishes them on a `tokio::sync::broadcast`
//! channel that socket transports subscribe to.

use crate::auth_jwt::auth::{Principal, TokenService};
use crate::db_models::SocketBinding;
use crate::errors::custom::CustomError;
use crate::services::guest::{load_session, GuestScope};
use crate::store::Gateway;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Every connected staff member.
    Staff,
    Sockets(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Event {
    NewOrder,
    OrderUpdated,
    PaymentSettled,
    BuffetModeChanged,
    StaffCallRequested,
    PaymentRequested,
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub target: Target,
    pub event: Event,
    pub payload: Value,
}

impl Notification {
    /// Whether a connection bound to `socket_id` for `principal` receives it.
    pub fn delivers_to(&self, principal: &Principal, socket_id: &str) -> bool {
        match &self.target {
            Target::Staff => principal.staff_id().is_some(),
            Target::Sockets(ids) => ids.iter().any(|id| id == socket_id),
        }
    }
}

pub trait Notifier: Send + Sync {
    fn emit(&self, target: Target, event: Event, payload: Value);
}

#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    sender: broadcast::Sender<Notification>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl Notifier for BroadcastNotifier {
    fn emit(&self, target: Target, event: Event, payload: Value) {
        if let Target::Sockets(ids) = &target {
            if ids.is_empty() {
                return;
            }
        }
        // Err only means no subscriber is attached.
        if self
            .sender
            .send(Notification {
                target,
                event,
                payload,
            })
            .is_err()
        {
            tracing::debug!(event = ?event, "notification dropped, no subscribers");
        }
    }
}

/// Verifies a connecting session and binds its socket id.
#[tracing::instrument(name = "Register realtime connection", skip(gateway, tokens, access_token))]
pub async fn register_connection(
    gateway: &Gateway,
    tokens: &TokenService,
    access_token: &str,
    socket_id: String,
) -> Result<Principal, CustomError> {
    let principal = tokens.verify_access(access_token)?.principal;
    let bound = principal.clone();
    gateway
        .run_in_transaction(move |tx| {
            Box::pin(async move {
                let (guest_id, account_id) = match &bound {
                    Principal::GuestSession { .. } => {
                        let scope = GuestScope::from_principal(&bound)
                            .ok_or_else(|| CustomError::not_found("Guest"))?;
                        let (guest, _) = load_session(tx, &scope).await?;
                        (Some(guest.id), None)
                    }
                    Principal::Owner { account_id } | Principal::Employee { account_id } => {
                        tx.find_account(*account_id)
                            .await?
                            .ok_or_else(|| CustomError::not_found("Account"))?;
                        (None, Some(*account_id))
                    }
                };
                tx.upsert_socket(&SocketBinding {
                    socket_id,
                    guest_id,
                    account_id,
                    created_at: Utc::now(),
                })
                .await
            })
        })
        .await?;
    Ok(principal)
}

pub async fn unregister_connection(gateway: &Gateway, socket_id: String) -> Result<(), CustomError> {
    gateway
        .run_in_transaction(move |tx| Box::pin(async move { tx.delete_socket(&socket_id).await }))
        .await
}

/// Socket currently bound to a guest, if the guest is connected.
pub async fn guest_socket(gateway: &Gateway, guest_id: Uuid) -> Result<Option<String>, CustomError> {
    gateway
        .run_in_transaction(move |tx| Box::pin(async move { tx.find_guest_socket(guest_id).await }))
        .await
}

/// Emits to the guest's socket when the guest is connected. Called after the
/// change has committed, so a failed lookup is logged and skipped.
pub async fn notify_guest(
    gateway: &Gateway,
    notifier: &dyn Notifier,
    guest_id: Uuid,
    event: Event,
    payload: Value,
) {
    match guest_socket(gateway, guest_id).await {
        Ok(Some(socket)) => notifier.emit(Target::Sockets(vec![socket]), event, payload),
        Ok(None) => {}
        Err(err) => {
            tracing::warn!(error = %err, guest_id = %guest_id, "guest socket lookup failed, notification skipped")
        }
    }
}
