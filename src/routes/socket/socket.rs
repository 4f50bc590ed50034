use crate::auth_jwt::auth::{Principal, TokenService};
use crate::middleware::authorization_value;
use crate::realtime::{self, BroadcastNotifier, Notification};
use crate::store::Gateway;
use actix_web::{web, HttpRequest, HttpResponse};
use actix_ws::{Message, MessageStream, Session};
use futures::StreamExt;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::instrument;
use uuid::Uuid;

#[derive(Deserialize)]
pub struct SocketQuery {
    pub token: Option<String>,
}

/******************************************/
// Realtime socket route
/******************************************/
/**
 * @route   GET /socket?token=
 * @access  Staff or guest session (query token or Bearer header)
 */
#[instrument(name = "Open realtime socket", skip(req, body, gateway, tokens, bus, query))]
pub async fn connect(
    req: HttpRequest,
    body: web::Payload,
    gateway: web::Data<Gateway>,
    tokens: web::Data<TokenService>,
    bus: web::Data<BroadcastNotifier>,
    query: web::Query<SocketQuery>,
) -> Result<HttpResponse, actix_web::Error> {
    let access_token = match query.into_inner().token {
        Some(token) => token,
        None => authorization_value(req.headers(), "Bearer")?.to_string(),
    };
    let socket_id = Uuid::new_v4().to_string();
    let principal =
        realtime::register_connection(&gateway, &tokens, &access_token, socket_id.clone()).await?;
    // subscribed before the handshake completes so nothing emitted after it is missed
    let notifications = bus.subscribe();

    let (response, session, messages) = match actix_ws::handle(&req, body) {
        Ok(parts) => parts,
        Err(err) => {
            release(&gateway, socket_id).await;
            return Err(err);
        }
    };
    tracing::info!(socket_id = %socket_id, "realtime connection opened");
    actix_web::rt::spawn(serve_connection(
        gateway.get_ref().clone(),
        session,
        messages,
        notifications,
        principal,
        socket_id,
    ));
    Ok(response)
}

async fn serve_connection(
    gateway: Gateway,
    mut session: Session,
    mut messages: MessageStream,
    mut notifications: broadcast::Receiver<Notification>,
    principal: Principal,
    socket_id: String,
) {
    loop {
        tokio::select! {
            message = messages.next() => match message {
                Some(Ok(Message::Ping(bytes))) => {
                    if session.pong(&bytes).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(reason))) => {
                    tracing::debug!(socket_id = %socket_id, ?reason, "client closed the socket");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    tracing::warn!(socket_id = %socket_id, error = %err, "socket protocol error");
                    break;
                }
                None => break,
            },
            received = notifications.recv() => match received {
                Ok(notification) => {
                    if !notification.delivers_to(&principal, &socket_id) {
                        continue;
                    }
                    let frame = json!({
                        "event": notification.event,
                        "data": notification.payload,
                    });
                    if session.text(frame.to_string()).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(socket_id = %socket_id, skipped, "socket fell behind, notifications dropped");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    let _ = session.close(None).await;
    release(&gateway, socket_id).await;
}

async fn release(gateway: &Gateway, socket_id: String) {
    match realtime::unregister_connection(gateway, socket_id.clone()).await {
        Ok(()) => tracing::info!(socket_id = %socket_id, "realtime connection closed"),
        Err(err) => {
            tracing::warn!(socket_id = %socket_id, error = %err, "failed to release socket binding")
        }
    }
}
