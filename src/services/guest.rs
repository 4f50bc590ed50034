//! Guest sessions scoped to a table and the token it had at login.

use crate::auth_jwt::auth::{Claims, Principal, TokenService};
use crate::db_models::{Guest, Table, TableStatus};
use crate::errors::custom::{AuthError, CustomError};
use crate::services::table::load_table_by_number;
use crate::store::{Gateway, StoreTx};
use chrono::{DateTime, Utc};
use tracing::instrument;
use uuid::Uuid;

const INVALID_TABLE_CREDENTIALS: &str = "Table not found or token is invalid";

/// What a guest access token vouches for.
#[derive(Debug, Clone, PartialEq)]
pub struct GuestScope {
    pub table_number: String,
    pub table_token: String,
    pub guest_id: Uuid,
}

impl GuestScope {
    pub fn from_principal(principal: &Principal) -> Option<Self> {
        match principal {
            Principal::GuestSession {
                table_number,
                table_token,
                guest_id,
            } => Some(Self {
                table_number: table_number.clone(),
                table_token: table_token.clone(),
                guest_id: *guest_id,
            }),
            _ => None,
        }
    }

    fn principal(&self) -> Principal {
        Principal::GuestSession {
            table_number: self.table_number.clone(),
            table_token: self.table_token.clone(),
            guest_id: self.guest_id,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GuestLogin {
    pub guest: Guest,
    pub access_token: String,
    pub refresh_token: String,
}

fn session_expired() -> CustomError {
    AuthError::OtherAuthenticationError("Session is no longer valid".to_string()).into()
}

/// Loads the guest and its table, checking the session still belongs to the
/// table's current seating.
pub(crate) async fn load_session(
    tx: &mut dyn StoreTx,
    scope: &GuestScope,
) -> Result<(Guest, Table), CustomError> {
    let guest = tx
        .find_guest(scope.guest_id)
        .await?
        .ok_or_else(|| CustomError::not_found("Guest"))?;
    let table_number = guest
        .table_number
        .clone()
        .ok_or_else(|| CustomError::not_found("Table"))?;
    let table = load_table_by_number(tx, &table_number).await?;
    if guest.table_token != scope.table_token || table.token != scope.table_token {
        return Err(session_expired());
    }
    Ok((guest, table))
}

#[instrument(name = "Guest login", skip(gateway, tokens, table_token))]
pub async fn login(
    gateway: &Gateway,
    tokens: &TokenService,
    table_number: String,
    table_token: String,
) -> Result<GuestLogin, CustomError> {
    let scope = GuestScope {
        table_number,
        table_token,
        guest_id: Uuid::new_v4(),
    };
    let access = tokens.sign_access(scope.principal())?;
    let refresh = tokens.sign_refresh(scope.principal(), None)?;
    let refresh_token = refresh.token.clone();

    let guest = gateway
        .run_in_transaction(move |tx| {
            Box::pin(async move {
                let table = match tx.find_table_by_number(&scope.table_number).await? {
                    Some(table) if table.token == scope.table_token => table,
                    _ => return Err(CustomError::NotFoundError(INVALID_TABLE_CREDENTIALS.to_string())),
                };
                if !table.accepts_guests() {
                    return Err(CustomError::ForbiddenError(
                        "Table is not accepting guests".to_string(),
                    ));
                }
                let now = Utc::now();
                let guest = Guest {
                    id: scope.guest_id,
                    table_number: Some(table.number),
                    table_token: table.token,
                    refresh_token: Some(refresh.token),
                    refresh_token_expires_at: Some(refresh.expires_at),
                    created_at: now,
                    updated_at: now,
                };
                tx.insert_guest(&guest).await?;
                Ok(guest)
            })
        })
        .await?;

    Ok(GuestLogin {
        guest,
        access_token: access.token,
        refresh_token,
    })
}

#[instrument(name = "Guest logout", skip(gateway))]
pub async fn logout(gateway: &Gateway, guest_id: Uuid) -> Result<(), CustomError> {
    gateway
        .run_in_transaction(move |tx| {
            Box::pin(async move {
                if let Some(mut guest) = tx.find_guest(guest_id).await? {
                    guest.refresh_token = None;
                    guest.refresh_token_expires_at = None;
                    guest.updated_at = Utc::now();
                    tx.save_guest(&guest).await?;
                }
                Ok(())
            })
        })
        .await
}

/// Issues a new token pair. The refresh token keeps its original expiry.
#[instrument(name = "Guest refresh token", skip(gateway, tokens, refresh_token))]
pub async fn refresh(
    gateway: &Gateway,
    tokens: &TokenService,
    refresh_token: String,
) -> Result<GuestLogin, CustomError> {
    let claims: Claims = tokens.verify_refresh(&refresh_token)?;
    let scope = GuestScope::from_principal(&claims.principal).ok_or_else(|| {
        AuthError::JwtAuthenticationError("Token was not issued to a guest".to_string())
    })?;
    let access = tokens.sign_access(scope.principal())?;
    let renewed = tokens.sign_refresh(scope.principal(), Some(claims.exp))?;
    let renewed_token = renewed.token.clone();

    let guest = gateway
        .run_in_transaction(move |tx| {
            Box::pin(async move {
                let (mut guest, _) = load_session(tx, &scope).await.map_err(|err| match err {
                    CustomError::NotFoundError(_) => session_expired(),
                    other => other,
                })?;
                if guest.refresh_token.as_deref() != Some(refresh_token.as_str()) {
                    return Err(session_expired());
                }
                guest.refresh_token = Some(renewed.token);
                guest.refresh_token_expires_at = Some(renewed.expires_at);
                guest.updated_at = Utc::now();
                tx.save_guest(&guest).await?;
                Ok(guest)
            })
        })
        .await?;

    Ok(GuestLogin {
        guest,
        access_token: access.token,
        refresh_token: renewed_token,
    })
}

/// Re-checked on every guest request; rotation must take effect immediately.
pub async fn ensure_session_valid(
    gateway: &Gateway,
    scope: &GuestScope,
) -> Result<(Guest, Table), CustomError> {
    let scope = scope.clone();
    gateway
        .run_in_transaction(move |tx| Box::pin(async move { load_session(tx, &scope).await }))
        .await
}

/// Guests created within the period, newest first.
pub async fn list_guests_by_period(
    gateway: &Gateway,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> Result<Vec<Guest>, CustomError> {
    gateway
        .run_in_transaction(move |tx| Box::pin(async move { tx.find_guests(from, to).await }))
        .await
}

/// Staff seat a guest at a table under its current token. No tokens are
/// issued; the guest row only attributes orders and payments.
#[instrument(name = "Staff create guest", skip(gateway))]
pub async fn staff_create_guest(gateway: &Gateway, table_number: String) -> Result<Guest, CustomError> {
    gateway
        .run_in_transaction(move |tx| {
            Box::pin(async move {
                let table = load_table_by_number(tx, &table_number).await?;
                if table.status == TableStatus::Hidden {
                    return Err(CustomError::ForbiddenError(format!(
                        "Table {} is hidden, please choose another table",
                        table.number
                    )));
                }
                let now = Utc::now();
                let guest = Guest {
                    id: Uuid::new_v4(),
                    table_number: Some(table.number),
                    table_token: table.token,
                    refresh_token: None,
                    refresh_token_expires_at: None,
                    created_at: now,
                    updated_at: now,
                };
                tx.insert_guest(&guest).await?;
                Ok(guest)
            })
        })
        .await
}
