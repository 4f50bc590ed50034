//! Staff credentials: login, refresh-token rotation and the owner account
//! created at startup.

use crate::auth_jwt::auth::{Principal, TokenService};
use crate::config::configuration::OwnerSettings;
use crate::db_models::{Account, AccountRole, RefreshToken};
use crate::errors::custom::{AuthError, CustomError};
use crate::store::Gateway;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::Utc;
use tracing::instrument;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct StaffTokens {
    pub account: Account,
    pub access_token: String,
    pub refresh_token: String,
}

fn generate_random_salt() -> SaltString {
    let mut rng = rand::thread_rng();
    SaltString::generate(&mut rng)
}

pub fn hash_password(password: &str) -> Result<String, CustomError> {
    let salt = generate_random_salt();
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| CustomError::HashingError(err.to_string()))
}

fn verify_password(password: &str, password_hash: &str) -> Result<bool, CustomError> {
    let parsed = PasswordHash::new(password_hash)
        .map_err(|err| CustomError::HashingError(err.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

pub fn principal_of(account: &Account) -> Principal {
    match account.role {
        AccountRole::Owner => Principal::Owner {
            account_id: account.id,
        },
        AccountRole::Employee => Principal::Employee {
            account_id: account.id,
        },
    }
}

fn invalid_credentials() -> CustomError {
    AuthError::InvalidCredentials("Email or password is incorrect".to_string()).into()
}

fn invalid_refresh_token() -> CustomError {
    AuthError::JwtAuthenticationError("Refresh token is invalid".to_string()).into()
}

#[instrument(name = "Staff login", skip(gateway, tokens, password))]
pub async fn login(
    gateway: &Gateway,
    tokens: &TokenService,
    email: String,
    password: String,
) -> Result<StaffTokens, CustomError> {
    let account = gateway
        .run_in_transaction(move |tx| Box::pin(async move { tx.find_account_by_email(&email).await }))
        .await?
        .ok_or_else(invalid_credentials)?;
    if !verify_password(&password, &account.password_hash)? {
        return Err(invalid_credentials());
    }

    let principal = principal_of(&account);
    let access = tokens.sign_access(principal.clone())?;
    let refresh = tokens.sign_refresh(principal, None)?;
    let row = RefreshToken {
        token: refresh.token.clone(),
        account_id: account.id,
        expires_at: refresh.expires_at,
        created_at: Utc::now(),
    };
    gateway
        .run_in_transaction(move |tx| Box::pin(async move { tx.insert_refresh_token(&row).await }))
        .await?;

    Ok(StaffTokens {
        account,
        access_token: access.token,
        refresh_token: refresh.token,
    })
}

#[instrument(name = "Staff logout", skip(gateway, refresh_token))]
pub async fn logout(gateway: &Gateway, refresh_token: String) -> Result<(), CustomError> {
    gateway
        .run_in_transaction(move |tx| {
            Box::pin(async move {
                tx.delete_refresh_token(&refresh_token).await?;
                Ok(())
            })
        })
        .await
}

/// Rotates the stored refresh token, keeping its original expiry.
#[instrument(name = "Staff refresh token", skip(gateway, tokens, refresh_token))]
pub async fn refresh(
    gateway: &Gateway,
    tokens: &TokenService,
    refresh_token: String,
) -> Result<StaffTokens, CustomError> {
    let claims = tokens.verify_refresh(&refresh_token)?;
    let account_id = claims.principal.staff_id().ok_or_else(invalid_refresh_token)?;
    let access = tokens.sign_access(claims.principal.clone())?;
    let renewed = tokens.sign_refresh(claims.principal.clone(), Some(claims.exp))?;
    let row = RefreshToken {
        token: renewed.token.clone(),
        account_id,
        expires_at: renewed.expires_at,
        created_at: Utc::now(),
    };

    let account = gateway
        .run_in_transaction(move |tx| {
            Box::pin(async move {
                let stored = tx
                    .find_refresh_token(&refresh_token)
                    .await?
                    .ok_or_else(invalid_refresh_token)?;
                if stored.account_id != account_id {
                    return Err(invalid_refresh_token());
                }
                let account = tx
                    .find_account(account_id)
                    .await?
                    .ok_or_else(invalid_refresh_token)?;
                tx.delete_refresh_token(&refresh_token).await?;
                tx.insert_refresh_token(&row).await?;
                Ok(account)
            })
        })
        .await?;

    Ok(StaffTokens {
        account,
        access_token: access.token,
        refresh_token: renewed.token,
    })
}

pub async fn find_account(gateway: &Gateway, id: Uuid) -> Result<Account, CustomError> {
    gateway
        .run_in_transaction(move |tx| {
            Box::pin(async move {
                tx.find_account(id)
                    .await?
                    .ok_or_else(|| CustomError::not_found("Account"))
            })
        })
        .await
}

/// Creates the owner account from settings unless the email is taken.
#[instrument(name = "Ensure owner account", skip(gateway, owner), fields(email = %owner.email))]
pub async fn ensure_owner(gateway: &Gateway, owner: &OwnerSettings) -> Result<Account, CustomError> {
    let email = owner.email.to_lowercase();
    let lookup = email.clone();
    let existing = gateway
        .run_in_transaction(move |tx| Box::pin(async move { tx.find_account_by_email(&lookup).await }))
        .await?;
    if let Some(account) = existing {
        return Ok(account);
    }

    let now = Utc::now();
    let account = Account {
        id: Uuid::new_v4(),
        name: owner.name.clone(),
        email,
        password_hash: hash_password(&owner.password)?,
        role: AccountRole::Owner,
        created_at: now,
        updated_at: now,
    };
    let created = account.clone();
    gateway
        .run_in_transaction(move |tx| Box::pin(async move { tx.insert_account(&created).await }))
        .await?;
    tracing::info!(account_id = %account.id, "owner account created");
    Ok(account)
}
