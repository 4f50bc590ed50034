use crate::auth_jwt::auth::{Principal, TokenService};
use crate::config::configuration::PaymentSettings;
use crate::errors::custom::{AuthError, CustomError};
use crate::services::guest::GuestScope;
use actix_web::body::MessageBody;
use actix_web::dev::{Payload, ServiceRequest, ServiceResponse};
use actix_web::http::header::{HeaderMap, AUTHORIZATION};
use actix_web::{web, Error, FromRequest, HttpMessage, HttpRequest};
use actix_web_lab::middleware::Next;
use std::future::{ready, Ready};
use subtle::ConstantTimeEq;
use uuid::Uuid;

pub(crate) fn authorization_value<'a>(headers: &'a HeaderMap, scheme: &str) -> Result<&'a str, CustomError> {
    let header = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AuthError::MissingToken("Authorization header is missing".to_string()))?;
    match header.split_once(' ') {
        Some((given, value)) if given.eq_ignore_ascii_case(scheme) && !value.trim().is_empty() => {
            Ok(value.trim())
        }
        _ => Err(AuthError::MissingToken(format!("Expected a {} token", scheme)).into()),
    }
}

/// Constant-time comparison.
fn api_key_matches(given: &str, expected: &str) -> bool {
    bool::from(given.as_bytes().ct_eq(expected.as_bytes()))
}

fn app_state<T: 'static>(req: &ServiceRequest) -> Result<web::Data<T>, CustomError> {
    req.app_data::<web::Data<T>>().cloned().ok_or_else(|| {
        AuthError::OtherAuthenticationError("Authentication is not configured".to_string()).into()
    })
}

/******************************************/
// Bearer token middleware
/******************************************/
/// Verifies the access token and stores its [`Principal`] in the request
/// extensions for the extractors below.
pub async fn jwt_auth_middleware(
    req: ServiceRequest,
    next: Next<impl MessageBody>,
) -> Result<ServiceResponse<impl MessageBody>, Error> {
    let tokens = app_state::<TokenService>(&req)?;
    let claims = {
        let token = authorization_value(req.headers(), "Bearer")?;
        tokens.verify_access(token)?
    };
    req.extensions_mut().insert(claims.principal);
    next.call(req).await
}

/******************************************/
// Payment gateway API key middleware
/******************************************/
/// Expects `Authorization: Apikey <key>`.
pub async fn webhook_auth_middleware(
    req: ServiceRequest,
    next: Next<impl MessageBody>,
) -> Result<ServiceResponse<impl MessageBody>, Error> {
    let settings = app_state::<PaymentSettings>(&req)?;
    let key = authorization_value(req.headers(), "Apikey")?;
    if !api_key_matches(key, &settings.api_key) {
        tracing::warn!("payment webhook called with a wrong api key");
        return Err(CustomError::from(AuthError::InvalidCredentials("Invalid api key".to_string())).into());
    }
    next.call(req).await
}

fn principal(req: &HttpRequest) -> Result<Principal, CustomError> {
    req.extensions()
        .get::<Principal>()
        .cloned()
        .ok_or_else(|| AuthError::MissingToken("Not authenticated".to_string()).into())
}

/// Owner or employee behind the request.
#[derive(Debug, Clone, Copy)]
pub struct StaffUser {
    pub account_id: Uuid,
}

impl FromRequest for StaffUser {
    type Error = CustomError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(principal(req).and_then(|principal| match principal.staff_id() {
            Some(account_id) => Ok(StaffUser { account_id }),
            None => Err(CustomError::ForbiddenError("Staff only".to_string())),
        }))
    }
}

/// Guest session behind the request. Validity against the table's current
/// token is checked by the services.
#[derive(Debug, Clone)]
pub struct GuestUser(pub GuestScope);

impl FromRequest for GuestUser {
    type Error = CustomError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(principal(req).and_then(|principal| {
            GuestScope::from_principal(&principal)
                .map(GuestUser)
                .ok_or_else(|| CustomError::ForbiddenError("Guests only".to_string()))
        }))
    }
}
