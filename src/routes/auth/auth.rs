use crate::auth_jwt::auth::TokenService;
use crate::errors::custom::CustomError;
use crate::services::account;
use crate::store::Gateway;
use crate::validations::name_email::UserEmail;
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

#[derive(Deserialize)]
pub struct LoginBody {
    pub email: String,
    pub password: String,
}

impl LoginBody {
    pub fn validate(self) -> Result<(UserEmail, String), String> {
        let email = UserEmail::parse(self.email)?;
        if self.password.is_empty() {
            return Err("Password is required.".to_string());
        }
        Ok((email, self.password))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenBody {
    pub refresh_token: String,
}

/******************************************/
// Staff login route
/******************************************/
/**
 * @route   POST /auth/login
 * @access  Public
 */
#[instrument(name = "Login staff", skip(req_login, gateway, tokens), fields(email = %req_login.email))]
pub async fn login(
    gateway: web::Data<Gateway>,
    tokens: web::Data<TokenService>,
    req_login: web::Json<LoginBody>,
) -> Result<HttpResponse, CustomError> {
    let (email, password) = req_login
        .into_inner()
        .validate()
        .map_err(CustomError::ValidationError)?;
    let session = account::login(&gateway, &tokens, email.as_ref().to_string(), password).await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Login successfully",
        "data": {
            "accessToken": session.access_token,
            "refreshToken": session.refresh_token,
            "account": session.account,
        }
    })))
}

/******************************************/
// Staff logout route
/******************************************/
/**
 * @route   POST /auth/logout
 * @access  Public
 */
#[instrument(name = "Logout staff", skip(req_body, gateway))]
pub async fn logout(
    gateway: web::Data<Gateway>,
    req_body: web::Json<RefreshTokenBody>,
) -> Result<HttpResponse, CustomError> {
    account::logout(&gateway, req_body.into_inner().refresh_token).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Logout successfully" })))
}

/******************************************/
// Staff refresh token route
/******************************************/
/**
 * @route   POST /auth/refresh-token
 * @access  Public
 */
#[instrument(name = "Refresh staff token", skip(req_body, gateway, tokens))]
pub async fn refresh_token(
    gateway: web::Data<Gateway>,
    tokens: web::Data<TokenService>,
    req_body: web::Json<RefreshTokenBody>,
) -> Result<HttpResponse, CustomError> {
    let session = account::refresh(&gateway, &tokens, req_body.into_inner().refresh_token).await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Refresh token successfully",
        "data": {
            "accessToken": session.access_token,
            "refreshToken": session.refresh_token,
        }
    })))
}
