use crate::config::configuration::JwtSettings;
use crate::errors::custom::{AuthError, CustomError};
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who a token was issued to. Staff and guest sessions carry different
/// fields, discriminated by `role`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role")]
pub enum Principal {
    #[serde(rename_all = "camelCase")]
    Owner { account_id: Uuid },
    #[serde(rename_all = "camelCase")]
    Employee { account_id: Uuid },
    #[serde(rename_all = "camelCase")]
    GuestSession {
        table_number: String,
        table_token: String,
        guest_id: Uuid,
    },
}

impl Principal {
    pub fn staff_id(&self) -> Option<Uuid> {
        match self {
            Principal::Owner { account_id } | Principal::Employee { account_id } => Some(*account_id),
            Principal::GuestSession { .. } => None,
        }
    }

    fn is_guest(&self) -> bool {
        matches!(self, Principal::GuestSession { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenType {
    AccessToken,
    RefreshToken,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    #[serde(flatten)]
    pub principal: Principal,
    pub token_type: TokenType,
    pub jti: Uuid,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0).single().unwrap_or_else(Utc::now)
    }
}

#[derive(Debug, Clone)]
pub struct SignedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Signs and verifies access/refresh tokens with two independent HS256 secrets.
#[derive(Clone)]
pub struct TokenService {
    settings: JwtSettings,
}

impl TokenService {
    pub fn new(settings: JwtSettings) -> Self {
        Self { settings }
    }

    pub fn sign_access(&self, principal: Principal) -> Result<SignedToken, CustomError> {
        let ttl = if principal.is_guest() {
            self.settings.guest_access_ttl_secs
        } else {
            self.settings.access_ttl_secs
        };
        let exp = (Utc::now() + Duration::seconds(ttl)).timestamp();
        self.sign(principal, TokenType::AccessToken, exp, &self.settings.access_secret)
    }

    /// `exp` keeps an existing expiry when rotating; `None` starts a fresh lifetime.
    pub fn sign_refresh(
        &self,
        principal: Principal,
        exp: Option<i64>,
    ) -> Result<SignedToken, CustomError> {
        let exp = exp.unwrap_or_else(|| {
            let ttl = if principal.is_guest() {
                self.settings.guest_refresh_ttl_secs
            } else {
                self.settings.refresh_ttl_secs
            };
            (Utc::now() + Duration::seconds(ttl)).timestamp()
        });
        self.sign(principal, TokenType::RefreshToken, exp, &self.settings.refresh_secret)
    }

    pub fn verify_access(&self, token: &str) -> Result<Claims, CustomError> {
        self.verify(token, TokenType::AccessToken, &self.settings.access_secret)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<Claims, CustomError> {
        self.verify(token, TokenType::RefreshToken, &self.settings.refresh_secret)
    }

    fn sign(
        &self,
        principal: Principal,
        token_type: TokenType,
        exp: i64,
        secret: &str,
    ) -> Result<SignedToken, CustomError> {
        let claims = Claims {
            principal,
            token_type,
            jti: Uuid::new_v4(),
            iat: Utc::now().timestamp(),
            exp,
        };
        let encoding_key = EncodingKey::from_secret(secret.as_ref());
        let token = encode(&Header::new(Algorithm::HS256), &claims, &encoding_key)
            .map_err(|err| AuthError::JwtAuthenticationError(err.to_string()))?;
        Ok(SignedToken {
            token,
            expires_at: claims.expires_at(),
        })
    }

    fn verify(&self, token: &str, expected: TokenType, secret: &str) -> Result<Claims, CustomError> {
        let decoding_key = DecodingKey::from_secret(secret.as_ref());
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        let token_data = decode::<Claims>(token, &decoding_key, &validation)
            .map_err(|err| AuthError::JwtAuthenticationError(err.to_string()))?;
        if token_data.claims.token_type != expected {
            return Err(AuthError::JwtAuthenticationError("Unexpected token type".to_string()).into());
        }
        Ok(token_data.claims)
    }
}

/// Fresh opaque table token: 32 uppercase hex characters.
pub fn generate_table_token() -> String {
    let mut rng = rand::thread_rng();
    (0..16)
        .map(|_| format!("{:02X}", rng.gen::<u8>()))
        .collect()
}
