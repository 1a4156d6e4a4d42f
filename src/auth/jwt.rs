use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use std::env;

use super::model::{Claims, ACCESS_TOKEN_TYPE};

const DEFAULT_JWT_SECRET: &str = "activity-report-jwt-secret-change-in-production";
const ACCESS_TOKEN_EXPIRY_SECONDS: i64 = 15 * 60; // 15 minutes

fn get_jwt_secret() -> String {
    env::var("JWT_SECRET").unwrap_or_else(|_| {
        log::warn!("JWT_SECRET not set, using default secret. SET THIS IN PRODUCTION!");
        DEFAULT_JWT_SECRET.to_string()
    })
}

/// Sign an access token with the shared secret.
///
/// Production tokens come from the identity service; this mirrors its claim
/// layout so operators and tests can mint tokens for a known user.
pub fn generate_access_token(
    user_id: &str,
    username: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = chrono::Utc::now().timestamp() as usize;
    let claims = Claims {
        sub: user_id.to_string(),
        username: username.to_string(),
        exp: now + ACCESS_TOKEN_EXPIRY_SECONDS as usize,
        iat: now,
        token_type: ACCESS_TOKEN_TYPE.to_string(),
    };

    let secret = get_jwt_secret();
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Validate and decode a token
pub fn validate_token(token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let secret = get_jwt_secret();
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}
