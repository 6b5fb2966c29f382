use chrono::{Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use tracing::debug;
use uuid::Uuid;

use shared_models::auth::{JwtClaims, Role, User};

/// Sign an HS256 token for `user_id` that expires after `ttl`.
pub fn issue_token(
    user_id: Uuid,
    email: Option<&str>,
    role: Role,
    secret: &str,
    ttl: Duration,
) -> Result<String, String> {
    if secret.is_empty() {
        return Err("JWT secret is not set".to_string());
    }

    let now = Utc::now();
    let claims = JwtClaims {
        sub: user_id.to_string(),
        email: email.map(str::to_string),
        role,
        iat: now.timestamp(),
        exp: (now + ttl).timestamp(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| format!("Failed to sign token: {}", e))
}

pub fn decode_claims(token: &str, jwt_secret: &str) -> Result<JwtClaims, String> {
    if jwt_secret.is_empty() {
        return Err("JWT secret is not set".to_string());
    }

    let validation = Validation::new(Algorithm::HS256);
    decode::<JwtClaims>(token, &DecodingKey::from_secret(jwt_secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            debug!("Token rejected: {}", e);
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => "Token expired".to_string(),
                jsonwebtoken::errors::ErrorKind::InvalidSignature => "Invalid token signature".to_string(),
                _ => "Invalid token".to_string(),
            }
        })
}

pub fn validate_token(token: &str, jwt_secret: &str) -> Result<User, String> {
    let claims = decode_claims(token, jwt_secret)?;

    let id = Uuid::parse_str(&claims.sub)
        .map_err(|_| "Invalid token subject".to_string())?;

    let user = User {
        id,
        email: claims.email,
        role: claims.role,
        issued_at: Utc.timestamp_opt(claims.iat, 0).single(),
    };

    debug!("Token validated successfully for user: {}", user.id);
    Ok(user)
}
