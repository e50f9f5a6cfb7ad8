//! JWT validation and token extraction helpers

use axum::http::HeaderValue;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

use crate::claims::IdentityClaims;
use crate::config::AuthConfig;
use crate::error::AuthError;

/// Validate an identity-provider JWT
pub(crate) fn validate_jwt_token(
    token: &str,
    config: &AuthConfig,
) -> Result<IdentityClaims, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);

    if let Some(aud) = &config.audience {
        validation.set_audience(&[aud]);
    } else {
        validation.validate_aud = false;
    }

    if let Some(iss) = &config.issuer {
        validation.set_issuer(&[iss]);
    }

    let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_ref());

    let token_data = decode::<IdentityClaims>(token, &decoding_key, &validation).map_err(|e| {
        tracing::debug!(error = %e, "JWT validation failed");
        AuthError::InvalidToken
    })?;

    Ok(token_data.claims)
}

/// Extract bearer token from Authorization header
pub(crate) fn extract_bearer_token(header: &HeaderValue) -> Result<String, AuthError> {
    let header_str = header
        .to_str()
        .map_err(|_| AuthError::InvalidAuthorizationFormat)?;

    header_str
        .strip_prefix("Bearer ")
        .map(str::to_string)
        .ok_or(AuthError::InvalidAuthorizationFormat)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::AuthBackend;
    use crate::context::Role;

    fn config() -> AuthConfig {
        AuthConfig {
            jwt_secret: "test-secret-key".to_string(),
            issuer: None,
            audience: None,
        }
    }

    fn token(config: &AuthConfig, sub: &str, role: Option<&str>, exp_offset: i64) -> String {
        let now = chrono::Utc::now().timestamp();
        let claims = IdentityClaims {
            sub: sub.to_string(),
            role: role.map(str::to_string),
            email: Some("leader@example.com".to_string()),
            iat: now as u64,
            exp: (now + exp_offset) as u64,
        };
        jsonwebtoken::encode(
            &jsonwebtoken::Header::new(Algorithm::HS256),
            &claims,
            &jsonwebtoken::EncodingKey::from_secret(config.jwt_secret.as_ref()),
        )
        .expect("Failed to encode JWT")
    }

    #[test]
    fn test_extract_bearer_token() {
        let header = HeaderValue::from_static("Bearer abc123");
        assert_eq!(extract_bearer_token(&header).unwrap(), "abc123");

        let header = HeaderValue::from_static("abc123");
        assert!(extract_bearer_token(&header).is_err());

        let header = HeaderValue::from_static("Basic abc123");
        assert!(extract_bearer_token(&header).is_err());
    }

    #[test]
    fn test_invalid_token_rejected() {
        assert!(validate_jwt_token("invalid_token", &config()).is_err());
    }

    #[test]
    fn test_roundtrip_yields_user_and_role() {
        let config = config();
        let user_id = uuid::Uuid::new_v4();
        let jwt = token(&config, &user_id.to_string(), Some("operator"), 3600);

        let ctx = AuthBackend::new(config).authenticate_jwt(&jwt).unwrap();
        assert_eq!(ctx.user_id, user_id);
        assert_eq!(ctx.role, Role::Operator);
        assert_eq!(ctx.email.as_deref(), Some("leader@example.com"));
    }

    #[test]
    fn test_non_uuid_subject_rejected() {
        let config = config();
        let jwt = token(&config, "not-a-uuid", None, 3600);
        let result = AuthBackend::new(config).authenticate_jwt(&jwt);
        assert!(matches!(result, Err(AuthError::InvalidUserId)));
    }

    #[test]
    fn test_expired_token_rejected() {
        let config = config();
        let jwt = token(&config, &uuid::Uuid::new_v4().to_string(), None, -3600);
        assert!(matches!(
            validate_jwt_token(&jwt, &config),
            Err(AuthError::InvalidToken)
        ));
    }
}
