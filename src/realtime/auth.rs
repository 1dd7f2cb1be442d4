//! Minimal bearer-token validation for the realtime fabric's connect-time
//! check (§4.7). Full auth — credential issuance, refresh, revocation —
//! stays out of scope per §1's Non-goals; this only answers "is this token
//! currently valid", using the teacher's `jsonwebtoken` dependency.

use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthClaims {
    pub sub: String,
    pub exp: usize,
}

pub fn validate_bearer_token(token: &str, secret: &str) -> Result<AuthClaims, jsonwebtoken::errors::Error> {
    let data = decode::<AuthClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    #[test]
    fn accepts_token_signed_with_matching_secret() {
        let claims = AuthClaims {
            sub: "user-1".into(),
            exp: (chrono::Utc::now().timestamp() + 3600) as usize,
        };
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(b"s3cr3t")).unwrap();
        assert!(validate_bearer_token(&token, "s3cr3t").is_ok());
    }

    #[test]
    fn rejects_token_signed_with_wrong_secret() {
        let claims = AuthClaims {
            sub: "user-1".into(),
            exp: (chrono::Utc::now().timestamp() + 3600) as usize,
        };
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(b"s3cr3t")).unwrap();
        assert!(validate_bearer_token(&token, "wrong").is_err());
    }
}
