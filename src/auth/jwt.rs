use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::Error};
use uuid::Uuid;

use crate::{model::role::Role, models::Claims};

fn now() -> usize {
    Utc::now().timestamp().max(0) as usize
}

pub fn generate_access_token(
    user_id: &str,
    email: &str,
    name: &str,
    role: Role,
    secret: &str,
    ttl: usize,
) -> Result<String, Error> {
    let claims = Claims {
        sub: user_id.to_string(),
        email: email.to_string(),
        name: name.to_string(),
        role,
        exp: now() + ttl,
        jti: Uuid::new_v4().to_string(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, Error> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trips_claims_and_rejects_other_secrets() {
        let token =
            generate_access_token("u1", "a@x.io", "Asha", Role::Admin, "secret", 60).unwrap();

        let claims = verify_token(&token, "secret").unwrap();
        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.role, Role::Admin);
        assert!(verify_token(&token, "other").is_err());
    }
}
