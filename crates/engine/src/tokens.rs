use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use domain::{CommentId, ModeratorIdentity, ProjectId};
use hmac::{Hmac, Mac};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("token signature mismatch")]
    BadSignature,
    #[error("token expired")]
    Expired,
}

pub trait TokenClaims: Serialize + DeserializeOwned {
    const PURPOSE: &'static str;
    const LIFETIME_HOURS: i64;
}

/// Moderator approval link sent with a new-comment notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApproveClaims {
    pub comment_id: CommentId,
    pub moderator: ModeratorIdentity,
}

impl TokenClaims for ApproveClaims {
    const PURPOSE: &'static str = "approve_comment";
    const LIFETIME_HOURS: i64 = 72;
}

/// Opt-in link for reply notifications on one comment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcceptNotifyClaims {
    pub comment_id: CommentId,
}

impl TokenClaims for AcceptNotifyClaims {
    const PURPOSE: &'static str = "accept_notify";
    const LIFETIME_HOURS: i64 = 24;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailVerifyClaims {
    pub email: String,
    pub project_id: ProjectId,
    pub comment_id: Option<CommentId>,
}

impl TokenClaims for EmailVerifyClaims {
    const PURPOSE: &'static str = "email_verify";
    const LIFETIME_HOURS: i64 = 72;
}

#[derive(Serialize, Deserialize)]
struct Envelope<C> {
    #[serde(flatten)]
    claims: C,
    exp: i64,
}

#[derive(Clone)]
pub struct TokenService {
    secret: String,
}

impl TokenService {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    fn mac<C: TokenClaims>(&self) -> Result<HmacSha256, TokenError> {
        let key = format!("{}-{}", self.secret, C::PURPOSE);
        HmacSha256::new_from_slice(key.as_bytes()).map_err(|_| TokenError::Malformed)
    }

    // base64url(json).base64url(hmac), keyed per purpose
    pub fn sign<C: TokenClaims>(&self, claims: &C, now: DateTime<Utc>) -> Result<String, TokenError> {
        let envelope = Envelope {
            claims,
            exp: (now + Duration::hours(C::LIFETIME_HOURS)).timestamp(),
        };
        let payload = serde_json::to_vec(&envelope).map_err(|_| TokenError::Malformed)?;

        let mut mac = self.mac::<C>()?;
        mac.update(&payload);
        let signature = mac.finalize().into_bytes();

        Ok(format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(&payload),
            URL_SAFE_NO_PAD.encode(signature)
        ))
    }

    pub fn verify<C: TokenClaims>(&self, token: &str, now: DateTime<Utc>) -> Result<C, TokenError> {
        let (payload, signature) = token.split_once('.').ok_or(TokenError::Malformed)?;
        let payload = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| TokenError::Malformed)?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| TokenError::Malformed)?;

        let mut mac = self.mac::<C>()?;
        mac.update(&payload);
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::BadSignature)?;

        let envelope: Envelope<C> =
            serde_json::from_slice(&payload).map_err(|_| TokenError::Malformed)?;
        if envelope.exp < now.timestamp() {
            return Err(TokenError::Expired);
        }
        Ok(envelope.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims() -> EmailVerifyClaims {
        EmailVerifyClaims {
            email: "a@x.com".into(),
            project_id: ProjectId::new_unchecked("blog".into()),
            comment_id: Some("c1".into()),
        }
    }

    #[test]
    fn test_signed_token_verifies() {
        let tokens = TokenService::new("s3cret");
        let now = Utc::now();
        let token = tokens.sign(&claims(), now).unwrap();
        assert_eq!(tokens.verify::<EmailVerifyClaims>(&token, now).unwrap(), claims());
    }

    #[test]
    fn test_expired_token_rejected() {
        let tokens = TokenService::new("s3cret");
        let now = Utc::now();
        let token = tokens.sign(&claims(), now).unwrap();
        let later = now + Duration::hours(EmailVerifyClaims::LIFETIME_HOURS + 1);
        assert_eq!(
            tokens.verify::<EmailVerifyClaims>(&token, later),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn test_tampered_or_foreign_token_rejected() {
        let tokens = TokenService::new("s3cret");
        let now = Utc::now();
        let token = tokens.sign(&claims(), now).unwrap();

        let other = TokenService::new("another");
        assert_eq!(
            other.verify::<EmailVerifyClaims>(&token, now),
            Err(TokenError::BadSignature)
        );

        let (_, sig) = token.split_once('.').unwrap();
        let forged = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(br#"{"email":"b@x.com","project_id":"blog","comment_id":null,"exp":9999999999}"#),
            sig
        );
        assert_eq!(
            tokens.verify::<EmailVerifyClaims>(&forged, now),
            Err(TokenError::BadSignature)
        );

        assert_eq!(
            tokens.verify::<EmailVerifyClaims>("garbage", now),
            Err(TokenError::Malformed)
        );
    }

    #[test]
    fn test_purpose_keys_are_separate() {
        let tokens = TokenService::new("s3cret");
        let now = Utc::now();
        let token = tokens
            .sign(&AcceptNotifyClaims { comment_id: "c1".into() }, now)
            .unwrap();
        assert_eq!(
            tokens.verify::<AcceptNotifyClaims>(&token, now).unwrap().comment_id,
            CommentId::from("c1")
        );
        assert!(tokens.verify::<ApproveClaims>(&token, now).is_err());
    }
}
