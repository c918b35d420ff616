//! Credential parsing and request authentication.
//!
//! Requests carry at most one credential: an `Authorization` header (`Basic`
//! or `Token` scheme) or, absent the header, a `_tok` query parameter. The
//! header always wins when both are present. No credential at all is not an
//! error; it yields an anonymous request.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;
use tracing::debug;

use super::error::AppError;
use super::tokens::TokenService;
use super::users::UserService;
use crate::domain::entities::UserRecord;
use crate::domain::types::AccessScope;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("malformed authorization header")]
    MalformedHeader,
    #[error("unsupported authorization scheme `{0}`")]
    UnsupportedScheme(String),
}

/// A parsed credential, not yet verified.
#[derive(Debug, Clone, PartialEq)]
pub enum Credentials {
    Basic { email: String, password: String },
    Token(String),
}

/// Extract the credential a request presents, if any.
///
/// `header` is the raw `Authorization` value; `query_token` is the `_tok`
/// query parameter, consulted only when no header is present.
pub fn parse_credentials(
    header: Option<&str>,
    query_token: Option<&str>,
) -> Result<Option<Credentials>, CredentialError> {
    if let Some(header) = header {
        return parse_header(header).map(Some);
    }
    match query_token {
        Some(secret) if !secret.is_empty() => Ok(Some(Credentials::Token(secret.to_string()))),
        _ => Ok(None),
    }
}

fn parse_header(header: &str) -> Result<Credentials, CredentialError> {
    let (scheme, rest) = header
        .trim()
        .split_once(' ')
        .ok_or(CredentialError::MalformedHeader)?;
    match scheme {
        s if s.eq_ignore_ascii_case("basic") => parse_basic(rest.trim()),
        s if s.eq_ignore_ascii_case("token") => parse_token(rest.trim()),
        other => Err(CredentialError::UnsupportedScheme(other.to_string())),
    }
}

fn parse_basic(encoded: &str) -> Result<Credentials, CredentialError> {
    let raw = STANDARD
        .decode(encoded)
        .map_err(|_| CredentialError::MalformedHeader)?;
    let pair = String::from_utf8(raw).map_err(|_| CredentialError::MalformedHeader)?;
    let (email, password) = pair
        .split_once(':')
        .ok_or(CredentialError::MalformedHeader)?;
    Ok(Credentials::Basic {
        email: email.to_string(),
        password: password.to_string(),
    })
}

/// `Token token="SECRET"`, quotes optional.
fn parse_token(rest: &str) -> Result<Credentials, CredentialError> {
    let value = rest
        .strip_prefix("token=")
        .ok_or(CredentialError::MalformedHeader)?;
    let secret = value.trim_matches('"');
    if secret.is_empty() {
        return Err(CredentialError::MalformedHeader);
    }
    Ok(Credentials::Token(secret.to_string()))
}

/// A verified caller: who they are and what their credential permits.
#[derive(Debug, Clone)]
pub struct RequestIdentity {
    pub user: UserRecord,
    pub access: AccessScope,
}

impl RequestIdentity {
    /// Ensure the credential covers `needed`, or fail with
    /// [`AppError::Forbidden`].
    pub fn require(&self, needed: AccessScope) -> Result<(), AppError> {
        if self.access.allows(needed) {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }
}

/// Turns parsed credentials into a verified [`RequestIdentity`].
#[derive(Clone)]
pub struct Authenticator {
    users: Arc<UserService>,
    tokens: Arc<TokenService>,
}

impl Authenticator {
    pub fn new(users: Arc<UserService>, tokens: Arc<TokenService>) -> Self {
        Self { users, tokens }
    }

    /// Verify a credential. `Ok(None)` is the anonymous caller; a credential
    /// that is present but wrong is always [`AppError::Unauthorized`].
    ///
    /// Password logins grant [`AccessScope::READ_WRITE`]; token logins grant
    /// whatever scope the token was minted with.
    pub async fn authenticate(
        &self,
        credentials: Option<Credentials>,
    ) -> Result<Option<RequestIdentity>, AppError> {
        let Some(credentials) = credentials else {
            return Ok(None);
        };
        match credentials {
            Credentials::Basic { email, password } => {
                let user = self.users.authenticate_password(&email, &password).await?;
                debug!(user_id = %user.id, "authenticated via password");
                Ok(Some(RequestIdentity {
                    user,
                    access: AccessScope::READ_WRITE,
                }))
            }
            Credentials::Token(secret) => {
                let Some((user, access)) = self.tokens.resolve(&secret).await? else {
                    return Err(AppError::Unauthorized);
                };
                debug!(user_id = %user.id, %access, "authenticated via token");
                Ok(Some(RequestIdentity { user, access }))
            }
        }
    }
}
