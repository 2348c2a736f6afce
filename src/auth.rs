use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

/// Identity handed out by the external auth provider. Referenced, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: String,
    pub email: Option<String>,
}

/// Capability over the external session/auth provider: resolves a bearer
/// token to the user it belongs to, or `None` for guests.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn resolve(&self, token: &str) -> Option<AuthUser>;
}

/// Static bearer-token table, configured as `token:user_id[:email]` entries.
/// Deployments sitting behind a real identity provider supply their own
/// `SessionProvider` instead.
pub struct StaticTokenSessions {
    tokens: HashMap<String, AuthUser>,
}

impl StaticTokenSessions {
    pub fn from_entries(entries: &[String]) -> Self {
        let mut tokens = HashMap::new();
        for entry in entries {
            let mut parts = entry.splitn(3, ':');
            let (token, user_id) = match (parts.next(), parts.next()) {
                (Some(t), Some(u)) if !t.is_empty() && !u.is_empty() => (t, u),
                _ => {
                    tracing::warn!("Ignoring malformed session token entry: {}", entry);
                    continue;
                }
            };
            tokens.insert(
                token.to_string(),
                AuthUser {
                    id: user_id.to_string(),
                    email: parts.next().map(str::to_string),
                },
            );
        }
        Self { tokens }
    }
}

#[async_trait]
impl SessionProvider for StaticTokenSessions {
    async fn resolve(&self, token: &str) -> Option<AuthUser> {
        self.tokens.get(token).cloned()
    }
}

async fn session_from_parts(parts: &mut Parts) -> Option<AuthUser> {
    let token = parts
        .headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())?
        .strip_prefix("Bearer ")?
        .trim()
        .to_string();

    let sessions = parts.extensions.get::<Arc<dyn SessionProvider>>()?.clone();
    sessions.resolve(&token).await
}

/// Extractor for endpoints that require a signed-in user (401 otherwise).
pub struct CurrentUser(pub AuthUser);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match session_from_parts(parts).await {
            Some(user) => Ok(CurrentUser(user)),
            None => Err((
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "Unauthorized" })),
            )
                .into_response()),
        }
    }
}

/// Extractor for endpoints that degrade gracefully for guests.
pub struct MaybeUser(pub Option<AuthUser>);

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(session_from_parts(parts).await))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_configured_tokens() {
        let sessions = StaticTokenSessions::from_entries(&[
            "tok-a:user-a:a@hce.edu.vn".to_string(),
            "tok-b:user-b".to_string(),
        ]);

        let a = sessions.resolve("tok-a").await.unwrap();
        assert_eq!(a.id, "user-a");
        assert_eq!(a.email.as_deref(), Some("a@hce.edu.vn"));

        let b = sessions.resolve("tok-b").await.unwrap();
        assert_eq!(b.email, None);

        assert!(sessions.resolve("tok-c").await.is_none());
    }

    #[tokio::test]
    async fn skips_malformed_entries() {
        let sessions = StaticTokenSessions::from_entries(&["broken".to_string()]);
        assert!(sessions.resolve("broken").await.is_none());
    }
}
