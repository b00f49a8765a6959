//! Axum middleware resolving the request principal.

use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{field, info_span, warn, Instrument};

use crate::api::error::ApiError;
use crate::errors::{AuthErrorType, LarderError};
use crate::AppState;

/// Credential presented with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresentedCredential {
    Bearer(String),
    Cookie(String),
}

/// A bearer header wins over a cookie.
pub fn presented_credential(headers: &HeaderMap, cookie_name: &str) -> Option<PresentedCredential> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty());
    if let Some(token) = bearer {
        return Some(PresentedCredential::Bearer(token));
    }

    CookieJar::from_headers(headers)
        .get(cookie_name)
        .map(|cookie| PresentedCredential::Cookie(cookie.value().to_string()))
}

/// Resolve the session and attach its [`SessionContext`](crate::auth::models::SessionContext)
/// as a request extension.
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let correlation_id = uuid::Uuid::new_v4();
    let span = info_span!(
        "auth_middleware.authenticate",
        http.method = %request.method(),
        http.path = %request.uri().path(),
        auth.user_id = field::Empty,
        correlation_id = %correlation_id
    );

    let credential = presented_credential(request.headers(), &state.config.auth.cookie_name);
    let resolved = async {
        match credential {
            Some(PresentedCredential::Bearer(token)) => state.sessions.resolve_bearer(&token).await,
            Some(PresentedCredential::Cookie(value)) => state.sessions.resolve_cookie(&value).await,
            None => Err(LarderError::auth("no session credential presented", AuthErrorType::MissingCredentials)),
        }
    }
    .instrument(span.clone())
    .await;

    match resolved {
        Ok(session) => {
            span.record("auth.user_id", field::display(&session.user_id));
            request.extensions_mut().insert(session);
            Ok(next.run(request).await)
        }
        Err(err) => {
            span.in_scope(|| warn!(%correlation_id, error = %err, "authentication failed"));
            Err(err.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header::COOKIE, HeaderValue};

    #[test]
    fn bearer_header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("larder_session=ses_a.b"));
        assert_eq!(
            presented_credential(&headers, "larder_session"),
            Some(PresentedCredential::Cookie("ses_a.b".to_string()))
        );

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer v4.local.xyz"));
        assert_eq!(
            presented_credential(&headers, "larder_session"),
            Some(PresentedCredential::Bearer("v4.local.xyz".to_string()))
        );
    }

    #[test]
    fn other_cookies_and_schemes_are_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("theme=dark"));
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwdw=="));
        assert_eq!(presented_credential(&headers, "larder_session"), None);
    }
}
