//! Registration, two-factor, login/logout and token exchange.

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    Extension,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use tracing::{info, instrument};

use crate::api::error::ApiError;
use crate::api::extract::JsonBody;
use crate::api::response::{ApiResponse, ApiResult};
use crate::auth::api_client::SIGNATURE_HEADER;
use crate::auth::models::{SessionContext, UserStatusResponse};
use crate::auth::token_service::TokenResponse;
use crate::auth::user::{
    LoginInput, PasswordUpdateInput, TotpSecretRefreshInput, TotpSecretRefreshResponse, TotpSecretVerificationInput,
    UserCreationResponse, UserRegistrationInput,
};
use crate::config::AuthConfig;
use crate::households::models::ChangeActiveHouseholdInput;
use crate::AppState;

/// Session cookie: HttpOnly, SameSite=None, Path=/ and a positive Max-Age.
pub fn session_cookie(config: &AuthConfig, value: String, max_age_seconds: i64) -> Cookie<'static> {
    let mut cookie = Cookie::build((config.cookie_name.clone(), value))
        .http_only(true)
        .same_site(SameSite::None)
        .path("/")
        .secure(config.cookie_secure)
        .max_age(time::Duration::seconds(max_age_seconds.max(1)))
        .build();
    if let Some(domain) = &config.cookie_domain {
        cookie.set_domain(domain.clone());
    }
    cookie
}

/// The same cookie, already expired.
pub fn expired_cookie(config: &AuthConfig) -> Cookie<'static> {
    let mut cookie = Cookie::build((config.cookie_name.clone(), String::new()))
        .http_only(true)
        .same_site(SameSite::None)
        .path("/")
        .secure(config.cookie_secure)
        .max_age(time::Duration::ZERO)
        .expires(time::OffsetDateTime::UNIX_EPOCH)
        .build();
    if let Some(domain) = &config.cookie_domain {
        cookie.set_domain(domain.clone());
    }
    cookie
}

#[instrument(skip(state, input), fields(username = %input.username))]
pub async fn register_handler(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<UserRegistrationInput>,
) -> ApiResult<UserCreationResponse> {
    Ok(ApiResponse::created(state.users.register(input).await?))
}

pub async fn verify_totp_handler(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<TotpSecretVerificationInput>,
) -> ApiResult<()> {
    state.users.verify_totp(input).await?;
    Ok(ApiResponse::ok(()))
}

pub async fn new_totp_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    JsonBody(input): JsonBody<TotpSecretRefreshInput>,
) -> ApiResult<TotpSecretRefreshResponse> {
    Ok(ApiResponse::ok(state.users.request_new_totp(&session, input).await?))
}

pub async fn change_password_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    JsonBody(input): JsonBody<PasswordUpdateInput>,
) -> ApiResult<()> {
    state.users.change_password(&session, input).await?;
    Ok(ApiResponse::ok(()))
}

/// Cookie login.
#[instrument(skip(state, jar, input), fields(username = %input.username))]
pub async fn login_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    JsonBody(input): JsonBody<LoginInput>,
) -> Result<(CookieJar, ApiResponse<UserStatusResponse>), ApiError> {
    let user = state.users.authenticate(&input).await?;
    let issued = state.sessions.open_cookie_session(&user).await?;
    let session = state.sessions.resolve_cookie(&issued.credential).await?;

    let max_age = (issued.expires_at - state.kernel.now()).num_seconds();
    let cookie = session_cookie(&state.config.auth, issued.credential, max_age);
    info!(user_id = %user.id, "user logged in");
    Ok((jar.add(cookie), ApiResponse::ok(UserStatusResponse::from(&session))))
}

/// Bearer login: a PASETO straight from credentials.
#[instrument(skip(state, input), fields(username = %input.username))]
pub async fn login_token_handler(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<LoginInput>,
) -> ApiResult<TokenResponse> {
    let user = state.users.authenticate(&input).await?;
    let issued = state.sessions.open_bearer_session(&user, None, None).await?;
    Ok(ApiResponse::ok(TokenResponse { token: issued.credential, expires_at: issued.expires_at }))
}

pub async fn logout_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    jar: CookieJar,
) -> Result<(CookieJar, ApiResponse<()>), ApiError> {
    state.sessions.logout(&session).await?;
    Ok((jar.add(expired_cookie(&state.config.auth)), ApiResponse::ok(())))
}

pub async fn status_handler(Extension(session): Extension<SessionContext>) -> ApiResult<UserStatusResponse> {
    Ok(ApiResponse::ok(UserStatusResponse::from(&session)))
}

/// API-client token exchange; the raw body is what the signature covers.
pub async fn paseto_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<TokenResponse> {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|value| value.to_str().ok());
    Ok(ApiResponse::ok(state.api_clients.exchange(&body, signature).await?))
}

pub async fn select_household_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    JsonBody(input): JsonBody<ChangeActiveHouseholdInput>,
) -> ApiResult<UserStatusResponse> {
    let household_id = state.households.switch_active(&session, input).await?;
    let mut switched = session;
    switched.active_household_id = Some(household_id);
    Ok(ApiResponse::ok(UserStatusResponse::from(&switched)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_cookies_carry_the_required_attributes() {
        let config = AuthConfig::default();
        let cookie = session_cookie(&config, "ses_a.b".to_string(), 3600);
        assert_eq!(cookie.name(), "larder_session");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::None));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(time::Duration::seconds(3600)));

        let expired = expired_cookie(&config);
        assert_eq!(expired.value(), "");
        assert_eq!(expired.max_age(), Some(time::Duration::ZERO));
    }
}
