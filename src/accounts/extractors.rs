use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};
use axum_extra::extract::cookie::CookieJar;
use tracing::error;

use crate::state::AppState;
use crate::store::{Session, UserAccount};

/// The signed-in user, if the request carries a live session cookie.
/// Anonymous requests are not rejected.
pub struct MaybeUser(pub Option<CurrentUser>);

#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub account: UserAccount,
    pub session: Session,
}

/// Like [`MaybeUser`] but rejects anonymous requests.
pub struct AuthUser(pub CurrentUser);

#[async_trait]
impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = (StatusCode, String);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let Some(token) = state.keys.token_from_jar(&jar) else {
            return Ok(MaybeUser(None));
        };

        let session = state.session_manager().resolve(token).await.map_err(|e| {
            error!(error = %e, "session lookup failed");
            internal()
        })?;
        let Some(session) = session else {
            return Ok(MaybeUser(None));
        };

        let account = state.identity.find_by_id(session.user_id).await.map_err(|e| {
            error!(error = %e, user_id = %session.user_id, "user lookup failed");
            internal()
        })?;

        Ok(MaybeUser(
            account.map(|account| CurrentUser { account, session }),
        ))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = (StatusCode, String);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match MaybeUser::from_request_parts(parts, state).await? {
            MaybeUser(Some(user)) => Ok(AuthUser(user)),
            MaybeUser(None) => Err((StatusCode::UNAUTHORIZED, "Authentication required".into())),
        }
    }
}

fn internal() -> (StatusCode, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".into(),
    )
}
