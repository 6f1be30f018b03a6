use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Form, Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{error, info, instrument};

use crate::{
    accounts::{
        dto::{ErrorSet, LoginInput, PublicUser, RegistrationInput, EMAIL, PASSWORD, USERNAME},
        errors::RegistrationError,
        extractors::{AuthUser, MaybeUser},
        password::verify_password,
        paths,
        session::IssuedSession,
        validator::{normalize_username, REQUIRED},
    },
    pages::templates,
    state::AppState,
};

pub const INVALID_LOGIN: &str =
    "Please enter a correct username and password. Note that both fields may be case-sensitive.";

pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route(paths::REGISTER, get(register_form).post(register))
        .route(paths::LOGIN, get(login_form).post(login))
        .route(paths::LOGOUT, axum::routing::post(logout))
        .route(paths::ME, get(get_me))
}

pub async fn register_form() -> Html<String> {
    Html(templates::register(&[], None))
}

#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    MaybeUser(current): MaybeUser,
    jar: CookieJar,
    Form(input): Form<RegistrationInput>,
) -> Response {
    let rerender = |errors: &ErrorSet| {
        Html(templates::register(
            &[(USERNAME, input.username.as_str()), (EMAIL, input.email.as_str())],
            Some(errors),
        ))
        .into_response()
    };

    let data = match state.validator().validate(&input).await {
        Ok(data) => data,
        Err(RegistrationError::Invalid(errors)) => return rerender(&errors),
        Err(e) => {
            error!(error = %e, "registration validation failed");
            return internal_error();
        }
    };

    let previous = current.map(|u| u.session.id);
    match state.account_creator().create_and_authenticate(data, previous).await {
        Ok(registered) => {
            info!(
                user_id = %registered.account.id,
                username = %registered.account.username,
                "user registered"
            );
            signed_in_redirect(&state, jar, &registered.session)
        }
        Err(RegistrationError::Invalid(errors)) => rerender(&errors),
        Err(e) => {
            error!(error = %e, "account creation failed");
            internal_error()
        }
    }
}

pub async fn login_form() -> Html<String> {
    Html(templates::login(&[], None))
}

#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    MaybeUser(current): MaybeUser,
    jar: CookieJar,
    Form(input): Form<LoginInput>,
) -> Response {
    let username = normalize_username(&input.username);
    let username = username.as_str();
    let rerender = |errors: &ErrorSet| {
        Html(templates::login(&[(USERNAME, username)], Some(errors))).into_response()
    };

    let mut errors = ErrorSet::new();
    if username.is_empty() {
        errors.add(USERNAME, REQUIRED);
    }
    if input.password.is_empty() {
        errors.add(PASSWORD, REQUIRED);
    }
    if !errors.is_empty() {
        return rerender(&errors);
    }

    let user = match state.identity.find_by_username(username).await {
        Ok(user) => user,
        Err(e) => {
            error!(error = %e, "find_by_username failed");
            return internal_error();
        }
    };

    let verified = match &user {
        Some(u) => match verify_password(&input.password, &u.password_hash) {
            Ok(ok) => ok,
            Err(e) => {
                error!(error = %e, user_id = %u.id, "verify_password failed");
                return internal_error();
            }
        },
        None => false,
    };

    let Some(user) = user.filter(|_| verified) else {
        info!(username = %username, "login rejected");
        errors.add_non_field(INVALID_LOGIN);
        return rerender(&errors);
    };

    let previous = current.map(|u| u.session.id);
    match state.session_manager().start(user.id, previous).await {
        Ok(issued) => {
            info!(user_id = %user.id, "user logged in");
            signed_in_redirect(&state, jar, &issued)
        }
        Err(e) => {
            error!(error = %e, user_id = %user.id, "session start failed");
            internal_error()
        }
    }
}

#[instrument(skip_all)]
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> Response {
    if let Some(token) = state.keys.token_from_jar(&jar) {
        if let Err(e) = state.session_manager().end(token).await {
            error!(error = %e, "session end failed");
            return internal_error();
        }
    }
    let jar = jar.add(state.keys.removal_cookie());
    (jar, Redirect::to(paths::HOME)).into_response()
}

#[instrument(skip_all)]
pub async fn get_me(AuthUser(user): AuthUser) -> Json<PublicUser> {
    Json(PublicUser {
        id: user.account.id,
        username: user.account.username,
        email: user.account.email,
    })
}

fn signed_in_redirect(state: &AppState, jar: CookieJar, issued: &IssuedSession) -> Response {
    let jar = jar.add(state.keys.cookie(&issued.token));
    (jar, Redirect::to(paths::HOME)).into_response()
}

fn internal_error() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
}
