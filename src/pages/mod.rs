use axum::{response::Html, routing::get, Router};
use time::OffsetDateTime;

use crate::accounts::{extractors::MaybeUser, paths};
use crate::state::AppState;

pub mod templates;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(paths::HOME, get(home))
        .route(paths::ACCOUNT, get(account))
        .route(paths::TIME, get(current_time))
}

pub async fn home(MaybeUser(user): MaybeUser) -> Html<String> {
    Html(templates::home(user.as_ref().map(|u| &u.account)))
}

pub async fn account() -> &'static str {
    "Welcome to the account page!"
}

pub async fn current_time() -> Html<String> {
    Html(templates::current_time(server_now()))
}

/// Server local time. Falls back to UTC where the local offset cannot be
/// determined soundly, e.g. in a multi-threaded process on some Unixes.
fn server_now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_now_is_the_current_instant() {
        let before = OffsetDateTime::now_utc();
        let now = server_now();
        let after = OffsetDateTime::now_utc();
        assert!(before <= now && now <= after);
    }
}
