use crate::state::AppState;
use axum::Router;

pub mod creator;
pub mod dto;
pub mod errors;
pub mod extractors;
pub mod handlers;
pub mod password;
pub mod session;
pub mod validator;

pub mod paths {
    pub const HOME: &str = "/";
    pub const ACCOUNT: &str = "/accounts/";
    pub const TIME: &str = "/accounts/time/";
    pub const REGISTER: &str = "/accounts/register/";
    pub const LOGIN: &str = "/accounts/login/";
    pub const LOGOUT: &str = "/accounts/logout/";
    pub const ME: &str = "/accounts/me/";
}

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::account_routes())
}
