use std::net::SocketAddr;

use axum::{routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use crate::{accounts, pages};

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(pages::router())
        .merge(accounts::router())
        .route("/health", get(|| async { "ok" }))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!(
                        "http_request",
                        %method,
                        uri = %uri,
                        status = tracing::field::Empty
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     _latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router, host: &str, port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{host}:{port}").parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        response::Response,
    };
    use tower::ServiceExt;

    use super::*;
    use crate::accounts::password::hash_password;
    use crate::accounts::paths;
    use crate::config::AppConfig;
    use crate::store::failing::BrokenSessions;
    use crate::store::{IdentityStore, MemoryStore, NewUser};

    const ALICE_FORM: &str =
        "username=alice&email=alice%40example.com&password1=Str0ngPass%2123&password2=Str0ngPass%2123";

    fn app() -> (Router, Arc<MemoryStore>) {
        let (state, store) = AppState::in_memory(AppConfig::for_tests());
        (build_app(state), store)
    }

    fn post_form(uri: &str, body: &str, cookie: Option<&str>) -> Request<Body> {
        let mut req = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(c) = cookie {
            req = req.header(header::COOKIE, c);
        }
        req.body(Body::from(body.to_string())).unwrap()
    }

    fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
        let mut req = Request::builder().uri(uri);
        if let Some(c) = cookie {
            req = req.header(header::COOKIE, c);
        }
        req.body(Body::empty()).unwrap()
    }

    async fn body_text(res: Response) -> String {
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    /// `name=value` pair from a `Set-Cookie` header.
    fn cookie_pair(res: &Response) -> String {
        let set = res
            .headers()
            .get(header::SET_COOKIE)
            .expect("set-cookie")
            .to_str()
            .unwrap();
        set.split(';').next().unwrap().to_string()
    }

    #[tokio::test]
    async fn registration_creates_account_session_and_redirects_home() {
        let (app, store) = app();

        let res = app
            .clone()
            .oneshot(post_form(paths::REGISTER, ALICE_FORM, None))
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(res.headers()[header::LOCATION], paths::HOME);
        let cookie = cookie_pair(&res);
        assert!(cookie.starts_with("sessionid="));

        assert_eq!(store.user_count().await, 1);
        let user = store.find_by_username("alice").await.unwrap().expect("alice");
        assert_eq!(user.email, "alice@example.com");
        assert_ne!(user.password_hash, "Str0ngPass!23");
        assert_eq!(store.sessions_for(user.id).await.len(), 1);

        let home = app.oneshot(get(paths::HOME, Some(&cookie))).await.unwrap();
        assert_eq!(home.status(), StatusCode::OK);
        assert!(body_text(home).await.contains("Welcome back, alice!"));
    }

    #[tokio::test]
    async fn second_identical_submission_is_rejected() {
        let (app, store) = app();

        let first = app
            .clone()
            .oneshot(post_form(paths::REGISTER, ALICE_FORM, None))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::SEE_OTHER);

        let second = app
            .oneshot(post_form(paths::REGISTER, ALICE_FORM, None))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::OK);
        assert!(second.headers().get(header::SET_COOKIE).is_none());
        let html = body_text(second).await;
        assert!(html.contains("A user with that username already exists."));
        assert_eq!(store.user_count().await, 1);
        assert_eq!(store.session_count().await, 1);
    }

    #[tokio::test]
    async fn fullwidth_spelling_of_taken_username_is_rejected() {
        let (app, store) = app();

        let first = app
            .clone()
            .oneshot(post_form(paths::REGISTER, ALICE_FORM, None))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::SEE_OTHER);

        // "alice" in fullwidth letters
        let body = "username=%EF%BD%81%EF%BD%8C%EF%BD%89%EF%BD%83%EF%BD%85\
                    &email=other%40example.com&password1=Str0ngPass%2123&password2=Str0ngPass%2123";
        let second = app.oneshot(post_form(paths::REGISTER, body, None)).await.unwrap();
        assert_eq!(second.status(), StatusCode::OK);
        assert!(body_text(second)
            .await
            .contains("A user with that username already exists."));
        assert_eq!(store.user_count().await, 1);
    }

    /// Users in memory, session writes failing.
    fn app_with_broken_sessions() -> (Router, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let state = AppState::from_parts(
            Arc::new(AppConfig::for_tests()),
            store.clone(),
            Arc::new(BrokenSessions),
        )
        .unwrap();
        (build_app(state), store)
    }

    #[tokio::test]
    async fn register_answers_500_when_session_store_fails() {
        let (app, store) = app_with_broken_sessions();

        let res = app.oneshot(post_form(paths::REGISTER, ALICE_FORM, None)).await.unwrap();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(res.headers().get(header::SET_COOKIE).is_none());
        assert_eq!(body_text(res).await, "Internal server error");
        assert_eq!(store.user_count().await, 0);
    }

    #[tokio::test]
    async fn login_answers_500_when_session_store_fails() {
        let (app, store) = app_with_broken_sessions();
        store
            .insert_user(NewUser {
                username: "alice".into(),
                email: "alice@example.com".into(),
                password_hash: hash_password("Str0ngPass!23").unwrap(),
            })
            .await
            .unwrap();

        let res = app
            .oneshot(post_form(
                paths::LOGIN,
                "username=alice&password=Str0ngPass%2123",
                None,
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_text(res).await, "Internal server error");
    }

    #[tokio::test]
    async fn invalid_form_rerenders_with_errors() {
        let (app, store) = app();
        let body = "username=bob&email=not-an-email&password1=Str0ngPass%2123&password2=other";

        let res = app.oneshot(post_form(paths::REGISTER, body, None)).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let html = body_text(res).await;
        assert!(html.contains("Enter a valid email address."));
        assert!(html.contains("The two password fields didn\u{2019}t match."));
        assert!(html.contains(r#"value="bob""#));
        assert!(!html.contains("Str0ngPass"));
        assert_eq!(store.user_count().await, 0);
        assert_eq!(store.session_count().await, 0);
    }

    #[tokio::test]
    async fn register_form_renders_empty_fields() {
        let (app, _) = app();
        let res = app.oneshot(get(paths::REGISTER, None)).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let html = body_text(res).await;
        for name in ["username", "email", "password1", "password2"] {
            assert!(html.contains(&format!(r#"name="{name}""#)), "{name}");
        }
        assert!(!html.contains("errorlist"));
    }

    #[tokio::test]
    async fn login_logout_cycle() {
        let (app, store) = app();
        let reg = app
            .clone()
            .oneshot(post_form(paths::REGISTER, ALICE_FORM, None))
            .await
            .unwrap();
        let reg_cookie = cookie_pair(&reg);

        let bad = app
            .clone()
            .oneshot(post_form(paths::LOGIN, "username=alice&password=wrong", None))
            .await
            .unwrap();
        assert_eq!(bad.status(), StatusCode::OK);
        assert!(body_text(bad).await.contains("Please enter a correct username and password."));

        // Logging in again from the registered client rotates its session.
        let ok = app
            .clone()
            .oneshot(post_form(
                paths::LOGIN,
                "username=alice&password=Str0ngPass%2123",
                Some(&reg_cookie),
            ))
            .await
            .unwrap();
        assert_eq!(ok.status(), StatusCode::SEE_OTHER);
        let cookie = cookie_pair(&ok);
        assert_eq!(store.session_count().await, 1);

        let me = app.clone().oneshot(get(paths::ME, Some(&cookie))).await.unwrap();
        assert_eq!(me.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body_text(me).await).unwrap();
        assert_eq!(json["username"], "alice");
        assert!(json.get("password_hash").is_none());

        let out = app
            .clone()
            .oneshot(post_form(paths::LOGOUT, "", Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(out.status(), StatusCode::SEE_OTHER);
        assert!(cookie_pair(&out).ends_with('='));
        assert_eq!(store.session_count().await, 0);

        let me = app.oneshot(get(paths::ME, Some(&cookie))).await.unwrap();
        assert_eq!(me.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn static_pages() {
        let (app, _) = app();

        let home = app.clone().oneshot(get(paths::HOME, None)).await.unwrap();
        assert!(body_text(home).await.contains("You are not signed in."));

        let account = app.clone().oneshot(get(paths::ACCOUNT, None)).await.unwrap();
        assert_eq!(body_text(account).await, "Welcome to the account page!");

        let time = app.clone().oneshot(get(paths::TIME, None)).await.unwrap();
        assert!(body_text(time).await.contains("<h2>Current date and time: "));

        let health = app.oneshot(get("/health", None)).await.unwrap();
        assert_eq!(body_text(health).await, "ok");
    }
}
