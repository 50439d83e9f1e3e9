//! Request handling that needs no database rows.

mod common;

use axum::http::header::SET_COOKIE;
use axum::http::StatusCode;
use common::{body_string, build_test_app, get, lazy_pool, post_form};

#[tokio::test]
async fn anonymous_visitors_get_not_found() {
    for uri in ["/submit/", "/dashboard/", "/all/", "/7/", "/reviews/7/", "/notification/accepted/"] {
        let (app, _) = build_test_app(lazy_pool());
        let response = get(app, uri, None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
    }
}

#[tokio::test]
async fn forged_session_is_rejected_before_touching_the_database() {
    let (app, _) = build_test_app(lazy_pool());
    let response = get(app, "/dashboard/", Some("sessionid=not.a.jwt")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let token = submissions::auth::session::issue_session_token(1, "other-secret", 1).unwrap();
    let (app, _) = build_test_app(lazy_pool());
    let response = get(app, "/dashboard/", Some(&format!("sessionid={token}"))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn not_found_page_is_html() {
    let (app, _) = build_test_app(lazy_pool());
    let response = get(app, "/submit/", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(body_string(response).await.contains("Page not found"));
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let (app, _) = build_test_app(lazy_pool());
    let response = get(app, "/this/route/does-not-exist", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn login_page_renders() {
    let (app, _) = build_test_app(lazy_pool());
    let response = get(app, "/account/login/", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert!(body.contains(r#"name="username""#));
    assert!(body.contains(r#"action="/account/login/""#));
}

#[tokio::test]
async fn empty_login_form_is_redisplayed_with_errors() {
    let (app, _) = build_test_app(lazy_pool());
    let response = post_form(app, "/account/login/", "username=&password=", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.contains("Enter your username."));
}

#[tokio::test]
async fn logout_clears_the_session_cookie() {
    let (app, _) = build_test_app(lazy_pool());
    let response = post_form(app, "/account/logout/", "", None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let cookie = response.headers().get(SET_COOKIE).unwrap().to_str().unwrap();
    assert!(cookie.starts_with("sessionid=;"));
    assert!(cookie.contains("Max-Age=0"));
}
