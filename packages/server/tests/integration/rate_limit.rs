use std::net::{IpAddr, Ipv4Addr};

use serde_json::json;

use server::config::RateLimitConfig;

use crate::common::{TestApp, TestOptions, routes};

const LOOPBACK: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

fn limited_options() -> TestOptions {
    TestOptions {
        rate_limit: RateLimitConfig {
            enabled: true,
            max_requests: 5,
            window_ms: 60_000,
            cleanup_interval_secs: 300,
        },
        ..Default::default()
    }
}

async fn limited_app() -> TestApp {
    TestApp::spawn_with(limited_options()).await
}

/// The test client connects from loopback, so trusting it makes the server
/// behave as if it sat behind a reverse proxy.
async fn limited_app_behind_proxy() -> TestApp {
    TestApp::spawn_with(TestOptions {
        trusted_proxies: vec![LOOPBACK],
        ..limited_options()
    })
    .await
}

#[tokio::test]
async fn sixth_login_in_a_minute_is_throttled() {
    let app = limited_app().await;
    let body = json!({"email": "nobody@studio.example", "password": "whatever-pass"});

    for _ in 0..5 {
        let res = app.post_without_token(routes::LOGIN, &body).await;
        assert_eq!(res.status, 401);
    }
    let res = app.post_without_token(routes::LOGIN, &body).await;

    assert_eq!(res.status, 429);
    assert_eq!(res.body["code"], "RATE_LIMITED");
    let retry_after: u64 = res.header("retry-after").unwrap().parse().unwrap();
    assert!((1..=60).contains(&retry_after));
}

#[tokio::test]
async fn forwarded_for_from_untrusted_peer_does_not_reset_budget() {
    let app = limited_app().await;
    let body = json!({"email": "nobody@studio.example", "password": "whatever-pass"});

    for i in 0..5 {
        let res = app
            .post_forwarded(routes::LOGIN, &body, &format!("198.51.100.{i}"))
            .await;
        assert_eq!(res.status, 401);
    }
    let res = app
        .post_forwarded(routes::LOGIN, &body, "198.51.100.200")
        .await;

    assert_eq!(res.status, 429);
}

#[tokio::test]
async fn clients_behind_trusted_proxy_are_counted_separately() {
    let app = limited_app_behind_proxy().await;
    let body = json!({"email": "nobody@studio.example", "password": "whatever-pass"});

    for _ in 0..5 {
        app.post_forwarded(routes::LOGIN, &body, "203.0.113.7").await;
    }
    let same = app.post_forwarded(routes::LOGIN, &body, "203.0.113.7").await;
    assert_eq!(same.status, 429);

    let other = app.post_forwarded(routes::LOGIN, &body, "198.51.100.2").await;
    assert_eq!(other.status, 401);
}

#[tokio::test]
async fn spoofed_left_hops_are_ignored_behind_trusted_proxy() {
    let app = limited_app_behind_proxy().await;
    let body = json!({"email": "nobody@studio.example", "password": "whatever-pass"});

    for i in 0..5 {
        let chain = format!("192.0.2.{i}, 203.0.113.7");
        let res = app.post_forwarded(routes::LOGIN, &body, &chain).await;
        assert_eq!(res.status, 401);
    }
    let res = app
        .post_forwarded(routes::LOGIN, &body, "192.0.2.99, 203.0.113.7")
        .await;

    assert_eq!(res.status, 429);
}

#[tokio::test]
async fn endpoints_have_their_own_budget() {
    let app = limited_app().await;
    let login = json!({"email": "nobody@studio.example", "password": "whatever-pass"});

    for _ in 0..5 {
        app.post_without_token(routes::LOGIN, &login).await;
    }

    let forgot = app
        .post_without_token(
            routes::FORGOT_PASSWORD,
            &json!({"email": "nobody@studio.example"}),
        )
        .await;
    assert_eq!(forgot.status, 200);
}

#[tokio::test]
async fn authenticated_reads_are_not_throttled() {
    let app = limited_app().await;
    let ada = app.create_user("ada@studio.example").await;

    for _ in 0..10 {
        let res = app.get_with_token(routes::ME, &ada.access).await;
        assert_eq!(res.status, 200);
    }
}
