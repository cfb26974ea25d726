use std::time::Duration;

use common::Role;
use serde_json::json;

use server::config::AuthConfig;

use crate::common::{JWT_SECRET, PASSWORD, TestApp, TestOptions, routes};

/// Refresh, reset and verification tokens expire the moment they are issued.
async fn expiring_app() -> TestApp {
    TestApp::spawn_with(TestOptions {
        auth: AuthConfig {
            refresh_token_ttl_secs: 0,
            password_reset_ttl_secs: 0,
            email_verification_ttl_secs: 0,
            ..AuthConfig::with_secret(JWT_SECRET)
        },
        ..Default::default()
    })
    .await
}

async fn let_tokens_lapse() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

mod registration {
    use super::*;

    #[tokio::test]
    async fn new_user_registers_as_unverified_viewer() {
        let app = TestApp::spawn().await;

        let res = app
            .post_without_token(
                routes::REGISTER,
                &json!({"email": "Ada@Studio.Example", "password": PASSWORD, "name": "Ada"}),
            )
            .await;

        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(res.body["success"], true);
        assert_eq!(res.body["user"]["email"], "ada@studio.example");
        assert_eq!(res.body["user"]["role"], "VIEWER");
        assert_eq!(res.body["user"]["email_verified"], false);
        assert!(res.body["user"].get("password_hash").is_none());
        assert!(
            app.mailer
                .last_token_for("ada@studio.example", "Verify")
                .is_some()
        );
    }

    #[tokio::test]
    async fn email_is_unique_regardless_of_case() {
        let app = TestApp::spawn().await;
        app.register("ada@studio.example").await;

        let res = app
            .post_without_token(
                routes::REGISTER,
                &json!({"email": "ADA@studio.example", "password": PASSWORD, "name": "Ada"}),
            )
            .await;

        assert_eq!(res.status, 409);
        assert_eq!(res.body["code"], "EMAIL_TAKEN");
    }

    #[tokio::test]
    async fn every_invalid_field_is_reported() {
        let app = TestApp::spawn().await;

        let res = app
            .post_without_token(
                routes::REGISTER,
                &json!({"email": "not-an-email", "password": "short", "name": ""}),
            )
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["success"], false);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
        let fields: Vec<_> = res.body["details"]
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d["field"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(fields, ["email", "password", "name"]);
    }

    #[tokio::test]
    async fn malformed_json_is_a_validation_error() {
        let app = TestApp::spawn().await;

        let res = app
            .post_without_token(routes::REGISTER, &json!({"email": "a@b.io"}))
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }
}

mod login {
    use super::*;

    #[tokio::test]
    async fn returns_token_pair_and_user() {
        let app = TestApp::spawn().await;
        app.register("ada@studio.example").await;

        let res = app.login("ada@studio.example", PASSWORD).await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["token_type"], "Bearer");
        assert_eq!(res.body["expires_in"], 900);
        assert_eq!(res.body["user"]["email"], "ada@studio.example");
        assert!(res.body["access_token"].is_string());
        assert!(res.body["refresh_token"].is_string());
    }

    #[tokio::test]
    async fn unknown_email_and_wrong_password_look_the_same() {
        let app = TestApp::spawn().await;
        app.register("ada@studio.example").await;

        let wrong_password = app.login("ada@studio.example", "not-the-password").await;
        let unknown_email = app.login("nobody@studio.example", PASSWORD).await;

        assert_eq!(wrong_password.status, 401);
        assert_eq!(unknown_email.status, 401);
        assert_eq!(wrong_password.body, unknown_email.body);
        assert_eq!(wrong_password.body["code"], "INVALID_CREDENTIALS");
    }

    #[tokio::test]
    async fn me_requires_a_valid_bearer_token() {
        let app = TestApp::spawn().await;
        let ada = app.create_user("ada@studio.example").await;

        let ok = app.get_with_token(routes::ME, &ada.access).await;
        assert_eq!(ok.status, 200);
        assert_eq!(ok.body["data"]["id"], ada.id);

        let missing = app.get_without_token(routes::ME).await;
        assert_eq!(missing.status, 401);
        assert_eq!(missing.body["code"], "TOKEN_MISSING");

        let garbage = app.get_with_token(routes::ME, "not.a.jwt").await;
        assert_eq!(garbage.status, 401);
        assert_eq!(garbage.body["code"], "TOKEN_INVALID");
    }

    #[tokio::test]
    async fn refresh_token_is_not_an_access_token() {
        let app = TestApp::spawn().await;
        let ada = app.create_user("ada@studio.example").await;

        let res = app.get_with_token(routes::ME, &ada.refresh).await;

        assert_eq!(res.status, 401);
        assert_eq!(res.body["code"], "TOKEN_INVALID");
    }
}

mod refresh {
    use super::*;

    #[tokio::test]
    async fn exchanging_rotates_both_tokens() {
        let app = TestApp::spawn().await;
        let ada = app.create_user("ada@studio.example").await;

        let res = app
            .post_without_token(routes::REFRESH, &json!({"refresh_token": ada.refresh}))
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_ne!(res.refresh_token(), ada.refresh);
        let me = app.get_with_token(routes::ME, &res.access_token()).await;
        assert_eq!(me.status, 200);
    }

    #[tokio::test]
    async fn reusing_a_rotated_token_revokes_the_whole_family() {
        let app = TestApp::spawn().await;
        let ada = app.create_user("ada@studio.example").await;

        let first = app
            .post_without_token(routes::REFRESH, &json!({"refresh_token": ada.refresh}))
            .await;
        assert_eq!(first.status, 200);
        let successor = first.refresh_token();

        let replay = app
            .post_without_token(routes::REFRESH, &json!({"refresh_token": ada.refresh}))
            .await;
        assert_eq!(replay.status, 401);
        assert_eq!(replay.body["code"], "TOKEN_INVALID");

        let after = app
            .post_without_token(routes::REFRESH, &json!({"refresh_token": successor}))
            .await;
        assert_eq!(after.status, 401, "successor must be revoked too");
    }

    #[tokio::test]
    async fn other_logins_survive_reuse_in_one_family() {
        let app = TestApp::spawn().await;
        let ada = app.create_user("ada@studio.example").await;
        let laptop = app.login("ada@studio.example", PASSWORD).await.refresh_token();

        app.post_without_token(routes::REFRESH, &json!({"refresh_token": ada.refresh}))
            .await;
        app.post_without_token(routes::REFRESH, &json!({"refresh_token": ada.refresh}))
            .await;

        let res = app
            .post_without_token(routes::REFRESH, &json!({"refresh_token": laptop}))
            .await;
        assert_eq!(res.status, 200);
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let app = expiring_app().await;
        let ada = app.create_user("ada@studio.example").await;
        let_tokens_lapse().await;

        let res = app
            .post_without_token(routes::REFRESH, &json!({"refresh_token": ada.refresh}))
            .await;

        assert_eq!(res.status, 401);
        assert_eq!(res.body["code"], "TOKEN_INVALID");
    }

    #[tokio::test]
    async fn concurrent_exchanges_of_one_token_succeed_at_most_once() {
        let app = TestApp::spawn().await;
        let ada = app.create_user("ada@studio.example").await;
        let body = json!({"refresh_token": ada.refresh});

        let (a, b) = tokio::join!(
            app.post_without_token(routes::REFRESH, &body),
            app.post_without_token(routes::REFRESH, &body),
        );

        let successes = [a.status, b.status].iter().filter(|s| **s == 200).count();
        assert!(successes <= 1, "both exchanges succeeded: {} / {}", a.text, b.text);

        let again = app.post_without_token(routes::REFRESH, &body).await;
        assert_eq!(again.status, 401);
    }

    #[tokio::test]
    async fn unknown_and_empty_tokens_are_rejected() {
        let app = TestApp::spawn().await;

        for token in ["", "   ", "deadbeef"] {
            let res = app
                .post_without_token(routes::REFRESH, &json!({"refresh_token": token}))
                .await;
            assert_eq!(res.status, 401, "{token:?}");
            assert_eq!(res.body["code"], "TOKEN_INVALID");
        }
    }

    #[tokio::test]
    async fn refreshed_token_carries_the_current_role() {
        let app = TestApp::spawn().await;
        let ada = app.create_user("ada@studio.example").await;
        app.set_role("ada@studio.example", Role::Editor).await;

        let stale = app.get_with_token(routes::BLOG_STATS, &ada.access).await;
        assert_eq!(stale.status, 403);

        let res = app
            .post_without_token(routes::REFRESH, &json!({"refresh_token": ada.refresh}))
            .await;
        assert_eq!(res.body["user"]["role"], "EDITOR");
        let fresh = app
            .get_with_token(routes::BLOG_STATS, &res.access_token())
            .await;
        assert_eq!(fresh.status, 200);
    }
}

mod logout {
    use super::*;

    #[tokio::test]
    async fn logout_revokes_the_session_and_is_idempotent() {
        let app = TestApp::spawn().await;
        let ada = app.create_user("ada@studio.example").await;

        let first = app.post_empty(routes::LOGOUT, &ada.access).await;
        assert_eq!(first.status, 200, "{}", first.text);
        let again = app.post_empty(routes::LOGOUT, &ada.access).await;
        assert_eq!(again.status, 200);

        let res = app
            .post_without_token(routes::REFRESH, &json!({"refresh_token": ada.refresh}))
            .await;
        assert_eq!(res.status, 401);
    }

    #[tokio::test]
    async fn logout_with_body_also_revokes_that_token() {
        let app = TestApp::spawn().await;
        let ada = app.create_user("ada@studio.example").await;
        let other = app.login("ada@studio.example", PASSWORD).await.refresh_token();

        let res = app
            .post_with_token(routes::LOGOUT, &json!({"refresh_token": other}), &ada.access)
            .await;
        assert_eq!(res.status, 200);

        for token in [ada.refresh, other] {
            let res = app
                .post_without_token(routes::REFRESH, &json!({"refresh_token": token}))
                .await;
            assert_eq!(res.status, 401);
        }
    }

    #[tokio::test]
    async fn logout_all_ends_every_login() {
        let app = TestApp::spawn().await;
        let ada = app.create_user("ada@studio.example").await;
        let phone = app.login("ada@studio.example", PASSWORD).await.refresh_token();

        let res = app.post_empty(routes::LOGOUT_ALL, &ada.access).await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body["message"], "Revoked 2 session(s)");

        for token in [ada.refresh, phone] {
            let res = app
                .post_without_token(routes::REFRESH, &json!({"refresh_token": token}))
                .await;
            assert_eq!(res.status, 401);
        }
    }

    #[tokio::test]
    async fn logout_requires_authentication() {
        let app = TestApp::spawn().await;

        let res = app.post_without_token(routes::LOGOUT, &json!({})).await;

        assert_eq!(res.status, 401);
        assert_eq!(res.body["code"], "TOKEN_MISSING");
    }
}

mod password_reset {
    use super::*;

    #[tokio::test]
    async fn unknown_email_gets_the_same_answer() {
        let app = TestApp::spawn().await;
        app.register("ada@studio.example").await;

        let known = app
            .post_without_token(routes::FORGOT_PASSWORD, &json!({"email": "ada@studio.example"}))
            .await;
        let unknown = app
            .post_without_token(routes::FORGOT_PASSWORD, &json!({"email": "who@studio.example"}))
            .await;

        assert_eq!(known.status, 200);
        assert_eq!(known.body, unknown.body);
        assert!(app.mailer.last_token_for("ada@studio.example", "Reset").is_some());
        assert!(app.mailer.last_token_for("who@studio.example", "Reset").is_none());
    }

    #[tokio::test]
    async fn reset_sets_the_password_and_revokes_sessions() {
        let app = TestApp::spawn().await;
        let ada = app.create_user("ada@studio.example").await;
        app.post_without_token(routes::FORGOT_PASSWORD, &json!({"email": "ada@studio.example"}))
            .await;
        let token = app
            .mailer
            .last_token_for("ada@studio.example", "Reset")
            .unwrap();

        let res = app
            .post_without_token(
                routes::RESET_PASSWORD,
                &json!({"token": token, "password": "a-brand-new-secret"}),
            )
            .await;
        assert_eq!(res.status, 200, "{}", res.text);

        assert_eq!(app.login("ada@studio.example", PASSWORD).await.status, 401);
        assert_eq!(
            app.login("ada@studio.example", "a-brand-new-secret").await.status,
            200
        );
        let refresh = app
            .post_without_token(routes::REFRESH, &json!({"refresh_token": ada.refresh}))
            .await;
        assert_eq!(refresh.status, 401);
    }

    #[tokio::test]
    async fn reset_token_works_only_once() {
        let app = TestApp::spawn().await;
        app.register("ada@studio.example").await;
        app.post_without_token(routes::FORGOT_PASSWORD, &json!({"email": "ada@studio.example"}))
            .await;
        let token = app
            .mailer
            .last_token_for("ada@studio.example", "Reset")
            .unwrap();
        let body = json!({"token": token, "password": "a-brand-new-secret"});

        assert_eq!(app.post_without_token(routes::RESET_PASSWORD, &body).await.status, 200);
        let second = app.post_without_token(routes::RESET_PASSWORD, &body).await;

        assert_eq!(second.status, 400);
        assert_eq!(second.body["code"], "INVALID_TOKEN");
    }

    #[tokio::test]
    async fn expired_reset_token_is_rejected() {
        let app = expiring_app().await;
        app.register("ada@studio.example").await;
        app.post_without_token(routes::FORGOT_PASSWORD, &json!({"email": "ada@studio.example"}))
            .await;
        let token = app
            .mailer
            .last_token_for("ada@studio.example", "Reset")
            .unwrap();
        let_tokens_lapse().await;

        let res = app
            .post_without_token(
                routes::RESET_PASSWORD,
                &json!({"token": token, "password": "a-brand-new-secret"}),
            )
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "INVALID_TOKEN");
        assert_eq!(app.login("ada@studio.example", PASSWORD).await.status, 200);
    }

    #[tokio::test]
    async fn a_newer_request_invalidates_the_older_token() {
        let app = TestApp::spawn().await;
        app.register("ada@studio.example").await;
        let forgot = json!({"email": "ada@studio.example"});

        app.post_without_token(routes::FORGOT_PASSWORD, &forgot).await;
        let old = app.mailer.last_token_for("ada@studio.example", "Reset").unwrap();
        app.post_without_token(routes::FORGOT_PASSWORD, &forgot).await;

        let res = app
            .post_without_token(
                routes::RESET_PASSWORD,
                &json!({"token": old, "password": "a-brand-new-secret"}),
            )
            .await;
        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "INVALID_TOKEN");
    }
}

mod email_verification {
    use super::*;

    #[tokio::test]
    async fn verification_token_marks_the_account_verified_once() {
        let app = TestApp::spawn().await;
        app.register("ada@studio.example").await;
        let token = app
            .mailer
            .last_token_for("ada@studio.example", "Verify")
            .unwrap();

        let res = app
            .post_without_token(routes::VERIFY_EMAIL, &json!({"token": token}))
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["data"]["email_verified"], true);

        let again = app
            .post_without_token(routes::VERIFY_EMAIL, &json!({"token": token}))
            .await;
        assert_eq!(again.status, 400);
        assert_eq!(again.body["code"], "INVALID_TOKEN");
    }

    #[tokio::test]
    async fn expired_verification_token_is_rejected() {
        let app = expiring_app().await;
        app.register("ada@studio.example").await;
        let token = app
            .mailer
            .last_token_for("ada@studio.example", "Verify")
            .unwrap();
        let_tokens_lapse().await;

        let res = app
            .post_without_token(routes::VERIFY_EMAIL, &json!({"token": token}))
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "INVALID_TOKEN");
    }

    #[tokio::test]
    async fn resend_replaces_the_pending_token() {
        let app = TestApp::spawn().await;
        let ada = app.create_user("ada@studio.example").await;
        let first = app.mailer.last_token_for(&ada.email, "Verify").unwrap();

        let res = app.post_empty(routes::RESEND_VERIFICATION, &ada.access).await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body["message"], "Verification email sent");
        let second = app.mailer.last_token_for(&ada.email, "Verify").unwrap();
        assert_ne!(first, second);

        let stale = app
            .post_without_token(routes::VERIFY_EMAIL, &json!({"token": first}))
            .await;
        assert_eq!(stale.status, 400);
        let fresh = app
            .post_without_token(routes::VERIFY_EMAIL, &json!({"token": second}))
            .await;
        assert_eq!(fresh.status, 200);

        let done = app.post_empty(routes::RESEND_VERIFICATION, &ada.access).await;
        assert_eq!(done.body["message"], "Email is already verified");
    }
}

mod health {
    use super::*;

    #[tokio::test]
    async fn reports_database_and_storage() {
        let app = TestApp::spawn().await;

        let res = app.get_without_token(routes::HEALTH).await;

        assert_eq!(res.status, 200);
        assert_eq!(res.body["status"], "ok");
        assert_eq!(res.body["database"], true);
        assert_eq!(res.body["storage"], "filesystem");
    }
}
