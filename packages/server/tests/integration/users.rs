use common::Role;
use serde_json::json;

use crate::common::{PASSWORD, TestApp, routes};

mod profile {
    use super::*;

    #[tokio::test]
    async fn update_changes_only_sent_fields() {
        let app = TestApp::spawn().await;
        let ada = app.create_user("ada@studio.example").await;

        let res = app
            .put_with_token(
                routes::PROFILE,
                &json!({"bio": "Designer", "avatar_url": "https://cdn.example/ada.png"}),
                &ada.access,
            )
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["data"]["bio"], "Designer");
        assert_eq!(res.body["data"]["name"], "Test User");

        let cleared = app
            .put_with_token(routes::PROFILE, &json!({"bio": null}), &ada.access)
            .await;
        assert_eq!(cleared.status, 200);
        assert!(cleared.body["data"]["bio"].is_null());
        assert_eq!(
            cleared.body["data"]["avatar_url"],
            "https://cdn.example/ada.png"
        );
    }

    #[tokio::test]
    async fn role_cannot_be_set_through_the_profile() {
        let app = TestApp::spawn().await;
        let ada = app.create_user("ada@studio.example").await;

        app.put_with_token(
            routes::PROFILE,
            &json!({"name": "Ada", "role": "SUPER_ADMIN"}),
            &ada.access,
        )
        .await;

        let me = app.get_with_token(routes::PROFILE, &ada.access).await;
        assert_eq!(me.body["data"]["role"], "VIEWER");
        assert_eq!(me.body["data"]["name"], "Ada");
    }

    #[tokio::test]
    async fn rejects_invalid_avatar_url() {
        let app = TestApp::spawn().await;
        let ada = app.create_user("ada@studio.example").await;

        let res = app
            .put_with_token(
                routes::PROFILE,
                &json!({"avatar_url": "javascript:alert(1)"}),
                &ada.access,
            )
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn export_contains_sessions_and_content_but_no_secrets() {
        let app = TestApp::spawn().await;
        let ada = app
            .create_user_with_role("ada@studio.example", Role::Editor)
            .await;
        app.create_post(&ada.access, "Hello world").await;
        app.upload_png(&ada.access, "public").await;

        let res = app.get_with_token(routes::PROFILE_EXPORT, &ada.access).await;

        assert_eq!(res.status, 200, "{}", res.text);
        let data = &res.body["data"];
        assert_eq!(data["user"]["email"], "ada@studio.example");
        assert_eq!(data["sessions"].as_array().unwrap().len(), 1);
        assert_eq!(data["posts"].as_array().unwrap().len(), 1);
        assert_eq!(data["media"].as_array().unwrap().len(), 1);
        assert!(!res.text.contains("password_hash"));
        assert!(!res.text.contains("token_hash"));
    }
}

mod change_password {
    use super::*;

    #[tokio::test]
    async fn wrong_current_password_is_rejected() {
        let app = TestApp::spawn().await;
        let ada = app.create_user("ada@studio.example").await;

        let res = app
            .put_with_token(
                routes::PROFILE_PASSWORD,
                &json!({"current_password": "guess-guess", "new_password": "another-secret"}),
                &ada.access,
            )
            .await;

        assert_eq!(res.status, 401);
        assert_eq!(res.body["code"], "INVALID_CREDENTIALS");
    }

    #[tokio::test]
    async fn other_logins_are_signed_out_but_this_one_stays() {
        let app = TestApp::spawn().await;
        let ada = app.create_user("ada@studio.example").await;
        let other = app.login("ada@studio.example", PASSWORD).await.refresh_token();

        let res = app
            .put_with_token(
                routes::PROFILE_PASSWORD,
                &json!({"current_password": PASSWORD, "new_password": "another-secret"}),
                &ada.access,
            )
            .await;
        assert_eq!(res.status, 200, "{}", res.text);

        let kept = app
            .post_without_token(routes::REFRESH, &json!({"refresh_token": ada.refresh}))
            .await;
        assert_eq!(kept.status, 200);
        let dropped = app
            .post_without_token(routes::REFRESH, &json!({"refresh_token": other}))
            .await;
        assert_eq!(dropped.status, 401);
        assert_eq!(app.login("ada@studio.example", "another-secret").await.status, 200);
    }
}

mod admin {
    use super::*;

    #[tokio::test]
    async fn listing_users_needs_admin() {
        let app = TestApp::spawn().await;
        let viewer = app.create_user("viewer@studio.example").await;
        let editor = app
            .create_user_with_role("editor@studio.example", Role::Editor)
            .await;
        let admin = app
            .create_user_with_role("admin@studio.example", Role::Admin)
            .await;

        assert_eq!(app.get_with_token(routes::USERS, &viewer.access).await.status, 403);
        assert_eq!(app.get_with_token(routes::USERS, &editor.access).await.status, 403);

        let res = app.get_with_token(routes::USERS, &admin.access).await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body["pagination"]["total"], 3);

        let found = app
            .get_with_token(&format!("{}?search=EDITOR@", routes::USERS), &admin.access)
            .await;
        assert_eq!(found.body["data"].as_array().unwrap().len(), 1);
        assert_eq!(found.body["data"][0]["id"], editor.id);

        let by_role = app
            .get_with_token(&format!("{}?role=ADMIN", routes::USERS), &admin.access)
            .await;
        assert_eq!(by_role.body["pagination"]["total"], 1);
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let app = TestApp::spawn().await;
        let admin = app
            .create_user_with_role("admin@studio.example", Role::Admin)
            .await;

        let res = app.get_with_token(&routes::user(9999), &admin.access).await;

        assert_eq!(res.status, 404);
        assert_eq!(res.body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn admin_promotes_a_viewer_to_editor() {
        let app = TestApp::spawn().await;
        let viewer = app.create_user("viewer@studio.example").await;
        let admin = app
            .create_user_with_role("admin@studio.example", Role::Admin)
            .await;

        let res = app
            .put_with_token(
                &routes::user_role(viewer.id),
                &json!({"role": "EDITOR"}),
                &admin.access,
            )
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["data"]["role"], "EDITOR");
    }

    #[tokio::test]
    async fn admin_cannot_grant_admin_or_touch_peers() {
        let app = TestApp::spawn().await;
        let viewer = app.create_user("viewer@studio.example").await;
        let admin = app
            .create_user_with_role("admin@studio.example", Role::Admin)
            .await;
        let peer = app
            .create_user_with_role("peer@studio.example", Role::Admin)
            .await;

        let grant = app
            .put_with_token(
                &routes::user_role(viewer.id),
                &json!({"role": "ADMIN"}),
                &admin.access,
            )
            .await;
        assert_eq!(grant.status, 403);

        let demote = app
            .put_with_token(
                &routes::user_role(peer.id),
                &json!({"role": "VIEWER"}),
                &admin.access,
            )
            .await;
        assert_eq!(demote.status, 403);
        assert_eq!(demote.body["code"], "PERMISSION_DENIED");
    }

    #[tokio::test]
    async fn nobody_changes_their_own_role() {
        let app = TestApp::spawn().await;
        let root = app
            .create_user_with_role("root@studio.example", Role::SuperAdmin)
            .await;

        let res = app
            .put_with_token(
                &routes::user_role(root.id),
                &json!({"role": "VIEWER"}),
                &root.access,
            )
            .await;

        assert_eq!(res.status, 403);
    }

    #[tokio::test]
    async fn super_admin_can_grant_admin() {
        let app = TestApp::spawn().await;
        let viewer = app.create_user("viewer@studio.example").await;
        let root = app
            .create_user_with_role("root@studio.example", Role::SuperAdmin)
            .await;

        let res = app
            .put_with_token(
                &routes::user_role(viewer.id),
                &json!({"role": "ADMIN"}),
                &root.access,
            )
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["data"]["role"], "ADMIN");
    }

    #[tokio::test]
    async fn unknown_role_value_is_a_validation_error() {
        let app = TestApp::spawn().await;
        let viewer = app.create_user("viewer@studio.example").await;
        let root = app
            .create_user_with_role("root@studio.example", Role::SuperAdmin)
            .await;

        let res = app
            .put_with_token(
                &routes::user_role(viewer.id),
                &json!({"role": "OWNER"}),
                &root.access,
            )
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn deleting_a_user_keeps_their_content() {
        let app = TestApp::spawn().await;
        let editor = app
            .create_user_with_role("editor@studio.example", Role::Editor)
            .await;
        let admin = app
            .create_user_with_role("admin@studio.example", Role::Admin)
            .await;
        let post_id = app.create_post(&editor.access, "Orphaned soon").await;

        let res = app
            .delete_with_token(&routes::user(editor.id), &admin.access)
            .await;
        assert_eq!(res.status, 200, "{}", res.text);

        let gone = app.get_with_token(&routes::user(editor.id), &admin.access).await;
        assert_eq!(gone.status, 404);
        let post = app.get_with_token(&routes::post(post_id), &admin.access).await;
        assert_eq!(post.status, 200);
        assert!(post.body["data"]["author_id"].is_null());
        let refresh = app
            .post_without_token(routes::REFRESH, &json!({"refresh_token": editor.refresh}))
            .await;
        assert_eq!(refresh.status, 401);
    }

    #[tokio::test]
    async fn admins_cannot_delete_themselves() {
        let app = TestApp::spawn().await;
        let admin = app
            .create_user_with_role("admin@studio.example", Role::Admin)
            .await;

        let res = app.delete_with_token(&routes::user(admin.id), &admin.access).await;

        assert_eq!(res.status, 403);
    }
}
