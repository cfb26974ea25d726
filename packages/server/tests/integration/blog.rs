use common::{ContentStatus, Role};
use sea_orm::{ActiveValue::Set, EntityTrait};
use serde_json::json;

use server::entity::blog_post;
use server::error::AppError;
use server::services::content;

use crate::common::{TestApp, routes};

#[tokio::test]
async fn editor_creates_a_draft_with_derived_slug_and_normalised_tags() {
    let app = TestApp::spawn().await;
    let editor = app
        .create_user_with_role("editor@studio.example", Role::Editor)
        .await;

    let res = app
        .post_with_token(
            routes::POSTS,
            &json!({
                "title": "  Hello, World!  ",
                "content": "First post.",
                "tags": ["Rust", "rust ", "Design"],
            }),
            &editor.access,
        )
        .await;

    assert_eq!(res.status, 201, "{}", res.text);
    let data = &res.body["data"];
    assert_eq!(data["title"], "Hello, World!");
    assert_eq!(data["slug"], "hello-world");
    assert_eq!(data["status"], "DRAFT");
    assert_eq!(data["tags"], json!(["rust", "design"]));
    assert_eq!(data["author_id"], editor.id);
    assert!(data["published_at"].is_null());
}

#[tokio::test]
async fn viewers_cannot_write_posts() {
    let app = TestApp::spawn().await;
    let viewer = app.create_user("viewer@studio.example").await;

    let res = app
        .post_with_token(
            routes::POSTS,
            &json!({"title": "Nope", "content": "x"}),
            &viewer.access,
        )
        .await;

    assert_eq!(res.status, 403);
    assert_eq!(res.body["code"], "PERMISSION_DENIED");
}

#[tokio::test]
async fn duplicate_slug_is_a_conflict() {
    let app = TestApp::spawn().await;
    let editor = app
        .create_user_with_role("editor@studio.example", Role::Editor)
        .await;
    app.create_post(&editor.access, "Launch day").await;

    let res = app
        .post_with_token(
            routes::POSTS,
            &json!({"title": "Launch Day", "content": "again"}),
            &editor.access,
        )
        .await;

    assert_eq!(res.status, 409);
    assert_eq!(res.body["code"], "CONFLICT");
}

#[tokio::test]
async fn deleted_author_cannot_create_with_a_live_token() {
    let app = TestApp::spawn().await;
    let admin = app
        .create_user_with_role("admin@studio.example", Role::Admin)
        .await;
    let editor = app
        .create_user_with_role("editor@studio.example", Role::Editor)
        .await;
    let removed = app.delete_with_token(&routes::user(editor.id), &admin.access).await;
    assert_eq!(removed.status, 200, "{}", removed.text);

    let res = app
        .post_with_token(
            routes::POSTS,
            &json!({"title": "Ghost post", "content": "nobody wrote this"}),
            &editor.access,
        )
        .await;

    assert_eq!(res.status, 401);
    assert_eq!(res.body["code"], "TOKEN_INVALID");
}

#[tokio::test]
async fn drafts_are_hidden_from_the_public() {
    let app = TestApp::spawn().await;
    let editor = app
        .create_user_with_role("editor@studio.example", Role::Editor)
        .await;
    let draft = app.create_post(&editor.access, "Secret plans").await;
    let public = app.create_post(&editor.access, "Open letter").await;
    app.post_empty(&routes::post_publish(public), &editor.access)
        .await;

    let anon = app.get_without_token(routes::POSTS).await;
    assert_eq!(anon.status, 200);
    assert_eq!(anon.body["pagination"]["total"], 1);
    assert_eq!(anon.body["data"][0]["id"], public);

    assert_eq!(app.get_without_token(&routes::post(draft)).await.status, 404);
    assert_eq!(
        app.get_without_token(&routes::post_by_slug("secret-plans"))
            .await
            .status,
        404
    );

    let staff = app.get_with_token(routes::POSTS, &editor.access).await;
    assert_eq!(staff.body["pagination"]["total"], 2);
    let drafts = app
        .get_with_token(&format!("{}?status=DRAFT", routes::POSTS), &editor.access)
        .await;
    assert_eq!(drafts.body["data"][0]["id"], draft);
    assert_eq!(drafts.body["pagination"]["total"], 1);
}

#[tokio::test]
async fn bad_token_on_a_public_route_is_rejected() {
    let app = TestApp::spawn().await;

    let res = app.get_with_token(routes::POSTS, "garbage").await;

    assert_eq!(res.status, 401);
    assert_eq!(res.body["code"], "TOKEN_INVALID");
}

#[tokio::test]
async fn list_filters_by_tag_and_search() {
    let app = TestApp::spawn().await;
    let editor = app
        .create_user_with_role("editor@studio.example", Role::Editor)
        .await;
    let rusty = app.create_post(&editor.access, "Why we chose Rust").await;
    let other = app
        .post_with_token(
            routes::POSTS,
            &json!({"title": "Colour theory", "content": "x", "tags": ["design"]}),
            &editor.access,
        )
        .await
        .data_id();

    let by_tag = app
        .get_with_token(&format!("{}?tag=RUST", routes::POSTS), &editor.access)
        .await;
    assert_eq!(by_tag.body["pagination"]["total"], 1);
    assert_eq!(by_tag.body["data"][0]["id"], rusty);

    let by_search = app
        .get_with_token(&format!("{}?search=colour", routes::POSTS), &editor.access)
        .await;
    assert_eq!(by_search.body["pagination"]["total"], 1);
    assert_eq!(by_search.body["data"][0]["id"], other);

    let bad_sort = app
        .get_with_token(&format!("{}?sort_by=author", routes::POSTS), &editor.access)
        .await;
    assert_eq!(bad_sort.status, 400);
}

#[tokio::test]
async fn pagination_reports_totals() {
    let app = TestApp::spawn().await;
    let editor = app
        .create_user_with_role("editor@studio.example", Role::Editor)
        .await;
    for i in 0..5 {
        app.create_post(&editor.access, &format!("Post number {i}"))
            .await;
    }

    let res = app
        .get_with_token(&format!("{}?page=2&per_page=2", routes::POSTS), &editor.access)
        .await;

    assert_eq!(res.body["data"].as_array().unwrap().len(), 2);
    assert_eq!(res.body["pagination"]["page"], 2);
    assert_eq!(res.body["pagination"]["per_page"], 2);
    assert_eq!(res.body["pagination"]["total"], 5);
    assert_eq!(res.body["pagination"]["total_pages"], 3);
}

#[tokio::test]
async fn publish_is_idempotent_and_keeps_the_first_timestamp() {
    let app = TestApp::spawn().await;
    let editor = app
        .create_user_with_role("editor@studio.example", Role::Editor)
        .await;
    let id = app.create_post(&editor.access, "Ship it").await;

    let first = app
        .post_empty(&routes::post_publish(id), &editor.access)
        .await;
    assert_eq!(first.status, 200, "{}", first.text);
    assert_eq!(first.body["data"]["status"], "PUBLISHED");
    let published_at = first.body["data"]["published_at"].clone();
    assert!(published_at.is_string());

    let second = app
        .post_empty(&routes::post_publish(id), &editor.access)
        .await;
    assert_eq!(second.status, 200);
    assert_eq!(second.body["data"]["published_at"], published_at);
}

#[tokio::test]
async fn archived_posts_are_read_only() {
    let app = TestApp::spawn().await;
    let editor = app
        .create_user_with_role("editor@studio.example", Role::Editor)
        .await;
    let id = app.create_post(&editor.access, "Old news").await;
    app.post_empty(&routes::post_publish(id), &editor.access)
        .await;

    let archived = app
        .post_empty(&routes::post_archive(id), &editor.access)
        .await;
    assert_eq!(archived.status, 200);
    assert_eq!(archived.body["data"]["status"], "ARCHIVED");

    let publish = app
        .post_empty(&routes::post_publish(id), &editor.access)
        .await;
    assert_eq!(publish.status, 409);
    assert_eq!(publish.body["code"], "INVALID_TRANSITION");

    let update = app
        .put_with_token(&routes::post(id), &json!({"title": "New"}), &editor.access)
        .await;
    assert_eq!(update.status, 409);
    assert_eq!(update.body["code"], "INVALID_TRANSITION");
}

#[tokio::test]
async fn edit_read_before_an_archive_is_not_written() {
    let app = TestApp::spawn().await;
    let editor = app
        .create_user_with_role("editor@studio.example", Role::Editor)
        .await;
    let id = app.create_post(&editor.access, "Old news").await;
    let stale = blog_post::Entity::find_by_id(id as i32)
        .one(&app.db)
        .await
        .unwrap()
        .unwrap();

    let archived = app
        .post_empty(&routes::post_archive(id), &editor.access)
        .await;
    assert_eq!(archived.status, 200);

    let mut edit: blog_post::ActiveModel = stale.into();
    edit.title = Set("Rewritten".into());
    let saved = content::save_edit::<blog_post::Entity, _, _>(&app.db, id as i32, edit).await;

    assert!(matches!(saved, Err(AppError::InvalidTransition { .. })));
    let stored = blog_post::Entity::find_by_id(id as i32)
        .one(&app.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.title, "Old news");
    assert_eq!(stored.status, ContentStatus::Archived);
}

#[tokio::test]
async fn update_can_clear_nullable_fields() {
    let app = TestApp::spawn().await;
    let editor = app
        .create_user_with_role("editor@studio.example", Role::Editor)
        .await;
    let id = app
        .post_with_token(
            routes::POSTS,
            &json!({"title": "With excerpt", "content": "x", "excerpt": "Short"}),
            &editor.access,
        )
        .await
        .data_id();

    let res = app
        .put_with_token(
            &routes::post(id),
            &json!({"excerpt": null, "slug": "renamed-post"}),
            &editor.access,
        )
        .await;

    assert_eq!(res.status, 200, "{}", res.text);
    assert!(res.body["data"]["excerpt"].is_null());
    assert_eq!(res.body["data"]["slug"], "renamed-post");
    assert_eq!(res.body["data"]["title"], "With excerpt");
}

#[tokio::test]
async fn reading_by_slug_counts_views() {
    let app = TestApp::spawn().await;
    let editor = app
        .create_user_with_role("editor@studio.example", Role::Editor)
        .await;
    let id = app.create_post(&editor.access, "Popular").await;
    app.post_empty(&routes::post_publish(id), &editor.access)
        .await;

    app.get_without_token(&routes::post_by_slug("popular")).await;
    let res = app.get_without_token(&routes::post_by_slug("popular")).await;

    assert_eq!(res.status, 200);
    assert_eq!(res.body["data"]["view_count"], 2);
}

#[tokio::test]
async fn only_the_author_or_an_admin_deletes() {
    let app = TestApp::spawn().await;
    let author = app
        .create_user_with_role("author@studio.example", Role::Editor)
        .await;
    let other = app
        .create_user_with_role("other@studio.example", Role::Editor)
        .await;
    let admin = app
        .create_user_with_role("admin@studio.example", Role::Admin)
        .await;
    let first = app.create_post(&author.access, "First").await;
    let second = app.create_post(&author.access, "Second").await;

    let denied = app.delete_with_token(&routes::post(first), &other.access).await;
    assert_eq!(denied.status, 403);

    assert_eq!(
        app.delete_with_token(&routes::post(first), &author.access)
            .await
            .status,
        200
    );
    assert_eq!(
        app.delete_with_token(&routes::post(second), &admin.access)
            .await
            .status,
        200
    );
    assert_eq!(
        app.get_with_token(&routes::post(first), &admin.access)
            .await
            .status,
        404
    );
}

#[tokio::test]
async fn stats_summarise_statuses_views_and_tags() {
    let app = TestApp::spawn().await;
    let editor = app
        .create_user_with_role("editor@studio.example", Role::Editor)
        .await;
    let live = app.create_post(&editor.access, "Live").await;
    app.create_post(&editor.access, "Draft").await;
    app.post_empty(&routes::post_publish(live), &editor.access)
        .await;
    app.get_without_token(&routes::post_by_slug("live")).await;

    let res = app.get_with_token(routes::BLOG_STATS, &editor.access).await;

    assert_eq!(res.status, 200, "{}", res.text);
    let data = &res.body["data"];
    assert_eq!(data["total"], 2);
    assert_eq!(data["drafts"], 1);
    assert_eq!(data["published"], 1);
    assert_eq!(data["archived"], 0);
    assert_eq!(data["total_views"], 1);
    assert_eq!(data["top_posts"][0]["id"], live);
    assert_eq!(
        data["tags"],
        json!([{"tag": "news", "count": 1}, {"tag": "rust", "count": 1}])
    );
}
