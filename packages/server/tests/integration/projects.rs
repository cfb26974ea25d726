use common::Role;
use serde_json::json;

use crate::common::{TestApp, routes};

#[tokio::test]
async fn deleted_author_cannot_create_with_a_live_token() {
    let app = TestApp::spawn().await;
    let admin = app
        .create_user_with_role("admin@studio.example", Role::Admin)
        .await;
    let editor = app
        .create_user_with_role("editor@studio.example", Role::Editor)
        .await;
    app.delete_with_token(&routes::user(editor.id), &admin.access)
        .await;

    let res = app
        .post_with_token(
            routes::PROJECTS,
            &json!({"title": "Ghost project", "description": "nobody built this"}),
            &editor.access,
        )
        .await;

    assert_eq!(res.status, 401);
    assert_eq!(res.body["code"], "TOKEN_INVALID");
}

#[tokio::test]
async fn editor_creates_a_draft_project() {
    let app = TestApp::spawn().await;
    let editor = app
        .create_user_with_role("editor@studio.example", Role::Editor)
        .await;

    let res = app
        .post_with_token(
            routes::PROJECTS,
            &json!({
                "title": "Acme Rebrand",
                "description": "A new identity.",
                "category": "Branding",
                "featured": true,
            }),
            &editor.access,
        )
        .await;

    assert_eq!(res.status, 201, "{}", res.text);
    let data = &res.body["data"];
    assert_eq!(data["slug"], "acme-rebrand");
    assert_eq!(data["status"], "DRAFT");
    assert_eq!(data["category"], "branding");
    assert_eq!(data["featured"], true);
    assert_eq!(data["images"], json!([]));
}

#[tokio::test]
async fn public_listing_shows_published_projects_only() {
    let app = TestApp::spawn().await;
    let editor = app
        .create_user_with_role("editor@studio.example", Role::Editor)
        .await;
    let live = app.create_project(&editor.access, "Live site").await;
    app.create_project(&editor.access, "Work in progress").await;
    app.post_empty(&routes::project_publish(live), &editor.access)
        .await;

    let anon = app.get_without_token(routes::PROJECTS).await;
    assert_eq!(anon.status, 200);
    assert_eq!(anon.body["pagination"]["total"], 1);
    assert_eq!(anon.body["data"][0]["id"], live);

    let viewer = app.create_user("viewer@studio.example").await;
    let as_viewer = app
        .get_with_token(&format!("{}?status=DRAFT", routes::PROJECTS), &viewer.access)
        .await;
    assert_eq!(as_viewer.body["pagination"]["total"], 1);
    assert_eq!(as_viewer.body["data"][0]["status"], "PUBLISHED");
}

#[tokio::test]
async fn list_filters_by_category_and_featured() {
    let app = TestApp::spawn().await;
    let editor = app
        .create_user_with_role("editor@studio.example", Role::Editor)
        .await;
    let featured = app
        .post_with_token(
            routes::PROJECTS,
            &json!({"title": "Flagship", "description": "x", "category": "Web", "featured": true}),
            &editor.access,
        )
        .await
        .data_id();
    app.create_project(&editor.access, "Side gig").await;

    let by_featured = app
        .get_with_token(&format!("{}?featured=true", routes::PROJECTS), &editor.access)
        .await;
    assert_eq!(by_featured.body["pagination"]["total"], 1);
    assert_eq!(by_featured.body["data"][0]["id"], featured);

    let by_category = app
        .get_with_token(&format!("{}?category=branding", routes::PROJECTS), &editor.access)
        .await;
    assert_eq!(by_category.body["pagination"]["total"], 1);
    assert_eq!(by_category.body["data"][0]["title"], "Side gig");
}

#[tokio::test]
async fn slug_lookup_counts_views_for_published_projects() {
    let app = TestApp::spawn().await;
    let editor = app
        .create_user_with_role("editor@studio.example", Role::Editor)
        .await;
    let id = app.create_project(&editor.access, "Museum app").await;

    assert_eq!(
        app.get_without_token(&routes::project_by_slug("museum-app"))
            .await
            .status,
        404
    );

    app.post_empty(&routes::project_publish(id), &editor.access)
        .await;
    app.get_without_token(&routes::project_by_slug("museum-app"))
        .await;
    let res = app
        .get_without_token(&routes::project_by_slug("museum-app"))
        .await;

    assert_eq!(res.status, 200);
    assert_eq!(res.body["data"]["view_count"], 2);
}

#[tokio::test]
async fn gallery_images_append_in_order() {
    let app = TestApp::spawn().await;
    let editor = app
        .create_user_with_role("editor@studio.example", Role::Editor)
        .await;
    let id = app.create_project(&editor.access, "Gallery").await;
    let media = app.upload_png(&editor.access, "public").await;

    let first = app
        .post_with_token(
            &routes::project_images(id),
            &json!({"url": "https://cdn.example/hero.jpg", "alt_text": "Hero"}),
            &editor.access,
        )
        .await;
    assert_eq!(first.status, 201, "{}", first.text);
    assert_eq!(first.body["data"]["position"], 0);

    let second = app
        .post_with_token(
            &routes::project_images(id),
            &json!({"media_id": media["id"]}),
            &editor.access,
        )
        .await;
    assert_eq!(second.status, 201, "{}", second.text);
    assert_eq!(second.body["data"]["position"], 1);
    assert_eq!(second.body["data"]["url"], media["url"]);

    let project = app.get_with_token(&routes::project(id), &editor.access).await;
    let images = project.body["data"]["images"].as_array().unwrap();
    assert_eq!(images.len(), 2);
    assert_eq!(images[0]["alt_text"], "Hero");
    assert_eq!(images[1]["media_id"], media["id"]);
}

#[tokio::test]
async fn image_needs_exactly_one_source() {
    let app = TestApp::spawn().await;
    let editor = app
        .create_user_with_role("editor@studio.example", Role::Editor)
        .await;
    let id = app.create_project(&editor.access, "Gallery").await;

    let neither = app
        .post_with_token(&routes::project_images(id), &json!({}), &editor.access)
        .await;
    assert_eq!(neither.status, 400);

    let unknown = app
        .post_with_token(
            &routes::project_images(id),
            &json!({"media_id": "01926f3e-0000-7000-8000-000000000000"}),
            &editor.access,
        )
        .await;
    assert_eq!(unknown.status, 404);
}

#[tokio::test]
async fn removing_an_image_checks_the_project() {
    let app = TestApp::spawn().await;
    let editor = app
        .create_user_with_role("editor@studio.example", Role::Editor)
        .await;
    let id = app.create_project(&editor.access, "Gallery").await;
    let other = app.create_project(&editor.access, "Elsewhere").await;
    let image = app
        .post_with_token(
            &routes::project_images(id),
            &json!({"url": "https://cdn.example/a.png"}),
            &editor.access,
        )
        .await
        .data_id();

    let wrong = app
        .delete_with_token(&routes::project_image(other, image), &editor.access)
        .await;
    assert_eq!(wrong.status, 404);

    let ok = app
        .delete_with_token(&routes::project_image(id, image), &editor.access)
        .await;
    assert_eq!(ok.status, 200);
    let project = app.get_with_token(&routes::project(id), &editor.access).await;
    assert_eq!(project.body["data"]["images"], json!([]));
}

#[tokio::test]
async fn archived_projects_reject_changes() {
    let app = TestApp::spawn().await;
    let editor = app
        .create_user_with_role("editor@studio.example", Role::Editor)
        .await;
    let id = app.create_project(&editor.access, "Retired").await;

    let archived = app
        .post_empty(&routes::project_archive(id), &editor.access)
        .await;
    assert_eq!(archived.status, 200, "{}", archived.text);

    let image = app
        .post_with_token(
            &routes::project_images(id),
            &json!({"url": "https://cdn.example/a.png"}),
            &editor.access,
        )
        .await;
    assert_eq!(image.status, 409);
    let publish = app
        .post_empty(&routes::project_publish(id), &editor.access)
        .await;
    assert_eq!(publish.status, 409);
    assert_eq!(publish.body["code"], "INVALID_TRANSITION");
}

#[tokio::test]
async fn deleting_a_project_removes_its_gallery() {
    let app = TestApp::spawn().await;
    let editor = app
        .create_user_with_role("editor@studio.example", Role::Editor)
        .await;
    let other = app
        .create_user_with_role("other@studio.example", Role::Editor)
        .await;
    let id = app.create_project(&editor.access, "Short lived").await;
    app.post_with_token(
        &routes::project_images(id),
        &json!({"url": "https://cdn.example/a.png"}),
        &editor.access,
    )
    .await;

    let denied = app.delete_with_token(&routes::project(id), &other.access).await;
    assert_eq!(denied.status, 403);

    let res = app.delete_with_token(&routes::project(id), &editor.access).await;
    assert_eq!(res.status, 200, "{}", res.text);
    assert_eq!(
        app.get_with_token(&routes::project(id), &editor.access)
            .await
            .status,
        404
    );
}

#[tokio::test]
async fn stats_count_featured_and_categories() {
    let app = TestApp::spawn().await;
    let editor = app
        .create_user_with_role("editor@studio.example", Role::Editor)
        .await;
    let featured = app
        .post_with_token(
            routes::PROJECTS,
            &json!({"title": "Flagship", "description": "x", "category": "Web", "featured": true}),
            &editor.access,
        )
        .await
        .data_id();
    let plain = app.create_project(&editor.access, "Side gig").await;
    app.create_project(&editor.access, "Unreleased").await;
    for id in [featured, plain] {
        app.post_empty(&routes::project_publish(id), &editor.access)
            .await;
    }

    let viewer = app.create_user("viewer@studio.example").await;
    assert_eq!(
        app.get_with_token(routes::PROJECT_STATS, &viewer.access)
            .await
            .status,
        403
    );

    let res = app.get_with_token(routes::PROJECT_STATS, &editor.access).await;
    assert_eq!(res.status, 200, "{}", res.text);
    let data = &res.body["data"];
    assert_eq!(data["total"], 3);
    assert_eq!(data["published"], 2);
    assert_eq!(data["drafts"], 1);
    assert_eq!(data["featured"], 1);
    assert_eq!(
        data["categories"],
        json!([{"category": "branding", "count": 1}, {"category": "web", "count": 1}])
    );
}
