use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use common::Role;
use common::config::StorageConfig;
use common::storage::UrlSigner;
use common::storage::filesystem::FilesystemObjectStore;
use reqwest::Client;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use serde_json::{Value, json};
use tempfile::TempDir;

use server::config::{
    AppConfig, AuthConfig, CorsConfig, DatabaseConfig, MediaConfig, RateLimitConfig, ServerConfig,
};
use server::entity::user;
use server::mail::MemoryMailer;
use server::rate_limit::RateLimiter;
use server::state::AppState;
use server::utils::jwt::JwtKeys;

pub const PASSWORD: &str = "correct-horse-battery";
pub const JWT_SECRET: &str = "test-secret-for-integration-tests";

/// Smallest valid PNG signature followed by filler bytes.
pub const PNG_BYTES: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
];

pub mod routes {
    pub const REGISTER: &str = "/api/v1/auth/register";
    pub const LOGIN: &str = "/api/v1/auth/login";
    pub const REFRESH: &str = "/api/v1/auth/refresh";
    pub const LOGOUT: &str = "/api/v1/auth/logout";
    pub const LOGOUT_ALL: &str = "/api/v1/auth/logout-all";
    pub const FORGOT_PASSWORD: &str = "/api/v1/auth/forgot-password";
    pub const RESET_PASSWORD: &str = "/api/v1/auth/reset-password";
    pub const VERIFY_EMAIL: &str = "/api/v1/auth/verify-email";
    pub const RESEND_VERIFICATION: &str = "/api/v1/auth/resend-verification";
    pub const ME: &str = "/api/v1/auth/me";

    pub const USERS: &str = "/api/v1/users";
    pub const PROFILE: &str = "/api/v1/users/me";
    pub const PROFILE_PASSWORD: &str = "/api/v1/users/me/password";
    pub const PROFILE_EXPORT: &str = "/api/v1/users/me/export";

    pub fn user(id: i64) -> String {
        format!("/api/v1/users/{id}")
    }

    pub fn user_role(id: i64) -> String {
        format!("/api/v1/users/{id}/role")
    }

    pub const POSTS: &str = "/api/v1/blog";
    pub const BLOG_STATS: &str = "/api/v1/blog/stats";

    pub fn post(id: i64) -> String {
        format!("/api/v1/blog/{id}")
    }

    pub fn post_by_slug(slug: &str) -> String {
        format!("/api/v1/blog/slug/{slug}")
    }

    pub fn post_publish(id: i64) -> String {
        format!("/api/v1/blog/{id}/publish")
    }

    pub fn post_archive(id: i64) -> String {
        format!("/api/v1/blog/{id}/archive")
    }

    pub const PROJECTS: &str = "/api/v1/projects";
    pub const PROJECT_STATS: &str = "/api/v1/projects/stats";

    pub fn project(id: i64) -> String {
        format!("/api/v1/projects/{id}")
    }

    pub fn project_by_slug(slug: &str) -> String {
        format!("/api/v1/projects/slug/{slug}")
    }

    pub fn project_publish(id: i64) -> String {
        format!("/api/v1/projects/{id}/publish")
    }

    pub fn project_archive(id: i64) -> String {
        format!("/api/v1/projects/{id}/archive")
    }

    pub fn project_images(id: i64) -> String {
        format!("/api/v1/projects/{id}/images")
    }

    pub fn project_image(id: i64, image_id: i64) -> String {
        format!("/api/v1/projects/{id}/images/{image_id}")
    }

    pub const MEDIA: &str = "/api/v1/media";
    pub const MEDIA_UPLOAD: &str = "/api/v1/media/upload";
    pub const MEDIA_STATS: &str = "/api/v1/media/stats";

    pub fn media(id: &str) -> String {
        format!("/api/v1/media/{id}")
    }

    pub fn media_signed_url(id: &str) -> String {
        format!("/api/v1/media/{id}/signed-url")
    }

    pub const HEALTH: &str = "/health";
}

/// Knobs for [`TestApp::spawn_with`].
pub struct TestOptions {
    pub rate_limit: RateLimitConfig,
    pub max_upload_bytes: usize,
    pub trusted_proxies: Vec<IpAddr>,
    pub auth: AuthConfig,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            rate_limit: RateLimitConfig {
                enabled: false,
                ..Default::default()
            },
            max_upload_bytes: MediaConfig::default().max_upload_bytes,
            trusted_proxies: vec![],
            auth: AuthConfig::with_secret(JWT_SECRET),
        }
    }
}

/// A running test server backed by a throwaway SQLite file and media root.
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: Client,
    pub db: DatabaseConnection,
    pub mailer: Arc<MemoryMailer>,
    _dir: TempDir,
}

/// Parsed HTTP response for test assertions.
pub struct TestResponse {
    pub status: u16,
    pub headers: reqwest::header::HeaderMap,
    /// Raw response body as text.
    pub text: String,
    /// Parsed JSON body, or `Null` if the response is not valid JSON.
    pub body: Value,
}

/// Tokens and id of a logged-in test user.
pub struct Session {
    pub id: i64,
    pub email: String,
    pub access: String,
    pub refresh: String,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(TestOptions::default()).await
    }

    pub async fn spawn_with(options: TestOptions) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let db_url = format!("sqlite://{}?mode=rwc", dir.path().join("test.db").display());

        let db = server::database::init_db(&db_url)
            .await
            .expect("Failed to initialize test database");
        server::seed::ensure_indexes(&db)
            .await
            .expect("Failed to create indexes");

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let addr = listener.local_addr().unwrap();

        let config = AppConfig {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: addr.port(),
                public_url: format!("http://{addr}"),
                cors: CorsConfig {
                    allow_origins: vec![],
                    max_age: 3600,
                },
                trusted_proxies: options.trusted_proxies,
            },
            database: DatabaseConfig { url: db_url },
            auth: options.auth,
            rate_limit: options.rate_limit,
            storage: StorageConfig::default(),
            media: MediaConfig {
                max_upload_bytes: options.max_upload_bytes,
                ..Default::default()
            },
        };

        let store = FilesystemObjectStore::new(
            dir.path().join("media"),
            config.media_files_url(),
            UrlSigner::new(config.url_signing_secret()),
        )
        .await
        .expect("Failed to create media store");

        let mailer = Arc::new(MemoryMailer::new());
        let state = AppState {
            db: db.clone(),
            jwt: JwtKeys::new(&config.auth.jwt_secret),
            storage: Some(Arc::new(store)),
            file_signer: UrlSigner::new(config.url_signing_secret()),
            mailer: mailer.clone(),
            rate_limiter: Arc::new(RateLimiter::new()),
            config,
        };

        let app = server::build_router(state);
        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .unwrap();
        });

        Self {
            addr,
            client: Client::new(),
            db,
            mailer,
            _dir: dir,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn post_with_token(&self, path: &str, body: &Value, token: &str) -> TestResponse {
        let res = self
            .client
            .post(self.url(path))
            .header("Authorization", format!("Bearer {token}"))
            .json(body)
            .send()
            .await
            .expect("Failed to send POST request");

        TestResponse::from_response(res).await
    }

    pub async fn post_without_token(&self, path: &str, body: &Value) -> TestResponse {
        let res = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("Failed to send POST request");

        TestResponse::from_response(res).await
    }

    /// POST with no body at all.
    pub async fn post_empty(&self, path: &str, token: &str) -> TestResponse {
        let res = self
            .client
            .post(self.url(path))
            .header("Authorization", format!("Bearer {token}"))
            .send()
            .await
            .expect("Failed to send POST request");

        TestResponse::from_response(res).await
    }

    /// POST from a given client address, as reported through `X-Forwarded-For`.
    /// POST carrying an `X-Forwarded-For` header.
    pub async fn post_forwarded(&self, path: &str, body: &Value, forwarded: &str) -> TestResponse {
        let res = self
            .client
            .post(self.url(path))
            .header("X-Forwarded-For", forwarded)
            .json(body)
            .send()
            .await
            .expect("Failed to send POST request");

        TestResponse::from_response(res).await
    }

    pub async fn get_with_token(&self, path: &str, token: &str) -> TestResponse {
        let res = self
            .client
            .get(self.url(path))
            .header("Authorization", format!("Bearer {token}"))
            .send()
            .await
            .expect("Failed to send GET request");

        TestResponse::from_response(res).await
    }

    pub async fn get_without_token(&self, path: &str) -> TestResponse {
        let res = self
            .client
            .get(self.url(path))
            .send()
            .await
            .expect("Failed to send GET request");

        TestResponse::from_response(res).await
    }

    /// GET an absolute URL handed out by the server.
    pub async fn get_absolute(&self, url: &str) -> TestResponse {
        let res = self
            .client
            .get(url)
            .send()
            .await
            .expect("Failed to send GET request");

        TestResponse::from_response(res).await
    }

    pub async fn put_with_token(&self, path: &str, body: &Value, token: &str) -> TestResponse {
        let res = self
            .client
            .put(self.url(path))
            .header("Authorization", format!("Bearer {token}"))
            .json(body)
            .send()
            .await
            .expect("Failed to send PUT request");

        TestResponse::from_response(res).await
    }

    pub async fn delete_with_token(&self, path: &str, token: &str) -> TestResponse {
        let res = self
            .client
            .delete(self.url(path))
            .header("Authorization", format!("Bearer {token}"))
            .send()
            .await
            .expect("Failed to send DELETE request");

        TestResponse::from_response(res).await
    }

    pub async fn upload_with_token(
        &self,
        file_name: &str,
        mime: &str,
        file_bytes: Vec<u8>,
        visibility: Option<&str>,
        token: &str,
    ) -> TestResponse {
        let part = reqwest::multipart::Part::bytes(file_bytes)
            .file_name(file_name.to_string())
            .mime_str(mime)
            .expect("Failed to set MIME type");
        let mut form = reqwest::multipart::Form::new().part("file", part);
        if let Some(v) = visibility {
            form = form.text("visibility", v.to_string());
        }

        let res = self
            .client
            .post(self.url(routes::MEDIA_UPLOAD))
            .header("Authorization", format!("Bearer {token}"))
            .multipart(form)
            .send()
            .await
            .expect("Failed to send multipart upload request");

        TestResponse::from_response(res).await
    }

    /// Register an account, asserting success, and return its id.
    pub async fn register(&self, email: &str) -> i64 {
        let res = self
            .post_without_token(
                routes::REGISTER,
                &json!({"email": email, "password": PASSWORD, "name": "Test User"}),
            )
            .await;
        assert_eq!(res.status, 201, "Registration failed: {}", res.text);
        res.body["user"]["id"]
            .as_i64()
            .expect("register response should contain user.id")
    }

    pub async fn login(&self, email: &str, password: &str) -> TestResponse {
        self.post_without_token(
            routes::LOGIN,
            &json!({"email": email, "password": password}),
        )
        .await
    }

    /// Register and log in a VIEWER.
    pub async fn create_user(&self, email: &str) -> Session {
        self.create_user_with_role(email, Role::Viewer).await
    }

    /// Register a user, set its role directly in the database, then log in.
    pub async fn create_user_with_role(&self, email: &str, role: Role) -> Session {
        let id = self.register(email).await;
        if role != Role::Viewer {
            self.set_role(email, role).await;
        }

        let res = self.login(email, PASSWORD).await;
        assert_eq!(res.status, 200, "Login failed: {}", res.text);
        Session {
            id,
            email: email.to_string(),
            access: res.access_token(),
            refresh: res.refresh_token(),
        }
    }

    pub async fn set_role(&self, email: &str, role: Role) {
        let db_user = user::Entity::find()
            .filter(user::Column::Email.eq(email))
            .one(&self.db)
            .await
            .expect("DB query failed")
            .expect("User not found after registration");

        let mut active: user::ActiveModel = db_user.into();
        active.role = Set(role);
        user::Entity::update(active)
            .exec(&self.db)
            .await
            .expect("Failed to update user role");
    }

    /// Create a draft post as `token` and return its id.
    pub async fn create_post(&self, token: &str, title: &str) -> i64 {
        let res = self
            .post_with_token(
                routes::POSTS,
                &json!({
                    "title": title,
                    "content": "Body text for the post.",
                    "tags": ["Rust", "news"],
                }),
                token,
            )
            .await;
        assert_eq!(res.status, 201, "create_post failed: {}", res.text);
        res.data_id()
    }

    /// Create a draft project as `token` and return its id.
    pub async fn create_project(&self, token: &str, title: &str) -> i64 {
        let res = self
            .post_with_token(
                routes::PROJECTS,
                &json!({
                    "title": title,
                    "description": "What we built and how.",
                    "client": "Acme",
                    "category": "Branding",
                }),
                token,
            )
            .await;
        assert_eq!(res.status, 201, "create_project failed: {}", res.text);
        res.data_id()
    }

    /// Upload a small PNG and return the media JSON object.
    pub async fn upload_png(&self, token: &str, visibility: &str) -> Value {
        let res = self
            .upload_with_token(
                "logo.png",
                "image/png",
                PNG_BYTES.to_vec(),
                Some(visibility),
                token,
            )
            .await;
        assert_eq!(res.status, 201, "upload failed: {}", res.text);
        res.body["data"].clone()
    }
}

impl TestResponse {
    pub async fn from_response(res: reqwest::Response) -> Self {
        let status = res.status().as_u16();
        let headers = res.headers().clone();
        let text = res.text().await.unwrap_or_default();
        let body = serde_json::from_str(&text).unwrap_or(Value::Null);
        Self {
            status,
            headers,
            text,
            body,
        }
    }

    pub fn data_id(&self) -> i64 {
        self.body["data"]["id"]
            .as_i64()
            .expect("response body should contain 'data.id'")
    }

    pub fn access_token(&self) -> String {
        self.body["access_token"]
            .as_str()
            .expect("response should contain an access token")
            .to_string()
    }

    pub fn refresh_token(&self) -> String {
        self.body["refresh_token"]
            .as_str()
            .expect("response should contain a refresh token")
            .to_string()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}
