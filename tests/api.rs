//! Router-level tests: full requests through auth, role checks and handlers
//! against an in-memory database.

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use data_encoding::BASE64;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use lectern::{
    api::{self, AppState},
    config::Config,
    db::{create_test_pool, migrations},
};

const PASSWORD: &str = "s3cret-pass";

struct TestApp {
    router: Router,
    _uploads: TempDir,
}

struct Response {
    status: StatusCode,
    headers: axum::http::HeaderMap,
    body: Value,
}

async fn spawn_app() -> TestApp {
    let pool = create_test_pool().await.expect("Failed to create test pool");
    migrations::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");

    let uploads = TempDir::new().expect("Failed to create upload dir");
    let mut config = Config::default();
    config.upload.path = uploads.path().to_path_buf();

    let state = AppState::new(pool, &config);
    TestApp {
        router: api::build_router(state, &config.server.cors_origin),
        _uploads: uploads,
    }
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> Response {
        let response = self.router.clone().oneshot(request).await.expect("request failed");
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        Response { status, headers, body }
    }

    async fn request(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    async fn get(&self, uri: &str, token: Option<&str>) -> Response {
        self.request(Method::GET, uri, token, None).await
    }

    async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> Response {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    async fn put(&self, uri: &str, token: Option<&str>, body: Value) -> Response {
        self.request(Method::PUT, uri, token, Some(body)).await
    }

    async fn delete(&self, uri: &str, token: Option<&str>) -> Response {
        self.request(Method::DELETE, uri, token, None).await
    }

    /// Register an account and return (user id, session token)
    async fn register(&self, username: &str) -> (i64, String) {
        let response = self
            .post(
                "/api/auth/register",
                None,
                json!({
                    "username": username,
                    "email": format!("{}@example.com", username),
                    "password": PASSWORD,
                }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        (
            response.body["user"]["id"].as_i64().unwrap(),
            response.body["token"].as_str().unwrap().to_string(),
        )
    }

    /// Admin plus two instructors, and one subject
    async fn seed(&self) -> Seed {
        let (_, admin) = self.register("admin").await;
        let (alice_id, alice) = self.register("alice").await;
        let (bob_id, bob) = self.register("bob").await;
        for id in [alice_id, bob_id] {
            let response = self
                .put(&format!("/api/admin/users/{}/role", id), Some(&admin), json!({"role": "instructor"}))
                .await;
            assert_eq!(response.status, StatusCode::OK, "{}", response.body);
        }
        let subject = self
            .post(
                "/api/admin/subjects/",
                Some(&admin),
                json!({"title": "Programming", "slug": "programming"}),
            )
            .await;
        assert_eq!(subject.status, StatusCode::CREATED, "{}", subject.body);
        Seed {
            alice,
            bob,
            subject_id: subject.body["id"].as_i64().unwrap(),
        }
    }

    async fn create_course(&self, token: &str, subject_id: i64, slug: &str) -> i64 {
        let response = self
            .post(
                "/api/manage/courses/",
                Some(token),
                json!({"subject": subject_id, "title": slug, "slug": slug, "overview": ""}),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        response.body["id"].as_i64().unwrap()
    }

    /// Multipart upload of a single `file` field
    async fn upload(&self, token: &str, filename: &str, content_type: &str, data: &str) -> Response {
        let boundary = "lectern-boundary";
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{name}\"\r\n\
             Content-Type: {ctype}\r\n\r\n{data}\r\n--{b}--\r\n",
            b = boundary,
            name = filename,
            ctype = content_type,
            data = data,
        );
        self.send(
            Request::builder()
                .method(Method::POST)
                .uri("/api/manage/upload/")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={}", boundary),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
    }

    async fn create_modules(&self, token: &str, course_id: i64, titles: &[&str]) -> Vec<Value> {
        let rows: Vec<Value> = titles.iter().map(|t| json!({"title": t})).collect();
        let response = self
            .put(
                &format!("/api/manage/courses/{}/modules/", course_id),
                Some(token),
                json!({"modules": rows}),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "{}", response.body);
        response.body.as_array().unwrap().clone()
    }
}

struct Seed {
    alice: String,
    bob: String,
    subject_id: i64,
}

#[tokio::test]
async fn test_first_user_is_admin_then_students() {
    let app = spawn_app().await;
    let (_, admin) = app.register("admin").await;
    let (_, other) = app.register("other").await;

    assert_eq!(app.get("/api/auth/me", Some(&admin)).await.body["role"], "admin");
    let me = app.get("/api/auth/me", Some(&other)).await;
    assert_eq!(me.body["role"], "student");
    assert!(me.body.get("password_hash").is_none());

    assert_eq!(app.get("/api/auth/me", None).await.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_sets_cookie_and_logout_ends_session() {
    let app = spawn_app().await;
    app.register("carol").await;

    let login = app
        .post(
            "/api/auth/login",
            None,
            json!({"username_or_email": "carol@example.com", "password": PASSWORD}),
        )
        .await;
    assert_eq!(login.status, StatusCode::OK);
    let cookie = login.headers[header::SET_COOKIE].to_str().unwrap().to_string();
    assert!(cookie.starts_with("session="));
    assert!(cookie.contains("HttpOnly"));
    let token = login.body["token"].as_str().unwrap().to_string();

    let via_cookie = app
        .send(
            Request::builder()
                .uri("/api/auth/me")
                .header(header::COOKIE, format!("session={}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(via_cookie.body["username"], "carol");

    let logout = app.request(Method::POST, "/api/auth/logout", Some(&token), None).await;
    assert_eq!(logout.status, StatusCode::NO_CONTENT);
    assert_eq!(app.get("/api/auth/me", Some(&token)).await.status, StatusCode::UNAUTHORIZED);

    let wrong = app
        .post("/api/auth/login", None, json!({"username_or_email": "carol", "password": "nope-nope"}))
        .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_manage_lists_only_own_courses() {
    let app = spawn_app().await;
    let seed = app.seed().await;
    let alice_course = app.create_course(&seed.alice, seed.subject_id, "rust").await;
    app.create_course(&seed.bob, seed.subject_id, "go").await;

    let listed = app.get("/api/manage/courses/", Some(&seed.alice)).await;
    let ids: Vec<i64> = listed
        .body
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![alice_course]);

    // Someone else's course looks missing.
    let url = format!("/api/manage/courses/{}/", alice_course);
    assert_eq!(app.get(&url, Some(&seed.bob)).await.status, StatusCode::NOT_FOUND);
    assert_eq!(app.delete(&url, Some(&seed.bob)).await.status, StatusCode::NOT_FOUND);
    assert_eq!(app.delete(&url, Some(&seed.alice)).await.status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_manage_requires_instructor() {
    let app = spawn_app().await;
    let seed = app.seed().await;
    let (_, student) = app.register("student").await;

    assert_eq!(
        app.get("/api/manage/courses/", Some(&student)).await.status,
        StatusCode::FORBIDDEN
    );
    assert_eq!(app.get("/api/manage/courses/", None).await.status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        app.post("/api/admin/subjects/", Some(&seed.alice), json!({"title": "X", "slug": "x"}))
            .await
            .status,
        StatusCode::FORBIDDEN
    );
}

#[tokio::test]
async fn test_invalid_course_form_returns_errors_and_schema() {
    let app = spawn_app().await;
    let seed = app.seed().await;

    let response = app
        .post(
            "/api/manage/courses/",
            Some(&seed.alice),
            json!({"subject": seed.subject_id, "title": "", "slug": "Bad Slug"}),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    let details = &response.body["error"]["details"];
    assert!(details["errors"]["title"].is_array());
    assert!(details["errors"]["slug"].is_array());
    assert!(details["form"]["fields"].is_array());
}

#[tokio::test]
async fn test_enroll_with_basic_auth_updates_total_students() {
    let app = spawn_app().await;
    let seed = app.seed().await;
    let course = app.create_course(&seed.alice, seed.subject_id, "rust").await;
    app.register("dave").await;

    let basic = format!("Basic {}", BASE64.encode(format!("dave:{}", PASSWORD).as_bytes()));
    let enroll = || {
        Request::builder()
            .method(Method::POST)
            .uri(format!("/api/courses/{}/enroll/", course))
            .header(header::AUTHORIZATION, basic.clone())
            .body(Body::empty())
            .unwrap()
    };

    let first = app.send(enroll()).await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.body, json!({"enrolled": true}));
    let detail = app.get(&format!("/api/courses/{}/", course), None).await;
    assert_eq!(detail.body["total_students"], 1);

    // Enrolling again changes nothing.
    app.send(enroll()).await;
    let detail = app.get(&format!("/api/courses/{}/", course), None).await;
    assert_eq!(detail.body["total_students"], 1);

    let bad = Request::builder()
        .method(Method::POST)
        .uri(format!("/api/courses/{}/enroll/", course))
        .header(
            header::AUTHORIZATION,
            format!("Basic {}", BASE64.encode(b"dave:wrong-password")),
        )
        .body(Body::empty())
        .unwrap();
    assert_eq!(app.send(bad).await.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_reorder_skips_unowned_modules() {
    let app = spawn_app().await;
    let seed = app.seed().await;
    let mine = app.create_course(&seed.alice, seed.subject_id, "mine").await;
    let theirs = app.create_course(&seed.bob, seed.subject_id, "theirs").await;
    let own = app.create_modules(&seed.alice, mine, &["Own"]).await;
    let foreign = app.create_modules(&seed.bob, theirs, &["Foreign"]).await;
    let own_id = own[0]["id"].as_i64().unwrap();
    let foreign_id = foreign[0]["id"].as_i64().unwrap();

    let mut order = serde_json::Map::new();
    order.insert(own_id.to_string(), json!(2));
    order.insert(foreign_id.to_string(), json!(1));
    let response = app
        .post("/api/manage/modules/order/", Some(&seed.alice), Value::Object(order))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, json!({"saved": "ok"}));

    let mine_modules = app.get(&format!("/api/courses/{}/", mine), None).await;
    assert_eq!(mine_modules.body["modules"][0]["order"], 2);
    let their_modules = app.get(&format!("/api/courses/{}/", theirs), None).await;
    assert_eq!(their_modules.body["modules"][0]["order"], 0);
}

#[tokio::test]
async fn test_unknown_content_type_is_not_found() {
    let app = spawn_app().await;
    let seed = app.seed().await;
    let course = app.create_course(&seed.alice, seed.subject_id, "rust").await;
    let modules = app.create_modules(&seed.alice, course, &["Intro"]).await;
    let module_id = modules[0]["id"].as_i64().unwrap();

    for tag in ["quiz", "Text", "texts"] {
        let url = format!("/api/manage/modules/{}/content/{}/", module_id, tag);
        assert_eq!(app.get(&url, Some(&seed.alice)).await.status, StatusCode::NOT_FOUND);
        let created = app.post(&url, Some(&seed.alice), json!({"title": "x"})).await;
        assert_eq!(created.status, StatusCode::NOT_FOUND);
    }

    let form = app
        .get(&format!("/api/manage/modules/{}/content/video/", module_id), Some(&seed.alice))
        .await;
    assert_eq!(form.status, StatusCode::OK);
    assert_eq!(form.body["schema"]["fields"][1]["name"], "url");
}

#[tokio::test]
async fn test_content_lifecycle() {
    let app = spawn_app().await;
    let seed = app.seed().await;
    let course = app.create_course(&seed.alice, seed.subject_id, "rust").await;
    let modules = app.create_modules(&seed.alice, course, &["Intro"]).await;
    let module_id = modules[0]["id"].as_i64().unwrap();
    let text_url = format!("/api/manage/modules/{}/content/text/", module_id);

    let invalid = app.post(&text_url, Some(&seed.alice), json!({"title": "Notes"})).await;
    assert_eq!(invalid.status, StatusCode::BAD_REQUEST);
    assert!(invalid.body["error"]["details"]["errors"]["content"].is_array());

    let created = app
        .post(&text_url, Some(&seed.alice), json!({"title": "Notes", "content": "Hello"}))
        .await;
    assert_eq!(created.status, StatusCode::CREATED, "{}", created.body);
    assert_eq!(created.body["type"], "text");
    let item_id = created.body["id"].as_i64().unwrap();
    let item_url = format!("{}{}/", text_url, item_id);

    let updated = app
        .put(&item_url, Some(&seed.alice), json!({"title": "Notes", "content": "Updated"}))
        .await;
    assert_eq!(updated.body["content"], "Updated");
    assert_eq!(app.get(&item_url, Some(&seed.bob)).await.status, StatusCode::NOT_FOUND);

    let listed = app.get(&format!("/api/manage/modules/{}/", module_id), Some(&seed.alice)).await;
    let contents = listed.body["contents"].as_array().unwrap().clone();
    assert_eq!(contents.len(), 1);
    let content_id = contents[0]["id"].as_i64().unwrap();

    let content_url = format!("/api/manage/contents/{}/", content_id);
    assert_eq!(app.delete(&content_url, Some(&seed.bob)).await.status, StatusCode::NOT_FOUND);
    let deleted = app.delete(&content_url, Some(&seed.alice)).await;
    assert_eq!(deleted.body, json!({"module": module_id}));

    // The item went with its content.
    assert_eq!(app.get(&item_url, Some(&seed.alice)).await.status, StatusCode::NOT_FOUND);
    let listed = app.get(&format!("/api/manage/modules/{}/", module_id), Some(&seed.alice)).await;
    assert!(listed.body["contents"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_upload_then_image_item() {
    let app = spawn_app().await;
    let seed = app.seed().await;
    let course = app.create_course(&seed.alice, seed.subject_id, "rust").await;
    let modules = app.create_modules(&seed.alice, course, &["Intro"]).await;
    let module_id = modules[0]["id"].as_i64().unwrap();

    let upload = app
        .upload(&seed.alice, "diagram.png", "image/png", "not-really-a-png")
        .await;
    assert_eq!(upload.status, StatusCode::CREATED, "{}", upload.body);
    let url = upload.body["url"].as_str().unwrap().to_string();
    assert!(url.starts_with("/uploads/") && url.ends_with(".png"));

    let served = app.get(&url, None).await;
    assert_eq!(served.status, StatusCode::OK);

    let image_url = format!("/api/manage/modules/{}/content/image/", module_id);
    let created = app
        .post(&image_url, Some(&seed.alice), json!({"title": "Diagram", "file": url}))
        .await;
    assert_eq!(created.status, StatusCode::CREATED, "{}", created.body);

    let rejected = app
        .post(&image_url, Some(&seed.alice), json!({"title": "Elsewhere", "file": "/etc/passwd.png"}))
        .await;
    assert_eq!(rejected.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upload_refuses_active_content() {
    let app = spawn_app().await;
    let seed = app.seed().await;
    let page = "<script>fetch('/api/auth/me')</script>";

    for (name, ctype) in [
        ("page.html", "text/html"),
        ("logo.svg", "image/svg+xml"),
        ("app.js", "application/javascript"),
        ("blob", "application/octet-stream"),
    ] {
        let response = app.upload(&seed.alice, name, ctype, page).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST, "{} was accepted", ctype);
        assert_eq!(response.body["error"]["code"], "VALIDATION_ERROR");
    }

    // The stored extension follows the declared type, not the file name.
    let renamed = app.upload(&seed.alice, "page.html", "text/plain", page).await;
    assert_eq!(renamed.status, StatusCode::CREATED, "{}", renamed.body);
    let url = renamed.body["url"].as_str().unwrap();
    assert!(url.ends_with(".txt"), "{}", url);
    let served = app.get(url, None).await;
    let served_type = served.headers[header::CONTENT_TYPE].to_str().unwrap();
    assert!(served_type.starts_with("text/plain"), "{}", served_type);
}

#[tokio::test]
async fn test_student_register_enroll_and_read() {
    let app = spawn_app().await;
    let seed = app.seed().await;
    let course = app.create_course(&seed.alice, seed.subject_id, "rust").await;
    let modules = app.create_modules(&seed.alice, course, &["Intro", "Ownership"]).await;
    let second = modules[1]["id"].as_i64().unwrap();
    app.post(
        &format!("/api/manage/modules/{}/content/text/", second),
        Some(&seed.alice),
        json!({"title": "Borrowing", "content": "&T and &mut T"}),
    )
    .await;

    let registered = app
        .post(
            "/api/students/register/",
            None,
            json!({"username": "erin", "email": "erin@example.com", "password": PASSWORD}),
        )
        .await;
    assert_eq!(registered.status, StatusCode::CREATED);
    assert_eq!(registered.body["user"]["role"], "student");
    let token = registered.body["token"].as_str().unwrap().to_string();

    let detail_url = format!("/api/students/courses/{}/", course);
    assert_eq!(app.get(&detail_url, Some(&token)).await.status, StatusCode::NOT_FOUND);

    let enroll = app
        .send(
            Request::builder()
                .method(Method::POST)
                .uri("/api/students/enroll/")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(format!("course={}", course)))
                .unwrap(),
        )
        .await;
    assert_eq!(enroll.status, StatusCode::SEE_OTHER);
    assert_eq!(enroll.headers[header::LOCATION].to_str().unwrap(), detail_url);

    let courses = app.get("/api/students/courses/", Some(&token)).await;
    assert_eq!(courses.body.as_array().unwrap().len(), 1);

    let first = app.get(&detail_url, Some(&token)).await;
    assert_eq!(first.body["module"]["title"], "Intro");
    assert!(first.body["contents"].as_array().unwrap().is_empty());

    let selected = app
        .get(&format!("{}modules/{}/", detail_url, second), Some(&token))
        .await;
    assert_eq!(selected.body["contents"][0]["item"]["title"], "Borrowing");
}

#[tokio::test]
async fn test_student_enroll_form_errors() {
    let app = spawn_app().await;
    app.seed().await;
    let (_, token) = app.register("frank").await;

    for body in ["course=999", "course=abc", "course=", ""] {
        let response = app
            .send(
                Request::builder()
                    .method(Method::POST)
                    .uri("/api/students/enroll/")
                    .header(header::AUTHORIZATION, format!("Bearer {}", token))
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST, "{:?}", body);
        let details = &response.body["error"]["details"];
        assert!(details["errors"]["course"].is_array(), "{}", response.body);
        assert_eq!(details["form"]["fields"][0]["name"], "course");
    }

    let courses = app.get("/api/students/courses/", Some(&token)).await;
    assert!(courses.body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_public_catalog() {
    let app = spawn_app().await;
    let seed = app.seed().await;
    let course = app.create_course(&seed.alice, seed.subject_id, "rust").await;
    app.create_modules(&seed.alice, course, &["Intro", "Traits"]).await;

    let catalog = app.get("/api/catalog/", None).await;
    assert_eq!(catalog.status, StatusCode::OK);
    assert_eq!(catalog.body["subjects"][0]["total_courses"], 1);
    assert_eq!(catalog.body["courses"][0]["total_modules"], 2);

    let by_subject = app.get("/api/catalog/subject/programming/", None).await;
    assert_eq!(by_subject.body["subject"]["slug"], "programming");
    assert_eq!(
        app.get("/api/catalog/subject/cooking/", None).await.status,
        StatusCode::NOT_FOUND
    );

    let detail = app.get("/api/catalog/courses/rust/", None).await;
    assert_eq!(detail.body["modules"].as_array().unwrap().len(), 2);
    assert!(detail.body["owner"].as_i64().is_some());

    let subjects = app.get("/api/subjects/", None).await;
    assert_eq!(subjects.body[0]["slug"], "programming");
    let subject = app.get(&format!("/api/subjects/{}/", seed.subject_id), None).await;
    assert_eq!(subject.body["title"], "Programming");
}
