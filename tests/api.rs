use std::path::Path;
use std::sync::Arc;

use actix_web::cookie::Cookie;
use actix_web::http::{header, StatusCode};
use actix_web::{test, App};
use serde_json::{json, Value};
use tempfile::TempDir;

use clubsite::config::StorageBackend;
use clubsite::models::NewAdminAccount;
use clubsite::services::SESSION_COOKIE;
use clubsite::store::AuthStore;
use clubsite::{AppConfig, AppState, MemoryStore};

const ADMIN_EMAIL: &str = "admin@mbw205ci.id";
const ADMIN_PASSWORD: &str = "correct horse battery";
const BOUNDARY: &str = "----clubsite-test-boundary";

struct Harness {
    store: Arc<MemoryStore>,
    state: AppState,
    uploads: TempDir,
}

impl Harness {
    async fn new() -> Self {
        let uploads = tempfile::tempdir().unwrap();
        let config = AppConfig {
            storage: StorageBackend::Memory,
            upload_dir: uploads.path().to_path_buf(),
            migration_secret: Some("let-me-in".to_string()),
            ..AppConfig::default()
        };

        let store = Arc::new(MemoryStore::new());
        store
            .create_account(NewAdminAccount {
                email: ADMIN_EMAIL.to_string(),
                password_hash: bcrypt::hash(ADMIN_PASSWORD, 4).unwrap(),
                name: Some("Club Admin".to_string()),
                is_active: true,
            })
            .await
            .unwrap();

        let state = AppState::new(store.clone(), config);
        Self { store, state, uploads }
    }

    fn upload_root(&self) -> &Path {
        self.uploads.path()
    }

    fn stored_files(&self) -> usize {
        walk(self.upload_root())
    }
}

fn walk(dir: &Path) -> usize {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    entries
        .map(|e| e.unwrap().path())
        .map(|p| if p.is_dir() { walk(&p) } else { 1 })
        .sum()
}

macro_rules! app {
    ($harness:expr) => {{
        let state = $harness.state.clone();
        test::init_service(App::new().configure(move |cfg| state.configure(cfg))).await
    }};
}

macro_rules! login {
    ($app:expr) => {{
        let req = test::TestRequest::post()
            .uri("/api/auth/login")
            .set_json(json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD }))
            .to_request();
        let resp = test::call_service(&$app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let token = resp
            .response()
            .cookies()
            .find(|c| c.name() == SESSION_COOKIE)
            .map(|c| c.value().to_string())
            .expect("login sets the session cookie");
        Cookie::new(SESSION_COOKIE, token)
    }};
}

enum Part<'a> {
    Text(&'a str, &'a str),
    File {
        field: &'a str,
        file_name: &'a str,
        content_type: &'a str,
        bytes: Vec<u8>,
    },
}

fn multipart(parts: Vec<Part<'_>>) -> (String, Vec<u8>) {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes());
                body.extend_from_slice(value.as_bytes());
            }
            Part::File {
                field,
                file_name,
                content_type,
                bytes,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                        field, file_name, content_type
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(&bytes);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    (format!("multipart/form-data; boundary={}", BOUNDARY), body)
}

fn image(field: &'static str, file_name: &'static str, len: usize) -> Part<'static> {
    Part::File {
        field,
        file_name,
        content_type: "image/png",
        bytes: vec![0x89; len],
    }
}

fn registration<'a>(email: &'a str, plate: &'a str) -> Vec<Part<'a>> {
    vec![
        Part::Text("full_name", "Budi Santoso"),
        Part::Text("email", email),
        Part::Text("phone_number", "0812-3456-7890"),
        Part::Text("city", "Bandung"),
        Part::Text("car_variant", "C300 AMG Line"),
        Part::Text("year_car", "2018"),
        Part::Text("license_plate", plate),
    ]
}

fn multipart_request(uri: &str, parts: Vec<Part<'_>>) -> test::TestRequest {
    let (content_type, body) = multipart(parts);
    test::TestRequest::post()
        .uri(uri)
        .insert_header((header::CONTENT_TYPE, content_type))
        .set_payload(body)
}

#[actix_web::test]
async fn login_cookie_opens_admin_routes_and_logout_closes_them() {
    let harness = Harness::new().await;
    let app = app!(harness);

    let req = test::TestRequest::get().uri("/api/admin/members").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

    let cookie = login!(app);

    let req = test::TestRequest::post().uri("/api/auth/middleware").cookie(cookie.clone()).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["authenticated"], true);

    let req = test::TestRequest::get().uri("/api/admin/members").cookie(cookie.clone()).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::post().uri("/api/auth/logout").cookie(cookie.clone()).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let cleared = resp.response().cookies().find(|c| c.name() == SESSION_COOKIE).unwrap();
    assert_eq!(cleared.value(), "");

    let req = test::TestRequest::get().uri("/api/admin/members").cookie(cookie).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn login_rejects_bad_credentials() {
    let harness = Harness::new().await;
    let app = app!(harness);

    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({ "email": ADMIN_EMAIL, "password": "wrong" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Invalid email or password");

    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({ "email": ADMIN_EMAIL }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn unauthenticated_upload_is_refused_before_anything_is_written() {
    let harness = Harness::new().await;
    let app = app!(harness);

    let req = multipart_request("/api/upload", vec![image("file", "logo.png", 1024)]).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

    let req = multipart_request("/api/cms/gallery/upload", vec![image("file", "car.png", 1024)]).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

    assert_eq!(harness.stored_files(), 0);
}

#[actix_web::test]
async fn empty_about_section_serves_defaults_even_when_storage_is_down() {
    let harness = Harness::new().await;
    let app = app!(harness);

    let req = test::TestRequest::get().uri("/api/cms/about").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["id"], "default");
    assert_eq!(body["title"], "About Us");
    assert_eq!(body["button_text"], "Learn More");

    harness.store.set_offline(true);
    let req = test::TestRequest::get().uri("/api/cms/about").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["id"], "default");

    let req = test::TestRequest::get().uri("/api/cms/benefits").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"], json!([]));
}

#[actix_web::test]
async fn hero_upsert_twice_keeps_one_row_with_the_latest_values() {
    let harness = Harness::new().await;
    let app = app!(harness);
    let cookie = login!(app);

    let mut ids = Vec::new();
    for (title, description) in [("First", "first copy"), ("Second", "second copy")] {
        let req = test::TestRequest::put()
            .uri("/api/cms/hero")
            .cookie(cookie.clone())
            .set_json(json!({ "id": "default", "title": title, "description": description }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        ids.push(body["id"].clone());
    }
    assert_eq!(ids[0], ids[1]);

    let req = test::TestRequest::get().uri("/api/cms/hero").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(
        resp.headers().get(header::CACHE_CONTROL).unwrap(),
        "no-cache, no-store, must-revalidate, max-age=0"
    );
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["title"], "Second");
    assert_eq!(body["description"], "second copy");
    assert_eq!(body["id"], ids[1]);
}

#[actix_web::test]
async fn hero_update_without_description_is_rejected() {
    let harness = Harness::new().await;
    let app = app!(harness);
    let cookie = login!(app);

    let req = test::TestRequest::put()
        .uri("/api/cms/hero")
        .cookie(cookie)
        .set_json(json!({ "title": "Only a title" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["errors"]["description"], "Description is required");
}

#[actix_web::test]
async fn duplicate_registrations_conflict_on_the_offending_field() {
    let harness = Harness::new().await;
    let app = app!(harness);

    let req = multipart_request("/api/register", registration("budi@example.com", "D 1234 ABC")).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["status"], "pending");
    assert_eq!(body["data"]["deleted_at"], Value::Null);

    let req = multipart_request("/api/register", registration("BUDI@example.com", "B 9 XYZ")).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["errors"]["email"], "This email is already registered");

    let req = multipart_request("/api/register", registration("sari@example.com", "D 1234 ABC")).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["errors"]["license_plate"], "This license plate is already registered");

    let req = multipart_request("/api/register", registration("sari@example.com", "B 77 SAR")).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);
}

#[actix_web::test]
async fn registration_reports_missing_fields() {
    let harness = Harness::new().await;
    let app = app!(harness);

    let req = multipart_request("/api/register", vec![Part::Text("full_name", "Budi")]).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["errors"]["email"], "Email is required");
    assert_eq!(body["errors"]["license_plate"], "License plate is required");
}

#[actix_web::test]
async fn rejected_uploads_leave_nothing_on_disk() {
    let harness = Harness::new().await;
    let app = app!(harness);
    let cookie = login!(app);

    let cases = vec![
        (image("file", "huge.png", 6 * 1024 * 1024), "File size must be less than 5MB"),
        (image("file", "empty.png", 0), "File is empty"),
        (
            Part::File {
                field: "file",
                file_name: "brochure.pdf",
                content_type: "application/pdf",
                bytes: b"%PDF-1.4".to_vec(),
            },
            "Invalid file type. Only JPEG, PNG, WebP, and GIF are allowed.",
        ),
    ];

    for (part, message) in cases {
        let req = multipart_request("/api/cms/gallery/upload", vec![part])
            .cookie(cookie.clone())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], message);
    }

    assert_eq!(harness.stored_files(), 0);
}

#[actix_web::test]
async fn gallery_cleanup_removes_only_broken_entries() {
    let harness = Harness::new().await;
    let app = app!(harness);
    let cookie = login!(app);

    for name in ["front.png", "rear.png"] {
        let req = multipart_request("/api/cms/gallery/upload", vec![image("file", name, 2048)])
            .cookie(cookie.clone())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["data"]["title"], name);
    }

    let req = test::TestRequest::post()
        .uri("/api/cms/gallery")
        .cookie(cookie.clone())
        .set_json(json!({ "title": "Lost", "image_url": "/uploads/1700000000000-gone0000.png" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);

    let req = test::TestRequest::get().uri("/api/cms/gallery/check").cookie(cookie.clone()).to_request();
    let resp = test::call_service(&app, req).await;
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["total"], 3);
    assert_eq!(body["broken"], 1);

    let req = test::TestRequest::post().uri("/api/cms/gallery/check").cookie(cookie.clone()).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["deleted"], 1);
    assert_eq!(body["message"], "Cleaned up 1 broken gallery entries");

    let req = test::TestRequest::get().uri("/api/cms/gallery").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let titles: Vec<&str> = body["data"].as_array().unwrap().iter().map(|i| i["title"].as_str().unwrap()).collect();
    assert_eq!(titles.len(), 2);
    assert!(!titles.contains(&"Lost"));
    assert_eq!(harness.stored_files(), 2);
}

#[actix_web::test]
async fn members_are_soft_deleted_restored_and_decided_once() {
    let harness = Harness::new().await;
    let app = app!(harness);
    let cookie = login!(app);

    let req = multipart_request("/api/register", registration("rina@example.com", "L 5 RIN")).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let id = body["data"]["id"].as_i64().unwrap();
    let original = body["data"].clone();

    let patch = |payload: Value| {
        test::TestRequest::patch()
            .uri("/api/admin/members")
            .cookie(cookie.clone())
            .set_json(payload)
            .to_request()
    };
    let listed = |query: &str| {
        test::TestRequest::get()
            .uri(&format!("/api/admin/members{}", query))
            .cookie(cookie.clone())
            .to_request()
    };

    let resp = test::call_service(&app, patch(json!({ "memberId": id, "action": "delete" }))).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::call_and_read_body_json(&app, listed("")).await;
    assert_eq!(body["data"], json!([]));
    let body: Value = test::call_and_read_body_json(&app, listed("?includeDeleted=true")).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let resp = test::call_service(&app, patch(json!({ "memberId": id, "action": "restore" }))).await;
    let body: Value = test::read_body_json(resp).await;
    let mut restored = body["data"].clone();
    let mut expected = original.clone();
    restored.as_object_mut().unwrap().remove("updated_at");
    expected.as_object_mut().unwrap().remove("updated_at");
    assert_eq!(restored, expected);

    let body: Value = test::call_and_read_body_json(&app, listed("?status=pending")).await;
    assert_eq!(body["data"][0]["id"], id);

    let resp = test::call_service(&app, patch(json!({ "memberId": id, "status": "approved" }))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let resp = test::call_service(&app, patch(json!({ "memberId": id, "status": "rejected" }))).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let req = test::TestRequest::get().uri("/api/admin/stats").cookie(cookie.clone()).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["totalMembers"], 1);
    assert_eq!(body["approvedMembers"], 1);
    assert_eq!(body["pendingApprovals"], 0);
    assert_eq!(body["recentRegistrations"][0]["email"], "rina@example.com");

    let resp = test::call_service(&app, patch(json!({ "memberId": 9999, "action": "delete" }))).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn contact_form_is_validated_and_listed_for_admins() {
    let harness = Harness::new().await;
    let app = app!(harness);

    let req = test::TestRequest::post()
        .uri("/api/contact")
        .set_json(json!({ "first_name": "Sari", "last_name": "", "email": "not-an-email", "message": "Hi" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["errors"]["email"], "Invalid email format");
    assert_eq!(body["errors"]["last_name"], "Last name is required");

    let req = test::TestRequest::post()
        .uri("/api/contact")
        .set_json(json!({ "first_name": "Sari", "last_name": "Dewi", "email": "Sari@Example.com ", "message": "Hi" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["email"], "sari@example.com");

    let req = test::TestRequest::get().uri("/api/contact").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

    let cookie = login!(app);
    let req = test::TestRequest::get().uri("/api/contact").cookie(cookie).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[actix_web::test]
async fn events_can_be_created_viewed_and_registered_for() {
    let harness = Harness::new().await;
    let app = app!(harness);
    let cookie = login!(app);

    let req = test::TestRequest::post()
        .uri("/api/cms/events")
        .cookie(cookie.clone())
        .set_json(json!({ "title": "Sunday Morning Ride", "description": "Sentul loop", "icon": "car" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    let id = body["data"]["id"].as_i64().unwrap();

    let req = multipart_request(
        "/api/cms/events/upload",
        vec![Part::Text("eventId", &id.to_string()), image("file", "banner.PNG", 512)],
    )
    .cookie(cookie.clone())
    .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    let url = body["url"].as_str().unwrap().to_string();
    assert!(url.starts_with("/uploads/events/") && url.ends_with(".png"));

    let req = test::TestRequest::get().uri(&format!("/api/cms/events/{}", id)).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["header_image"], url.as_str());

    let req = test::TestRequest::get().uri("/api/cms/events/4242").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::post()
        .uri("/api/cms/events/register")
        .set_json(json!({ "event_id": id, "full_name": "Andi", "email": "andi@example.com", "phone_number": "081298765432" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);

    let req = test::TestRequest::post()
        .uri("/api/cms/events/register")
        .set_json(json!({ "event_id": 4242, "full_name": "Andi", "email": "andi@example.com", "phone_number": "081298765432" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::get().uri("/api/cms/events/registrations").cookie(cookie).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"][0]["event_title"], "Sunday Morning Ride");

    let req = test::TestRequest::get().uri("/api/events").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[actix_web::test]
async fn uploads_are_served_with_long_lived_caching_and_no_traversal() {
    let harness = Harness::new().await;
    std::fs::create_dir_all(harness.upload_root().join("events")).unwrap();
    std::fs::write(harness.upload_root().join("events/banner.webp"), b"RIFFxxxxWEBP").unwrap();
    let app = app!(harness);

    let req = test::TestRequest::get().uri("/uploads/events/banner.webp").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers().get(header::CONTENT_TYPE).unwrap(), "image/webp");
    assert_eq!(
        resp.headers().get(header::CACHE_CONTROL).unwrap(),
        "public, max-age=31536000, immutable"
    );

    for uri in ["/uploads/missing.png", "/uploads/../secret.txt", "/uploads/events/../../secret.txt"] {
        let req = test::TestRequest::get().uri(uri).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{}", uri);
    }
}

#[actix_web::test]
async fn social_links_upsert_by_platform() {
    let harness = Harness::new().await;
    let app = app!(harness);
    let cookie = login!(app);

    for url in ["https://instagram.com/old", "https://instagram.com/mbw205ci"] {
        let req = test::TestRequest::put()
            .uri("/api/cms/social-media")
            .cookie(cookie.clone())
            .set_json(json!({ "platform": "Instagram", "url": url }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    }

    let req = test::TestRequest::get().uri("/api/cms/social-media").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let links = body["data"].as_array().unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0]["platform"], "instagram");
    assert_eq!(links[0]["url"], "https://instagram.com/mbw205ci");
}

#[actix_web::test]
async fn social_links_are_edited_by_id() {
    let harness = Harness::new().await;
    let app = app!(harness);
    let cookie = login!(app);

    let mut ids = Vec::new();
    for (platform, url) in [("twitter", "https://twitter.com/mbw205ci"), ("youtube", "https://youtube.com/@mbw205ci")] {
        let req = test::TestRequest::post()
            .uri("/api/cms/social-media")
            .cookie(cookie.clone())
            .set_json(json!({ "platform": platform, "url": url }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        ids.push(body["data"]["id"].as_i64().unwrap());
    }
    let (twitter, youtube) = (ids[0], ids[1]);

    // the dashboard sends only the id and the new url
    let req = test::TestRequest::put()
        .uri("/api/cms/social-media")
        .cookie(cookie.clone())
        .set_json(json!({ "id": twitter, "url": "https://twitter.com/club" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["platform"], "twitter");
    assert_eq!(body["data"]["url"], "https://twitter.com/club");

    let req = test::TestRequest::put()
        .uri("/api/cms/social-media")
        .cookie(cookie.clone())
        .set_json(json!({ "id": twitter, "platform": "X", "icon_type": "x" }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["id"].as_i64(), Some(twitter));
    assert_eq!(body["data"]["platform"], "x");
    assert_eq!(body["data"]["url"], "https://twitter.com/club");

    let req = test::TestRequest::put()
        .uri("/api/cms/social-media")
        .cookie(cookie.clone())
        .set_json(json!({ "id": youtube, "platform": "x" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["errors"]["platform"].is_string());

    let req = test::TestRequest::put()
        .uri("/api/cms/social-media")
        .cookie(cookie.clone())
        .set_json(json!({ "id": 99999, "platform": "tiktok", "url": "https://tiktok.com/@mbw205ci" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::get().uri("/api/cms/social-media").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let platforms: Vec<&str> = body["data"].as_array().unwrap().iter().map(|l| l["platform"].as_str().unwrap()).collect();
    assert_eq!(platforms, ["x", "youtube"]);
}

#[actix_web::test]
async fn partial_updates_leave_unsent_fields_alone() {
    let harness = Harness::new().await;
    let app = app!(harness);
    let cookie = login!(app);

    let req = test::TestRequest::post()
        .uri("/api/cms/benefits")
        .cookie(cookie.clone())
        .set_json(json!({ "title": "Track days", "description": "Two per year at Sentul", "icon_type": "flag", "sort_order": 3 }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let benefit = body["data"]["id"].as_i64().unwrap();

    let req = test::TestRequest::put()
        .uri("/api/cms/benefits")
        .cookie(cookie.clone())
        .set_json(json!({ "id": benefit, "title": "Track weekends" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["title"], "Track weekends");
    assert_eq!(body["data"]["description"], "Two per year at Sentul");
    assert_eq!(body["data"]["icon_type"], "flag");
    assert_eq!(body["data"]["sort_order"], 3);

    let req = test::TestRequest::put()
        .uri("/api/cms/benefits")
        .cookie(cookie.clone())
        .set_json(json!({ "id": 9999, "title": "Ghost" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::post()
        .uri("/api/cms/events")
        .cookie(cookie.clone())
        .set_json(json!({
            "title": "Night Ride",
            "description": "City loop",
            "icon": "moon",
            "event_time": "2025-03-01 20:00",
            "location": "Senayan",
            "status": "upcoming",
        }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let event = body["data"]["id"].as_i64().unwrap();

    let req = test::TestRequest::put()
        .uri("/api/cms/events")
        .cookie(cookie.clone())
        .set_json(json!({ "id": event, "title": "Night Ride Vol. 2" }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["title"], "Night Ride Vol. 2");
    assert_eq!(body["data"]["description"], "City loop");
    assert_eq!(body["data"]["icon"], "moon");
    assert_eq!(body["data"]["location"], "Senayan");
    assert_eq!(body["data"]["status"], "upcoming");

    let req = test::TestRequest::put()
        .uri("/api/cms/events")
        .cookie(cookie)
        .set_json(json!({ "id": 9999, "title": "Ghost" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn migration_endpoint_requires_the_secret() {
    let harness = Harness::new().await;
    let app = app!(harness);

    let req = test::TestRequest::get().uri("/api/migrate?secret=guess").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::get().uri("/api/migrate?secret=let-me-in").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], true);
}
