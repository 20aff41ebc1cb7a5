//! 端到端接口测试：内存存储 + 脚本化模型

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use medinodus_database::MemoryStore;
use medinodus_pipeline::testing::{RecordingLookup, ScriptedExtractor, ScriptedSynthesizer};
use medinodus_pipeline::AnalysisPipeline;
use medinodus_storage::ImageStore;
use medinodus_web::{create_app, AppState, IdentityService};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "medinodus-test-boundary";

const ASPIRIN_FIELDS: &str = r#"{"drug_name": "Aspirin", "strength": "500 mg"}"#;
const ASPIRIN_ANALYSIS: &str = r#"Here is the analysis:
{"drug_name": "Aspirin", "strength": "500 mg", "indications": ["headache", "fever"],
 "usage_instructions": ["1-2 tablets every 4-6 hours"], "warnings": ["Do not give to children"],
 "prescription_drug": "No"}"#;

struct TestApp {
    app: Router,
    store: MemoryStore,
    lookup: Arc<RecordingLookup>,
    identity: Arc<IdentityService>,
    _dir: TempDir,
}

fn test_app(extractor: ScriptedExtractor, synthesizer: ScriptedSynthesizer) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let store = MemoryStore::new();
    let lookup = Arc::new(RecordingLookup::new());
    let identity = Arc::new(IdentityService::new("test-secret", 12));

    let pipeline = AnalysisPipeline::new(
        Arc::new(extractor),
        lookup.clone(),
        Arc::new(synthesizer),
        Arc::new(store.clone()),
        Arc::new(ImageStore::new(dir.path())),
        Duration::from_secs(2),
    );

    let state = AppState {
        service_name: "MediNodus".to_string(),
        identity: identity.clone(),
        users: Arc::new(store.clone()),
        history: Arc::new(store.clone()),
        pipeline: Arc::new(pipeline),
        max_upload_bytes: 1024 * 1024,
    };

    TestApp {
        app: create_app(state),
        store,
        lookup,
        identity,
        _dir: dir,
    }
}

fn default_app() -> TestApp {
    test_app(
        ScriptedExtractor::returning(ASPIRIN_FIELDS),
        ScriptedSynthesizer::returning(ASPIRIN_ANALYSIS),
    )
}

fn json_request(method: Method, uri: &str, body: Option<Value>, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn upload_request(uri: &str, field: &str, data: &[u8], token: &str) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"box.jpg\"\r\nContent-Type: image/jpeg\r\n\r\n",
            BOUNDARY, field
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn register_and_login(app: &Router, email: &str) -> String {
    let (status, _) = send(
        app,
        json_request(
            Method::POST,
            "/auth/register",
            Some(json!({"email": email, "password": "pw123456", "full_name": "Test User"})),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        app,
        json_request(
            Method::POST,
            "/auth/login",
            Some(json!({"email": email, "password": "pw123456"})),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["access_token"].as_str().unwrap().to_string()
}

async fn history_count(app: &Router, token: &str) -> u64 {
    let (status, body) = send(app, json_request(Method::GET, "/med/history", None, Some(token))).await;
    assert_eq!(status, StatusCode::OK);
    body["count"].as_u64().unwrap()
}

#[tokio::test]
async fn test_register_and_login() {
    let t = default_app();

    let (status, body) = send(
        &t.app,
        json_request(
            Method::POST,
            "/auth/register",
            Some(json!({"email": "a@x.com", "password": "pw123456", "full_name": "Ana"})),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "a@x.com");
    assert!(body.get("password").is_none());
    assert!(body.get("hashed_password").is_none());

    let (status, body) = send(
        &t.app,
        json_request(
            Method::POST,
            "/auth/login",
            Some(json!({"email": "a@x.com", "password": "pw123456"})),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body["access_token"].as_str().unwrap().is_empty());
    assert_eq!(body["token_type"], "bearer");

    let (status, body) = send(
        &t.app,
        json_request(
            Method::POST,
            "/auth/login",
            Some(json!({"email": "a@x.com", "password": "wrong-password"})),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "Invalid credentials");

    let (status, body) = send(
        &t.app,
        json_request(
            Method::POST,
            "/auth/login",
            Some(json!({"email": "nobody@x.com", "password": "pw123456"})),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "Invalid credentials");
}

#[tokio::test]
async fn test_unknown_email_login_verifies_password() {
    let t = default_app();
    register_and_login(&t.app, "a@x.com").await;

    for (email, password) in [("a@x.com", "wrong-password"), ("nobody@x.com", "pw123456")] {
        let before = t.identity.verification_count();
        let (status, body) = send(
            &t.app,
            json_request(
                Method::POST,
                "/auth/login",
                Some(json!({"email": email, "password": password})),
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["detail"], "Invalid credentials");
        assert_eq!(t.identity.verification_count(), before + 1, "login as {}", email);
    }
}

#[tokio::test]
async fn test_register_rejections() {
    let t = default_app();
    register_and_login(&t.app, "a@x.com").await;

    let (status, body) = send(
        &t.app,
        json_request(
            Method::POST,
            "/auth/register",
            Some(json!({"email": " A@X.com ", "password": "pw123456"})),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Email already registered");

    let (status, _) = send(
        &t.app,
        json_request(
            Method::POST,
            "/auth/register",
            Some(json!({"email": "b@x.com", "password": "short"})),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_form_login_and_me() {
    let t = default_app();
    register_and_login(&t.app, "form@x.com").await;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/auth/login")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("username=FORM%40x.com&password=pw123456"))
        .unwrap();
    let (status, body) = send(&t.app, request).await;
    assert_eq!(status, StatusCode::OK);
    let token = body["access_token"].as_str().unwrap().to_string();

    let (status, body) = send(&t.app, json_request(Method::GET, "/auth/me", None, Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "form@x.com");
    assert_eq!(body["full_name"], "Test User");

    let (status, _) = send(&t.app, json_request(Method::POST, "/auth/logout", None, Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let t = default_app();

    let (status, _) = send(&t.app, json_request(Method::GET, "/med/infoget", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(
        &t.app,
        json_request(Method::GET, "/med/infoget", None, Some("not.a.token")),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "Invalid or expired token");

    let (status, body) = send(&t.app, json_request(Method::GET, "/health", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (_, body) = send(&t.app, json_request(Method::GET, "/", None, None)).await;
    assert_eq!(body["service"], "MediNodus");
}

#[tokio::test]
async fn test_medical_info_patch_flow() {
    let t = default_app();
    let token = register_and_login(&t.app, "a@x.com").await;

    let (status, _) = send(&t.app, json_request(Method::GET, "/med/infoget", None, Some(&token))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &t.app,
        json_request(
            Method::POST,
            "/med/infoupdate",
            Some(json!({"allergy": ["penicillin"]})),
            Some(&token),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&t.app, json_request(Method::GET, "/med/infoget", None, Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"allergy": ["penicillin"], "current_medication": null, "chronic_condition": null})
    );

    let (_, body) = send(
        &t.app,
        json_request(
            Method::POST,
            "/med/infoupdate",
            Some(json!({"current_medication": ["metformin"]})),
            Some(&token),
        ),
    )
    .await;
    assert_eq!(body["allergy"], json!(["penicillin"]));
    assert_eq!(body["current_medication"], json!(["metformin"]));
}

#[tokio::test]
async fn test_unreadable_medicine_image() {
    let t = test_app(
        ScriptedExtractor::returning("I cannot make out any text in this photo"),
        ScriptedSynthesizer::returning(ASPIRIN_ANALYSIS),
    );
    let token = register_and_login(&t.app, "a@x.com").await;

    let (status, body) = send(
        &t.app,
        upload_request("/med/upload-medicine-image", "image", b"blurry", &token),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "failure", "message": "Could not read image"}));
    assert_eq!(history_count(&t.app, &token).await, 0);
    assert!(t.lookup.calls().await.is_empty());
}

#[tokio::test]
async fn test_medicine_upload_with_empty_lookup() {
    let t = default_app();
    let token = register_and_login(&t.app, "a@x.com").await;

    let (status, body) = send(
        &t.app,
        upload_request("/med/upload-medicine-image", "file", b"\xff\xd8jpeg", &token),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["history_length"], 1);
    assert_eq!(body["latest_entry"]["type"], "med");
    assert_eq!(body["latest_entry"]["response"]["drug_name"], "Aspirin");
    assert_eq!(t.lookup.calls().await, vec!["Aspirin".to_string()]);
    assert_eq!(history_count(&t.app, &token).await, 1);
}

#[tokio::test]
async fn test_unparseable_analysis_is_failure() {
    let t = test_app(
        ScriptedExtractor::returning(ASPIRIN_FIELDS),
        ScriptedSynthesizer::returning("The model is overloaded, try later."),
    );
    let token = register_and_login(&t.app, "a@x.com").await;

    let (status, body) = send(
        &t.app,
        upload_request("/med/upload-medicine-image", "image", b"img", &token),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "failure");
    assert_eq!(body["analysis"]["drug_name"], "Unknown");
    assert_eq!(body["raw_output"], "The model is overloaded, try later.");
    assert_eq!(history_count(&t.app, &token).await, 0);

    let (status, _) = send(&t.app, json_request(Method::GET, "/med/infoget", None, Some(&token))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_generic_upload_type_parameter() {
    let t = default_app();
    let token = register_and_login(&t.app, "a@x.com").await;

    let (status, body) = send(
        &t.app,
        upload_request("/med/upload-medical-image?type=xray", "image", b"img", &token),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "type must be 'med' or 'report'");

    let (status, body) = send(
        &t.app,
        upload_request("/med/upload-medical-image?type=med", "image", b"img", &token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
}

#[tokio::test]
async fn test_upload_without_image_field() {
    let t = default_app();
    let token = register_and_login(&t.app, "a@x.com").await;

    let (status, body) = send(
        &t.app,
        upload_request("/med/upload-medicine-image", "document", b"img", &token),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Missing image file");
}

#[tokio::test]
async fn test_persistence_failure_is_server_error() {
    let t = default_app();
    let token = register_and_login(&t.app, "a@x.com").await;
    t.store.set_fail_writes(true);

    let (status, body) = send(
        &t.app,
        upload_request("/med/upload-medicine-image", "image", b"img", &token),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["detail"], "Internal server error");
    t.store.set_fail_writes(false);
    assert_eq!(history_count(&t.app, &token).await, 0);
}
