//! REST surface tests driven through the router with `oneshot`.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use chrono::Utc;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::util::ServiceExt;

use relab::Config;
use relab::api::{self, AppState};
use relab::domain::module::{LabModule, ModuleId};
use relab::domain::request::TimeSlot;
use relab::domain::resource::{Resource, ResourceId, ResourceKind};
use relab::storage::Storage;
use relab::storage::memory::MemoryStore;

struct TestApp {
    router: Router,
    store: Arc<MemoryStore>,
    _upload_dir: tempfile::TempDir,
}

fn test_app() -> TestApp {
    let upload_dir = tempfile::tempdir().unwrap();
    let config = Config {
        port: 0,
        database_url: String::new(),
        jwt_secret: "test-secret".to_string(),
        token_ttl_secs: 3600,
        upload_dir: upload_dir.path().to_string_lossy().into_owned(),
    };
    let store = Arc::new(MemoryStore::new());
    let state = AppState::new(store.clone(), config);
    TestApp {
        router: api::router(state),
        store,
        _upload_dir: upload_dir,
    }
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

/// Register a user with the given short role names and return their token.
async fn register(router: &Router, username: &str, roles: &[&str]) -> String {
    let (status, _) = send(
        router,
        json_request(
            "POST",
            "/api/auth/signup",
            None,
            &json!({
                "username": username,
                "email": format!("{username}@eng.example.edu"),
                "password": "hunter2!",
                "roles": roles,
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        router,
        json_request(
            "POST",
            "/api/auth/signin",
            None,
            &json!({ "username": username, "password": "hunter2!" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["accessToken"].as_str().unwrap().to_string()
}

async fn seed_module(store: &MemoryStore, code: &str) {
    let now = Utc::now();
    store
        .insert_module(LabModule {
            id: ModuleId::new(),
            module_code: code.to_string(),
            module_name: "Electronics III".to_string(),
            department: "Electrical Engineering".to_string(),
            semester: 5,
            coordinator: "Dr. Silva".to_string(),
            lab_sessions: vec!["Week 4 - Circuits Lab".to_string()],
            active: true,
            created_at: now,
            updated_at: now,
        })
        .await
        .unwrap();
}

fn submission_body() -> Value {
    json!({
        "moduleCode": "EE3350",
        "originalLabDate": "2025-04-24",
        "requestedDate": "2025-05-01",
        "requestedTimeSlot": "08:30-10:30",
        "reason": "Medical appointment",
    })
}

#[test_log::test(tokio::test)]
async fn signin_rejects_bad_credentials() {
    let app = test_app();
    register(&app.router, "nadia", &[]).await;

    let (status, body) = send(
        &app.router,
        json_request(
            "POST",
            "/api/auth/signin",
            None,
            &json!({ "username": "nadia", "password": "wrong" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["message"].as_str().unwrap().contains("Invalid username"));
}

#[test_log::test(tokio::test)]
async fn duplicate_username_is_refused() {
    let app = test_app();
    register(&app.router, "nadia", &[]).await;

    let (status, body) = send(
        &app.router,
        json_request(
            "POST",
            "/api/auth/signup",
            None,
            &json!({
                "username": "nadia",
                "email": "other@eng.example.edu",
                "password": "hunter2!",
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["message"].as_str().unwrap(),
        "Validation error: Error: Username is already taken!"
    );
}

#[test_log::test(tokio::test)]
async fn missing_token_is_unauthorized() {
    let app = test_app();
    let (status, _) = send(&app.router, get_request("/api/requests", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[test_log::test(tokio::test)]
async fn student_cannot_review_requests() {
    let app = test_app();
    seed_module(&app.store, "EE3350").await;
    let student = register(&app.router, "nadia", &[]).await;

    let (status, created) = send(
        &app.router,
        json_request("POST", "/api/requests", Some(&student), &submission_body()),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app.router,
        json_request(
            "PUT",
            &format!("/api/requests/{id}"),
            Some(&student),
            &json!({ "action": "RECOMMEND", "comment": "ok" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[test_log::test(tokio::test)]
async fn pipeline_over_rest() {
    let app = test_app();
    seed_module(&app.store, "EE3350").await;
    let student = register(&app.router, "nadia", &[]).await;
    let advisor = register(&app.router, "advisor1", &["advisor"]).await;
    let coordinator = register(&app.router, "coord1", &["module_coordinator"]).await;
    let lab_coordinator = register(&app.router, "labcoord1", &["lab_coordinator"]).await;

    let (status, created) = send(
        &app.router,
        json_request("POST", "/api/requests", Some(&student), &submission_body()),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["status"], "PENDING");
    let id = created["id"].as_str().unwrap().to_string();
    let uri = format!("/api/requests/{id}");

    let (status, body) = send(
        &app.router,
        json_request(
            "PUT",
            &uri,
            Some(&advisor),
            &json!({ "action": "RECOMMEND", "comment": "ok" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "LAB_ADVISOR_REVIEWED");

    let (status, body) = send(
        &app.router,
        json_request(
            "PUT",
            &uri,
            Some(&coordinator),
            &json!({ "action": "ENDORSE", "comment": "approved" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "MODULE_COORDINATOR_REVIEWED");

    let (status, body) = send(
        &app.router,
        json_request(
            "PUT",
            &uri,
            Some(&lab_coordinator),
            &json!({
                "action": "APPROVE",
                "comment": "slot confirmed",
                "approvedDate": "2025-06-01",
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "APPROVED");
    assert_eq!(body["approvedDate"], "2025-06-01");
    assert_eq!(body["labAdvisorRecommendation"], "ok");

    // Out-of-order review is a 400, not a silent overwrite.
    let (status, _) = send(
        &app.router,
        json_request(
            "PUT",
            &uri,
            Some(&advisor),
            &json!({ "action": "RECOMMEND", "comment": "again" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // An appeal against an approved request is invalid.
    let (status, body) = send(
        &app.router,
        json_request(
            "POST",
            "/api/appeals",
            Some(&student),
            &json!({ "requestId": id, "appealReason": "still unhappy" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("Invalid appeal"));
}

#[test_log::test(tokio::test)]
async fn appeal_flow_over_rest() {
    let app = test_app();
    seed_module(&app.store, "EE3350").await;
    let student = register(&app.router, "nadia", &[]).await;
    let admin = register(&app.router, "admin1", &["admin"]).await;

    let (_, created) = send(
        &app.router,
        json_request("POST", "/api/requests", Some(&student), &submission_body()),
    )
    .await;
    let id = created["id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app.router,
        json_request(
            "PUT",
            &format!("/api/requests/{id}"),
            Some(&admin),
            &json!({ "action": "REJECT", "reason": "insufficient grounds" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Only the owner may appeal.
    let (status, _) = send(
        &app.router,
        json_request(
            "POST",
            "/api/appeals",
            Some(&admin),
            &json!({ "requestId": id, "appealReason": "not mine" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, appeal) = send(
        &app.router,
        json_request(
            "POST",
            "/api/appeals",
            Some(&student),
            &json!({ "requestId": id, "appealReason": "new evidence" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(appeal["status"], "PENDING");
    let appeal_id = appeal["id"].as_str().unwrap().to_string();

    // The pending partition is admin-only.
    let (status, _) = send(&app.router, get_request("/api/appeals/pending", Some(&student))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, pending) =
        send(&app.router, get_request("/api/appeals/pending", Some(&admin))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pending.as_array().unwrap().len(), 1);

    // Quick-action approval: no comments supplied.
    let (status, reviewed) = send(
        &app.router,
        json_request(
            "POST",
            &format!("/api/appeals/{appeal_id}/review"),
            Some(&admin),
            &json!({ "decision": true }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reviewed["status"], "APPROVED");
    assert_eq!(reviewed["panelDecision"], "Approved via quick action");
    assert_eq!(reviewed["reviewedBy"], "admin1");

    // Second review conflicts.
    let (status, _) = send(
        &app.router,
        json_request(
            "POST",
            &format!("/api/appeals/{appeal_id}/review"),
            Some(&admin),
            &json!({ "decision": false, "comments": "round two" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, reviewed_list) =
        send(&app.router, get_request("/api/appeals/reviewed", Some(&admin))).await;
    assert_eq!(reviewed_list.as_array().unwrap().len(), 1);
}

#[test_log::test(tokio::test)]
async fn quick_action_rejection_over_rest() {
    let app = test_app();
    seed_module(&app.store, "EE3350").await;
    let student = register(&app.router, "nadia", &[]).await;
    let admin = register(&app.router, "admin1", &["admin"]).await;

    let (_, created) = send(
        &app.router,
        json_request("POST", "/api/requests", Some(&student), &submission_body()),
    )
    .await;
    let id = created["id"].as_str().unwrap().to_string();
    send(
        &app.router,
        json_request(
            "PUT",
            &format!("/api/requests/{id}"),
            Some(&admin),
            &json!({ "action": "REJECT", "reason": "insufficient grounds" }),
        ),
    )
    .await;
    let (_, appeal) = send(
        &app.router,
        json_request(
            "POST",
            "/api/appeals",
            Some(&student),
            &json!({ "requestId": id, "appealReason": "new evidence" }),
        ),
    )
    .await;
    let appeal_id = appeal["id"].as_str().unwrap().to_string();
    let review_uri = format!("/api/appeals/{appeal_id}/review");

    // An explicitly blank comment on rejection is refused.
    let (status, body) = send(
        &app.router,
        json_request(
            "POST",
            &review_uri,
            Some(&admin),
            &json!({ "decision": false, "comments": "   " }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("required"));

    // Omitting comments entirely is the quick action and gets canned text.
    let (status, reviewed) = send(
        &app.router,
        json_request(
            "POST",
            &review_uri,
            Some(&admin),
            &json!({ "decision": false }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reviewed["status"], "REJECTED");
    assert_eq!(reviewed["panelDecision"], "Rejected via quick action");
}

#[test_log::test(tokio::test)]
async fn appeal_attachments_are_validated_and_stored() {
    let app = test_app();
    seed_module(&app.store, "EE3350").await;
    let student = register(&app.router, "nadia", &[]).await;
    let admin = register(&app.router, "admin1", &["admin"]).await;

    let (_, created) = send(
        &app.router,
        json_request("POST", "/api/requests", Some(&student), &submission_body()),
    )
    .await;
    let id = created["id"].as_str().unwrap().to_string();
    send(
        &app.router,
        json_request(
            "PUT",
            &format!("/api/requests/{id}"),
            Some(&admin),
            &json!({ "action": "REJECT", "reason": "insufficient grounds" }),
        ),
    )
    .await;

    // References that no uploaded file backs are refused.
    let (status, body) = send(
        &app.router,
        json_request(
            "POST",
            "/api/appeals",
            Some(&student),
            &json!({
                "requestId": id,
                "appealReason": "new evidence",
                "attachments": ["missing.pdf"],
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(
        body["message"]
            .as_str()
            .unwrap()
            .contains("Attachment not found: missing.pdf")
    );

    std::fs::write(app._upload_dir.path().join("cert.pdf"), b"certificate").unwrap();
    let (status, appeal) = send(
        &app.router,
        json_request(
            "POST",
            "/api/appeals",
            Some(&student),
            &json!({
                "requestId": id,
                "appealReason": "new evidence",
                "attachments": ["cert.pdf"],
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(appeal["attachments"], json!(["cert.pdf"]));
}

#[test_log::test(tokio::test)]
async fn signup_keeps_profile_fields_and_disabled_accounts_cannot_sign_in() {
    let app = test_app();
    let admin = register(&app.router, "admin1", &["admin"]).await;

    let (status, _) = send(
        &app.router,
        json_request(
            "POST",
            "/api/auth/signup",
            None,
            &json!({
                "username": "nadia",
                "email": "nadia@eng.example.edu",
                "password": "hunter2!",
                "firstName": "Nadia",
                "lastName": "Perera",
                "studentNumber": "EN21-4417",
                "department": "Electrical Engineering",
                "semester": 5,
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let stored = app
        .store
        .find_user_by_username("nadia")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.first_name, "Nadia");
    assert_eq!(stored.last_name, "Perera");
    assert_eq!(stored.student_number.as_deref(), Some("EN21-4417"));
    assert_eq!(stored.department.as_deref(), Some("Electrical Engineering"));
    assert_eq!(stored.semester, Some(5));
    assert!(stored.enabled);

    let (status, fetched) = send(
        &app.router,
        get_request(&format!("/api/users/{}", stored.id.0), Some(&admin)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["firstName"], "Nadia");
    assert_eq!(fetched["studentNumber"], "EN21-4417");

    let (status, _) = send(
        &app.router,
        json_request(
            "PUT",
            &format!("/api/users/{}", stored.id.0),
            Some(&admin),
            &json!({ "enabled": false }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app.router,
        json_request(
            "POST",
            "/api/auth/signin",
            None,
            &json!({ "username": "nadia", "password": "hunter2!" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["message"].as_str().unwrap().contains("disabled"));
}

#[test_log::test(tokio::test)]
async fn only_students_may_upload() {
    let app = test_app();
    let advisor = register(&app.router, "advisor1", &["advisor"]).await;

    let boundary = "----relabtestboundary";
    let payload = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"note.pdf\"\r\n\
         Content-Type: application/pdf\r\n\r\n\
         medical certificate\r\n\
         --{boundary}--\r\n"
    );
    let request = Request::builder()
        .method("POST")
        .uri("/api/requests/upload")
        .header(header::AUTHORIZATION, format!("Bearer {advisor}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(payload))
        .unwrap();
    let (status, _) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[test_log::test(tokio::test)]
async fn inactive_module_refuses_requests() {
    let app = test_app();
    let now = Utc::now();
    app.store
        .insert_module(LabModule {
            id: ModuleId::new(),
            module_code: "EE3350".to_string(),
            module_name: "Electronics III".to_string(),
            department: "Electrical Engineering".to_string(),
            semester: 5,
            coordinator: "Dr. Silva".to_string(),
            lab_sessions: vec![],
            active: false,
            created_at: now,
            updated_at: now,
        })
        .await
        .unwrap();
    let student = register(&app.router, "nadia", &[]).await;

    let (status, body) = send(
        &app.router,
        json_request("POST", "/api/requests", Some(&student), &submission_body()),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("not accepting"));
}

#[test_log::test(tokio::test)]
async fn upload_and_download_round_trip() {
    let app = test_app();
    let student = register(&app.router, "nadia", &[]).await;

    let boundary = "----relabtestboundary";
    let payload = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"note.pdf\"\r\n\
         Content-Type: application/pdf\r\n\r\n\
         medical certificate\r\n\
         --{boundary}--\r\n"
    );
    let request = Request::builder()
        .method("POST")
        .uri("/api/requests/upload")
        .header(header::AUTHORIZATION, format!("Bearer {student}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(payload))
        .unwrap();
    let (status, body) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::OK);
    let reference = body["fileName"].as_str().unwrap().to_string();
    assert!(reference.ends_with(".pdf"));

    let response = app
        .router
        .clone()
        .oneshot(get_request(
            &format!("/api/requests/files/{reference}"),
            Some(&student),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"medical certificate");

    // Path-like references never resolve.
    let (status, _) = send(
        &app.router,
        get_request("/api/requests/files/..%2Fsecret", Some(&student)),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[test_log::test(tokio::test)]
async fn availability_over_rest() {
    let app = test_app();
    seed_module(&app.store, "EE3350").await;
    let student = register(&app.router, "nadia", &[]).await;

    for (kind, name) in [
        (ResourceKind::Instructor, "Dr. Silva"),
        (ResourceKind::LabRoom, "LR-204"),
        (ResourceKind::TeachingAssistant, "K. Fernando"),
    ] {
        app.store
            .insert_resource(Resource {
                id: ResourceId::new(),
                kind,
                name: name.to_string(),
                email: None,
                capacity: None,
                equipment: None,
                unavailable_dates: vec!["2025-05-01".parse().unwrap()],
                unavailable_time_slots: vec![TimeSlot::MorningFirst],
            })
            .await
            .unwrap();
    }

    // Blocked on date AND slot: not available.
    let (status, list) = send(
        &app.router,
        get_request(
            "/api/instructors/available?date=2025-05-01&timeSlot=08:30-10:30",
            Some(&student),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(list.as_array().unwrap().is_empty());

    // Same date, different slot: the conjunctive rule keeps them available.
    let (_, list) = send(
        &app.router,
        get_request(
            "/api/instructors/available?date=2025-05-01&timeSlot=10:30-12:30",
            Some(&student),
        ),
    )
    .await;
    assert_eq!(list.as_array().unwrap().len(), 1);

    let (status, report) = send(
        &app.router,
        get_request(
            "/api/resources/availability?moduleCode=EE3350&date=2025-05-01&timeSlot=08:30-10:30",
            Some(&student),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["available"], false);
    assert!(report["message"].as_str().unwrap().contains("Instructor not available."));

    let (_, report) = send(
        &app.router,
        get_request(
            "/api/resources/availability?moduleCode=EE3350&date=2025-05-02&timeSlot=08:30-10:30",
            Some(&student),
        ),
    )
    .await;
    assert_eq!(report["available"], true);
    assert_eq!(report["message"], "All resources available");
}
