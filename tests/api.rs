//! HTTP API tests
//!
//! Drive the full router in-process with a fake portal: login, task
//! lifecycle, status shape and error envelopes.

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use course_runner::portal::{
    CourseContext, CourseInfo, CourseUnits, PortalClient, PortalResult, UnitInfo, UserInfo,
};
use course_runner::session::Credentials;
use course_runner::{build_router, AppContext, ServerConfig};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

const GOOD_COOKIES: &str = "ASP.NET_SessionId=abc; .ASPXAUTH=def";

struct FakePortal;

#[async_trait]
impl PortalClient for FakePortal {
    async fn validate(&self, credentials: &Credentials) -> PortalResult<bool> {
        Ok(credentials.get(".ASPXAUTH") == Some("def"))
    }

    async fn user_info(&self, _credentials: &Credentials) -> PortalResult<UserInfo> {
        Ok(UserInfo {
            username: Some("s1024".to_string()),
            name: Some("Li Hua".to_string()),
            student_id: Some("20240001".to_string()),
            school: None,
            birth_year: None,
        })
    }

    async fn courses(&self, _credentials: &Credentials) -> PortalResult<Vec<CourseInfo>> {
        Ok(vec![CourseInfo {
            cid: "1042".to_string(),
            name: "Integrated English".to_string(),
            per: 35,
        }])
    }

    async fn lessons(&self, _credentials: &Credentials, cid: &str) -> PortalResult<CourseUnits> {
        Ok(CourseUnits {
            context: CourseContext {
                cid: cid.to_string(),
                uid: "77".to_string(),
                classid: "c-9".to_string(),
            },
            units: vec![UnitInfo {
                unitname: "Unit 1".to_string(),
                name: "Campus life".to_string(),
                visible: "true".to_string(),
            }],
        })
    }
}

struct TestApp {
    _dir: TempDir,
    ctx: Arc<AppContext>,
    router: Router,
}

impl TestApp {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig {
            session_config_path: dir.path().join("config.json"),
            log_directory: dir.path().join("logs"),
            bounded_task_steps: 1000,
            bounded_step_delay_ms: 20,
            duration_tick_ms: 10,
            ..ServerConfig::default()
        };
        let ctx = Arc::new(AppContext::new(config, Arc::new(FakePortal)));
        let router = build_router(ctx.clone());
        Self {
            _dir: dir,
            ctx,
            router,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }

    async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(
            Request::post(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    async fn login(&self) {
        let (status, body) = self
            .post("/api/login", json!({ "cookies": GOOD_COOKIES }))
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);
    }
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new();
    let (status, body) = app.get("/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["authenticated"], false);
    assert_eq!(body["task_status"], "not_authenticated");
}

#[tokio::test]
async fn test_login_success_and_failure() {
    let app = TestApp::new();

    let (status, body) = app
        .post("/api/login", json!({ "cookies": "ASP.NET_SessionId=abc; .ASPXAUTH=nope" }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert!(!app.ctx.session.is_authenticated());

    let (status, body) = app.post("/api/login", json!({ "cookies": "" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, body) = app
        .post("/api/login", json!({ "cookies": GOOD_COOKIES }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(body["message"].as_str().unwrap().contains("Li Hua"));

    let (_, status_body) = app.get("/api/status").await;
    assert_eq!(status_body["status"], "idle");
}

#[tokio::test]
async fn test_start_requires_login() {
    let app = TestApp::new();

    let (status, body) = app
        .post("/api/startTask", json!({ "type": "brain_burst", "unitIndex": 0 }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "NotAuthenticated");
}

#[tokio::test]
async fn test_start_unknown_type() {
    let app = TestApp::new();
    app.login().await;

    let (status, body) = app
        .post("/api/startTask", json!({ "type": "speedrun", "unitIndex": 0 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "UnknownKind");
}

#[tokio::test]
async fn test_single_flight_and_stop() {
    let app = TestApp::new();
    app.login().await;

    let (status, body) = app
        .post("/api/startTask", json!({ "type": "brain_burst", "unitIndex": 0 }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, body) = app
        .post(
            "/api/startTask",
            json!({ "type": "away_from_keyboard", "unitIndex": 0, "params": 5 }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "AlreadyRunning");

    // Progress starts at (0, 0) until the worker reports its ceiling
    let mut body = Value::Null;
    for _ in 0..100 {
        body = app.get("/api/status").await.1;
        if body["progress"]["total"] == 1000 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(body["status"], "brain_burst");
    assert_eq!(body["progress"]["total"], 1000);
    assert_eq!(body["activeThreads"], 1);

    let (status, body) = app.post("/api/stop", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (_, body) = app.get("/api/status").await;
    assert_eq!(body["status"], "idle");
    assert_eq!(body["progress"]["current"], 0);
    assert_eq!(body["progress"]["total"], 0);
    assert_eq!(body["activeThreads"], 0);
}

#[tokio::test]
async fn test_duration_task_completes() {
    let app = TestApp::new();
    app.login().await;

    let (status, _) = app
        .post(
            "/api/startTask",
            json!({ "type": "away_from_keyboard", "unitIndex": 0, "params": [3, 3] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let mut body = Value::Null;
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        body = app.get("/api/status").await.1;
        if body["status"] == "completed" {
            break;
        }
    }
    assert_eq!(body["status"], "completed");
    assert_eq!(body["progress"]["current"], 3);
    assert_eq!(body["progress"]["total"], 3);

    // A finished task holds the slot until it is stopped
    let (status, _) = app
        .post("/api/startTask", json!({ "type": "brain_burst", "unitIndex": 0 }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_invalid_duration_range() {
    let app = TestApp::new();
    app.login().await;

    let (status, body) = app
        .post(
            "/api/startTask",
            json!({ "type": "away_from_keyboard", "unitIndex": 0, "params": [9, 2] }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "InvalidParams");

    let (_, body) = app.get("/api/status").await;
    assert_eq!(body["status"], "idle");
}

#[tokio::test]
async fn test_logout_resets_everything() {
    let app = TestApp::new();
    app.login().await;
    app.post("/api/startTask", json!({ "type": "brain_burst", "unitIndex": 0 }))
        .await;

    let (status, _) = app.post("/api/logout", json!({})).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.get("/api/status").await;
    assert_eq!(body["status"], "not_authenticated");
    assert_eq!(body["activeThreads"], 0);

    let (status, _) = app.get("/api/getCourses").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_user_info_before_and_after_login() {
    let app = TestApp::new();

    let (status, body) = app.get("/api/getUserInfo").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["name"].is_null());
    assert!(body["studentId"].is_null());

    app.login().await;
    let (_, body) = app.get("/api/getUserInfo").await;
    assert_eq!(body["name"], "Li Hua");
    assert_eq!(body["studentId"], "20240001");
    assert!(body["school"].is_null());
}

#[tokio::test]
async fn test_courses_and_lessons() {
    let app = TestApp::new();
    app.login().await;

    let (status, body) = app.get("/api/getCourses").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["courses"][0]["cid"], "1042");

    let (status, body) = app.get("/api/getLessons?cid=1042").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["lessons"][0]["unitname"], "Unit 1");
    assert_eq!(
        app.ctx.session.course_context().map(|c| c.uid),
        Some("77".to_string())
    );
}

#[tokio::test]
async fn test_requests_are_access_logged() {
    let app = TestApp::new();
    app.get("/api/status").await;

    let (status, body) = app.get("/api/logs?limit=10").await;
    assert_eq!(status, StatusCode::OK);
    let logs = body["logs"].as_array().unwrap();
    assert!(logs
        .iter()
        .any(|entry| entry["category"] == "ACCESS"
            && entry["message"].as_str().unwrap().contains("\"GET /api/status\" 200")));
}

#[tokio::test]
async fn test_progress_stream_is_event_stream() {
    let app = TestApp::new();
    let response = app
        .router
        .clone()
        .oneshot(
            Request::get("/api/progress/stream")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/event-stream"
    );
}

#[tokio::test]
async fn test_start_without_type_is_json_envelope() {
    let app = TestApp::new();
    app.login().await;

    let (status, body) = app
        .post("/api/startTask", json!({ "unitIndex": 0 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "InvalidRequest");
    assert!(body["message"].as_str().unwrap().contains("type"));

    let (_, body) = app.get("/api/status").await;
    assert_eq!(body["status"], "idle");
}

#[tokio::test]
async fn test_login_with_invalid_body_is_json_envelope() {
    let app = TestApp::new();

    let (status, body) = app
        .send(
            Request::post("/api/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("cookies=abc"))
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "InvalidRequest");
}

#[tokio::test]
async fn test_lessons_without_cid_is_json_envelope() {
    let app = TestApp::new();
    app.login().await;

    let (status, body) = app.get("/api/getLessons").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "InvalidRequest");
    assert!(body["message"].as_str().unwrap().contains("cid"));
}

#[tokio::test]
async fn test_progress_stream_ends_on_shutdown() {
    let app = TestApp::new();
    app.login().await;
    app.post("/api/startTask", json!({ "type": "brain_burst", "unitIndex": 0 }))
        .await;

    let response = app
        .router
        .clone()
        .oneshot(
            Request::get("/api/progress/stream")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    app.ctx.begin_shutdown().await;

    let bytes = tokio::time::timeout(
        Duration::from_secs(3),
        to_bytes(response.into_body(), usize::MAX),
    )
    .await
    .expect("event stream should close once shutdown begins")
    .unwrap();
    let text = String::from_utf8_lossy(&bytes);
    assert!(text.contains("event: status"));
    assert_eq!(app.ctx.tasks.status(), course_runner::TaskStatus::Idle);
}
