#![allow(clippy::unwrap_used, clippy::expect_used)]

use crucial_auth::{
    APP_USER_AGENT,
    api::{DEFAULT_REQUEST_TIMEOUT, HttpTransport, RequestDescriptor, Transport},
    challenge::{
        Brightness, ChallengeDevices, ChallengeSession, ChallengeState, DEFAULT_VERIFY_PATH,
        FileCamera, HttpFaceVerifier, SoftwareBrightness, VerificationError,
    },
    cli::{
        actions::invoke::{Args, invoke},
        commands,
    },
    crucial::{ChannelPresenter, CrucialAuthManager, CrucialClient, PresenterEvent},
};
use serde_json::json;
use std::{net::TcpListener, path::PathBuf, sync::Arc, time::Duration};
use tokio::{sync::mpsc::UnboundedReceiver, time::timeout};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn can_bind_localhost() -> bool {
    TcpListener::bind("127.0.0.1:0").is_ok()
}

fn face_file() -> PathBuf {
    let path = std::env::temp_dir().join(format!("crucial-flow-{}.jpg", ulid::Ulid::new()));
    std::fs::write(&path, b"face").unwrap();
    path
}

/// Backend that demands verification for `/api/secure-action` until the marker is sent.
async fn backend(verify_status: u16, verify_body: serde_json::Value) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/secure-action"))
        .and(header("x-crucial-verified", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"done": true})))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/secure-action"))
        .respond_with(
            ResponseTemplate::new(403).set_body_json(json!({"error": "CRUCIAL_AUTH_REQUIRED"})),
        )
        .with_priority(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(DEFAULT_VERIFY_PATH))
        .and(body_partial_json(json!({"image": "ZmFjZQ==", "mime_type": "image/jpeg"})))
        .respond_with(ResponseTemplate::new(verify_status).set_body_json(verify_body))
        .mount(&server)
        .await;
    server
}

struct Stack {
    client: CrucialClient,
    events: UnboundedReceiver<PresenterEvent>,
    devices: ChallengeDevices,
    brightness: Arc<SoftwareBrightness>,
}

fn stack(server: &MockServer, capture: PathBuf) -> Stack {
    let transport: Arc<dyn Transport> = Arc::new(
        HttpTransport::new(&server.uri(), APP_USER_AGENT, DEFAULT_REQUEST_TIMEOUT).unwrap(),
    );
    let (presenter, events) = ChannelPresenter::new();
    let manager = CrucialAuthManager::new(transport.clone(), Arc::new(presenter));
    let brightness = Arc::new(SoftwareBrightness::new(0.3));
    Stack {
        client: CrucialClient::new(transport.clone(), manager),
        events,
        devices: ChallengeDevices {
            camera: Arc::new(FileCamera::new(capture)),
            verifier: Arc::new(HttpFaceVerifier::new(transport, DEFAULT_VERIFY_PATH)),
            brightness: brightness.clone(),
        },
        brightness,
    }
}

async fn next_event(events: &mut UnboundedReceiver<PresenterEvent>) -> PresenterEvent {
    timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("presenter event")
        .expect("presenter open")
}

#[tokio::test]
async fn secure_action_is_replayed_after_face_verification() {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return;
    }
    let server = backend(200, json!({"message": "Crucial access granted!"})).await;
    let capture = face_file();
    let mut stack = stack(&server, capture.clone());

    let call = tokio::spawn({
        let client = stack.client.clone();
        async move { client.send(RequestDescriptor::post("/api/secure-action")).await }
    });

    let PresenterEvent::Present(prompt) = next_event(&mut stack.events).await else {
        panic!("expected a challenge prompt");
    };
    let generation = prompt.generation();
    let session = ChallengeSession::open(prompt, &stack.devices);
    assert!((stack.brightness_level() - 1.0).abs() < f32::EPSILON);

    assert_eq!(session.request_permission().await, Ok(ChallengeState::Ready));
    let receipt = session.verify().await.unwrap();
    assert_eq!(receipt.message, "Crucial access granted!");

    let response = call.await.unwrap().unwrap();
    assert_eq!(response.body, json!({"done": true}));
    assert!(!stack.client.manager().is_pending());
    assert!((stack.brightness_level() - 0.3).abs() < f32::EPSILON);

    assert!(matches!(
        next_event(&mut stack.events).await,
        PresenterEvent::Dismiss { generation: dismissed } if dismissed == generation
    ));

    let _ = std::fs::remove_file(capture);
}

#[tokio::test]
async fn rejected_face_keeps_request_pending_until_cancel() {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return;
    }
    let server = backend(401, json!({"message": "Face does not match"})).await;
    let capture = face_file();
    let mut stack = stack(&server, capture.clone());

    let call = tokio::spawn({
        let client = stack.client.clone();
        async move { client.send(RequestDescriptor::post("/api/secure-action")).await }
    });

    let PresenterEvent::Present(prompt) = next_event(&mut stack.events).await else {
        panic!("expected a challenge prompt");
    };
    let session = ChallengeSession::open(prompt, &stack.devices);
    session.request_permission().await.unwrap();

    assert_eq!(
        session.verify().await,
        Err(VerificationError::Rejected("Face does not match".to_string()))
    );
    assert_eq!(session.state(), ChallengeState::Ready);
    assert!(stack.client.manager().is_pending());
    assert!(!call.is_finished());

    assert!(session.cancel());
    let err = call.await.unwrap().unwrap_err();
    assert!(err.is_cancelled());
    assert!(!stack.client.manager().is_pending());
    assert!((stack.brightness_level() - 0.3).abs() < f32::EPSILON);

    let _ = std::fs::remove_file(capture);
}

#[tokio::test]
async fn command_line_flow_verifies_from_console_input() {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return;
    }
    let server = backend(200, json!({"message": "Crucial access granted!"})).await;
    let capture = face_file();
    let capture_arg = capture.display().to_string();

    let matches = temp_env::with_vars(
        [
            ("CRUCIAL_API_BASE_URL", Some(server.uri())),
            ("CRUCIAL_CAPTURE", Some(capture_arg)),
            ("CRUCIAL_ACCESS_TOKEN", None),
            ("CRUCIAL_VERIFY_PATH", None),
        ],
        || commands::new().get_matches_from(["crucial-auth", "--path", "/api/secure-action"]),
    );
    let args = Args {
        api: commands::api::Options::parse(&matches).unwrap(),
        challenge: commands::challenge::Options::parse(&matches).unwrap(),
    };

    let mut console = Vec::new();
    let response = invoke(args, &b"\n"[..], &mut console).await.unwrap();
    assert_eq!(response.body, json!({"done": true}));

    let console = String::from_utf8(console).unwrap();
    assert!(console.contains("Verify it's you"));
    assert!(console.contains("Crucial access granted!"));

    let _ = std::fs::remove_file(capture);
}

impl Stack {
    fn brightness_level(&self) -> f32 {
        self.brightness.level()
    }
}
