use std::net::SocketAddr;

use anyhow::Result;
use axum::{
    body::{to_bytes, Body},
    http::{
        header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE},
        Request, StatusCode,
    },
    response::Response,
    Router,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chiacchiera_client::{AuthStore, CookieOptions};
use chiacchiera_server::{config::Config, routes::router, AppState};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::{
    matchers::{body_partial_json, header, header_regex, method, path},
    Mock, MockServer, ResponseTemplate,
};

const CONVERSATION_PATH: &str = "/api/collections/conversations/records/c1";

// Funzione di utilità per costruire un JWT (non firmato) con scadenza tra un'ora
fn jwt(subject: &str) -> String {
    let exp = time::OffsetDateTime::now_utc().unix_timestamp() + 3600;
    let payload = URL_SAFE_NO_PAD.encode(json!({ "id": subject, "exp": exp }).to_string());
    format!("eyJhbGciOiJIUzI1NiJ9.{payload}.signature")
}

fn user_record(id: &str) -> Value {
    json!({ "id": id, "username": format!("user-{id}"), "collectionName": "users" })
}

fn message(id: &str, user_id: &str) -> Value {
    json!({
        "id": id,
        "user_id": user_id,
        "content": format!("content {id}"),
        "contentType": "message",
        "created": "2025-11-02T10:00:00Z",
    })
}

fn conversation(messages: Vec<Value>, admins: &[&str]) -> Value {
    json!({
        "id": "c1",
        "name": "friends",
        "members": ["u1", "u2", "u9"],
        "admins": admins,
        "messages": messages,
        "message_photos": ["old.png"],
    })
}

struct Harness {
    server: MockServer,
    app: Router,
    user_token: String,
    admin_token: String,
}

impl Harness {
    async fn start() -> Result<Self> {
        let server = MockServer::start().await;
        let user_token = jwt("u1");
        let admin_token = jwt("a1");

        Mock::given(method("POST"))
            .and(path("/api/admins/auth-with-password"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "token": admin_token,
                "admin": { "id": "a1", "email": "root@example.com" },
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/collections/users/auth-refresh"))
            .and(header("Authorization", user_token.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "token": user_token,
                "record": user_record("u1"),
            })))
            .mount(&server)
            .await;

        let state = AppState::connect(config(&server)).await?;
        Ok(Self {
            app: router(state),
            server,
            user_token,
            admin_token,
        })
    }

    fn cookie(&self) -> String {
        session_cookie(&self.user_token, user_record("u1"))
    }

    async fn mock_conversation(&self, record: Value) {
        Mock::given(method("GET"))
            .and(path(CONVERSATION_PATH))
            .and(header("Authorization", self.user_token.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(record))
            .mount(&self.server)
            .await;
    }

    async fn mock_json_patch(&self, expected_calls: u64) {
        Mock::given(method("PATCH"))
            .and(path(CONVERSATION_PATH))
            .and(header("Authorization", self.admin_token.as_str()))
            .and(header_regex("content-type", "^application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "c1" })))
            .expect(expected_calls)
            .mount(&self.server)
            .await;
    }

    async fn send(&self, request: Request<Body>) -> Result<Response> {
        Ok(self.app.clone().oneshot(request).await?)
    }

    // Corpi delle PATCH ricevute dal backend, in ordine
    async fn patches(&self) -> Vec<wiremock::Request> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|request| request.method.as_str() == "PATCH")
            .collect()
    }
}

fn config(server: &MockServer) -> Config {
    Config {
        bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        pocketbase_url: server.uri(),
        admin_email: "root@example.com".to_string(),
        admin_password: "secret".to_string(),
        cookie: CookieOptions::default(),
    }
}

// Cookie `pb_auth=...` come lo rimanda il browser
fn session_cookie(token: &str, model: Value) -> String {
    let store = AuthStore::new();
    store.save(token, model);
    let set_cookie = store.export_to_cookie(&CookieOptions::default());
    set_cookie.split(';').next().unwrap_or_default().to_string()
}

fn form(uri: &str, body: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header(COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).expect("valid request")
}

fn photo_upload(uri: &str, cookie: &str, data: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        b"--XBOUNDARY\r\nContent-Disposition: form-data; name=\"photo\"; filename=\"cat.png\"\r\nContent-Type: image/png\r\n\r\n",
    );
    body.extend_from_slice(data);
    body.extend_from_slice(b"\r\n--XBOUNDARY--\r\n");

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(CONTENT_TYPE, "multipart/form-data; boundary=XBOUNDARY")
        .header(COOKIE, cookie)
        .body(Body::from(body))
        .expect("valid request")
}

fn location(response: &Response) -> Option<&str> {
    response.headers().get(LOCATION)?.to_str().ok()
}

async fn json_body(response: Response) -> Result<Value> {
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

// Test che verifica che senza sessione admin il server non parta
#[tokio::test]
async fn startup_fails_without_admin_session() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/admins/auth-with-password"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "code": 400,
            "message": "Failed to authenticate.",
            "data": {},
        })))
        .mount(&server)
        .await;

    assert!(AppState::connect(config(&server)).await.is_err());
    Ok(())
}

// Test che verifica che l'health check risponda senza toccare la sessione
#[tokio::test]
async fn health_is_ok() -> Result<()> {
    let harness = Harness::start().await?;
    let response = harness
        .send(Request::get("/health").body(Body::empty())?)
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(SET_COOKIE).is_none());
    Ok(())
}

// Test che verifica l'invio di un messaggio in una conversazione vuota
#[tokio::test]
async fn send_message_into_empty_conversation() -> Result<()> {
    let harness = Harness::start().await?;
    harness.mock_conversation(conversation(vec![], &["u9"])).await;
    harness.mock_json_patch(1).await;

    let cookie = harness.cookie();
    let response = harness
        .send(form("/c1/sendMessage", "message=hello", Some(&cookie)))
        .await?;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/c1"));
    let set_cookie = response.headers().get(SET_COOKIE).expect("session cookie").to_str()?;
    assert!(set_cookie.starts_with("pb_auth="));
    assert!(set_cookie.contains(&harness.user_token));

    let patches = harness.patches().await;
    assert_eq!(patches.len(), 1);
    let body: Value = patches[0].body_json()?;
    let messages = body["messages"].as_array().expect("messages array");
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["content"], "hello");
    assert_eq!(messages[0]["contentType"], "message");
    assert_eq!(messages[0]["user_id"], "u1");
    assert!(body.get("message_photos-").is_none());
    Ok(())
}

// Test che verifica gli errori di validazione del messaggio
#[tokio::test]
async fn send_message_validation_errors() -> Result<()> {
    let harness = Harness::start().await?;
    harness.mock_json_patch(0).await;
    let cookie = harness.cookie();

    let response = harness
        .send(form("/c1/sendMessage", "message=", Some(&cookie)))
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await?, json!({ "error": "Message cannot be empty" }));

    let response = harness
        .send(form("/c1/sendMessage", "other=1", Some(&cookie)))
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await?, json!({ "error": "Invalid message" }));
    Ok(())
}

// Test che verifica che una conversazione non visibile all'utente sia "non trovata"
#[tokio::test]
async fn send_message_to_missing_conversation() -> Result<()> {
    let harness = Harness::start().await?;
    Mock::given(method("GET"))
        .and(path("/api/collections/conversations/records/nope"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "code": 404,
            "message": "The requested resource wasn't found.",
            "data": {},
        })))
        .mount(&harness.server)
        .await;

    let cookie = harness.cookie();
    let response = harness
        .send(form("/nope/sendMessage", "message=hi", Some(&cookie)))
        .await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await?, json!({ "error": "Conversation not found" }));
    Ok(())
}

// Test che verifica che un errore del backend in scrittura diventi un 500 generico
#[tokio::test]
async fn backend_failure_is_reported_generically() -> Result<()> {
    let harness = Harness::start().await?;
    harness.mock_conversation(conversation(vec![], &["u9"])).await;
    Mock::given(method("PATCH"))
        .and(path(CONVERSATION_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("database is locked"))
        .mount(&harness.server)
        .await;

    let cookie = harness.cookie();
    let response = harness
        .send(form("/c1/sendMessage", "message=hello", Some(&cookie)))
        .await?;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await?;
    assert!(!body["error"].as_str().unwrap_or_default().contains("database"));
    Ok(())
}

// Test che verifica l'invio di una foto in una conversazione già piena
#[tokio::test]
async fn send_image_into_full_conversation() -> Result<()> {
    let harness = Harness::start().await?;
    let full: Vec<Value> = (0..50).map(|i| message(&format!("m{i}"), "u2")).collect();
    harness.mock_conversation(conversation(full, &["u9"])).await;

    let mut uploaded = conversation(vec![], &["u9"]);
    uploaded["message_photos"] = json!(["old.png", "cat_k3v9x2.png"]);
    Mock::given(method("PATCH"))
        .and(path(CONVERSATION_PATH))
        .and(header("Authorization", harness.admin_token.as_str()))
        .and(header_regex("content-type", "^multipart/form-data"))
        .respond_with(ResponseTemplate::new(200).set_body_json(uploaded))
        .expect(1)
        .mount(&harness.server)
        .await;
    harness.mock_json_patch(1).await;

    let cookie = harness.cookie();
    let response = harness
        .send(photo_upload("/c1/sendImage", &cookie, b"\x89PNG fake image"))
        .await?;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/c1"));

    let patches = harness.patches().await;
    assert_eq!(patches.len(), 2);
    let upload = String::from_utf8_lossy(&patches[0].body).to_string();
    assert!(upload.contains("name=\"message_photos+\""));
    assert!(upload.contains("PNG fake image"));

    let body: Value = patches[1].body_json()?;
    let messages = body["messages"].as_array().expect("messages array");
    assert_eq!(messages.len(), 50);
    assert_eq!(messages[0]["contentType"], "image");
    assert_eq!(messages[0]["content"], "cat_k3v9x2.png");
    assert_eq!(messages[0]["user_id"], "u1");
    assert_eq!(messages[1]["id"], "m0");
    assert_eq!(messages[49]["id"], "m48");
    Ok(())
}

// Test che verifica che una foto vuota venga rifiutata prima di chiamare il backend
#[tokio::test]
async fn send_empty_image_is_invalid() -> Result<()> {
    let harness = Harness::start().await?;
    harness.mock_json_patch(0).await;

    let cookie = harness.cookie();
    let response = harness.send(photo_upload("/c1/sendImage", &cookie, b"")).await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await?, json!({ "error": "Invalid message" }));
    Ok(())
}

// Test che verifica che chi non è admin né autore non possa rimuovere il messaggio
#[tokio::test]
async fn remove_message_of_someone_else_is_forbidden() -> Result<()> {
    let harness = Harness::start().await?;
    harness
        .mock_conversation(conversation(vec![message("m1", "u2")], &["u9"]))
        .await;
    harness.mock_json_patch(0).await;

    let cookie = harness.cookie();
    let response = harness
        .send(form("/c1/removeMessage", "message-id=m1", Some(&cookie)))
        .await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await?,
        json!({ "error": "User does not have the permission to remove this message" })
    );
    assert!(harness.patches().await.is_empty());
    Ok(())
}

// Test che verifica che rimuovendo una propria foto venga tolto anche il file
#[tokio::test]
async fn remove_own_image_drops_the_file() -> Result<()> {
    let harness = Harness::start().await?;
    let mut image = message("m1", "u1");
    image["contentType"] = json!("image");
    image["content"] = json!("old.png");
    harness
        .mock_conversation(conversation(vec![message("m2", "u2"), image], &["u9"]))
        .await;
    harness.mock_json_patch(1).await;

    let cookie = harness.cookie();
    let response = harness
        .send(form("/c1/removeMessage", "message-id=m1", Some(&cookie)))
        .await?;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/c1"));

    let body: Value = harness.patches().await[0].body_json()?;
    assert_eq!(body["message_photos-"], json!(["old.png"]));
    let ids: Vec<&str> = body["messages"]
        .as_array()
        .expect("messages array")
        .iter()
        .filter_map(|m| m["id"].as_str())
        .collect();
    assert_eq!(ids, ["m2"]);
    Ok(())
}

// Test che verifica che un admin possa rimuovere messaggi altrui ma non id inesistenti
#[tokio::test]
async fn admin_removes_and_unknown_id_is_not_found() -> Result<()> {
    let harness = Harness::start().await?;
    harness
        .mock_conversation(conversation(vec![message("m1", "u2")], &["u1"]))
        .await;
    harness.mock_json_patch(1).await;
    let cookie = harness.cookie();

    let response = harness
        .send(form("/c1/removeMessage", "message-id=nope", Some(&cookie)))
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await?, json!({ "error": "Message not found" }));

    let response = harness
        .send(form("/c1/removeMessage", "message-id=m1", Some(&cookie)))
        .await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let response = harness
        .send(form("/c1/removeMessage", "message-id=", Some(&cookie)))
        .await?;
    assert_eq!(json_body(response).await?, json!({ "error": "Invalid message id" }));
    Ok(())
}

// Test che verifica che un messaggio illeggibile non blocchi le action sulla conversazione
#[tokio::test]
async fn conversation_with_unreadable_message_still_works() -> Result<()> {
    let harness = Harness::start().await?;
    let mut sticker = message("m2", "u2");
    sticker["contentType"] = json!("sticker");
    harness
        .mock_conversation(conversation(vec![message("m1", "u1"), sticker], &["u9"]))
        .await;
    harness.mock_json_patch(1).await;

    let cookie = harness.cookie();
    let response = harness
        .send(form("/c1/removeMessage", "message-id=m1", Some(&cookie)))
        .await?;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let body: Value = harness.patches().await[0].body_json()?;
    assert_eq!(body["messages"], json!([]));
    Ok(())
}

// Test che verifica che senza sessione le action rimandino al login
#[tokio::test]
async fn actions_without_session_redirect_to_login() -> Result<()> {
    let harness = Harness::start().await?;
    harness.mock_json_patch(0).await;

    let response = harness
        .send(form("/c1/sendMessage", "message=hello", None))
        .await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/login"));

    // token che il backend rifiuta al refresh: la sessione viene svuotata
    let stranger = session_cookie(&jwt("u7"), user_record("u7"));
    let response = harness
        .send(form("/c1/removeMessage", "message-id=m1", Some(&stranger)))
        .await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/login"));
    let set_cookie = response.headers().get(SET_COOKIE).expect("cookie cleared").to_str()?;
    assert!(set_cookie.contains("Thu, 01 Jan 1970 00:00:00 GMT"));
    Ok(())
}

// Test che verifica il sign-out con e senza sessione
#[tokio::test]
async fn signout_clears_the_session() -> Result<()> {
    let harness = Harness::start().await?;

    let response = harness.send(form("/signout", "", None)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await?, json!({}));

    let cookie = harness.cookie();
    let response = harness.send(form("/signout", "", Some(&cookie))).await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/signup"));
    let set_cookie = response.headers().get(SET_COOKIE).expect("cookie cleared").to_str()?;
    assert!(set_cookie.contains("Thu, 01 Jan 1970 00:00:00 GMT"));
    assert!(!set_cookie.contains(&harness.user_token));
    Ok(())
}

// Test che verifica il login con credenziali giuste e sbagliate
#[tokio::test]
async fn login_sets_cookie_or_reports_invalid_credentials() -> Result<()> {
    let harness = Harness::start().await?;
    Mock::given(method("POST"))
        .and(path("/api/collections/users/auth-with-password"))
        .and(body_partial_json(json!({ "identity": "alice", "password": "right" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": harness.user_token,
            "record": user_record("u1"),
        })))
        .mount(&harness.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/collections/users/auth-with-password"))
        .and(body_partial_json(json!({ "password": "wrong" })))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "code": 400,
            "message": "Failed to authenticate.",
            "data": {},
        })))
        .mount(&harness.server)
        .await;

    let response = harness
        .send(form("/login", "identity=alice&password=right", None))
        .await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/"));
    let set_cookie = response.headers().get(SET_COOKIE).expect("session cookie").to_str()?;
    assert!(set_cookie.contains(&harness.user_token));
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("Secure"));

    let response = harness
        .send(form("/login", "identity=alice&password=wrong", None))
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await?, json!({ "error": "Invalid credentials" }));
    Ok(())
}

// Test che verifica la registrazione: validazione locale, creazione e login
#[tokio::test]
async fn signup_creates_user_and_signs_in() -> Result<()> {
    let harness = Harness::start().await?;
    Mock::given(method("POST"))
        .and(path("/api/collections/users/records"))
        .and(body_partial_json(json!({
            "username": "alice",
            "email": "alice@example.com",
            "passwordConfirm": "secret123",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_record("u1")))
        .expect(1)
        .mount(&harness.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/collections/users/auth-with-password"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": harness.user_token,
            "record": user_record("u1"),
        })))
        .mount(&harness.server)
        .await;

    let response = harness
        .send(form(
            "/signup",
            "username=alice&email=alice%40example.com&password=secret123&passwordConfirm=other",
            None,
        ))
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await?, json!({ "error": "Passwords do not match" }));

    let response = harness
        .send(form(
            "/signup",
            "username=alice&email=alice%40example.com&password=secret123&passwordConfirm=secret123",
            None,
        ))
        .await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/"));
    let set_cookie = response.headers().get(SET_COOKIE).expect("session cookie").to_str()?;
    assert!(set_cookie.contains(&harness.user_token));
    Ok(())
}

// Test che verifica che un content type non valido sia un errore di input e non del backend
#[test]
fn photo_with_unparsable_content_type_is_invalid() {
    use chiacchiera_server::{controllers::photo_part, error::ActionError};

    let result = photo_part("cat.png".to_string(), Some("not a mime type"), b"png".to_vec());
    let err = result.err().expect("content type rejected");
    assert!(matches!(err, ActionError::InvalidMessage));
    assert_eq!(err.status(), StatusCode::BAD_REQUEST);

    assert!(photo_part("cat.png".to_string(), Some("image/png"), b"png".to_vec()).is_ok());
    assert!(photo_part("cat.png".to_string(), None, b"png".to_vec()).is_ok());
}
