use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::{
    db::{MemStorage, Storage, StorageError},
    handler::{build_router, AppState, CONTACT_CREATED, QUOTE_CREATED},
    schema::Validated,
    submission::{Contact, NewContact, NewQuote, Quote},
};

struct BrokenStorage;

#[async_trait]
impl Storage for BrokenStorage {
    async fn create_quote(&self, _: Validated<NewQuote>) -> Result<Quote, StorageError> {
        Err(StorageError::Unavailable("connection pool exhausted at 10.0.0.7".into()))
    }

    async fn get_quotes(&self) -> Result<Vec<Quote>, StorageError> {
        Err(StorageError::Unavailable("connection pool exhausted at 10.0.0.7".into()))
    }

    async fn create_contact(&self, _: Validated<NewContact>) -> Result<Contact, StorageError> {
        Err(StorageError::Unavailable("connection pool exhausted at 10.0.0.7".into()))
    }

    async fn get_contacts(&self) -> Result<Vec<Contact>, StorageError> {
        Err(StorageError::Unavailable("connection pool exhausted at 10.0.0.7".into()))
    }
}

fn app(storage: Arc<dyn Storage>) -> Router {
    build_router(AppState::new(storage))
}

async fn call(app: Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).method(method);
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap())),
        None => request.body(Body::empty()),
    }
    .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);
    (status, body)
}

fn jane(email: &str, phone: &str) -> Value {
    json!({
        "name": "Jane",
        "email": email,
        "phone": phone,
        "message": "hi",
        "service": "web-development"
    })
}

fn quote_body() -> Value {
    json!({
        "firstName": "Arjun",
        "lastName": "Mehta",
        "email": "arjun@startup.in",
        "phone": "+91 9123456780",
        "service": "backend-services",
        "message": "We need an API for our logistics app"
    })
}

#[tokio::test]
async fn test_health_endpoint() {
    let storage = Arc::new(MemStorage::new());
    let response = app(storage)
        .oneshot(
            Request::builder()
                .uri("/health")
                .method(Method::GET)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body_bytes[..], b"Status: OK");
}

#[tokio::test]
async fn test_contact_with_disposable_email_is_rejected() {
    let storage = Arc::new(MemStorage::new());
    let (status, body) = call(
        app(storage.clone()),
        Method::POST,
        "/api/contacts",
        Some(jane("jane@mailinator.com", "+919876543210")),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Invalid form data");
    let errors = body["errors"].as_array().unwrap();
    assert!(errors
        .iter()
        .any(|e| e["field"] == "email" && e["code"] == "disposable_domain"));
    assert!(storage.get_contacts().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_contact_is_created() {
    let storage = Arc::new(MemStorage::new());
    let (status, body) = call(
        app(storage.clone()),
        Method::POST,
        "/api/contacts",
        Some(jane("jane@gmail.com", "9876543210")),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], CONTACT_CREATED);
    assert!(body["data"]["id"].is_string());
    assert!(body["data"]["createdAt"].is_string());
    assert_eq!(body["data"]["phone"], "9876543210");
    assert!(body.get("errors").is_none());

    let stored = storage.get_contacts().await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id.to_string(), body["data"]["id"].as_str().unwrap());
}

#[tokio::test]
async fn test_server_reports_every_invalid_field() {
    let storage = Arc::new(MemStorage::new());
    let (status, body) = call(
        app(storage.clone()),
        Method::POST,
        "/api/contacts",
        Some(json!({ "name": "  ", "email": "not-an-email", "phone": "0123456789" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let fields: Vec<&str> = body["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, ["name", "email", "phone", "service", "message"]);
    assert_eq!(body["errors"][1]["message"], "Invalid email address");
    assert_eq!(body["errors"][2]["message"], "Please enter a valid phone number");
    assert!(storage.get_contacts().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_quote_fields_are_named() {
    let storage = Arc::new(MemStorage::new());
    for field in ["firstName", "lastName", "email", "service", "message"] {
        let mut payload = quote_body();
        payload.as_object_mut().unwrap().remove(field);

        let (status, body) =
            call(app(storage.clone()), Method::POST, "/api/quotes", Some(payload)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST, "{field}");
        assert!(body["errors"]
            .as_array()
            .unwrap()
            .iter()
            .any(|e| e["field"] == field && e["code"] == "required"));
    }
    assert!(storage.get_quotes().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_quote_without_phone_is_accepted() {
    let storage = Arc::new(MemStorage::new());
    let mut payload = quote_body();
    payload.as_object_mut().unwrap().remove("phone");

    let (status, body) = call(app(storage), Method::POST, "/api/quotes", Some(payload)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], QUOTE_CREATED);
    assert!(body["data"]["phone"].is_null());
}

#[tokio::test]
async fn test_client_supplied_id_is_rejected() {
    let storage = Arc::new(MemStorage::new());
    let mut payload = quote_body();
    payload["id"] = json!("00000000-0000-0000-0000-000000000001");
    payload["createdAt"] = json!("2020-01-01T00:00:00Z");

    let (status, body) =
        call(app(storage.clone()), Method::POST, "/api/quotes", Some(payload)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["errors"][0]["field"], "body");
    assert_eq!(body["errors"][0]["code"], "malformed_body");
    assert!(storage.get_quotes().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_wrongly_typed_body_is_rejected() {
    let storage = Arc::new(MemStorage::new());
    let (status, body) = call(
        app(storage),
        Method::POST,
        "/api/contacts",
        Some(json!({ "name": 42, "email": ["jane@gmail.com"] })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid form data");
}

#[tokio::test]
async fn test_identical_quotes_are_both_listed() {
    let storage = Arc::new(MemStorage::new());
    let (_, first) = call(app(storage.clone()), Method::POST, "/api/quotes", Some(quote_body())).await;
    let (_, second) =
        call(app(storage.clone()), Method::POST, "/api/quotes", Some(quote_body())).await;
    assert_ne!(first["data"]["id"], second["data"]["id"]);

    let (status, listing) = call(app(storage), Method::GET, "/api/quotes", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listing["success"], true);
    assert!(listing.get("message").is_none());

    let quotes = listing["data"].as_array().unwrap();
    assert_eq!(quotes.len(), 2);
    for quote in quotes {
        for field in ["firstName", "lastName", "email", "phone", "service", "message"] {
            assert_eq!(quote[field], quote_body()[field], "{field}");
        }
    }
    let first_at: chrono::DateTime<chrono::Utc> =
        serde_json::from_value(quotes[0]["createdAt"].clone()).unwrap();
    let second_at: chrono::DateTime<chrono::Utc> =
        serde_json::from_value(quotes[1]["createdAt"].clone()).unwrap();
    assert!(second_at >= first_at);
}

#[tokio::test]
async fn test_storage_failure_is_generic() {
    let storage: Arc<dyn Storage> = Arc::new(BrokenStorage);

    let cases = [
        (Method::POST, "/api/quotes", Some(quote_body()), "Failed to submit quote request"),
        (
            Method::POST,
            "/api/contacts",
            Some(jane("jane@gmail.com", "9876543210")),
            "Failed to send message",
        ),
        (Method::GET, "/api/quotes", None, "Failed to fetch quotes"),
        (Method::GET, "/api/contacts", None, "Failed to fetch contacts"),
    ];

    for (method, uri, body, message) in cases {
        let (status, response) = call(app(storage.clone()), method, uri, body).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{uri}");
        assert_eq!(response, json!({ "success": false, "message": message }));
    }
}

#[tokio::test]
async fn test_validation_runs_before_storage() {
    // a broken store must not turn a bad payload into a 500
    let storage: Arc<dyn Storage> = Arc::new(BrokenStorage);
    let (status, _) = call(
        app(storage),
        Method::POST,
        "/api/contacts",
        Some(jane("jane@gmail.com", "5555555555")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_service_catalogue() {
    let storage = Arc::new(MemStorage::new());
    let (status, body) = call(app(storage.clone()), Method::GET, "/api/services?form=quote", None).await;
    assert_eq!(status, StatusCode::OK);
    let values: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|o| o["value"].as_str().unwrap())
        .collect();
    assert!(!values.contains(&"Other"));
    assert_eq!(body["data"][0]["label"], "Custom Software Development");

    let (_, body) = call(app(storage), Method::GET, "/api/services", None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 7);
}

#[tokio::test]
async fn test_unknown_service_form_uses_envelope() {
    let storage = Arc::new(MemStorage::new());
    let (status, body) =
        call(app(storage), Method::GET, "/api/services?form=newsletter", None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Invalid form data");
    assert_eq!(body["errors"][0]["field"], "form");
    assert_eq!(body["errors"][0]["code"], "invalid_format");
}

mod transport {
    use std::{sync::Mutex, time::Duration};

    use axum::{routing::post, Json};

    use super::*;
    use crate::{
        client::{FormController, FormState, HttpTransport, Transport, TransportError, RELAY_THANKS},
        config::{ClientConfig, TransportTarget},
        submission::RecordKind,
    };

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
        format!("http://{addr}")
    }

    fn fill(form: &mut FormController<NewContact, HttpTransport>) {
        form.edit(|c| {
            c.name = "Jane".into();
            c.email = "jane@gmail.com".into();
            c.phone = "9876543210".into();
            c.service = "web-development".into();
            c.message = "hi".into();
        });
    }

    #[tokio::test]
    async fn contact_form_submits_to_backend() {
        let storage = Arc::new(MemStorage::new());
        let base_url = serve(app(storage.clone())).await;
        let config = ClientConfig::from_lookup(|key| match key {
            "API_BASE_URL" => Some(base_url.clone()),
            _ => None,
        })
        .unwrap();

        let mut form = FormController::<NewContact, HttpTransport>::from_config(&config);
        fill(&mut form);
        let notice = form.submit().await.unwrap();

        assert_eq!(notice.title, "Success!");
        assert_eq!(notice.description, CONTACT_CREATED);
        assert_eq!(form.draft(), &NewContact::default());
        assert_eq!(storage.get_contacts().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn quote_form_submits_to_backend() {
        let storage = Arc::new(MemStorage::new());
        let base_url = serve(app(storage.clone())).await;
        let transport = HttpTransport::new(TransportTarget::Backend { base_url });
        let mut form: FormController<NewQuote, _> =
            FormController::new(transport, Duration::from_secs(5));
        form.edit(|q| {
            q.first_name = "Arjun".into();
            q.last_name = "Mehta".into();
            q.email = "arjun@startup.in".into();
            q.service = "backend-services".into();
            q.message = "An API".into();
        });

        let notice = form.submit().await.unwrap();
        assert_eq!(notice.description, QUOTE_CREATED);
        let stored = storage.get_quotes().await.unwrap();
        assert_eq!(stored[0].first_name, "Arjun");
        assert_eq!(stored[0].phone, None);
    }

    #[tokio::test]
    async fn skipping_client_validation_still_hits_server_gate() {
        let storage = Arc::new(MemStorage::new());
        let base_url = serve(app(storage.clone())).await;
        let transport = HttpTransport::new(TransportTarget::Backend { base_url });

        let err = transport
            .deliver(RecordKind::Contact, jane("jane@yopmail.com", "9876543210"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            TransportError::Status { status: 400, message: Some(ref m) } if m == "Invalid form data"
        ));
        assert!(storage.get_contacts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn relay_receives_the_same_body() {
        let seen: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(Vec::new()));
        let recorder = seen.clone();
        let relay = Router::new().route(
            "/f/test",
            post(move |Json(body): Json<Value>| {
                let recorder = recorder.clone();
                async move {
                    recorder.lock().unwrap().push(body);
                    Json(json!({ "ok": true, "next": "/thanks" }))
                }
            }),
        );
        let relay_url = format!("{}/f/test", serve(relay).await);

        let config = ClientConfig::from_lookup(|key| match key {
            "CONTACT_TRANSPORT" => Some("relay".to_string()),
            "FORM_RELAY_URL" => Some(relay_url.clone()),
            _ => None,
        })
        .unwrap();
        let mut form = FormController::<NewContact, HttpTransport>::from_config(&config);
        assert!(matches!(form.transport().target(), TransportTarget::Relay { .. }));
        fill(&mut form);

        let notice = form.submit().await.unwrap();
        assert_eq!(notice.description, RELAY_THANKS);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0], jane("jane@gmail.com", "9876543210"));
    }

    #[tokio::test]
    async fn relay_refusal_keeps_the_form() {
        let relay = Router::new().route(
            "/f/test",
            post(|| async { (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({ "errors": [] }))) }),
        );
        let endpoint = format!("{}/f/test", serve(relay).await);
        let transport = HttpTransport::new(TransportTarget::Relay { endpoint });
        let mut form: FormController<NewContact, _> =
            FormController::new(transport, Duration::from_secs(5));
        fill(&mut form);

        let notice = form.submit().await.unwrap();
        assert_eq!(notice.title, "Error");
        assert_eq!(form.draft().name, "Jane");
        assert!(matches!(
            form.state(),
            FormState::Failed(TransportError::Status { status: 422, .. })
        ));
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_failure() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let transport = HttpTransport::new(TransportTarget::Backend { base_url });
        let mut form: FormController<NewContact, _> =
            FormController::new(transport, Duration::from_secs(5));
        fill(&mut form);

        let notice = form.submit().await.unwrap();
        assert_eq!(notice.description, "Failed to send message. Please try again.");
        assert!(matches!(form.state(), FormState::Failed(TransportError::Network(_))));
        assert!(form.can_submit());
    }

    #[tokio::test]
    async fn non_envelope_reply_is_malformed() {
        let backend = Router::new().route("/api/contacts", post(|| async { "thanks!" }));
        let base_url = serve(backend).await;
        let transport = HttpTransport::new(TransportTarget::Backend { base_url });
        let mut form: FormController<NewContact, _> =
            FormController::new(transport, Duration::from_secs(5));
        fill(&mut form);

        form.submit().await.unwrap();
        assert!(matches!(form.state(), FormState::Failed(TransportError::Malformed(_))));
    }
}
