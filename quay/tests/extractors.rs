//! Integration tests for request extractors.

use quay::prelude::*;
use quay::testing::{ClientFixture, TestClient, client};
use serde_json::json;

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct User {
    name: String,
    email: String,
}

#[derive(Debug, Deserialize)]
struct Pagination {
    page: u32,
    #[serde(default)]
    limit: Option<u32>,
}

fn with_router(router: Router) -> TestClient {
    client(|config| Quay::with_config(config).router(router)).unwrap()
}

async fn echo_user(req: Request, params: PathParams, state: Arc<AppState>) -> Result<Json<User>> {
    let Json(user) = Json::<User>::from_request(req, &params, &state).await?;
    Ok(Json(user))
}

async fn login(req: Request, params: PathParams, state: Arc<AppState>) -> Result<String> {
    let Form(user) = Form::<User>::from_request(req, &params, &state).await?;
    Ok(format!("{} <{}>", user.name, user.email))
}

async fn page(req: Request, params: PathParams, state: Arc<AppState>) -> Result<String> {
    let Query(p) = Query::<Pagination>::from_request(req, &params, &state).await?;
    Ok(format!("page={} limit={:?}", p.page, p.limit))
}

#[tokio::test]
async fn test_json_extraction() {
    let client = with_router(Router::new().post("/users", echo_user));
    let user = User {
        name: "Alice".to_string(),
        email: "alice@example.com".to_string(),
    };

    let response = client.post("/users").json(&user).send().await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.json::<User>(), user);
}

#[tokio::test]
async fn test_json_extraction_missing_field() {
    let client = with_router(Router::new().post("/users", echo_user));
    let response = client
        .post("/users")
        .json(&json!({"name": "Alice"}))
        .send()
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_form_extraction() {
    let client = with_router(Router::new().post("/login", login));
    let response = client
        .post("/login")
        .form(&User {
            name: "Bob".to_string(),
            email: "bob@example.com".to_string(),
        })
        .send()
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text(), "Bob <bob@example.com>");
}

#[tokio::test]
async fn test_form_extraction_requires_content_type() {
    let client = with_router(Router::new().post("/login", login));
    let response = client
        .post("/login")
        .body("name=Bob&email=bob%40example.com")
        .send()
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_query_extraction() {
    let client = with_router(Router::new().get("/notes", page));

    let response = client.get("/notes").query(&[("page", "3")]).send().await;
    assert_eq!(response.text(), "page=3 limit=None");

    let response = client.get("/notes?page=1&limit=20").send().await;
    assert_eq!(response.text(), "page=1 limit=Some(20)");
}

#[tokio::test]
async fn test_query_extraction_invalid() {
    let client = with_router(Router::new().get("/notes", page));
    let response = client.get("/notes?page=first").send().await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_headers_and_context_extraction() {
    let client = with_router(Router::new().get("/whoami", |req, params, state| async move {
        let (parts, _) = req.into_parts();
        let headers = Headers::from_request_parts(&parts, &params, &state).await?;
        let ctx = Context::from_request_parts(&parts, &params, &state).await?;
        let agent = headers
            .get("user-agent")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string();
        Ok::<_, Error>(format!("{} {}", agent, ctx.trace_id()))
    }));

    let response = client
        .get("/whoami")
        .header("user-agent", "quay-tests")
        .header("x-trace-id", "trace-42")
        .send()
        .await;

    assert_eq!(response.text(), "quay-tests trace-42");
}

#[tokio::test]
async fn test_state_extraction() {
    #[derive(Clone)]
    struct Greeting(&'static str);

    let client = client(|config| {
        Quay::with_config(config)
            .state(Greeting("hello"))
            .router(Router::new().get("/", |req, params, state| async move {
                let State(greeting) = State::<Greeting>::from_request(req, &params, &state).await?;
                Ok::<_, Error>(greeting.0)
            }))
    })
    .unwrap();

    assert_eq!(client.get("/").send().await.text(), "hello");
}

#[tokio::test]
async fn test_missing_state_is_server_error() {
    let client = ClientFixture::new()
        .configure(|config| config.propagate_exceptions = Some(false))
        .setup(|config| {
            Quay::with_config(config).router(Router::new().get("/", |req, params, state| async move {
                let State(n) = State::<u64>::from_request(req, &params, &state).await?;
                Ok::<_, Error>(n.to_string())
            }))
        })
        .unwrap();

    assert_eq!(
        client.get("/").send().await.status(),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}
