//! Router tests against in-process storage and upstreams

use super::*;
use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    response::Response,
};
use paperlens_common::{
    analysis::MockAnalyzer,
    config::AppConfig,
    papers::{Author, Paper, StaticPaperIndex},
    workspace::InMemoryWorkspace,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

const SECRET: &str = "test-secret";

struct Harness {
    app: Router,
    analyzer: Arc<MockAnalyzer>,
    workspace: Arc<InMemoryWorkspace>,
    jwt: Arc<JwtManager>,
}

fn attention() -> Paper {
    Paper {
        paper_id: "204e3073870fae3d05bcbc2f6a8e263d9b72e776".into(),
        title: "Attention Is All You Need".into(),
        abstract_text: Some("The Transformer, based solely on attention mechanisms.".into()),
        authors: vec![
            Author { name: "Ashish Vaswani".into(), author_id: None },
            Author { name: "Noam Shazeer".into(), author_id: None },
        ],
        year: Some(2017),
        citation_count: 120_000,
        url: Some("https://www.semanticscholar.org/paper/204e3073".into()),
        venue: Some("NeurIPS".into()),
        publication_date: None,
        fields_of_study: Some(vec!["Computer Science".into()]),
    }
}

fn bert() -> Paper {
    Paper {
        paper_id: "df2b0e26d0599ce3e70df8a9da02e51594e0e992".into(),
        title: "BERT: Pre-training of Deep Bidirectional Transformers".into(),
        abstract_text: None,
        authors: vec![],
        year: Some(2019),
        citation_count: 90_000,
        url: None,
        venue: None,
        publication_date: None,
        fields_of_study: None,
    }
}

fn harness() -> Harness {
    let analyzer = Arc::new(MockAnalyzer::new());
    let workspace = Arc::new(InMemoryWorkspace::new());
    let jwt = Arc::new(JwtManager::new(SECRET, "authenticated", 3600));

    let state = AppState {
        config: Arc::new(AppConfig::default()),
        store: Arc::new(InMemoryStore::new()),
        papers: Arc::new(StaticPaperIndex::new(vec![attention(), bert()])),
        analyzer: analyzer.clone(),
        workspace: workspace.clone(),
        jwt: jwt.clone(),
    };

    Harness {
        app: create_router(state),
        analyzer,
        workspace,
        jwt,
    }
}

impl Harness {
    fn token(&self, user_id: Uuid) -> String {
        self.jwt.generate_token(user_id, None).unwrap()
    }

    async fn send(&self, method: Method, uri: &str, user: Option<Uuid>, body: Option<Value>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user_id) = user {
            builder = builder.header("authorization", format!("Bearer {}", self.token(user_id)));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        self.app.clone().oneshot(request).await.unwrap()
    }
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health() {
    let h = harness();
    let response = h.send(Method::GET, "/health", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "healthy");

    let response = h.send(Method::GET, "/ready", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["checks"]["storage"]["status"], "up");
}

#[tokio::test]
async fn test_request_id_is_propagated() {
    let h = harness();
    let response = h.send(Method::GET, "/health", None, None).await;
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_search_returns_seeded_paper() {
    let h = harness();
    let response = h.send(Method::GET, "/papers/search?query=transformer", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    let data = body["data"].as_array().unwrap();
    assert!(data.len() <= 10);
    let paper = data
        .iter()
        .find(|p| p["title"] == "Attention Is All You Need")
        .expect("seeded paper in results");
    assert_eq!(paper["year"], 2017);
    assert!(paper["citationCount"].as_u64().is_some());
}

#[tokio::test]
async fn test_search_requires_query() {
    let h = harness();
    for uri in ["/papers/search", "/papers/search?query=", "/papers/search?query=%20%20"] {
        let response = h.send(Method::GET, uri, None, None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(json_body(response).await["code"], "MISSING_FIELD");
    }
}

#[tokio::test]
async fn test_get_paper() {
    let h = harness();
    let uri = format!("/papers/{}", attention().paper_id);
    let response = h.send(Method::GET, &uri, None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["paperId"], attention().paper_id);
}

#[tokio::test]
async fn test_unknown_paper_is_generic_500() {
    let h = harness();
    let response = h.send(Method::GET, "/papers/missing", None, None).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = json_body(response).await;
    assert_eq!(body["error"], "Failed to fetch papers");
    assert_eq!(body["code"], "UPSTREAM_ERROR");
}

#[tokio::test]
async fn test_analyze_returns_analysis() {
    let h = harness();
    let response = h
        .send(Method::POST, "/analyze", None, Some(serde_json::to_value(attention()).unwrap()))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["tags"], json!(["Computer Science"]));
    assert!(body["keyFindings"].is_array());
    assert_eq!(h.analyzer.calls(), 1);
}

#[tokio::test]
async fn test_saved_analysis_requires_auth() {
    let h = harness();
    let response = h.send(Method::GET, "/analyses", None, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .uri("/analyses")
        .header("authorization", "Bearer not-a-token")
        .body(Body::empty())
        .unwrap();
    let response = h.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["code"], "INVALID_TOKEN");
}

#[tokio::test]
async fn test_analyze_and_save_is_idempotent() {
    let h = harness();
    let user = Uuid::new_v4();
    let body = json!({ "paper": attention() });

    let uri = format!("/analyses/paper/{}", attention().paper_id);
    let response = h.send(Method::GET, &uri, Some(user), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let first = h.send(Method::POST, "/analyses", Some(user), Some(body.clone())).await;
    assert_eq!(first.status(), StatusCode::CREATED);
    let first = json_body(first).await;
    assert_eq!(first["title"], "Attention Is All You Need");
    assert!(first["project_id"].is_null());

    let second = h.send(Method::POST, "/analyses", Some(user), Some(body)).await;
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(json_body(second).await["id"], first["id"]);
    assert_eq!(h.analyzer.calls(), 1);

    let fetched = h.send(Method::GET, &uri, Some(user), None).await;
    assert_eq!(fetched.status(), StatusCode::OK);
    assert_eq!(json_body(fetched).await["analysis"], first["analysis"]);
}

#[tokio::test]
async fn test_analyses_are_owner_scoped() {
    let h = harness();
    let owner = Uuid::new_v4();
    let other = Uuid::new_v4();

    h.send(Method::POST, "/analyses", Some(owner), Some(json!({ "paper": attention() })))
        .await;

    let listed = json_body(h.send(Method::GET, "/analyses", Some(other), None).await).await;
    assert_eq!(listed, json!([]));

    let listed = json_body(h.send(Method::GET, "/analyses", Some(owner), None).await).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_project_lifecycle() {
    let h = harness();
    let user = Uuid::new_v4();

    let created = h
        .send(Method::POST, "/projects", Some(user), Some(json!({ "title": "T", "description": "D" })))
        .await;
    assert_eq!(created.status(), StatusCode::CREATED);
    let project = json_body(created).await;
    assert_eq!(project["title"], "T");
    assert_eq!(project["description"], "D");
    assert!(project["id"].is_string());
    assert!(project["created_at"].is_string());
    let project_id = project["id"].as_str().unwrap().to_string();

    let analysis = json_body(
        h.send(
            Method::POST,
            "/analyses",
            Some(user),
            Some(json!({ "paper": attention(), "project_id": project_id })),
        )
        .await,
    )
    .await;
    assert_eq!(analysis["project_id"], project_id.as_str());

    let uri = format!("/projects/{}", project_id);
    let detail = json_body(h.send(Method::GET, &uri, Some(user), None).await).await;
    assert_eq!(detail["title"], "T");
    assert_eq!(detail["paper_analyses"].as_array().unwrap().len(), 1);

    let updated = h
        .send(Method::PUT, &uri, Some(user), Some(json!({ "title": "T2" })))
        .await;
    assert_eq!(updated.status(), StatusCode::OK);
    let updated = json_body(updated).await;
    assert_eq!(updated["title"], "T2");
    assert!(updated["description"].is_null());

    let deleted = h.send(Method::DELETE, &uri, Some(user), None).await;
    assert_eq!(deleted.status(), StatusCode::OK);
    assert_eq!(json_body(deleted).await, json!({ "success": true }));

    let gone = h.send(Method::GET, &uri, Some(user), None).await;
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);

    // The analysis survives, unassigned
    let recents = json_body(h.send(Method::GET, "/analyses", Some(user), None).await).await;
    assert_eq!(recents[0]["id"], analysis["id"]);
    assert!(recents[0]["project_id"].is_null());
}

#[tokio::test]
async fn test_other_users_project_is_not_found() {
    let h = harness();
    let owner = Uuid::new_v4();
    let other = Uuid::new_v4();

    let project = json_body(
        h.send(Method::POST, "/projects", Some(owner), Some(json!({ "title": "Mine" })))
            .await,
    )
    .await;
    let uri = format!("/projects/{}", project["id"].as_str().unwrap());

    let response = h.send(Method::GET, &uri, Some(other), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let response = h.send(Method::DELETE, &uri, Some(other), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = h.send(Method::GET, &uri, Some(owner), None).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_project_validation() {
    let h = harness();
    let user = Uuid::new_v4();

    for body in [
        json!({ "title": "" }),
        json!({ "title": "   " }),
        json!({ "title": "x".repeat(201) }),
        json!({ "title": "ok", "description": "d".repeat(2001) }),
    ] {
        let response = h.send(Method::POST, "/projects", Some(user), Some(body)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn test_bad_bodies_are_flat_400s() {
    let h = harness();
    let user = Uuid::new_v4();

    for (uri, body, field) in [
        ("/projects", json!({ "description": "no title" }), "title"),
        ("/analyze", json!({ "title": "No id" }), "paperId"),
        ("/analyses", json!({}), "paper"),
    ] {
        let response = h.send(Method::POST, uri, Some(user), Some(body)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", uri);

        let body = json_body(response).await;
        assert_eq!(body["code"], "MISSING_FIELD");
        assert!(body["error"].as_str().unwrap().contains(field));
    }

    let response = h
        .send(Method::POST, "/projects", Some(user), Some(json!({ "title": 7 })))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["code"], "VALIDATION_ERROR");

    let request = Request::builder()
        .method(Method::POST)
        .uri("/analyze")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = h.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["code"], "INVALID_FORMAT");
}

#[tokio::test]
async fn test_set_project_round_trip() {
    let h = harness();
    let user = Uuid::new_v4();

    let project = json_body(
        h.send(Method::POST, "/projects", Some(user), Some(json!({ "title": "P" })))
            .await,
    )
    .await;
    let analysis = json_body(
        h.send(Method::POST, "/analyses", Some(user), Some(json!({ "paper": bert() })))
            .await,
    )
    .await;
    let uri = format!("/analyses/{}/project", analysis["id"].as_str().unwrap());

    let assigned = h
        .send(Method::PUT, &uri, Some(user), Some(json!({ "project_id": project["id"] })))
        .await;
    assert_eq!(assigned.status(), StatusCode::OK);
    assert_eq!(json_body(assigned).await["project_id"], project["id"]);

    let cleared = h
        .send(Method::PUT, &uri, Some(user), Some(json!({ "project_id": null })))
        .await;
    assert!(json_body(cleared).await["project_id"].is_null());

    let recents = json_body(h.send(Method::GET, "/analyses", Some(user), None).await).await;
    assert_eq!(recents.as_array().unwrap().len(), 1);

    let response = h
        .send(Method::PUT, &uri, Some(user), Some(json!({ "project_id": Uuid::new_v4() })))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_notion_requires_access_token() {
    let h = harness();
    let response = h
        .send(Method::POST, "/notion", None, Some(json!({ "action": "list_databases" })))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_notion_checks_token_before_payload() {
    let h = harness();
    let payload = json!({
        "action": "add_to_database",
        "databaseId": "db-1",
        "paper": { "title": 42 },
        "analysis": {}
    });

    let response = h.send(Method::POST, "/notion", None, Some(payload.clone())).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let mut with_token = payload;
    with_token["access_token"] = json!("secret");
    let response = h.send(Method::POST, "/notion", None, Some(with_token)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_notion_rejects_unknown_action() {
    let h = harness();
    let response = h
        .send(
            Method::POST,
            "/notion",
            None,
            Some(json!({ "action": "drop_everything", "access_token": "secret" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_notion_export_flow() {
    let h = harness();

    let response = h
        .send(
            Method::POST,
            "/notion",
            None,
            Some(json!({ "action": "create_database", "access_token": "secret" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["code"], "MISSING_FIELD");

    let database = json_body(
        h.send(
            Method::POST,
            "/notion",
            None,
            Some(json!({
                "action": "create_database",
                "access_token": "secret",
                "title": "Papers",
                "pageId": "page-1"
            })),
        )
        .await,
    )
    .await;
    let database_id = database["id"].as_str().unwrap().to_string();

    let listed = json_body(
        h.send(
            Method::POST,
            "/notion",
            None,
            Some(json!({ "action": "list_databases", "access_token": "secret" })),
        )
        .await,
    )
    .await;
    assert_eq!(listed["results"][0]["title"], "Papers");

    let response = h
        .send(
            Method::POST,
            "/notion",
            None,
            Some(json!({
                "action": "add_to_database",
                "access_token": "secret",
                "databaseId": database_id,
                "paper": attention(),
                "analysis": {
                    "tags": ["NLP", "ML"],
                    "summary": "s",
                    "keyFindings": ["a", "b"],
                    "methodology": "m",
                    "limitations": [],
                    "futureWork": [],
                    "impact": "i"
                }
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let rows = h.workspace.rows(&database_id).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(
        rows[0].properties["Tags"]["multi_select"],
        json!([{ "name": "NLP" }, { "name": "ML" }])
    );
    assert_eq!(
        rows[0].properties["Key Findings"]["rich_text"][0]["text"]["content"],
        "a\nb"
    );
}
