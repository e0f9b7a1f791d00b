//! HTTP-level tests for the books module running on the in-memory store.

use axum::http::StatusCode;
use axum_test::TestServer;
use bookshelf_app::books::models::Book;
use bookshelf_app::modules;
use bookshelf_db::{MemoryStore, RecordId};
use bookshelf_kernel::{settings::Settings, InitCtx, ModuleRegistry};
use serde_json::{json, Value};

async fn server() -> TestServer {
    let settings = Settings::default();
    let store = MemoryStore::new();
    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry, &store).unwrap();
    registry
        .init_modules(&InitCtx {
            settings: &settings,
        })
        .await
        .unwrap();

    let app = bookshelf_http::build_router(&registry, &settings);
    TestServer::new(app).unwrap()
}

fn dune() -> Value {
    json!({
        "title": "Dune",
        "author": "Herbert",
        "synopsis": "Desert planet politics"
    })
}

async fn create(server: &TestServer, body: &Value) -> Book {
    let response = server.post("/api/books").json(body).await;
    response.assert_status(StatusCode::CREATED);
    response.json()
}

#[tokio::test]
async fn full_lifecycle_scenario() {
    let server = server().await;

    let created = create(&server, &dune()).await;
    assert!(!created.id.is_empty());

    let duplicate = server.post("/api/books").json(&dune()).await;
    duplicate.assert_status(StatusCode::CONFLICT);
    let body: Value = duplicate.json();
    assert!(body["detail"].as_str().unwrap().contains("Dune"));

    let fetched: Book = server
        .get(&format!("/api/books/{}", created.id))
        .await
        .json();
    assert_eq!(fetched, created);

    let response = server
        .put(&format!("/api/books/{}", created.id))
        .json(&json!({"author": "Frank Herbert"}))
        .await;
    response.assert_status_ok();
    let updated: Book = response.json();
    assert_eq!(updated.author, "Frank Herbert");
    assert_eq!(updated.title, created.title);
    assert_eq!(updated.synopsis, created.synopsis);
    assert_eq!(updated.id, created.id);

    let refetched: Book = server
        .get(&format!("/api/books/{}", created.id))
        .await
        .json();
    assert_eq!(refetched, updated);

    let response = server
        .delete(&format!("/api/books/{}", created.id))
        .await;
    response.assert_status(StatusCode::NO_CONTENT);
    assert!(response.as_bytes().is_empty());

    let response = server.get(&format!("/api/books/{}", created.id)).await;
    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["code"], "not_found");
    assert_eq!(
        body["detail"],
        format!("Book with ID {} not found", created.id)
    );
}

#[tokio::test]
async fn list_returns_created_books_in_order() {
    let server = server().await;
    for title in ["Dune", "Emma", "Ulysses"] {
        create(
            &server,
            &json!({"title": title, "author": "A", "synopsis": "S"}),
        )
        .await;
    }

    let response = server.get("/api/books").await;
    response.assert_status_ok();
    let books: Vec<Book> = response.json();
    let titles: Vec<_> = books.iter().map(|b| b.title.as_str()).collect();
    assert_eq!(titles, vec!["Dune", "Emma", "Ulysses"]);
}

#[tokio::test]
async fn list_never_exceeds_one_hundred() {
    let server = server().await;
    for n in 0..105 {
        create(
            &server,
            &json!({"title": format!("Volume {n}"), "author": "A", "synopsis": "S"}),
        )
        .await;
    }

    let books: Vec<Book> = server.get("/api/books").await.json();
    assert_eq!(books.len(), 100);
}

#[tokio::test]
async fn empty_update_returns_unchanged_record() {
    let server = server().await;
    let created = create(&server, &dune()).await;

    let response = server
        .put(&format!("/api/books/{}", created.id))
        .json(&json!({}))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Book>(), created);
}

#[tokio::test]
async fn update_with_identical_values_is_not_reported_missing() {
    let server = server().await;
    let created = create(&server, &dune()).await;

    let response = server
        .put(&format!("/api/books/{}", created.id))
        .json(&json!({"author": "Herbert"}))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Book>(), created);
}

#[tokio::test]
async fn update_of_unknown_id_is_not_found() {
    let server = server().await;
    let missing = RecordId::generate();

    let response = server
        .put(&format!("/api/books/{missing}"))
        .json(&json!({"title": "Anything"}))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);

    let response = server
        .put(&format!("/api/books/{missing}"))
        .json(&json!({}))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_of_unknown_id_is_not_found() {
    let server = server().await;
    let missing = RecordId::generate();

    let response = server.delete(&format!("/api/books/{missing}")).await;
    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["detail"], format!("Book with ID {missing} not found"));
}

#[tokio::test]
async fn malformed_id_is_reported_separately() {
    let server = server().await;

    for response in [
        server.get("/api/books/not-an-id").await,
        server.delete("/api/books/not-an-id").await,
        server
            .put("/api/books/not-an-id")
            .json(&json!({"author": "x"}))
            .await,
    ] {
        response.assert_status(StatusCode::NOT_FOUND);
        let body: Value = response.json();
        assert_eq!(body["code"], "invalid_id");
        assert_eq!(body["detail"], "Invalid book ID not-an-id");
    }
}

#[tokio::test]
async fn create_requires_every_field() {
    let server = server().await;

    let response = server
        .post("/api/books")
        .json(&json!({"title": "Dune", "author": "Herbert"}))
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json();
    assert_eq!(body["code"], "validation_error");
    assert!(body["detail"].as_str().unwrap().contains("synopsis"));

    let response = server
        .post("/api/books")
        .json(&json!({"title": "", "author": "Herbert", "synopsis": "S"}))
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn client_supplied_id_is_ignored() {
    let server = server().await;
    let mut body = dune();
    body["id"] = json!("65f0c0ffee65f0c0ffee65f0");

    let created = create(&server, &body).await;
    assert_ne!(created.id, "65f0c0ffee65f0c0ffee65f0");
}

#[tokio::test]
async fn renaming_onto_taken_title_conflicts() {
    let server = server().await;
    create(&server, &dune()).await;
    let emma = create(
        &server,
        &json!({"title": "Emma", "author": "Austen", "synopsis": "Matchmaking"}),
    )
    .await;

    let response = server
        .put(&format!("/api/books/{}", emma.id))
        .json(&json!({"title": "Dune"}))
        .await;
    response.assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn openapi_lists_book_routes() {
    let server = server().await;

    let spec: Value = server.get("/docs/openapi.json").await.json();
    assert!(spec["paths"]["/api/books"]["post"].is_object());
    assert!(spec["paths"]["/api/books/{id}"]["delete"].is_object());
    assert!(spec["components"]["schemas"]["Book"].is_object());
}
