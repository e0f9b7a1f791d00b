use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use bookshelf_http::{ApiJson, AppError};

use super::models::{Book, BookCreate, BookUpdate};
use super::service::BookService;

/// HTTP routes for the books module, relative to its mount point.
pub fn router(service: BookService) -> Router {
    Router::new()
        .route("/", get(list_books).post(create_book))
        .route("/{id}", get(get_book).put(update_book).delete(delete_book))
        .with_state(service)
}

async fn create_book(
    State(service): State<BookService>,
    ApiJson(input): ApiJson<BookCreate>,
) -> Result<(StatusCode, Json<Book>), AppError> {
    let book = service.create(input).await?;
    Ok((StatusCode::CREATED, Json(book)))
}

async fn list_books(State(service): State<BookService>) -> Result<Json<Vec<Book>>, AppError> {
    Ok(Json(service.list().await?))
}

async fn get_book(
    State(service): State<BookService>,
    Path(id): Path<String>,
) -> Result<Json<Book>, AppError> {
    Ok(Json(service.get(&id).await?))
}

async fn update_book(
    State(service): State<BookService>,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<BookUpdate>,
) -> Result<Json<Book>, AppError> {
    Ok(Json(service.update(&id, input).await?))
}

async fn delete_book(
    State(service): State<BookService>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    service.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
