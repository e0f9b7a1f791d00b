//! Book resource handler: one request in, one or two store calls out.

use std::sync::Arc;

use bookshelf_db::{Collection, Filter, RecordId, StoreError};
use bookshelf_http::AppError;
use thiserror::Error;

use super::models::{Book, BookCreate, BookUpdate};

/// Name of the collection holding book documents.
pub const COLLECTION: &str = "books";

/// Upper bound on the number of books returned by a listing.
pub const LIST_LIMIT: usize = 100;

/// Field carrying the uniqueness constraint.
pub const TITLE_FIELD: &str = "title";

#[derive(Error, Debug)]
pub enum BookError {
    #[error("Book with title {0} already exists")]
    Conflict(String),

    #[error("Book with ID {0} not found")]
    NotFound(String),

    #[error("Invalid book ID {0}")]
    BadIdentifier(String),

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<BookError> for AppError {
    fn from(err: BookError) -> Self {
        let message = err.to_string();
        match err {
            BookError::Conflict(_) => AppError::conflict(vec![], message),
            BookError::NotFound(_) => AppError::not_found(message),
            BookError::BadIdentifier(_) => AppError::invalid_id(message),
            BookError::Validation(_) => AppError::validation(vec![], message),
            BookError::Store(store) => AppError::Internal(anyhow::Error::new(store)),
        }
    }
}

fn parse_id(raw: &str) -> Result<RecordId, BookError> {
    raw.parse()
        .map_err(|_| BookError::BadIdentifier(raw.to_string()))
}

fn require_title(title: &str) -> Result<(), BookError> {
    if title.is_empty() {
        return Err(BookError::Validation("title must not be empty".to_string()));
    }
    Ok(())
}

/// Operations on the books collection.
#[derive(Clone)]
pub struct BookService {
    books: Arc<dyn Collection>,
}

impl BookService {
    pub fn new(books: Arc<dyn Collection>) -> Self {
        Self { books }
    }

    /// Make the store reject duplicate titles on its own, closing the gap
    /// between the lookup in [`BookService::create`] and the insert.
    pub async fn ensure_indexes(&self) -> Result<(), BookError> {
        self.books.ensure_unique(TITLE_FIELD).await?;
        Ok(())
    }

    pub async fn create(&self, input: BookCreate) -> Result<Book, BookError> {
        require_title(&input.title)?;

        let by_title = Filter::eq(TITLE_FIELD, input.title.clone());
        if self.books.find_one(&by_title).await?.is_some() {
            return Err(BookError::Conflict(input.title));
        }

        let title = input.title.clone();
        let id = match self.books.insert_one(input.into_document()).await {
            Ok(id) => id,
            Err(err) if err.is_duplicate_key() => return Err(BookError::Conflict(title)),
            Err(err) => return Err(err.into()),
        };
        tracing::info!(book_id = %id, %title, "book created");

        self.fetch(id, &id.to_string()).await
    }

    pub async fn list(&self) -> Result<Vec<Book>, BookError> {
        let documents = self.books.find(LIST_LIMIT).await?;
        documents
            .into_iter()
            .map(|document| Book::try_from(document).map_err(BookError::from))
            .collect()
    }

    pub async fn get(&self, raw_id: &str) -> Result<Book, BookError> {
        let id = parse_id(raw_id)?;
        self.fetch(id, raw_id).await
    }

    /// Apply the supplied fields, then return the stored record.
    ///
    /// An update whose values equal the stored ones still succeeds; only a
    /// filter that matches nothing is reported as `NotFound`.
    pub async fn update(&self, raw_id: &str, input: BookUpdate) -> Result<Book, BookError> {
        let id = parse_id(raw_id)?;
        if let Some(title) = &input.title {
            require_title(title)?;
        }

        let changes = input.change_set();
        if !changes.is_empty() {
            let outcome = match self.books.update_one(&Filter::id(id), changes).await {
                Ok(outcome) => outcome,
                Err(err) if err.is_duplicate_key() => {
                    return Err(BookError::Conflict(input.title.unwrap_or_default()))
                }
                Err(err) => return Err(err.into()),
            };

            if outcome.matched == 0 {
                return Err(BookError::NotFound(raw_id.to_string()));
            }
            tracing::info!(book_id = %id, modified = outcome.modified, "book updated");
        }

        self.fetch(id, raw_id).await
    }

    pub async fn delete(&self, raw_id: &str) -> Result<(), BookError> {
        let id = parse_id(raw_id)?;
        match self.books.delete_one(&Filter::id(id)).await? {
            1 => {
                tracing::info!(book_id = %id, "book deleted");
                Ok(())
            }
            _ => Err(BookError::NotFound(raw_id.to_string())),
        }
    }

    async fn fetch(&self, id: RecordId, raw_id: &str) -> Result<Book, BookError> {
        match self.books.find_one(&Filter::id(id)).await? {
            Some(document) => Ok(Book::try_from(document)?),
            None => Err(BookError::NotFound(raw_id.to_string())),
        }
    }
}
