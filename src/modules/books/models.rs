use bookshelf_db::{Document, RecordId, StoreError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A book as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    /// Store-assigned identifier, rendered as a string
    pub id: String,
    /// Title of the book, unique across the catalogue
    pub title: String,
    /// Author of the book
    pub author: String,
    /// Short summary of the book
    pub synopsis: String,
}

/// Shape of a book document inside the store.
#[derive(Deserialize)]
struct StoredBook {
    #[serde(rename = "_id")]
    id: RecordId,
    title: String,
    author: String,
    synopsis: String,
}

impl TryFrom<Document> for Book {
    type Error = StoreError;

    fn try_from(document: Document) -> Result<Self, Self::Error> {
        let stored: StoredBook = serde_json::from_value(Value::Object(document))
            .map_err(|e| StoreError::Decode(format!("book: {}", e)))?;

        Ok(Book {
            id: stored.id.to_string(),
            title: stored.title,
            author: stored.author,
            synopsis: stored.synopsis,
        })
    }
}

/// Request model for creating a new book.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookCreate {
    pub title: String,
    pub author: String,
    pub synopsis: String,
}

impl BookCreate {
    /// Document to insert; the store adds the identifier.
    pub fn into_document(self) -> Document {
        let mut document = Document::new();
        document.insert("title".to_string(), Value::String(self.title));
        document.insert("author".to_string(), Value::String(self.author));
        document.insert("synopsis".to_string(), Value::String(self.synopsis));
        document
    }
}

/// Request model for a partial update; absent or `null` fields are left alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BookUpdate {
    pub title: Option<String>,
    pub author: Option<String>,
    pub synopsis: Option<String>,
}

impl BookUpdate {
    /// Fields to set, containing only the ones supplied.
    pub fn change_set(&self) -> Document {
        [
            ("title", &self.title),
            ("author", &self.author),
            ("synopsis", &self.synopsis),
        ]
        .into_iter()
        .filter_map(|(field, value)| {
            value
                .as_ref()
                .map(|v| (field.to_string(), Value::String(v.clone())))
        })
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn change_set_skips_absent_and_null_fields() {
        let update: BookUpdate =
            serde_json::from_value(json!({"author": "Frank Herbert", "title": null})).unwrap();
        let changes = update.change_set();

        assert_eq!(changes.len(), 1);
        assert_eq!(changes["author"], json!("Frank Herbert"));
    }

    #[test]
    fn empty_update_has_empty_change_set() {
        let update: BookUpdate = serde_json::from_value(json!({})).unwrap();
        assert!(update.change_set().is_empty());
    }

    #[test]
    fn stored_document_becomes_book_with_string_id() {
        let id = RecordId::generate();
        let document = match json!({
            "_id": id.to_string(),
            "title": "Dune",
            "author": "Herbert",
            "synopsis": "Desert planet politics"
        }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };

        let book = Book::try_from(document).unwrap();
        assert_eq!(book.id, id.to_string());
        assert_eq!(book.title, "Dune");

        let rendered = serde_json::to_value(&book).unwrap();
        assert!(rendered.get("_id").is_none());
        assert_eq!(rendered["id"], json!(id.to_string()));
    }

    #[test]
    fn stored_document_missing_fields_fails_to_decode() {
        let document = match json!({"_id": RecordId::generate().to_string(), "title": "Dune"}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        assert!(matches!(
            Book::try_from(document),
            Err(StoreError::Decode(_))
        ));
    }
}
