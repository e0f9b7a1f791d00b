pub mod models;
pub mod routes;
pub mod service;

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use bookshelf_db::{Collection, DocumentStore};
use bookshelf_kernel::{InitCtx, Module};
use serde_json::json;

pub use service::{BookError, BookService};

/// Books module: CRUD over the `books` collection
pub struct BooksModule {
    service: BookService,
}

impl BooksModule {
    pub fn new(books: Arc<dyn Collection>) -> Self {
        Self {
            service: BookService::new(books),
        }
    }
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        self.service.ensure_indexes().await?;
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        routes::router(self.service.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let error = |description: &str| {
            json!({
                "description": description,
                "content": {
                    "application/json": {
                        "schema": { "$ref": "#/components/schemas/ErrorResponse" }
                    }
                }
            })
        };
        let book = |description: &str| {
            json!({
                "description": description,
                "content": {
                    "application/json": {
                        "schema": { "$ref": "#/components/schemas/Book" }
                    }
                }
            })
        };
        let id_param = json!([{
            "name": "id",
            "in": "path",
            "required": true,
            "schema": { "type": "string" }
        }]);

        Some(json!({
            "paths": {
                "/": {
                    "get": {
                        "summary": "List books",
                        "description": "Returns at most 100 books.",
                        "tags": ["Books"],
                        "responses": {
                            "200": {
                                "description": "List of books",
                                "content": {
                                    "application/json": {
                                        "schema": {
                                            "type": "array",
                                            "items": { "$ref": "#/components/schemas/Book" }
                                        }
                                    }
                                }
                            },
                            "500": error("Internal server error")
                        }
                    },
                    "post": {
                        "summary": "Create a new book",
                        "tags": ["Books"],
                        "requestBody": {
                            "required": true,
                            "content": {
                                "application/json": {
                                    "schema": { "$ref": "#/components/schemas/BookCreate" }
                                }
                            }
                        },
                        "responses": {
                            "201": book("Created book"),
                            "409": error("Title already exists"),
                            "422": error("Validation error")
                        }
                    }
                },
                "/{id}": {
                    "get": {
                        "summary": "Get a single book by id",
                        "tags": ["Books"],
                        "parameters": id_param.clone(),
                        "responses": {
                            "200": book("Book"),
                            "404": error("Book not found or invalid id")
                        }
                    },
                    "put": {
                        "summary": "Update a book",
                        "tags": ["Books"],
                        "parameters": id_param.clone(),
                        "requestBody": {
                            "required": true,
                            "content": {
                                "application/json": {
                                    "schema": { "$ref": "#/components/schemas/BookUpdate" }
                                }
                            }
                        },
                        "responses": {
                            "200": book("Updated book"),
                            "404": error("Book not found or invalid id"),
                            "409": error("Title already exists"),
                            "422": error("Validation error")
                        }
                    },
                    "delete": {
                        "summary": "Delete a book",
                        "tags": ["Books"],
                        "parameters": id_param,
                        "responses": {
                            "204": { "description": "Book deleted" },
                            "404": error("Book not found or invalid id")
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "Book": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "string", "description": "Store-assigned identifier" },
                            "title": { "type": "string", "description": "Title of the book" },
                            "author": { "type": "string", "description": "Author of the book" },
                            "synopsis": { "type": "string", "description": "Short summary of the book" }
                        },
                        "required": ["id", "title", "author", "synopsis"]
                    },
                    "BookCreate": {
                        "type": "object",
                        "properties": {
                            "title": { "type": "string", "minLength": 1 },
                            "author": { "type": "string" },
                            "synopsis": { "type": "string" }
                        },
                        "required": ["title", "author", "synopsis"]
                    },
                    "BookUpdate": {
                        "type": "object",
                        "properties": {
                            "title": { "type": ["string", "null"], "minLength": 1 },
                            "author": { "type": ["string", "null"] },
                            "synopsis": { "type": ["string", "null"] }
                        }
                    }
                }
            }
        }))
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module stopped");
        Ok(())
    }
}

/// Create the books module on top of `store`
pub fn create_module(store: &dyn DocumentStore) -> Arc<dyn Module> {
    Arc::new(BooksModule::new(store.collection(service::COLLECTION)))
}
