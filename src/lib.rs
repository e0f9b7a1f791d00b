//! Bookshelf application library
//!
//! Wires the feature modules to a document store and serves them over HTTP.

use anyhow::Context;
use bookshelf_kernel::{settings::Settings, InitCtx, ModuleRegistry};

pub mod modules;

pub use modules::books::{self, BookError, BookService};

/// Connect to the configured store and initialize every module on it.
pub async fn bootstrap(settings: &Settings) -> anyhow::Result<ModuleRegistry> {
    let store = bookshelf_db::connect(&settings.database)
        .await
        .with_context(|| format!("failed to connect to document store at {}", settings.database.uri))?;

    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry, store.as_ref())?;

    let ctx = InitCtx { settings };
    registry.init_modules(&ctx).await?;

    Ok(registry)
}

/// Run the HTTP service until a shutdown signal arrives.
pub async fn run(settings: Settings) -> anyhow::Result<()> {
    let registry = bootstrap(&settings).await?;
    let ctx = InitCtx {
        settings: &settings,
    };
    registry.start_modules(&ctx).await?;

    let served =
        bookshelf_http::start_server(&registry, &settings, bookshelf_http::shutdown_signal()).await;

    registry.stop_modules().await?;
    served
}
