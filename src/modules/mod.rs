pub mod books;

use bookshelf_db::DocumentStore;
use bookshelf_kernel::ModuleRegistry;

/// Register all project-specific modules with the registry
pub fn register_all(registry: &mut ModuleRegistry, store: &dyn DocumentStore) -> anyhow::Result<()> {
    registry.register(books::create_module(store))?;
    Ok(())
}
