use anyhow::Context;
use bookshelf_kernel::settings::Settings;
use clap::{Parser, Subcommand};

/// Book catalogue service
#[derive(Debug, Parser)]
#[command(name = "bookshelf", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Create the storage indexes the service relies on, then exit
    Indexes,
    /// Print the resolved configuration as JSON
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load().with_context(|| "failed to load bookshelf settings")?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            bookshelf_telemetry::init(&settings.telemetry)?;
            tracing::info!(env = ?settings.environment, "bookshelf serve");
            bookshelf_app::run(settings).await
        }
        Command::Indexes => {
            bookshelf_telemetry::init(&settings.telemetry)?;
            // Module init ensures every index.
            let registry = bookshelf_app::bootstrap(&settings).await?;
            tracing::info!(modules = registry.len(), "indexes ensured");
            Ok(())
        }
        Command::Config => {
            let rendered = serde_json::to_string_pretty(&settings)
                .with_context(|| "failed to render settings")?;
            println!("{}", rendered);
            Ok(())
        }
    }
}
