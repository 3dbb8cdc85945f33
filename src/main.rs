use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use registrar::{
    churches::Church,
    config::{
        DEFAULT_ORGANIZER_PASSKEY, Settings, create_app_with_settings,
        make_pool, run_migrations,
    },
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(about = "Church competition registration portal")]
struct Cli {
    /// TOML settings file; environment variables take precedence.
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the web server.
    Serve,
    /// Apply pending database migrations and exit.
    Migrate,
    /// Add a church that secretaries and members can pick.
    AddChurch { name: String, place: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())
        .context("Failed to load settings")?;

    let pool = make_pool(&settings.database_url)
        .context("Failed to open the database")?;
    {
        let pool = pool.clone();
        tokio::task::spawn_blocking(move || run_migrations(&pool))
            .await
            .context("Migration task panicked")??;
    }

    match cli.command {
        Command::Migrate => {
            tracing::info!("Migrations applied");
        }
        Command::AddChurch { name, place } => {
            let mut conn = pool.get().context("Failed to get a connection")?;
            let church = Church::create(&name, &place, &mut conn)?;
            tracing::info!("Added church {} ({})", church.label(), church.id);
        }
        Command::Serve => {
            let key = settings
                .cookie_key()
                .context("Invalid SECRET_KEY")?;
            if settings.organizer_passkey == DEFAULT_ORGANIZER_PASSKEY {
                tracing::warn!(
                    "ORGANIZER_PASSKEY is not set, so the built-in default is \
                     in use"
                );
            }
            tracing::warn!(
                "The organizer passkey only hides the dashboard in the UI; it \
                 is not access control"
            );

            let bind_addr = settings.bind_addr.clone();
            let app = create_app_with_settings(pool, settings, key);
            let listener = tokio::net::TcpListener::bind(&bind_addr)
                .await
                .with_context(|| format!("Failed to bind to {bind_addr}"))?;
            tracing::info!("Listening on http://{bind_addr}");
            axum::serve(listener, app).await.context("Server error")?;
        }
    }

    Ok(())
}
