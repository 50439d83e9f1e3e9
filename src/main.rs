use std::sync::Arc;

use submissions::config::Config;
use submissions::forms::FormRegistry;
use submissions::hooks::DefaultHookSet;
use submissions::mail::{LogMailer, Mailer, SmtpMailer};
use submissions::{build_router, db, state, storage};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "submissions=info,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env()?;
    let config = Arc::new(config);

    storage::ensure_dirs(&config.media_root)?;

    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(pool.as_ref()).await?;

    let mailer: Arc<dyn Mailer> = match &config.smtp {
        Some(smtp) => {
            tracing::info!(host = %smtp.host, port = smtp.port, "Delivering email over SMTP");
            Arc::new(SmtpMailer::new(smtp)?)
        }
        None => {
            tracing::warn!("SMTP_HOST not set, outgoing email will only be logged");
            Arc::new(LogMailer)
        }
    };

    let mut forms = FormRegistry::with_defaults();
    if let Some(path) = &config.submission_forms {
        let count = forms.extend_from_file(path)?;
        tracing::info!(path = %path.display(), count, "Loaded submission form schemas");
    }

    let state = Arc::new(state::AppState {
        pool,
        config: config.clone(),
        hooks: Arc::new(DefaultHookSet::new(&config, mailer)),
        forms: Arc::new(forms),
    });

    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Submissions listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
