//! Administrative commands run against the service database.

use clap::{Parser, Subcommand};

use submissions::assignment;
use submissions::auth::password::hash_password;
use submissions::auth::{PERM_CAN_MANAGE, PERM_CAN_REVIEW, PERM_CAN_REVIEW_SUBMISSIONS};
use submissions::db::{self, AssignmentOrigin};
use submissions::hooks::REVIEWER_PERMISSION;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Postgres connection string
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Top up every active submission to its reviewer target
    AssignReviewers,

    /// Create the reviewing permissions if they are missing
    CreateReviewPermissions,

    /// Create a user account
    CreateUser {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "NEW_USER_PASSWORD")]
        password: String,
        /// Mark the account as staff (may change results)
        #[arg(long)]
        staff: bool,
        /// Groups to join, e.g. `reviewers`; repeatable
        #[arg(long)]
        group: Vec<String>,
        /// Permission codenames to grant directly; repeatable
        #[arg(long)]
        permission: Vec<String>,
    },

    /// Store a result notification template
    CreateTemplate {
        #[arg(long)]
        label: String,
        #[arg(long)]
        from_address: String,
        #[arg(long)]
        subject: String,
        /// File holding the body template
        #[arg(long)]
        body_file: std::path::PathBuf,
    },
}

const REVIEW_PERMISSIONS: [(&str, &str); 4] = [
    (PERM_CAN_REVIEW, "Can review"),
    (PERM_CAN_MANAGE, "Can manage"),
    (PERM_CAN_REVIEW_SUBMISSIONS, "Can review submissions"),
    (REVIEWER_PERMISSION, "Can add review"),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "submissions=info,manage=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let pool = db::create_pool(&cli.database_url).await?;
    db::run_migrations(pool.as_ref()).await?;
    let pool = pool.as_ref();

    match cli.command {
        Command::AssignReviewers => {
            let ids = db::list_active_submission_ids(pool).await?;
            for id in &ids {
                tracing::info!(submission_id = id, "Creating assignments");
                assignment::create_assignments(pool, *id, AssignmentOrigin::AutoAssignedInitial)
                    .await?;
            }
            tracing::info!(count = ids.len(), "Assignment pass finished");
        }
        Command::CreateReviewPermissions => {
            for (codename, name) in REVIEW_PERMISSIONS {
                let created = db::ensure_permission(pool, codename, name).await?;
                tracing::info!(codename, created, "Permission ready");
            }
        }
        Command::CreateUser {
            username,
            email,
            password,
            staff,
            group,
            permission,
        } => {
            let hash = hash_password(&password).map_err(|e| format!("password hashing failed: {e}"))?;
            let user = db::create_user(pool, &username, &email, &hash, staff).await?;
            for name in &group {
                db::add_user_to_group(pool, user.id, name).await?;
            }
            for codename in &permission {
                if !db::grant_permission(pool, user.id, codename).await? {
                    return Err(format!("unknown permission {codename}").into());
                }
            }
            tracing::info!(user_id = user.id, username = %user.username, staff, "User created");
        }
        Command::CreateTemplate {
            label,
            from_address,
            subject,
            body_file,
        } => {
            let body = std::fs::read_to_string(&body_file)?;
            let template =
                db::create_template(pool, &label, &from_address, &subject, &body).await?;
            tracing::info!(template_id = template.id, label = %template.label, "Template created");
        }
    }

    Ok(())
}
