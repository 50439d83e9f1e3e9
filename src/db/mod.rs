mod assignments;
mod documents;
mod models;
mod notifications;
mod reviews;
mod submissions;
mod users;

pub use assignments::*;
pub use documents::*;
pub use models::*;
pub use notifications::*;
pub use reviews::*;
pub use submissions::*;
pub use users::*;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;

pub type DbPool = Arc<PgPool>;

pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    Ok(Arc::new(pool))
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
