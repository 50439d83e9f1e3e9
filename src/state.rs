use crate::config::Config;
use crate::db::DbPool;
use crate::forms::FormRegistry;
use crate::hooks::HookSet;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub config: Arc<Config>,
    pub hooks: Arc<dyn HookSet>,
    pub forms: Arc<FormRegistry>,
}
