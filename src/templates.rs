use std::path::Path;
use std::sync::OnceLock;

use axum::response::Html;
use tera::{Context, Tera};

use crate::error::AppResult;

static TERA: OnceLock<Tera> = OnceLock::new();

pub fn get_tera() -> &'static Tera {
    TERA.get_or_init(|| {
        load_templates(Path::new("templates")).unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to load templates");
            Tera::default()
        })
    })
}

/// Loads every template under `dir`, keyed by its path relative to `dir`
/// (e.g. `emails/submission_updated/subject.txt`).
pub fn load_templates(dir: &Path) -> Result<Tera, tera::Error> {
    let glob = format!("{}/**/*", dir.display());
    Tera::new(&glob)
}

pub fn render_page(name: &str, ctx: &Context) -> AppResult<Html<String>> {
    Ok(Html(get_tera().render(name, ctx)?))
}

/// Renders a template body supplied at runtime (notification bodies).
pub fn render_str(source: &str, ctx: &Context) -> Result<String, tera::Error> {
    Tera::one_off(source, ctx, false)
}
