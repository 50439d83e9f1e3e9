//! Swappable behaviors shared by the handlers: who may review, how free text
//! is rendered, how assignments are created and how email goes out.
//!
//! Handlers only see `Arc<dyn HookSet>` from the application state.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;
use tera::Context;

use crate::assignment;
use crate::config::Config;
use crate::db::{self, AssignmentOrigin, ReviewAssignment, User};
use crate::mail::{strip_tags, MailError, Mailer, OutgoingEmail};
use crate::markup::{MarkupRenderer, RenderedText};
use crate::templates::get_tera;

/// Permission that makes a user show up in the reviewer admin list.
pub const REVIEWER_PERMISSION: &str = "add_review";

#[async_trait]
pub trait HookSet: Send + Sync {
    async fn reviewers(&self, pool: &PgPool) -> Result<Vec<User>, sqlx::Error>;

    async fn create_assignments(
        &self,
        pool: &PgPool,
        submission_id: i32,
        origin: AssignmentOrigin,
    ) -> Result<Vec<ReviewAssignment>, sqlx::Error>;

    fn parse_content(&self, content: &str) -> String;

    fn render(&self, raw: &str) -> RenderedText {
        RenderedText::new(raw, |s| self.parse_content(s))
    }

    /// Sends the `emails/<kind>/` templates rendered with `context`.
    async fn send_email(&self, to: &[String], kind: &str, context: &Context)
        -> Result<(), MailError>;

    async fn send_mass_mail(&self, emails: &[OutgoingEmail]) -> Result<usize, MailError>;
}

pub struct DefaultHookSet {
    renderer: MarkupRenderer,
    site_name: String,
    static_url: String,
    from_email: String,
    mailer: Arc<dyn Mailer>,
}

impl DefaultHookSet {
    pub fn new(config: &Config, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            renderer: config.markup_renderer,
            site_name: config.site_name.clone(),
            static_url: config.static_url.clone(),
            from_email: config.default_from_email.clone(),
            mailer,
        }
    }

    pub fn compose(
        &self,
        to: &[String],
        kind: &str,
        context: &Context,
    ) -> Result<OutgoingEmail, MailError> {
        let mut ctx = Context::new();
        ctx.insert("current_site", &serde_json::json!({ "name": self.site_name }));
        ctx.insert("static_url", &self.static_url);
        ctx.extend(context.clone());

        let tera = get_tera();
        let subject = tera.render(&format!("emails/{kind}/subject.txt"), &ctx)?;
        let html = tera.render(&format!("emails/{kind}/message.html"), &ctx)?;

        Ok(OutgoingEmail {
            from: self.from_email.clone(),
            to: to.to_vec(),
            subject: format!("[{}] {}", self.site_name, subject.trim()),
            text_body: strip_tags(&html),
            html_body: Some(html),
        })
    }
}

#[async_trait]
impl HookSet for DefaultHookSet {
    async fn reviewers(&self, pool: &PgPool) -> Result<Vec<User>, sqlx::Error> {
        db::users_with_permission(pool, REVIEWER_PERMISSION).await
    }

    async fn create_assignments(
        &self,
        pool: &PgPool,
        submission_id: i32,
        origin: AssignmentOrigin,
    ) -> Result<Vec<ReviewAssignment>, sqlx::Error> {
        assignment::create_assignments(pool, submission_id, origin).await
    }

    fn parse_content(&self, content: &str) -> String {
        self.renderer.render(content)
    }

    async fn send_email(
        &self,
        to: &[String],
        kind: &str,
        context: &Context,
    ) -> Result<(), MailError> {
        if to.is_empty() {
            return Ok(());
        }
        let email = self.compose(to, kind, context)?;
        self.mailer.send(&email).await?;
        tracing::debug!(kind, recipients = to.len(), "Notification email dispatched");
        Ok(())
    }

    async fn send_mass_mail(&self, emails: &[OutgoingEmail]) -> Result<usize, MailError> {
        self.mailer.send_mass(emails).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::MemoryMailer;
    use crate::markup::MarkupRenderer;

    fn hooks(mailer: Arc<MemoryMailer>) -> DefaultHookSet {
        DefaultHookSet {
            renderer: MarkupRenderer::Markdown,
            site_name: "RustConf".into(),
            static_url: "/static/".into(),
            from_email: "program@example.com".into(),
            mailer,
        }
    }

    #[test]
    fn render_derives_html_from_raw() {
        let hooks = hooks(Arc::new(MemoryMailer::default()));
        let text = hooks.render("**solid** proposal");
        assert_eq!(text.raw(), "**solid** proposal");
        assert!(text.html().contains("<strong>solid</strong>"));
        assert_eq!(hooks.render(text.raw()).html(), text.html());
    }

    #[tokio::test]
    async fn send_email_prefixes_subject_and_attaches_plain_text() {
        let mailer = Arc::new(MemoryMailer::default());
        let hooks = hooks(mailer.clone());

        let mut ctx = Context::new();
        ctx.insert("user", &serde_json::json!({ "username": "ada" }));
        ctx.insert("submission", &serde_json::json!({ "id": 3, "title": "Pin projections" }));
        hooks
            .send_email(&["rev@example.com".to_string()], "submission_updated", &ctx)
            .await
            .unwrap();

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].subject.starts_with("[RustConf] "));
        assert!(sent[0].subject.contains("Pin projections"));
        assert_eq!(sent[0].from, "program@example.com");
        assert!(!sent[0].text_body.contains('<'));
        assert!(sent[0].html_body.as_deref().unwrap_or("").contains("Pin projections"));
    }

    #[tokio::test]
    async fn no_recipients_sends_nothing() {
        let mailer = Arc::new(MemoryMailer::default());
        hooks(mailer.clone())
            .send_email(&[], "submission_updated", &Context::new())
            .await
            .unwrap();
        assert!(mailer.sent().is_empty());
    }
}
