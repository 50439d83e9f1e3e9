//! Form schemas.
//!
//! Each submission kind has its own field schema, looked up by slug in a
//! [`FormRegistry`] built at startup. The fixed forms used on review pages are
//! plain structs validated with `validator`.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};
use validator::Validate;

/// The common `title` field every kind carries; stored in its own column.
pub const TITLE_FIELD: &str = "title";
const TITLE_MAX_LENGTH: usize = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldWidget {
    Text,
    Textarea,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub label: String,
    #[serde(default = "default_widget")]
    pub widget: FieldWidget,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub max_length: Option<usize>,
}

fn default_widget() -> FieldWidget {
    FieldWidget::Text
}

impl FieldSpec {
    fn new(name: &str, label: &str, widget: FieldWidget, required: bool) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            widget,
            required,
            max_length: None,
        }
    }

    fn max_length(mut self, max: usize) -> Self {
        self.max_length = Some(max);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KindSchema {
    pub slug: String,
    /// Fields in display order, not counting the title.
    pub fields: Vec<FieldSpec>,
    /// Whether submitters may still edit submissions of this kind.
    #[serde(default = "default_editable")]
    pub editable: bool,
}

fn default_editable() -> bool {
    true
}

/// Field name to message.
pub type FormErrors = BTreeMap<String, String>;

#[derive(Debug, Clone, Serialize)]
pub struct FormRow {
    #[serde(flatten)]
    pub field: FieldSpec,
    pub value: String,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CleanedSubmission {
    pub title: String,
    pub details: serde_json::Value,
}

impl KindSchema {
    pub fn new(slug: &str, fields: Vec<FieldSpec>) -> Self {
        Self {
            slug: slug.to_string(),
            fields,
            editable: true,
        }
    }

    /// All fields including the title, in display order.
    pub fn all_fields(&self) -> Vec<FieldSpec> {
        let mut fields = vec![
            FieldSpec::new(TITLE_FIELD, "Title", FieldWidget::Text, true).max_length(TITLE_MAX_LENGTH),
        ];
        fields.extend(self.fields.iter().cloned());
        fields
    }

    /// Validates posted values. Unknown keys are ignored.
    pub fn clean(&self, input: &HashMap<String, String>) -> Result<CleanedSubmission, FormErrors> {
        let mut errors = FormErrors::new();
        let mut details = serde_json::Map::new();
        let mut title = String::new();

        for field in self.all_fields() {
            let value = input
                .get(&field.name)
                .map(|v| v.trim().to_string())
                .unwrap_or_default();

            if field.required && value.is_empty() {
                errors.insert(field.name.clone(), "This field is required.".to_string());
                continue;
            }
            if let Some(max) = field.max_length {
                if value.chars().count() > max {
                    errors.insert(
                        field.name.clone(),
                        format!("Ensure this value has at most {max} characters."),
                    );
                    continue;
                }
            }

            if field.name == TITLE_FIELD {
                title = value;
            } else {
                details.insert(field.name.clone(), serde_json::Value::String(value));
            }
        }

        if errors.is_empty() {
            Ok(CleanedSubmission {
                title,
                details: serde_json::Value::Object(details),
            })
        } else {
            Err(errors)
        }
    }

    /// Fields paired with their current value and error, for rendering.
    pub fn rows(&self, values: &HashMap<String, String>, errors: &FormErrors) -> Vec<FormRow> {
        self.all_fields()
            .into_iter()
            .map(|field| FormRow {
                value: values.get(&field.name).cloned().unwrap_or_default(),
                error: errors.get(&field.name).cloned(),
                field,
            })
            .collect()
    }

    /// Current values of a stored submission, for pre-filling the edit form.
    pub fn initial(&self, title: &str, details: &serde_json::Value) -> HashMap<String, String> {
        let mut values = HashMap::new();
        values.insert(TITLE_FIELD.to_string(), title.to_string());
        for field in &self.fields {
            if let Some(v) = details.get(&field.name).and_then(|v| v.as_str()) {
                values.insert(field.name.clone(), v.to_string());
            }
        }
        values
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("failed to read form definitions: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid form definitions: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Kind slug to schema.
#[derive(Debug, Clone, Default)]
pub struct FormRegistry {
    schemas: HashMap<String, KindSchema>,
}

impl FormRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schemas for the kinds seeded by the initial migration.
    pub fn with_defaults() -> Self {
        use FieldWidget::{Text, Textarea};

        let mut registry = Self::new();
        registry.register(KindSchema::new(
            "talk",
            vec![
                FieldSpec::new("abstract", "Abstract", Textarea, true),
                FieldSpec::new("description", "Description", Textarea, false),
                FieldSpec::new("audience_level", "Audience level", Text, false).max_length(50),
            ],
        ));
        registry.register(KindSchema::new(
            "tutorial",
            vec![
                FieldSpec::new("abstract", "Abstract", Textarea, true),
                FieldSpec::new("prerequisites", "Prerequisites", Textarea, false),
                FieldSpec::new("audience_level", "Audience level", Text, false).max_length(50),
            ],
        ));
        registry.register(KindSchema::new(
            "panel",
            vec![
                FieldSpec::new("abstract", "Abstract", Textarea, true),
                FieldSpec::new("panelists", "Panelists", Textarea, true),
            ],
        ));
        registry.register(KindSchema::new(
            "poster",
            vec![FieldSpec::new("abstract", "Abstract", Textarea, true)],
        ));
        registry
    }

    /// Reads a JSON array of schemas; entries replace defaults with the same slug.
    pub fn extend_from_file(&mut self, path: &Path) -> Result<usize, RegistryError> {
        let raw = std::fs::read_to_string(path)?;
        let schemas: Vec<KindSchema> = serde_json::from_str(&raw)?;
        let count = schemas.len();
        for schema in schemas {
            self.register(schema);
        }
        Ok(count)
    }

    pub fn register(&mut self, schema: KindSchema) {
        self.schemas.insert(schema.slug.clone(), schema);
    }

    pub fn get(&self, slug: &str) -> Option<&KindSchema> {
        self.schemas.get(slug)
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginForm {
    #[validate(length(min = 1, message = "Enter your username."))]
    pub username: String,
    #[validate(length(min = 1, message = "Enter your password."))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct MessageForm {
    #[validate(length(min = 1, message = "Message cannot be empty."))]
    pub message: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReviewForm {
    #[validate(length(min = 1, message = "Comment cannot be empty."))]
    pub comment: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CommentForm {
    #[validate(length(min = 1, message = "Comment cannot be empty."))]
    pub text: String,
    #[serde(default)]
    pub public: Option<String>,
}

impl CommentForm {
    pub fn is_public(&self) -> bool {
        matches!(self.public.as_deref(), Some("on" | "true" | "1"))
    }
}

#[derive(Debug, Default, Validate)]
pub struct DocumentForm {
    #[validate(length(min = 1, max = 140, message = "Description must be 1 to 140 characters."))]
    pub description: String,
    pub file_name: String,
    #[validate(length(min = 1, message = "Choose a file to upload."))]
    pub content: Vec<u8>,
}

/// Flattens `validator` errors to field name to first message.
pub fn collect_errors(errors: &validator::ValidationErrors) -> FormErrors {
    errors
        .field_errors()
        .iter()
        .filter_map(|(field, errs)| {
            errs.first().map(|e| {
                let message = e
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "Invalid value.".to_string());
                (field.to_string(), message)
            })
        })
        .collect()
}
