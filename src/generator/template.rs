use crate::analyzer::ProjectDescriptor;
use chrono::{Datelike, NaiveDate};
use std::collections::BTreeMap;
use std::path::Path;

/// Values substituted into pipeline templates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderContext {
    values: BTreeMap<String, String>,
}

impl RenderContext {
    pub fn for_project(descriptor: &ProjectDescriptor, today: NaiveDate) -> Self {
        let pipeline_type = descriptor.pipeline_type();
        let mut context = Self::default();
        context.insert("creation_date", today.format("%Y-%m-%d").to_string());
        context.insert("creation_year", today.year().to_string());
        context.insert("project_name", descriptor.name.clone());
        context.insert("language", descriptor.language.to_string());

        if pipeline_type.contains('_') {
            let mut parts = pipeline_type.split('_');
            if let (Some(language), Some(kind)) = (parts.next(), parts.next()) {
                context.insert("original_language", language.to_string());
                context.insert("original_type", kind.to_string());
            }
        }
        context.insert("pipeline_type", pipeline_type);
        context
    }

    pub fn insert(&mut self, key: &str, value: String) {
        self.values.insert(key.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Turns template text into file content.
pub trait TemplateRenderer: Send + Sync {
    fn render(&self, template: &str, context: &RenderContext) -> String;
}

/// Replaces every `{{key}}` with its context value; unknown placeholders
/// are left as they are.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderRenderer;

impl TemplateRenderer for PlaceholderRenderer {
    fn render(&self, template: &str, context: &RenderContext) -> String {
        context.iter().fold(template.to_string(), |text, (key, value)| {
            let placeholder = format!("{{{{{key}}}}}");
            if text.contains(&placeholder) {
                text.replace(&placeholder, value)
            } else {
                text
            }
        })
    }
}

pub async fn load_template(path: &Path) -> std::io::Result<String> {
    tokio::fs::read_to_string(path).await
}
