//! Template rendering collaborator.
//!
//! Template names come from a closed allow-list; a name never maps to an
//! arbitrary path. Placeholders use `{{ key }}` with dotted paths into the
//! supplied data (`{{ user.name }}`). Missing keys render as empty text.

use regex::{Captures, Regex};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, LazyLock};

use crate::error::TemplateError;

/// Every template the render operation may resolve.
pub const ALLOWED_TEMPLATES: &[&str] = &["email", "report", "reminder"];

const TEMPLATE_EXTENSION: &str = "tmpl";

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z0-9_]+)*)\s*\}\}")
        .expect("placeholder pattern is valid")
});

pub fn is_allowed(name: &str) -> bool {
    ALLOWED_TEMPLATES.contains(&name)
}

/// Where template bodies come from.
pub trait TemplateSource: Send + Sync {
    fn load(&self, name: &str) -> Result<String, TemplateError>;
}

/// Reads `<dir>/<name>.tmpl`.
pub struct FileTemplates {
    dir: PathBuf,
}

impl FileTemplates {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl TemplateSource for FileTemplates {
    fn load(&self, name: &str) -> Result<String, TemplateError> {
        let path = self.dir.join(format!("{name}.{TEMPLATE_EXTENSION}"));
        match std::fs::read_to_string(&path) {
            Ok(body) => Ok(body),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(TemplateError::Missing {
                name: name.to_string(),
                path: path.display().to_string(),
            }),
            Err(source) => Err(TemplateError::Unreadable {
                name: name.to_string(),
                source,
            }),
        }
    }
}

/// Fixed in-memory templates.
#[derive(Default)]
pub struct StaticTemplates {
    templates: HashMap<String, String>,
}

impl StaticTemplates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, body: &str) -> Self {
        self.templates.insert(name.to_string(), body.to_string());
        self
    }
}

impl TemplateSource for StaticTemplates {
    fn load(&self, name: &str) -> Result<String, TemplateError> {
        self.templates
            .get(name)
            .cloned()
            .ok_or_else(|| TemplateError::Missing {
                name: name.to_string(),
                path: "<static>".into(),
            })
    }
}

/// Resolves an allow-listed template and substitutes data into it.
/// Cheap to clone; the source is shared read-only.
#[derive(Clone)]
pub struct TemplateRenderer {
    source: Arc<dyn TemplateSource>,
}

impl TemplateRenderer {
    pub fn new(source: Arc<dyn TemplateSource>) -> Self {
        Self { source }
    }

    pub fn render(&self, name: &str, data: &Value) -> Result<String, TemplateError> {
        if !is_allowed(name) {
            return Err(TemplateError::NotAllowed(name.to_string()));
        }
        let body = self.source.load(name)?;
        Ok(substitute(&body, data))
    }
}

fn substitute(body: &str, data: &Value) -> String {
    PLACEHOLDER
        .replace_all(body, |caps: &Captures| {
            lookup(data, &caps[1]).map(display).unwrap_or_default()
        })
        .into_owned()
}

fn lookup<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(data, |node, key| node.get(key))
}

fn display(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
