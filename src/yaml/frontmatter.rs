//! Split, edit and re-render `---` delimited YAML front matter
//!
//! Item documents are Markdown files whose first line is `---`, followed by a
//! YAML mapping, a closing `---` (or `...`) line, and a free-form body. Edits
//! only ever touch the mapping; the body is carried through byte for byte.

use miette::Diagnostic;
use serde_yml::{Mapping, Value};
use thiserror::Error;

use super::diagnostics::YamlSyntaxError;

/// Errors that can occur while reading or writing front matter
#[derive(Debug, Error, Diagnostic)]
pub enum FrontMatterError {
    #[error("document does not start with a '---' front matter block")]
    #[diagnostic(
        code(workline::yaml::missing_front_matter),
        help("Start the file with '---', the item metadata, then another '---' line")
    )]
    Missing,

    #[error("front matter block is never closed")]
    #[diagnostic(
        code(workline::yaml::unterminated),
        help("Add a '---' line after the last metadata field")
    )]
    Unterminated,

    #[error("front matter must be a mapping of field names to values")]
    #[diagnostic(code(workline::yaml::not_mapping))]
    NotMapping,

    #[error(transparent)]
    #[diagnostic(transparent)]
    Syntax(#[from] YamlSyntaxError),

    #[error("failed to render front matter: {0}")]
    Render(String),
}

/// A parsed document: metadata mapping plus untouched body text
#[derive(Debug, Clone, PartialEq)]
pub struct FrontMatter {
    pub meta: Mapping,
    pub body: String,
}

impl FrontMatter {
    /// Parse a document; `filename` is only used for diagnostics
    pub fn parse(content: &str, filename: &str) -> Result<Self, FrontMatterError> {
        let content = content.strip_prefix('\u{feff}').unwrap_or(content);
        let mut lines = content.split_inclusive('\n');

        let first = lines.next().ok_or(FrontMatterError::Missing)?;
        if first.trim_end() != "---" {
            return Err(FrontMatterError::Missing);
        }

        let yaml_start = first.len();
        let mut pos = yaml_start;
        for line in lines {
            if matches!(line.trim_end(), "---" | "...") {
                let yaml = &content[yaml_start..pos];
                let body = &content[pos + line.len()..];
                let meta = parse_mapping(yaml, content, filename)?;
                return Ok(Self {
                    meta,
                    body: body.to_string(),
                });
            }
            pos += line.len();
        }

        Err(FrontMatterError::Unterminated)
    }

    /// Render back to document text
    pub fn render(&self) -> Result<String, FrontMatterError> {
        let mut yaml = if self.meta.is_empty() {
            String::new()
        } else {
            serde_yml::to_string(&Value::Mapping(self.meta.clone()))
                .map_err(|e| FrontMatterError::Render(e.to_string()))?
        };
        if !yaml.is_empty() && !yaml.ends_with('\n') {
            yaml.push('\n');
        }
        Ok(format!("---\n{}---\n{}", yaml, self.body))
    }

    /// Get a field value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.meta.get(key)
    }

    /// Get a string field, ignoring non-string values
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Set a field, replacing any previous value
    pub fn set(&mut self, key: &str, value: Value) {
        self.meta.insert(Value::String(key.to_string()), value);
    }

    /// Remove a field if present
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.meta.remove(key)
    }
}

fn parse_mapping(yaml: &str, document: &str, filename: &str) -> Result<Mapping, FrontMatterError> {
    if yaml.trim().is_empty() {
        return Ok(Mapping::new());
    }

    let value: Value = serde_yml::from_str(yaml)
        .map_err(|e| YamlSyntaxError::from_serde_error(&e, document, filename, 1))?;

    match value {
        Value::Mapping(map) => Ok(map),
        Value::Null => Ok(Mapping::new()),
        _ => Err(FrontMatterError::NotMapping),
    }
}
