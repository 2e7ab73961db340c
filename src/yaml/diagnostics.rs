//! YAML error diagnostics pointing into the item document

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// YAML syntax error with source location
#[derive(Debug, Error, Diagnostic)]
#[error("YAML syntax error in front matter: {message}")]
#[diagnostic(code(workline::yaml::syntax))]
pub struct YamlSyntaxError {
    #[source_code]
    src: NamedSource<String>,

    #[label("error here")]
    span: SourceSpan,

    #[help]
    help: Option<String>,

    /// The underlying error message
    message: String,
}

impl YamlSyntaxError {
    /// Create a syntax error from a serde_yml error
    ///
    /// `line_offset` is the number of document lines that precede the YAML
    /// block (the opening `---` delimiter), so the label lands on the right
    /// line of the whole document.
    pub fn from_serde_error(
        err: &serde_yml::Error,
        source: &str,
        filename: &str,
        line_offset: usize,
    ) -> Self {
        let (line, column) = err
            .location()
            .map(|loc| (loc.line(), loc.column()))
            .unwrap_or((1, 1));

        let offset = line_col_to_offset(source, line + line_offset, column);
        let message = err.to_string();
        let help = generate_help(&message);

        Self {
            src: NamedSource::new(filename, source.to_string()),
            span: SourceSpan::from(offset..offset.saturating_add(1)),
            help,
            message,
        }
    }
}

/// Byte offset of a 1-based line/column position, clamped to the source
fn line_col_to_offset(source: &str, line: usize, column: usize) -> usize {
    let Some(start) = line_start(source, line) else {
        return source.len().saturating_sub(1);
    };

    let text = &source[start..];
    let line_end = text.find('\n').unwrap_or(text.len());
    text[..line_end]
        .char_indices()
        .nth(column.saturating_sub(1))
        .map(|(i, _)| start + i)
        .unwrap_or(start + line_end.min(column.saturating_sub(1)))
}

fn line_start(source: &str, line: usize) -> Option<usize> {
    if line <= 1 {
        return Some(0);
    }
    source
        .match_indices('\n')
        .nth(line - 2)
        .map(|(i, _)| i + 1)
        .filter(|&start| start < source.len())
}

/// Suggest a fix for the mistakes people make most when hand-editing metadata
fn generate_help(message: &str) -> Option<String> {
    let msg_lower = message.to_lowercase();

    if msg_lower.contains("tab") {
        return Some(
            "YAML requires spaces for indentation, not tabs. Replace tabs with spaces.".to_string(),
        );
    }

    if msg_lower.contains("duplicate key") {
        return Some("Each key can only appear once. Remove or rename the duplicate key.".to_string());
    }

    if msg_lower.contains("mapping values are not allowed") {
        return Some("Titles containing ':' need quotes: title: \"Auth: login page\"".to_string());
    }

    if msg_lower.contains("expected ','") || msg_lower.contains("flow sequence") {
        return Some("Write lists as [EP-0001, EP-0002] or one '- item' per line.".to_string());
    }

    if msg_lower.contains("expected block end") {
        return Some("Check your indentation - it may be inconsistent.".to_string());
    }

    None
}
