use std::path::{Path, PathBuf};

use crate::SessionError;

pub const LABEL_PLACEHOLDER: &str = "{label}";

/// A rename template known to contain the `{label}` placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameTemplate(String);

impl RenameTemplate {
    pub fn parse(template: &str) -> Result<Self, SessionError> {
        if !template.contains(LABEL_PLACEHOLDER) {
            return Err(SessionError::InvalidTemplate);
        }
        Ok(Self(template.to_string()))
    }

    /// `{label}.<ext>` for the extension of `source`, or bare `{label}` without one.
    pub fn for_source(source: &Path) -> Self {
        match source.extension() {
            Some(ext) => Self(format!("{LABEL_PLACEHOLDER}.{}", ext.to_string_lossy())),
            None => Self(LABEL_PLACEHOLDER.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name for `label`, keeping the extension of `source`.
    pub fn file_name(&self, label: &str, source: &Path) -> String {
        let mut name = self.0.replace(LABEL_PLACEHOLDER, &sanitize_label(label));
        if let Some(ext) = source.extension().map(|e| e.to_string_lossy()) {
            let suffix = format!(".{ext}");
            let has_suffix = name.len() >= suffix.len()
                && name.is_char_boundary(name.len() - suffix.len())
                && name[name.len() - suffix.len()..].eq_ignore_ascii_case(&suffix);
            if !has_suffix {
                name.push_str(&suffix);
            }
        }
        name
    }

    /// Sibling of `source` named after `label`.
    pub fn destination(&self, label: &str, source: &Path) -> PathBuf {
        let name = self.file_name(label, source);
        match source.parent() {
            Some(dir) => dir.join(name),
            None => PathBuf::from(name),
        }
    }
}

/// Makes a label safe to embed in a file name.
///
/// Path separators and characters Windows forbids become `_`, runs of `_`
/// collapse, and leading or trailing `_`, spaces and dots are dropped.
pub fn sanitize_label(label: &str) -> String {
    let cleaned: String = label
        .trim()
        .chars()
        .map(|c| if is_forbidden(c) { '_' } else { c })
        .collect();
    let cleaned = cleaned.trim_matches(&['_', ' ', '.'][..]);

    let mut compacted = String::with_capacity(cleaned.len());
    let mut prev_underscore = false;
    for c in cleaned.chars() {
        if c == '_' {
            if !prev_underscore {
                compacted.push(c);
            }
            prev_underscore = true;
        } else {
            compacted.push(c);
            prev_underscore = false;
        }
    }
    compacted
}

fn is_forbidden(c: char) -> bool {
    matches!(c,
        '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0'..='\u{1F}'
    )
}
