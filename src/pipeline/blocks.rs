//! Model Reply Parsing
//!
//! Two grammars are recognised in model replies:
//!
//! - a fenced `json` block holding an object or array
//! - labeled code blocks: a line `**relative/path**`, then a fence opening
//!   line, the body, and a closing fence line

use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

static JSON_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```json\s*([\{\[].*?[\}\]])\s*```").expect("Invalid JSON block regex")
});

const FENCE: &str = "```";

#[derive(Debug, Error)]
pub enum JsonBlockError {
    #[error("No JSON block found in model output")]
    Missing,

    #[error("Invalid JSON in model output: {0}")]
    Invalid(#[from] serde_json::Error),
}

/// Parse the first fenced `json` block of a reply
pub fn extract_json_block(reply: &str) -> Result<serde_json::Value, JsonBlockError> {
    let captures = JSON_BLOCK
        .captures(reply.trim())
        .ok_or(JsonBlockError::Missing)?;
    let body = captures.get(1).ok_or(JsonBlockError::Missing)?.as_str();
    Ok(serde_json::from_str(body)?)
}

/// A code block introduced by a bold path label
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledBlock {
    pub label: String,
    pub language: Option<String>,
    pub body: String,
}

impl LabeledBlock {
    /// Body trimmed of surrounding blank space, newline-terminated
    pub fn file_contents(&self) -> String {
        let mut contents = self.body.trim().to_string();
        contents.push('\n');
        contents
    }
}

fn bold_label(line: &str) -> Option<&str> {
    let inner = line.trim().strip_prefix("**")?.strip_suffix("**")?.trim();
    (!inner.is_empty() && !inner.contains("**")).then_some(inner)
}

fn fence_language(line: &str) -> Option<Option<String>> {
    let tag = line.trim_start().strip_prefix(FENCE)?.trim();
    Some((!tag.is_empty()).then(|| tag.to_string()))
}

/// Collect every complete labeled block in reply order
pub fn parse_labeled_blocks(reply: &str) -> Vec<LabeledBlock> {
    let lines: Vec<&str> = reply.lines().collect();
    let mut blocks = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let Some(label) = bold_label(lines[i]) else {
            i += 1;
            continue;
        };
        let Some(language) = lines.get(i + 1).and_then(|l| fence_language(l)) else {
            i += 1;
            continue;
        };

        let body_start = i + 2;
        let close = lines[body_start.min(lines.len())..]
            .iter()
            .position(|l| l.trim() == FENCE)
            .map(|offset| body_start + offset);

        match close {
            Some(end) => {
                blocks.push(LabeledBlock {
                    label: label.to_string(),
                    language,
                    body: lines[body_start..end].join("\n"),
                });
                i = end + 1;
            }
            None => {
                tracing::debug!("Unterminated block for label '{}' ignored", label);
                break;
            }
        }
    }

    blocks
}

/// Normalize a model-supplied relative path
///
/// Returns `None` for empty, absolute or parent-escaping paths.
pub fn sanitize_relative_path(label: &str) -> Option<PathBuf> {
    let label = label.trim().trim_matches('`');
    if label.is_empty() || label.starts_with('/') || label.starts_with('\\') {
        return None;
    }

    let mut clean = PathBuf::new();
    for component in Path::new(label).components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    (!clean.as_os_str().is_empty()).then_some(clean)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_json_object() {
        let reply = "Here you go:\n```json\n{\"endpoints\": [{\"path\": \"/users\"}]}\n```\nDone.";
        let value = extract_json_block(reply).unwrap();
        assert_eq!(value, json!({"endpoints": [{"path": "/users"}]}));
    }

    #[test]
    fn test_extract_json_array() {
        let reply = "```json\n[{\"name\": \"users\"}]\n```";
        assert_eq!(extract_json_block(reply).unwrap(), json!([{"name": "users"}]));
    }

    #[test]
    fn test_missing_block() {
        let err = extract_json_block("no fences here {\"a\": 1}").unwrap_err();
        assert!(matches!(err, JsonBlockError::Missing));
        assert!(matches!(
            extract_json_block("```python\n{\"a\": 1}\n```").unwrap_err(),
            JsonBlockError::Missing
        ));
    }

    #[test]
    fn test_invalid_json_in_block() {
        let err = extract_json_block("```json\n{\"a\": }\n```").unwrap_err();
        assert!(matches!(err, JsonBlockError::Invalid(_)));
    }

    #[test]
    fn test_parse_labeled_blocks() {
        let reply = "\
Intro text

**app/models/user.py**
```python
class User(Base):
    pass
```

Some commentary.
  **app/models/order.py**
```
class Order(Base):
    pass
```
**not followed by fence**
plain line
";
        let blocks = parse_labeled_blocks(reply);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].label, "app/models/user.py");
        assert_eq!(blocks[0].language.as_deref(), Some("python"));
        assert_eq!(blocks[0].body, "class User(Base):\n    pass");
        assert_eq!(blocks[1].label, "app/models/order.py");
        assert_eq!(blocks[1].language, None);
        assert_eq!(blocks[1].file_contents(), "class Order(Base):\n    pass\n");
    }

    #[test]
    fn test_unterminated_block_dropped() {
        let reply = "**a.py**\n```python\nprint('x')\n";
        assert!(parse_labeled_blocks(reply).is_empty());
    }

    #[test]
    fn test_tagged_inner_fence_does_not_close_block() {
        let reply = "**docs/usage.md**\n```markdown\nExample request:\n```json\n{\"id\": 1}\n```\nDone.\n```\n";
        let blocks = parse_labeled_blocks(reply);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].label, "docs/usage.md");
        assert_eq!(blocks[0].language.as_deref(), Some("markdown"));
        assert_eq!(
            blocks[0].body,
            "Example request:\n```json\n{\"id\": 1}\n```\nDone."
        );
    }

    #[test]
    fn test_sanitize_relative_path() {
        assert_eq!(
            sanitize_relative_path("app/models/user.py"),
            Some(PathBuf::from("app/models/user.py"))
        );
        assert_eq!(
            sanitize_relative_path("./users.py"),
            Some(PathBuf::from("users.py"))
        );
        assert_eq!(sanitize_relative_path("/etc/passwd"), None);
        assert_eq!(sanitize_relative_path("../escape.py"), None);
        assert_eq!(sanitize_relative_path("routes/../../x.py"), None);
        assert_eq!(sanitize_relative_path("  "), None);
    }
}
