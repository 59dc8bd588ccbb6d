//! Front matter extraction from markdown content.

use super::types::{Frontmatter, ParsedDocument};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrontmatterParseError {
    #[error("invalid YAML front matter: {0}")]
    InvalidYaml(#[from] serde_yaml::Error),
}

/// Split a note into its `---` fenced YAML block and body.
///
/// A document without an opening fence, or with an opening fence that is never
/// closed, has no front matter and is returned whole as the body.
pub fn parse(content: &str) -> Result<ParsedDocument, FrontmatterParseError> {
    let Some((yaml, body)) = split(content) else {
        return Ok(ParsedDocument { frontmatter: None, body: content.to_string() });
    };

    let frontmatter = Frontmatter::from_yaml(yaml)?;
    Ok(ParsedDocument { frontmatter: Some(frontmatter), body: body.to_string() })
}

fn split(content: &str) -> Option<(&str, &str)> {
    let trimmed = content.trim_start();
    let rest = trimmed.strip_prefix("---")?;
    let rest = rest.strip_prefix("\r\n").or_else(|| rest.strip_prefix('\n'))?;

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            let yaml = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return Some((yaml, body));
        }
        offset += line.len();
    }
    None
}
