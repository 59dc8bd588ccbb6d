//! Note content extraction: front matter, tags, inline fields, body links.

use std::sync::LazyLock;

use regex::Regex;
use serde_yaml::Value;

use crate::frontmatter::{self, Frontmatter, FrontmatterParseError};
use crate::store::normalize_tag;

/// Metadata pulled out of a single markdown note.
#[derive(Debug, Clone, Default)]
pub struct ExtractedNote {
    pub frontmatter: Frontmatter,
    /// Normalized tags from the `tags` key and inline `#tags`, deduplicated.
    pub tags: Vec<String>,
    /// Inline `key:: value` fields in document order. Repeated keys are
    /// folded into one list value.
    pub inline_fields: Vec<(String, Value)>,
    /// Raw wikilink targets found in the body.
    pub links: Vec<String>,
}

// Matches [[target]], [[target|alias]] and [[target#section]]
static WIKILINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[([^\]|]+)(?:\|([^\]]+))?\]\]").unwrap());

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)#([\p{L}_][\p{L}\p{N}_/\-]*)").unwrap());

static FULL_LINE_FIELD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:[-*]\s+)?([\p{L}\p{N}_][\p{L}\p{N}_ \-]*?)::\s*(.*?)\s*$").unwrap()
});

static BRACKET_FIELD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\[(]([\p{L}\p{N}_][\p{L}\p{N}_ \-]*?)::\s*([^\])]*?)\s*[\])]").unwrap()
});

/// Extract metadata from note content.
pub fn extract_note(content: &str) -> Result<ExtractedNote, FrontmatterParseError> {
    let parsed = frontmatter::parse(content)?;
    let fm = parsed.frontmatter.unwrap_or_default();

    let mut tags = frontmatter_tags(&fm);
    let mut inline: Vec<(String, Value)> = Vec::new();
    let mut links = Vec::new();

    let mut in_code = false;
    for line in parsed.body.lines() {
        if line.trim_start().starts_with("```") {
            in_code = !in_code;
            continue;
        }
        if in_code {
            continue;
        }

        for cap in TAG_RE.captures_iter(line) {
            tags.push(normalize_tag(&cap[1]));
        }

        if let Some(cap) = FULL_LINE_FIELD_RE.captures(line)
            && !line.trim_start().starts_with('[')
        {
            push_inline(&mut inline, cap[1].trim(), &cap[2]);
        } else {
            for cap in BRACKET_FIELD_RE.captures_iter(line) {
                push_inline(&mut inline, cap[1].trim(), &cap[2]);
            }
        }

        for cap in WIKILINK_RE.captures_iter(line) {
            links.push(cap[1].trim().to_string());
        }
    }

    let mut seen = std::collections::HashSet::new();
    tags.retain(|t| !t.is_empty() && seen.insert(t.clone()));

    Ok(ExtractedNote { frontmatter: fm, tags, inline_fields: inline, links })
}

fn frontmatter_tags(fm: &Frontmatter) -> Vec<String> {
    let value = fm.get("tags").or_else(|| fm.get("tag"));
    match value {
        Some(Value::String(s)) => s
            .split(|c: char| c == ',' || c.is_whitespace())
            .map(normalize_tag)
            .collect(),
        Some(Value::Sequence(seq)) => {
            seq.iter().filter_map(|v| v.as_str()).map(normalize_tag).collect()
        }
        _ => Vec::new(),
    }
}

fn push_inline(fields: &mut Vec<(String, Value)>, key: &str, raw: &str) {
    let value = parse_inline_value(raw);
    if let Some((_, existing)) = fields.iter_mut().find(|(k, _)| k == key) {
        match existing {
            Value::Sequence(seq) => seq.push(value),
            other => {
                let first = std::mem::replace(other, Value::Null);
                *other = Value::Sequence(vec![first, value]);
            }
        }
    } else {
        fields.push((key.to_string(), value));
    }
}

/// Interpret an inline field value: numbers and booleans are typed,
/// everything else (wikilinks included) stays a string.
pub fn parse_inline_value(raw: &str) -> Value {
    let raw = raw.trim();
    if raw.is_empty() {
        return Value::Null;
    }
    match raw {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(i) = raw.parse::<i64>() {
        return Value::Number(i.into());
    }
    if let Ok(f) = raw.parse::<f64>()
        && f.is_finite()
    {
        return Value::Number(f.into());
    }
    Value::String(raw.to_string())
}
