//! Link resolution from field values to note paths.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde_yaml::Value;

use crate::store::NotePath;

static WIKILINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[([^\]|]+)(?:\|[^\]]*)?\]\]").unwrap());

/// Resolves link text (`[[Dune]]`, `Books/Dune.md`, `Dune|alias`) to notes.
///
/// Full paths win; otherwise a file name resolves only when exactly one note
/// carries it. Ambiguous names stay unresolved.
#[derive(Debug, Clone, Default)]
pub struct LinkResolver {
    by_path: HashMap<String, NotePath>,
    /// `None` marks a name shared by several notes.
    by_stem: HashMap<String, Option<NotePath>>,
}

impl LinkResolver {
    pub fn from_notes<'a>(notes: impl IntoIterator<Item = &'a NotePath>) -> Self {
        let mut by_path = HashMap::new();
        let mut by_stem: HashMap<String, Option<NotePath>> = HashMap::new();

        for note in notes {
            by_path.insert(note.without_extension().to_lowercase(), note.clone());

            by_stem
                .entry(note.stem().to_lowercase())
                .and_modify(|slot| {
                    if slot.as_ref() != Some(note) {
                        *slot = None;
                    }
                })
                .or_insert_with(|| Some(note.clone()));
        }

        Self { by_path, by_stem }
    }

    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }

    /// Resolve a single link target.
    pub fn resolve(&self, raw: &str) -> Option<NotePath> {
        let target = strip_link(raw);
        if target.is_empty() {
            return None;
        }
        let key = target.to_lowercase();
        self.by_path
            .get(&key)
            .or_else(|| self.by_stem.get(&key).and_then(Option::as_ref))
            .cloned()
    }

    /// Every note referenced by a field value.
    ///
    /// Strings contribute each wikilink they contain, or themselves as a bare
    /// link when they contain none. Lists are searched element by element.
    pub fn references_in(&self, value: &Value) -> Vec<NotePath> {
        let mut out = Vec::new();
        self.collect(value, &mut out);
        out.dedup();
        out
    }

    fn collect(&self, value: &Value, out: &mut Vec<NotePath>) {
        match value {
            Value::String(s) => {
                let mut found_link = false;
                for cap in WIKILINK_RE.captures_iter(s) {
                    found_link = true;
                    if let Some(p) = self.resolve(&cap[1]) {
                        out.push(p);
                    }
                }
                if !found_link && let Some(p) = self.resolve(s) {
                    out.push(p);
                }
            }
            Value::Sequence(items) => {
                for item in items {
                    self.collect(item, out);
                }
            }
            Value::Tagged(tagged) => self.collect(&tagged.value, out),
            _ => {}
        }
    }

    /// Whether `value` references `note`.
    pub fn references(&self, value: &Value, note: &NotePath) -> bool {
        self.references_in(value).iter().any(|p| p == note)
    }
}

/// `[[Books/Dune.md#Plot|Dune]]` → `Books/Dune`
fn strip_link(raw: &str) -> &str {
    let s = raw.trim();
    let s = s.strip_prefix("[[").unwrap_or(s);
    let s = s.strip_suffix("]]").unwrap_or(s);
    let s = s.split('|').next().unwrap_or(s);
    let s = s.split('#').next().unwrap_or(s);
    let s = s.trim().trim_start_matches('/');
    s.strip_suffix(".md").unwrap_or(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> LinkResolver {
        let notes: Vec<NotePath> = ["Books/Dune.md", "Projects/Alpha.md", "Archive/Old/Tasks.md"]
            .into_iter()
            .map(NotePath::new)
            .collect();
        LinkResolver::from_notes(&notes)
    }

    #[test]
    fn resolves_link_forms() {
        let r = resolver();
        let dune = Some(NotePath::new("Books/Dune.md"));
        assert_eq!(r.resolve("[[Books/Dune]]"), dune);
        assert_eq!(r.resolve("[[Dune|The Book]]"), dune);
        assert_eq!(r.resolve("Books/Dune.md"), dune);
        assert_eq!(r.resolve("[[dune#Plot]]"), dune);
        assert_eq!(
            r.resolve("Archive/Old/Tasks"),
            Some(NotePath::new("Archive/Old/Tasks.md"))
        );
        assert_eq!(r.resolve("[[Missing]]"), None);
        assert_eq!(r.resolve(""), None);
    }

    #[test]
    fn shared_name_resolves_only_by_path() {
        let notes: Vec<NotePath> = ["Books/Dune.md", "Archive/Dune.md", "Books/Dune.md"]
            .into_iter()
            .map(NotePath::new)
            .collect();
        let r = LinkResolver::from_notes(&notes);
        assert_eq!(r.resolve("[[Dune]]"), None);
        assert_eq!(r.resolve("[[Archive/Dune]]"), Some(NotePath::new("Archive/Dune.md")));
        assert!(r.references_in(&Value::String("[[Dune]]".into())).is_empty());

        let single: Vec<NotePath> = vec![NotePath::new("Books/Dune.md"), NotePath::new("Books/Dune.md")];
        let r = LinkResolver::from_notes(&single);
        assert_eq!(r.resolve("Dune"), Some(NotePath::new("Books/Dune.md")));
    }

    #[test]
    fn references_in_strings_and_lists() {
        let r = resolver();
        let v: Value = serde_yaml::from_str("['[[Alpha]]', 'Dune', 'nothing']").unwrap();
        assert_eq!(
            r.references_in(&v),
            vec![NotePath::new("Projects/Alpha.md"), NotePath::new("Books/Dune.md")]
        );

        let v = Value::String("see [[Alpha]] and [[Dune]]".into());
        assert_eq!(r.references_in(&v).len(), 2);
        assert!(r.references(&v, &NotePath::new("Projects/Alpha.md")));
    }
}
