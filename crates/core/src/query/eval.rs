//! Selector evaluation over a snapshot of notes.

use std::collections::HashSet;

use super::parser::Query;
use crate::resolve::links::LinkResolver;
use crate::store::NotePath;

/// What the evaluator needs to know about one note.
#[derive(Debug, Clone)]
pub struct QueryNote {
    pub path: NotePath,
    /// Normalized tags.
    pub tags: Vec<String>,
    /// Resolved outgoing links (fields and body).
    pub links: HashSet<NotePath>,
}

/// Select the notes matching `query`, in input order.
pub fn select(
    query: &Query,
    notes: &[QueryNote],
    context: Option<&NotePath>,
    links: &LinkResolver,
) -> Vec<NotePath> {
    notes
        .iter()
        .filter(|n| matches(query, n, context, links))
        .map(|n| n.path.clone())
        .collect()
}

fn matches(
    query: &Query,
    note: &QueryNote,
    context: Option<&NotePath>,
    links: &LinkResolver,
) -> bool {
    match query {
        Query::All => true,
        Query::Folder(dir) => note.path.is_inside(dir),
        Query::Tag(tag) => note.tags.iter().any(|t| {
            t == tag || t.strip_prefix(tag.as_str()).is_some_and(|rest| rest.starts_with('/'))
        }),
        Query::LinksTo(target) => {
            let target = match target {
                Some(raw) => links.resolve(raw),
                None => context.cloned(),
            };
            target.is_some_and(|t| note.links.contains(&t))
        }
        Query::Not(inner) => !matches(inner, note, context, links),
        Query::And(terms) => terms.iter().all(|q| matches(q, note, context, links)),
        Query::Or(terms) => terms.iter().any(|q| matches(q, note, context, links)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parse;

    fn note(path: &str, tags: &[&str], links: &[&str]) -> QueryNote {
        QueryNote {
            path: NotePath::new(path),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            links: links.iter().map(|l| NotePath::new(*l)).collect(),
        }
    }

    fn fixture() -> (Vec<QueryNote>, LinkResolver) {
        let notes = vec![
            note("Books/Dune.md", &["novel", "scifi/classic"], &["Authors/Herbert.md"]),
            note("Books/Draft.md", &["novel", "draft"], &[]),
            note("Authors/Herbert.md", &[], &[]),
            note("Inbox.md", &[], &["Books/Dune.md"]),
        ];
        let resolver = LinkResolver::from_notes(notes.iter().map(|n| &n.path));
        (notes, resolver)
    }

    fn run(q: &str, context: Option<&str>) -> Vec<String> {
        let (notes, resolver) = fixture();
        let ctx = context.map(NotePath::new);
        select(&parse(q).unwrap(), &notes, ctx.as_ref(), &resolver)
            .into_iter()
            .map(|p| p.to_string())
            .collect()
    }

    #[test]
    fn folder_and_tag() {
        assert_eq!(run("\"Books\" and -#draft", None), vec!["Books/Dune.md"]);
    }

    #[test]
    fn nested_tags_match_parent() {
        assert_eq!(run("#scifi", None), vec!["Books/Dune.md"]);
        assert!(run("#sci", None).is_empty());
    }

    #[test]
    fn links_to_named_and_context_note() {
        assert_eq!(run("[[Dune]]", None), vec!["Inbox.md"]);
        assert_eq!(run("[[]]", Some("Authors/Herbert.md")), vec!["Books/Dune.md"]);
        assert!(run("[[]]", None).is_empty());
    }

    #[test]
    fn all_notes() {
        assert_eq!(run("", None).len(), 4);
    }
}
