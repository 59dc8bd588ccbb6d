//! Lookup fields: values aggregated from the notes that link back to the
//! owning note through a named field.

use thiserror::Error;

use super::links::LinkResolver;
use super::page_view;
use crate::fields::{LookupOptions, LookupOutput, Summary};
use crate::scripting::{Bindings, ScriptError, ScriptSandbox};
use crate::store::{self, DocumentStore, NotePath, QueryEvaluator, StoreError};

/// A lookup whose selector, reads or custom function failed.
#[derive(Debug, Clone, Error)]
pub enum LookupError {
    #[error("source query failed: {0}")]
    Query(String),

    #[error("failed to read {note}: {message}")]
    Store { note: NotePath, message: String },

    #[error("lookup has no {0} configured")]
    MissingOption(&'static str),

    #[error("custom function failed: {0}")]
    Script(#[from] ScriptError),
}

/// Collaborators a lookup reads from.
#[derive(Clone, Copy)]
pub struct LookupSources<'a> {
    pub store: &'a dyn DocumentStore,
    pub queries: &'a dyn QueryEvaluator,
    pub sandbox: &'a dyn ScriptSandbox,
    pub links: &'a LinkResolver,
}

/// Compute the value of a lookup defined on `note`.
pub async fn compute_lookup(
    sources: LookupSources<'_>,
    note: &NotePath,
    options: &LookupOptions,
) -> Result<serde_json::Value, LookupError> {
    let pages = matching_pages(sources, note, options).await?;
    tracing::debug!(note = %note, target = %options.target_field_name, matches = pages.len(), "Lookup matches");

    match options.output {
        LookupOutput::LinksList => Ok(serde_json::Value::Array(
            pages.iter().map(|(p, _)| serde_json::Value::String(p.to_link())).collect(),
        )),
        LookupOutput::LinksBulletList => {
            Ok(serde_json::Value::String(bullets(pages.iter().map(|(p, _)| p.to_link()))))
        }
        LookupOutput::BuiltinSummarizingFunction => {
            let summary = options.builtin.unwrap_or_default();
            summarize(summary, options.summarized_field_name.as_deref(), &pages)
        }
        LookupOutput::CustomList | LookupOutput::CustomBulletList => {
            let function = options
                .custom_list_function
                .as_deref()
                .filter(|f| !f.trim().is_empty())
                .ok_or(LookupError::MissingOption("custom_list_function"))?;
            let mut items = Vec::with_capacity(pages.len());
            for (_, page) in &pages {
                let mut bindings = Bindings::new();
                bindings.insert("page".to_string(), page.clone());
                items.push(sources.sandbox.run(function, &bindings).await?);
            }
            if options.output == LookupOutput::CustomList {
                Ok(serde_json::Value::Array(items))
            } else {
                Ok(serde_json::Value::String(bullets(items.iter().map(display))))
            }
        }
        LookupOutput::CustomSummarizingFunction => {
            let function = options
                .custom_summarizing_function
                .as_deref()
                .filter(|f| !f.trim().is_empty())
                .ok_or(LookupError::MissingOption("custom_summarizing_function"))?;
            let mut bindings = Bindings::new();
            bindings.insert(
                "pages".to_string(),
                serde_json::Value::Array(pages.into_iter().map(|(_, p)| p).collect()),
            );
            Ok(sources.sandbox.run(function, &bindings).await?)
        }
    }
}

/// Candidates from the source selector whose target field links to `note`,
/// with their values as page objects.
async fn matching_pages(
    sources: LookupSources<'_>,
    note: &NotePath,
    options: &LookupOptions,
) -> Result<Vec<(NotePath, serde_json::Value)>, LookupError> {
    let candidates = sources
        .queries
        .evaluate(&options.source, Some(note))
        .await
        .map_err(|e| LookupError::Query(e.to_string()))?;

    let mut pages = Vec::new();
    for candidate in candidates {
        let values = match store::field_values(sources.store, &candidate).await {
            Ok(values) => values,
            Err(StoreError::Read { path, message }) => {
                tracing::warn!(note = %path, error = %message, "Skipping unreadable lookup candidate");
                continue;
            }
            Err(e) => {
                return Err(LookupError::Store { note: candidate.clone(), message: e.to_string() });
            }
        };
        let Some(target) = values.get(&options.target_field_name) else {
            continue;
        };
        if sources.links.references(target, note) {
            let page = serde_json::Value::Object(page_view(&candidate, &values));
            pages.push((candidate, page));
        }
    }
    Ok(pages)
}

fn summarize(
    summary: Summary,
    field: Option<&str>,
    pages: &[(NotePath, serde_json::Value)],
) -> Result<serde_json::Value, LookupError> {
    if summary == Summary::CountAll {
        return Ok(serde_json::Value::from(pages.len()));
    }
    let field = field
        .filter(|f| !f.is_empty())
        .ok_or(LookupError::MissingOption("summarized_field_name"))?;
    let numbers: Vec<f64> = pages.iter().filter_map(|(_, p)| as_number(p.get(field)?)).collect();

    let result = match summary {
        Summary::Sum => Some(numbers.iter().sum()),
        Summary::Average if numbers.is_empty() => None,
        Summary::Average => Some(numbers.iter().sum::<f64>() / numbers.len() as f64),
        Summary::Max => numbers.iter().copied().reduce(f64::max),
        Summary::Min => numbers.iter().copied().reduce(f64::min),
        Summary::CountAll => Some(pages.len() as f64),
    };
    Ok(result.map(number).unwrap_or(serde_json::Value::Null))
}

fn as_number(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Whole numbers are stored as integers so equal sums compare equal.
fn number(n: f64) -> serde_json::Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        serde_json::Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n).map(serde_json::Value::Number).unwrap_or(serde_json::Value::Null)
    }
}

fn display(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn bullets(items: impl Iterator<Item = String>) -> String {
    items.map(|i| format!("- {i}")).collect::<Vec<_>>().join("\n")
}
