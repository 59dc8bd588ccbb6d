//! The scripting collaborator used by formulas and custom lookup functions.

use async_trait::async_trait;

use super::engine::LuaEngine;
use super::types::{Bindings, SandboxConfig, ScriptError};

/// Evaluates user expressions against named bindings.
#[async_trait]
pub trait ScriptSandbox: Send + Sync {
    /// Run `expression` with `bindings` visible as globals.
    async fn run(
        &self,
        expression: &str,
        bindings: &Bindings,
    ) -> Result<serde_json::Value, ScriptError>;
}

/// [`ScriptSandbox`] backed by a fresh sandboxed Lua VM per run, so no state
/// leaks between expressions.
#[derive(Debug, Clone, Default)]
pub struct LuaSandbox {
    config: SandboxConfig,
}

impl LuaSandbox {
    pub fn new(config: SandboxConfig) -> Self {
        Self { config }
    }

    /// Synchronous form of [`ScriptSandbox::run`].
    pub fn run_blocking(
        &self,
        expression: &str,
        bindings: &Bindings,
    ) -> Result<serde_json::Value, ScriptError> {
        let engine = LuaEngine::new(&self.config)?;
        engine.bind(bindings)?;
        engine.eval_json(expression)
    }
}

#[async_trait]
impl ScriptSandbox for LuaSandbox {
    async fn run(
        &self,
        expression: &str,
        bindings: &Bindings,
    ) -> Result<serde_json::Value, ScriptError> {
        self.run_blocking(expression, bindings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_runs_are_isolated() {
        let sandbox = LuaSandbox::default();
        let bindings = Bindings::new();
        sandbox.run("leaked = 1", &bindings).await.unwrap();
        assert_eq!(sandbox.run("leaked", &bindings).await.unwrap(), json!(null));
    }

    #[tokio::test]
    async fn test_pages_binding() {
        let sandbox = LuaSandbox::default();
        let mut bindings = Bindings::new();
        bindings.insert("pages".into(), json!([{"n": 2}, {"n": 3}]));
        let total = sandbox
            .run("local t = 0; for _, p in ipairs(pages) do t = t + p.n end; return t", &bindings)
            .await
            .unwrap();
        assert_eq!(total, json!(5));
    }
}
