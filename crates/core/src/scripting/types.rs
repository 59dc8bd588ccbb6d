//! Scripting types and error definitions.

use std::collections::BTreeMap;

use thiserror::Error;

/// Named values made visible to an expression as Lua globals.
pub type Bindings = BTreeMap<String, serde_json::Value>;

/// Errors raised while evaluating a user expression.
#[derive(Debug, Clone, Error)]
pub enum ScriptError {
    /// Syntax or runtime error from the Lua runtime.
    #[error("Lua error: {0}")]
    Lua(String),

    /// The expression produced infinity or NaN (e.g. a division by zero).
    #[error("expression produced a non-finite number: {0}")]
    NonFinite(f64),

    /// The result cannot be represented as a field value.
    #[error("unsupported result: {0}")]
    Unsupported(String),

    /// Sandbox security violation.
    #[error("sandbox violation: {0}")]
    SandboxViolation(String),
}

impl From<mlua::Error> for ScriptError {
    fn from(e: mlua::Error) -> Self {
        Self::Lua(e.to_string())
    }
}

/// Configuration for the Lua sandbox.
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Maximum memory the Lua VM can allocate (in bytes). 0 = unlimited.
    pub memory_limit: usize,

    /// Maximum instructions before the run is aborted. 0 = unlimited.
    pub instruction_limit: u32,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self::restricted()
    }
}

impl SandboxConfig {
    /// A restrictive sandbox suitable for user expressions.
    pub fn restricted() -> Self {
        Self {
            memory_limit: 10 * 1024 * 1024, // 10 MB
            instruction_limit: 1_000_000,
        }
    }

    /// No memory or instruction limits (use with caution).
    pub fn unrestricted() -> Self {
        Self { memory_limit: 0, instruction_limit: 0 }
    }
}
