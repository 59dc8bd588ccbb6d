//! Sandboxed expression evaluation for formulas and custom lookup
//! functions.
//!
//! # Example
//!
//! ```rust
//! use mdfields_core::scripting::{Bindings, LuaSandbox};
//!
//! let sandbox = LuaSandbox::default();
//! let mut bindings = Bindings::new();
//! bindings.insert("current".into(), serde_json::json!({ "pages": 300 }));
//! let hours = sandbox.run_blocking("current.pages / 60", &bindings).unwrap();
//! assert_eq!(hours, serde_json::json!(5.0));
//! ```
//!
//! # Security
//!
//! The Lua environment has no `io`, `os`, `require`, `load`, `loadfile`,
//! `dofile` or `debug`, a memory limit and an instruction budget.

pub mod bindings;
pub mod engine;
pub mod sandbox;
pub mod types;

pub use engine::LuaEngine;
pub use sandbox::{LuaSandbox, ScriptSandbox};
pub use types::{Bindings, SandboxConfig, ScriptError};
