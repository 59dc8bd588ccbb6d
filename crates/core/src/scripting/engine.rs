//! Lua scripting engine with sandboxing.

use mlua::{HookTriggers, Lua, Result as LuaResult, StdLib, Value};

use super::bindings::{json_to_lua, lua_to_json, register_mdf_table};
use super::types::{Bindings, SandboxConfig, ScriptError};

/// A sandboxed Lua execution environment.
///
/// Only the `table`, `string`, `utf8` and `math` libraries are loaded, and
/// globals that reach outside the VM are removed. Helper functions live in
/// the `mdf` global table.
///
/// # Example
///
/// ```rust
/// use mdfields_core::scripting::LuaEngine;
///
/// let engine = LuaEngine::sandboxed().unwrap();
/// let result = engine.eval_json("2 * 21").unwrap();
/// assert_eq!(result, serde_json::json!(42));
/// ```
pub struct LuaEngine {
    lua: Lua,
}

impl LuaEngine {
    /// Create a new Lua engine with the given sandbox configuration.
    pub fn new(config: &SandboxConfig) -> Result<Self, ScriptError> {
        // Base functions (type, tostring, pairs, ...) are always available.
        let libs = StdLib::TABLE | StdLib::STRING | StdLib::UTF8 | StdLib::MATH;
        let lua = Lua::new_with(libs, mlua::LuaOptions::default())?;

        if config.memory_limit > 0 {
            lua.set_memory_limit(config.memory_limit)?;
        }
        if config.instruction_limit > 0 {
            // Fires once the budget is spent.
            lua.set_hook(
                HookTriggers::new().every_nth_instruction(config.instruction_limit),
                |_, _| Err(mlua::Error::runtime("instruction limit exceeded")),
            );
        }

        Self::apply_sandbox(&lua)?;
        register_mdf_table(&lua)?;

        Ok(Self { lua })
    }

    /// Create a new engine with default restrictive sandbox.
    pub fn sandboxed() -> Result<Self, ScriptError> {
        Self::new(&SandboxConfig::restricted())
    }

    /// Install each binding as a global.
    pub fn bind(&self, bindings: &Bindings) -> Result<(), ScriptError> {
        let globals = self.lua.globals();
        for (name, value) in bindings {
            if name == "mdf" {
                return Err(ScriptError::SandboxViolation(
                    "'mdf' cannot be rebound".to_string(),
                ));
            }
            globals.set(name.as_str(), json_to_lua(&self.lua, value)?)?;
        }
        Ok(())
    }

    /// Evaluate an expression or a chunk ending in `return`, converting the
    /// result to JSON. `nil` becomes `null`.
    pub fn eval_json(&self, script: &str) -> Result<serde_json::Value, ScriptError> {
        let value: Value = self.lua.load(script).set_name("expression").eval()?;
        lua_to_json(&value)
    }

    /// Get a reference to the underlying Lua state (for advanced usage).
    pub fn lua(&self) -> &Lua {
        &self.lua
    }

    /// Remove globals that could load code, touch the filesystem, run
    /// commands or inspect the VM.
    fn apply_sandbox(lua: &Lua) -> LuaResult<()> {
        let globals = lua.globals();
        for name in [
            "dofile",
            "loadfile",
            "load",
            "require",
            "package",
            "io",
            "os",
            "debug",
            "collectgarbage",
        ] {
            globals.set(name, Value::Nil)?;
        }
        Ok(())
    }
}
