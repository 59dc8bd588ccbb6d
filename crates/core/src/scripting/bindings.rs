//! Lua bindings: the `mdf` helper table and JSON value conversion.

use mlua::{Function, Lua, Result as LuaResult, Table, Value};

use super::types::ScriptError;

/// Register the `mdf` global table.
///
/// After calling this function, expressions can use:
/// - `mdf.link(path)` - Wikilink for a note path
/// - `mdf.basename(path_or_link)` - File name without folder or extension
/// - `mdf.today(format?)` - Today's date, `%Y-%m-%d` by default
pub fn register_mdf_table(lua: &Lua) -> LuaResult<()> {
    let mdf = lua.create_table()?;

    mdf.set("link", create_link_fn(lua)?)?;
    mdf.set("basename", create_basename_fn(lua)?)?;
    mdf.set("today", create_today_fn(lua)?)?;

    lua.globals().set("mdf", mdf)?;
    Ok(())
}

/// ```lua
/// mdf.link("Books/Dune.md")  -- "[[Books/Dune]]"
/// ```
fn create_link_fn(lua: &Lua) -> LuaResult<Function> {
    lua.create_function(|_, path: String| {
        let trimmed = path.trim();
        if trimmed.starts_with("[[") {
            return Ok(trimmed.to_string());
        }
        Ok(format!("[[{}]]", trimmed.strip_suffix(".md").unwrap_or(trimmed)))
    })
}

/// ```lua
/// mdf.basename("[[Books/Dune|Dune]]")  -- "Dune"
/// ```
fn create_basename_fn(lua: &Lua) -> LuaResult<Function> {
    lua.create_function(|_, path: String| {
        let s = path.trim().trim_start_matches("[[").trim_end_matches("]]");
        let s = s.split(['|', '#']).next().unwrap_or(s);
        let s = s.rsplit('/').next().unwrap_or(s);
        Ok(s.strip_suffix(".md").unwrap_or(s).to_string())
    })
}

/// ```lua
/// mdf.today()          -- "2025-12-29"
/// mdf.today("%d/%m")   -- "29/12"
/// ```
fn create_today_fn(lua: &Lua) -> LuaResult<Function> {
    lua.create_function(|_, format: Option<String>| {
        let format = format.unwrap_or_else(|| "%Y-%m-%d".to_string());
        Ok(chrono::Local::now().date_naive().format(&format).to_string())
    })
}

/// Convert a JSON value into a Lua value. Objects and arrays become tables.
pub fn json_to_lua(lua: &Lua, value: &serde_json::Value) -> LuaResult<Value> {
    match value {
        serde_json::Value::Null => Ok(Value::Nil),
        serde_json::Value::Bool(b) => Ok(Value::Boolean(*b)),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::Integer(i))
            } else {
                Ok(n.as_f64().map(Value::Number).unwrap_or(Value::Nil))
            }
        }
        serde_json::Value::String(s) => Ok(Value::String(lua.create_string(s)?)),
        serde_json::Value::Array(items) => {
            let table = lua.create_table()?;
            for (i, item) in items.iter().enumerate() {
                table.set(i + 1, json_to_lua(lua, item)?)?;
            }
            Ok(Value::Table(table))
        }
        serde_json::Value::Object(map) => {
            let table = lua.create_table()?;
            for (k, v) in map {
                table.set(k.as_str(), json_to_lua(lua, v)?)?;
            }
            Ok(Value::Table(table))
        }
    }
}

/// Convert a Lua result back to JSON.
///
/// Tables with keys `1..n` become arrays, other tables become objects with
/// string keys. Infinite and NaN numbers are errors.
pub fn lua_to_json(value: &Value) -> Result<serde_json::Value, ScriptError> {
    match value {
        Value::Nil => Ok(serde_json::Value::Null),
        Value::Boolean(b) => Ok(serde_json::Value::Bool(*b)),
        Value::Integer(i) => Ok(serde_json::Value::from(*i)),
        Value::Number(n) => serde_json::Number::from_f64(*n)
            .map(serde_json::Value::Number)
            .ok_or(ScriptError::NonFinite(*n)),
        Value::String(s) => Ok(serde_json::Value::String(s.to_str()?.to_string())),
        Value::Table(t) => table_to_json(t),
        other => Err(ScriptError::Unsupported(other.type_name().to_string())),
    }
}

fn table_to_json(table: &Table) -> Result<serde_json::Value, ScriptError> {
    let len = table.raw_len();
    let mut count = 0usize;
    for pair in table.clone().pairs::<Value, Value>() {
        pair?;
        count += 1;
    }

    if len > 0 && count == len {
        let mut items = Vec::with_capacity(len);
        for item in table.clone().sequence_values::<Value>() {
            items.push(lua_to_json(&item?)?);
        }
        return Ok(serde_json::Value::Array(items));
    }

    let mut map = serde_json::Map::new();
    for pair in table.clone().pairs::<Value, Value>() {
        let (k, v) = pair?;
        let key = match k {
            Value::String(s) => s.to_str()?.to_string(),
            Value::Integer(i) => i.to_string(),
            other => {
                return Err(ScriptError::Unsupported(format!("{} table key", other.type_name())));
            }
        };
        map.insert(key, lua_to_json(&v)?);
    }
    Ok(serde_json::Value::Object(map))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripting::LuaEngine;
    use serde_json::json;

    #[test]
    fn test_link_and_basename() {
        let engine = LuaEngine::sandboxed().unwrap();
        assert_eq!(engine.eval_json(r#"mdf.link("Books/Dune.md")"#).unwrap(), json!("[[Books/Dune]]"));
        assert_eq!(
            engine.eval_json(r#"mdf.basename("[[Books/Dune|The Book]]")"#).unwrap(),
            json!("Dune")
        );
    }

    #[test]
    fn test_today_format() {
        let engine = LuaEngine::sandboxed().unwrap();
        let today = engine.eval_json("mdf.today()").unwrap();
        assert_eq!(today.as_str().map(str::len), Some(10));
    }

    #[test]
    fn test_tables_round_trip_to_json() {
        let engine = LuaEngine::sandboxed().unwrap();
        assert_eq!(engine.eval_json("{1, 2, 3}").unwrap(), json!([1, 2, 3]));
        assert_eq!(engine.eval_json("{a = 1}").unwrap(), json!({"a": 1}));
        assert_eq!(engine.eval_json("{}").unwrap(), json!({}));
    }

    #[test]
    fn test_non_finite_is_an_error() {
        let engine = LuaEngine::sandboxed().unwrap();
        assert!(matches!(engine.eval_json("1 / 0"), Err(ScriptError::NonFinite(_))));
        assert!(matches!(engine.eval_json("0 / 0"), Err(ScriptError::NonFinite(_))));
    }

    #[test]
    fn test_functions_are_unsupported() {
        let engine = LuaEngine::sandboxed().unwrap();
        assert!(matches!(engine.eval_json("print"), Err(ScriptError::Unsupported(_))));
    }
}
