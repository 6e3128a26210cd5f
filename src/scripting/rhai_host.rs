use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use bevy::prelude::*;
use rhai::{CallFnOptions, Dynamic, Engine, Map, Scope, AST, INT};

use super::{ScriptExecutor, DEFAULT_RHAI_MAX_CALL_LEVELS, DEFAULT_RHAI_MAX_OPERATIONS};
use crate::script_call::ScriptCall;

/// Handler every call script must define: `fn on_call(name, primary, secondary)`.
/// `this` is bound to a map shared by all scripts that persists across calls.
pub const ENTRY_FN: &str = "on_call";
const ENTRY_FN_PARAMS: usize = 3;

/// Script executor backed by rhai. Scripts are registered under the call name
/// they handle.
pub struct RhaiScripts {
    engine: Engine,
    sources: HashMap<String, String>,
    compiled: HashMap<String, (u64, AST)>,
    vars: Map,
}

impl Default for RhaiScripts {
    fn default() -> Self {
        Self::new()
    }
}

impl RhaiScripts {
    /// Engine limits come from `TILEWALK_RHAI_MAX_OPERATIONS` and
    /// `TILEWALK_RHAI_MAX_CALL_LEVELS` when set.
    pub fn new() -> Self {
        let max_ops = std::env::var("TILEWALK_RHAI_MAX_OPERATIONS")
            .ok()
            .and_then(|value| value.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_RHAI_MAX_OPERATIONS)
            .max(10_000);
        let max_call_levels = std::env::var("TILEWALK_RHAI_MAX_CALL_LEVELS")
            .ok()
            .and_then(|value| value.trim().parse::<usize>().ok())
            .unwrap_or(DEFAULT_RHAI_MAX_CALL_LEVELS)
            .max(8);
        Self::with_limits(max_ops, max_call_levels)
    }

    pub fn with_limits(max_operations: u64, max_call_levels: usize) -> Self {
        Self {
            engine: make_rhai_engine(max_operations, max_call_levels),
            sources: HashMap::new(),
            compiled: HashMap::new(),
            vars: Map::new(),
        }
    }

    /// Registers `source` as the handler for calls named `name`. Replaces any
    /// earlier script for that call.
    pub fn load_script(
        &mut self,
        name: impl Into<String>,
        source: impl Into<String>,
    ) -> Result<(), String> {
        let name = name.into();
        let source = source.into();
        let ast = self.engine.compile(&source).map_err(|e| e.to_string())?;
        let has_entry = ast
            .iter_functions()
            .any(|f| f.name == ENTRY_FN && f.params.len() == ENTRY_FN_PARAMS);
        if !has_entry {
            return Err(format!(
                "Script '{name}' must define `fn {ENTRY_FN}(name, primary, secondary)`"
            ));
        }
        self.compiled
            .insert(name.clone(), (script_hash(&source), ast));
        self.sources.insert(name, source);
        Ok(())
    }

    pub fn has_script(&self, name: &str) -> bool {
        self.sources.contains_key(name)
    }

    pub fn script_names(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }

    pub fn vars(&self) -> &Map {
        &self.vars
    }

    pub fn var_int(&self, name: &str) -> Option<INT> {
        self.vars.get(name).and_then(|value| value.as_int().ok())
    }
}

impl ScriptExecutor for RhaiScripts {
    fn execute(&mut self, call: &ScriptCall, frame: u64) -> Result<(), String> {
        let source = self
            .sources
            .get(&call.name)
            .ok_or_else(|| format!("No script registered for call '{}'", call.name))?;
        let ast = get_or_compile_ast(&self.engine, &mut self.compiled, &call.name, source)?;

        let mut vars = std::mem::take(&mut self.vars);
        vars.insert("frame".into(), Dynamic::from_int(frame as INT));
        let mut this = Dynamic::from_map(vars);
        let secondary = call
            .secondary
            .map_or(Dynamic::UNIT, |id| Dynamic::from_int(id as INT));

        let mut scope = Scope::new();
        let options = CallFnOptions::new().eval_ast(false).bind_this_ptr(&mut this);
        let result = self.engine.call_fn_with_options::<Dynamic>(
            options,
            &mut scope,
            &ast,
            ENTRY_FN,
            (call.name.clone(), call.primary as INT, secondary),
        );

        self.vars = this.try_cast::<Map>().unwrap_or_default();
        result.map(|_| ()).map_err(|e| e.to_string())
    }
}

fn make_rhai_engine(max_operations: u64, max_call_levels: usize) -> Engine {
    let mut engine = Engine::new();
    engine.set_max_operations(max_operations);
    engine.set_max_call_levels(max_call_levels);
    engine.on_print(|text| info!("[Tilewalk scripts] {}", text));
    engine.on_debug(|text, source, pos| {
        debug!("[Tilewalk scripts] {} ({:?} @ {})", text, source, pos);
    });
    engine
}

fn script_hash(source: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    source.hash(&mut hasher);
    hasher.finish()
}

fn get_or_compile_ast(
    engine: &Engine,
    cache: &mut HashMap<String, (u64, AST)>,
    name: &str,
    source: &str,
) -> Result<AST, String> {
    let hash = script_hash(source);
    if let Some((old_hash, ast)) = cache.get(name) {
        if *old_hash == hash {
            return Ok(ast.clone());
        }
    }
    let compiled = engine.compile(source).map_err(|e| e.to_string())?;
    cache.insert(name.to_string(), (hash, compiled.clone()));
    Ok(compiled)
}
