//! `use @mount.path as alias`: resolution, loading and caching of modules.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use std::rc::Rc;

use luma_core::ast::{ModuleId, Statement, Visibility};
use luma_core::lexer::scan;
use luma_core::parser::parse;
use tracing::debug;

use crate::config::SOURCE_EXTENSION;
use crate::environment::Environment;
use crate::evaluator::Interpreter;
use crate::value::{Map, QuickReturn, RuntimeError, Value};

/// Loaded export maps by module id, plus the ids whose load is in progress.
#[derive(Debug, Default)]
pub struct ModuleCache {
    exports: HashMap<String, Map>,
    loading: HashSet<String>,
}

impl ModuleCache {
    pub fn get(&self, id: &str) -> Option<Map> {
        self.exports.get(id).cloned()
    }

    pub fn is_loading(&self, id: &str) -> bool {
        self.loading.contains(id)
    }
}

impl Interpreter {
    /// Ids of every module loaded so far in this session.
    pub fn loaded_modules(&self) -> Vec<String> {
        let mut ids = self.modules.exports.keys().cloned().collect::<Vec<_>>();
        ids.sort();
        ids
    }

    /// The export map of `id`, loading the module on first use. A module body
    /// runs at most once per session.
    pub(crate) fn load_module(&mut self, id: &ModuleId) -> Result<Value, RuntimeError> {
        let key = id.to_string();
        if let Some(exports) = self.modules.get(&key) {
            debug!(module = %key, "module cache hit");
            return Ok(Value::Map(exports));
        }
        if !self.modules.loading.insert(key.clone()) {
            return Err(RuntimeError::CyclicImport(key));
        }

        let loaded = self.load_uncached(id, &key);
        self.modules.loading.remove(&key);
        let exports = loaded?;

        self.modules.exports.insert(key.clone(), exports.clone());
        self.natives.inject(&key, &mut exports.borrow_mut());
        Ok(Value::Map(exports))
    }

    fn load_uncached(&mut self, id: &ModuleId, key: &str) -> Result<Map, RuntimeError> {
        let path = self.resolve_module_path(id, key)?;
        debug!(module = %key, path = %path.display(), "loading module");

        let source = std::fs::read_to_string(&path).map_err(|err| RuntimeError::ModuleIo {
            path: path.clone(),
            message: err.to_string(),
        })?;
        let tokens = scan(&source).map_err(|err| RuntimeError::ModuleSyntax {
            module: key.to_owned(),
            diagnostics: vec![err.to_string()],
        })?;
        let program = parse(tokens).map_err(|errors| RuntimeError::ModuleSyntax {
            module: key.to_owned(),
            diagnostics: errors.iter().map(ToString::to_string).collect(),
        })?;

        let environment = Environment::new_enclosed(&self.globals);
        let mut exports = BTreeMap::new();
        for statement in &program.statements {
            self.eval_statement(statement, &environment)
                .map_err(|quick_return| match quick_return {
                    QuickReturn::Return(_) => RuntimeError::ReturnOutsideFunction,
                    QuickReturn::Error(error) => error,
                })?;

            let exported = match statement {
                Statement::FuncDef(decl) if decl.visibility == Visibility::Open => &decl.name,
                Statement::Class(decl) if decl.visibility == Visibility::Open => &decl.name,
                _ => continue,
            };
            exports.insert(exported.name.clone(), environment.get(exported)?);
        }

        debug!(module = %key, exports = exports.len(), "module loaded");
        Ok(Rc::new(RefCell::new(exports)))
    }

    fn resolve_module_path(&self, id: &ModuleId, key: &str) -> Result<PathBuf, RuntimeError> {
        let mut path = match id.mount() {
            // Without a stdlib root nothing under `@std` can exist; report the
            // relative path the lookup would have used.
            "std" => self.std_root.clone().unwrap_or_else(|| PathBuf::from("std")),
            "app" => self.config.app_root(),
            other => return Err(RuntimeError::UnknownMount(other.into())),
        };
        if id.path().is_empty() {
            return Err(RuntimeError::InvalidModuleId(key.to_owned()));
        }

        for segment in id.path() {
            path.push(&**segment);
        }
        path.set_extension(SOURCE_EXTENSION);

        if !path.is_file() {
            return Err(RuntimeError::ModuleNotFound {
                module: key.to_owned(),
                path,
            });
        }
        Ok(path)
    }
}
