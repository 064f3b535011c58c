//! The runtime: global namespace, module registry and CommonJS loader.

use crate::builtins::Intrinsics;
use crate::error::{Result, RuntimeError};
use crate::registry::{Factory, ModuleRegistry};
use crate::scope::Scope;
use crate::value::{Object, ObjectRef, Value};
use std::cell::{Cell, Ref, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use tracing::{debug, debug_span, trace};

/// Deepest nesting of script function calls before a stack overflow error.
pub const MAX_CALL_DEPTH: usize = 64;

/// Name used for the requiring module when `require` is called from a script.
const ROOT: &str = "<root>";

/// Single-threaded script runtime.
///
/// Owns the process-wide global namespace, the module registry and the
/// loader's cache of module objects. Methods take `&self` so host
/// functions, which receive the runtime while a script is running, can
/// re-enter it (`require` inside a module, a recorder updating state).
///
/// # Example
///
/// ```rust
/// use probar_js_runtime::{Factory, Runtime};
///
/// let runtime = Runtime::new();
/// runtime.register(
///     "math/index.js",
///     Factory::from_function_text("function(exports){ exports.two = 1 + 1; }").unwrap(),
/// );
/// let exports = runtime.require("math").unwrap();
/// let two = runtime.get_property(&exports, "two").unwrap();
/// assert_eq!(two.as_number(), Some(2.0));
/// ```
pub struct Runtime {
    pub(crate) globals: Scope,
    pub(crate) intrinsics: Intrinsics,
    registry: RefCell<ModuleRegistry>,
    modules: RefCell<HashMap<String, ObjectRef>>,
    pub(crate) depth: Cell<usize>,
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("modules", &self.registry.borrow().len())
            .field("loaded", &self.modules.borrow().len())
            .finish_non_exhaustive()
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    /// Create a runtime with the built-in globals installed.
    #[must_use]
    pub fn new() -> Self {
        let runtime = Self {
            globals: Scope::global(),
            intrinsics: Intrinsics::new(),
            registry: RefCell::new(ModuleRegistry::new()),
            modules: RefCell::new(HashMap::new()),
            depth: Cell::new(0),
        };
        runtime.install_builtins();
        runtime
    }

    /// Create a runtime with a pre-filled registry.
    #[must_use]
    pub fn with_registry(registry: ModuleRegistry) -> Self {
        let runtime = Self::new();
        *runtime.registry.borrow_mut() = registry;
        runtime
    }

    // ------------------------------------------------------------------
    // Objects and errors
    // ------------------------------------------------------------------

    /// Create an empty object inheriting from `Object.prototype`.
    #[must_use]
    pub fn new_object(&self) -> Value {
        Value::Object(Rc::new(RefCell::new(Object::with_proto(Rc::clone(
            &self.intrinsics.object,
        )))))
    }

    /// Create an error object as the global constructor `name` would.
    ///
    /// Unknown names fall back to `Error`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use probar_js_runtime::Runtime;
    ///
    /// let runtime = Runtime::new();
    /// runtime.define_global("e", runtime.make_error("TypeError", "bad"));
    /// let value = runtime.eval("e instanceof TypeError && e instanceof Error").unwrap();
    /// assert!(value.is_truthy());
    /// ```
    #[must_use]
    pub fn make_error(&self, name: &str, message: &str) -> Value {
        let mut error = Object::with_proto(self.intrinsics.error(name));
        error.define_hidden("message", Value::from(message));
        Value::Object(Rc::new(RefCell::new(error)))
    }

    /// A script-visible `throw` of a new error object.
    pub(crate) fn throw_error(&self, name: &str, message: &str) -> RuntimeError {
        RuntimeError::Thrown(self.make_error(name, message))
    }

    /// The value a `catch (e)` clause binds for `err`.
    ///
    /// Thrown values pass through unchanged; host errors become error
    /// objects that inherit from the matching constructor's prototype.
    #[must_use]
    pub fn error_value(&self, err: RuntimeError) -> Value {
        match err.error_parts() {
            Some((name, message)) => self.make_error(name, &message),
            None => err.into_value(),
        }
    }

    // ------------------------------------------------------------------
    // Global namespace
    // ------------------------------------------------------------------

    /// Bind `name` in the global namespace, replacing any previous binding.
    pub fn define_global(&self, name: &str, value: Value) {
        trace!(name, "define global");
        self.globals.declare(name, value);
    }

    /// Current global binding of `name`.
    #[must_use]
    pub fn global(&self, name: &str) -> Option<Value> {
        self.globals.get_own(name)
    }

    /// Remove a global binding, returning it.
    pub fn remove_global(&self, name: &str) -> Option<Value> {
        trace!(name, "remove global");
        self.globals.remove_own(name)
    }

    /// Whether `name` is bound in the global namespace.
    #[must_use]
    pub fn has_global(&self, name: &str) -> bool {
        self.globals.has_own(name)
    }

    // ------------------------------------------------------------------
    // Registry
    // ------------------------------------------------------------------

    /// Read access to the module registry.
    ///
    /// The borrow must be released before running scripts that register
    /// modules.
    pub fn registry(&self) -> Ref<'_, ModuleRegistry> {
        self.registry.borrow()
    }

    /// Register or replace a module factory.
    ///
    /// Replacing a factory drops the loader's cached module for `key`, so
    /// the next `require` runs the new factory.
    pub fn register(&self, key: impl Into<String>, factory: Factory) -> Option<Factory> {
        let key = key.into();
        self.modules.borrow_mut().remove(&key);
        debug!(key = %key, "register module factory");
        self.registry.borrow_mut().register(key, factory)
    }

    /// Whether the loader has executed (or is executing) `key`.
    #[must_use]
    pub fn is_loaded(&self, key: &str) -> bool {
        self.modules.borrow().contains_key(key)
    }

    // ------------------------------------------------------------------
    // Loader
    // ------------------------------------------------------------------

    /// Load a module from the top level, returning its exports.
    pub fn require(&self, path: &str) -> Result<Value> {
        self.require_from(None, path)
    }

    /// Load a module as `from` would, resolving relative paths against
    /// `from`'s directory.
    pub fn require_from(&self, from: Option<&str>, path: &str) -> Result<Value> {
        let key = self.resolve(from, path)?;
        self.load(&key)
    }

    /// Resolve a `require` path to a registered key.
    ///
    /// Tries `path`, `path.js`, `path.json`, `path/index.js` and
    /// `path/index.json` in that order.
    pub fn resolve(&self, from: Option<&str>, path: &str) -> Result<String> {
        let base = if path.starts_with("./") || path.starts_with("../") {
            let dir = from
                .and_then(|key| key.rsplit_once('/'))
                .map_or("", |(dir, _)| dir);
            normalize(dir, path)
        } else {
            path.strip_prefix('/').unwrap_or(path).to_string()
        };

        let registry = self.registry.borrow();
        let candidates = [
            base.clone(),
            format!("{base}.js"),
            format!("{base}.json"),
            format!("{base}/index.js"),
            format!("{base}/index.json"),
        ];
        candidates
            .into_iter()
            .find(|candidate| registry.contains(candidate))
            .ok_or_else(|| RuntimeError::ModuleNotFound {
                path: path.to_string(),
                from: from.unwrap_or(ROOT).to_string(),
            })
    }

    fn load(&self, key: &str) -> Result<Value> {
        if let Some(module) = self.modules.borrow().get(key) {
            return Ok(module.borrow().get("exports").unwrap_or_default());
        }

        let factory = self
            .registry
            .borrow()
            .factory(key)
            .cloned()
            .ok_or_else(|| RuntimeError::ModuleNotFound {
                path: key.to_string(),
                from: ROOT.to_string(),
            })?;

        let span = debug_span!("load_module", key);
        let _guard = span.enter();

        let program = factory.compile().map_err(|source| RuntimeError::Syntax {
            key: key.to_string(),
            source,
        })?;

        let exports = self.new_object();
        let module = Rc::new(RefCell::new(Object::with_proto(Rc::clone(
            &self.intrinsics.object,
        ))));
        module.borrow_mut().set("exports", exports.clone());
        module.borrow_mut().set("id", Value::from(key));
        self.modules
            .borrow_mut()
            .insert(key.to_string(), Rc::clone(&module));

        let args = [
            exports.clone(),
            self.require_function(key),
            Value::Object(Rc::clone(&module)),
        ];
        debug!("executing module factory");
        if let Err(err) = self.run_factory(factory.params(), &program, exports, &args) {
            self.modules.borrow_mut().remove(key);
            return Err(err);
        }

        let exports = module.borrow().get("exports").unwrap_or_default();
        Ok(exports)
    }

    /// The `require` function handed to the module `from`.
    fn require_function(&self, from: &str) -> Value {
        let from = from.to_string();
        Value::native("require", move |runtime, _, args| {
            let path = require_path(args)?;
            runtime.require_from(Some(&from), &path)
        })
    }
}

pub(crate) fn require_path(args: &[Value]) -> Result<String> {
    match args.first() {
        Some(Value::String(path)) => Ok(path.to_string()),
        _ => Err(RuntimeError::type_error("require path must be a string")),
    }
}

/// Join a relative path onto a directory, folding `.` and `..` segments.
fn normalize(dir: &str, path: &str) -> String {
    let mut segments: Vec<&str> = dir.split('/').filter(|s| !s.is_empty()).collect();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}
