//! CommonJS module runtime for probar instrumentation.
//!
//! A [`Runtime`] owns a global namespace, a [`ModuleRegistry`] of module
//! factories keyed `"<component>/<path>"`, and a loader that resolves
//! `require` paths, runs each factory once, and caches its exports.
//! Factories execute on a small tree-walking evaluator over the
//! [`probar_js`] syntax tree.
//!
//! # Example
//!
//! ```rust
//! use probar_js_runtime::prelude::*;
//!
//! let runtime = Runtime::new();
//! runtime.register(
//!     "math/add.js",
//!     Factory::from_function_text(
//!         "function(_, _, module){ module.exports = function(a, b){ return a + b; }; }",
//!     )
//!     .unwrap(),
//! );
//! let add = runtime.require("math/add").unwrap();
//! let sum = runtime
//!     .call(&add, Value::Undefined, &[Value::Number(2.0), Value::Number(3.0)])
//!     .unwrap();
//! assert_eq!(sum.as_number(), Some(5.0));
//! ```
//!
//! The runtime is single-threaded: values share state through `Rc` and
//! `RefCell`, so neither [`Runtime`] nor [`Value`] is `Send`.

#![warn(missing_docs)]
#![allow(clippy::wildcard_imports)]

mod builtins;
pub mod error;
mod interp;
pub mod registry;
pub mod runtime;
pub mod scope;
pub mod source;
pub mod value;

pub use error::{Result, RuntimeError};
pub use registry::{Factory, ModuleRegistry};
pub use runtime::{Runtime, MAX_CALL_DEPTH};
pub use scope::{Frame, Scope};
pub use source::function_source;
pub use value::{FunctionKind, JsFunction, JsRegExp, NativeFn, Object, Property, Value};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::error::{Result, RuntimeError};
    pub use crate::registry::{Factory, ModuleRegistry};
    pub use crate::runtime::{Runtime, MAX_CALL_DEPTH};
    pub use crate::source::function_source;
    pub use crate::value::{NativeFn, Object, Value};
}
