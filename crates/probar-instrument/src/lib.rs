//! Statement coverage instrumentation for CommonJS components.
//!
//! A [`Session`] takes every module registered under a component prefix
//! (except its `deps/` subtree), inserts a recorder call before each statement
//! of each statement body, regenerates the source, and swaps the loader's
//! factory for the instrumented one. When the program later runs those
//! modules, each call reports the byte range of the statement it guards
//! to a recorder exposed in the runtime's global namespace.
//!
//! ```text
//! registry ──collect──▶ ModuleRecord ──insert──▶ instrumented tree ──regenerate──▶ source
//!                                                                   │
//!        runtime.require(..) ◀──────────── patched factory ◀─────────┘
//!                │
//!                └── recorder(key, start, end) ──▶ record ──▶ covered / uncovered
//! ```
//!
//! # Example
//!
//! ```rust
//! use probar_instrument::prelude::*;
//! use probar_js_runtime::{Factory, Runtime};
//!
//! let runtime = Runtime::new();
//! runtime.register(
//!     "math/add.js",
//!     Factory::from_function_text(
//!         "function(_, _, module){\n    module.exports = function(a, b){\n      return a + b;\n    };\n  }",
//!     )
//!     .unwrap(),
//! );
//!
//! let session = instrument(&runtime, "math").unwrap();
//! let before = session.module("math/add.js").unwrap();
//! assert_eq!(before.uncovered.len(), 2);
//!
//! runtime.require("math/add").unwrap();
//! let after = session.module("math/add.js").unwrap();
//! assert_eq!(after.covered.len(), 1);
//! assert_eq!(after.uncovered.len(), 1);
//! ```

#![warn(missing_docs)]

pub mod collector;
pub mod config;
pub mod error;
pub mod generator;
pub mod inserter;
pub mod naming;
pub mod patcher;
pub mod range;
pub mod record;
pub mod recorder;
pub mod session;

pub use config::{InstrumentConfig, InstrumentConfigBuilder};
pub use error::{InstrumentError, Result};
pub use range::Range;
pub use record::{CoverageSummary, ModuleCoverage, ModuleRecord};
pub use recorder::CoverageRecorder;
pub use session::{instrument, Session};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::config::{InstrumentConfig, InstrumentConfigBuilder};
    pub use crate::error::{InstrumentError, Result};
    pub use crate::range::Range;
    pub use crate::record::{CoverageSummary, ModuleCoverage, ModuleRecord};
    pub use crate::recorder::CoverageRecorder;
    pub use crate::session::{instrument, Session};
}
