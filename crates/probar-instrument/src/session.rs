//! Instrumentation session: orchestrates collection, probing, generation
//! and patching for one component.

use crate::collector::collect;
use crate::config::InstrumentConfig;
use crate::error::{InstrumentError, Result};
use crate::generator::regenerate;
use crate::inserter::insert;
use crate::naming;
use crate::patcher;
use crate::record::{CoverageSummary, ModuleCoverage, ModuleRecord};
use crate::recorder::{CoverageRecorder, ModuleTable};
use probar_js::Identifier;
use probar_js_runtime::Runtime;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use tracing::{debug, info, info_span, warn};

/// Coverage instrumentation of one component.
///
/// Creating a session exposes a recorder in the runtime's global namespace
/// and replaces every module of the component with an instrumented
/// version. Coverage accumulates as the program later requires and runs
/// those modules.
///
/// # Example
///
/// ```rust
/// use probar_instrument::Session;
/// use probar_js_runtime::{Factory, Runtime};
///
/// let runtime = Runtime::new();
/// runtime.register(
///     "calc/index.js",
///     Factory::from_function_text("function(exports){ exports.one = 1; }").unwrap(),
/// );
///
/// let session = Session::new(&runtime, "calc").unwrap();
/// assert_eq!(session.summary().covered, 0);
///
/// runtime.require("calc").unwrap();
/// assert_eq!(session.summary().covered, 1);
/// ```
#[derive(Debug)]
pub struct Session {
    component: String,
    recorder_name: String,
    modules: ModuleTable,
}

impl Session {
    /// Instrument `component` with default settings.
    pub fn new(runtime: &Runtime, component: impl Into<String>) -> Result<Self> {
        Self::with_config(runtime, InstrumentConfig::new(component))
    }

    /// Instrument a component as configured.
    ///
    /// Either every module of the component is patched or none is: when a
    /// module fails to parse, the recorder is withdrawn and the registry is
    /// left as it was.
    pub fn with_config(runtime: &Runtime, config: InstrumentConfig) -> Result<Self> {
        let span = info_span!("instrument", component = %config.component);
        let _guard = span.enter();

        let recorder_name = match &config.recorder_name {
            Some(name) => name.clone(),
            None => naming::recorder_name(&naming::session_id()),
        };
        let recorder_ident =
            Identifier::new(recorder_name.as_str()).map_err(|e| {
                InstrumentError::InvalidRecorderName {
                    name: recorder_name.clone(),
                    reason: e.to_string(),
                }
            })?;
        if runtime.has_global(&recorder_name) {
            return Err(InstrumentError::RecorderNameTaken {
                name: recorder_name,
            });
        }

        let modules: ModuleTable = Rc::new(RefCell::new(BTreeMap::new()));
        let recorder = CoverageRecorder::new(Rc::clone(&modules));
        runtime.define_global(&recorder_name, recorder.to_function(&recorder_name));
        debug!(recorder = %recorder_name, "exposed coverage recorder");

        let factories = match Self::prepare(runtime, &config, &recorder_ident, &modules) {
            Ok(factories) => factories,
            Err(err) => {
                warn!(error = %err, "instrumentation failed, withdrawing recorder");
                modules.borrow_mut().clear();
                runtime.remove_global(&recorder_name);
                return Err(err);
            }
        };
        for (key, factory) in factories {
            patcher::install(runtime, &key, factory);
        }

        let session = Self {
            component: config.component,
            recorder_name,
            modules,
        };
        info!(
            modules = session.modules.borrow().len(),
            statements = session.summary().total,
            "component instrumented"
        );
        Ok(session)
    }

    /// Collect and cover every module, returning the factories to install.
    fn prepare(
        runtime: &Runtime,
        config: &InstrumentConfig,
        recorder: &Identifier,
        modules: &ModuleTable,
    ) -> Result<Vec<(String, probar_js_runtime::Factory)>> {
        let registry = runtime.registry();
        let mut factories = Vec::new();
        for record in collect(&registry, &config.component, &config.deps_dir) {
            let mut record = record?;
            cover(&mut record, recorder)?;
            factories.push((record.key().to_string(), patcher::instrumented_factory(&record)?));
            modules
                .borrow_mut()
                .insert(record.key().to_string(), record);
        }
        Ok(factories)
    }

    /// Component this session covers.
    #[must_use]
    pub fn component(&self) -> &str {
        &self.component
    }

    /// Global name of the recorder instrumented code calls.
    #[must_use]
    pub fn recorder_name(&self) -> &str {
        &self.recorder_name
    }

    /// Host-side handle to the recorder.
    #[must_use]
    pub fn recorder(&self) -> CoverageRecorder {
        CoverageRecorder::new(Rc::clone(&self.modules))
    }

    /// Snapshot of one module's coverage.
    #[must_use]
    pub fn module(&self, key: &str) -> Option<ModuleCoverage> {
        self.modules.borrow().get(key).map(ModuleRecord::snapshot)
    }

    /// Snapshots of every module in key order.
    #[must_use]
    pub fn modules(&self) -> Vec<ModuleCoverage> {
        self.modules
            .borrow()
            .values()
            .map(ModuleRecord::snapshot)
            .collect()
    }

    /// Instrumented module keys in order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.modules.borrow().keys().cloned().collect()
    }

    /// Coverage over every module of the component.
    #[must_use]
    pub fn summary(&self) -> CoverageSummary {
        self.modules
            .borrow()
            .values()
            .map(ModuleRecord::summary)
            .sum()
    }

    /// Coverage of one module.
    #[must_use]
    pub fn module_summary(&self, key: &str) -> Option<CoverageSummary> {
        self.modules.borrow().get(key).map(ModuleRecord::summary)
    }
}

/// Instrument a collected record and generate its instrumented source.
pub fn cover(record: &mut ModuleRecord, recorder: &Identifier) -> Result<()> {
    insert(record, recorder);
    regenerate(record)?;
    Ok(())
}

/// Instrument `component` with default settings.
///
/// Equivalent to [`Session::new`].
pub fn instrument(runtime: &Runtime, component: impl Into<String>) -> Result<Session> {
    Session::new(runtime, component)
}
