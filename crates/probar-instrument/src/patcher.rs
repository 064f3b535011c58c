//! Loader Patcher: swaps a module's registered factory for its
//! instrumented version.

use crate::error::Result;
use crate::record::ModuleRecord;
use probar_js_runtime::{Factory, Runtime};
use tracing::debug;

/// Build the loader factory that runs `record`'s instrumented source.
pub fn instrumented_factory(record: &ModuleRecord) -> Result<Factory> {
    Ok(Factory::from_body(
        &Factory::LOADER_PARAMS,
        record.instrumented(),
    )?)
}

/// Install a factory under `key`, replacing the original.
///
/// The loader forgets any exports cached for `key`, so the next `require`
/// runs the new factory.
pub fn install(runtime: &Runtime, key: &str, factory: Factory) {
    let previous = runtime.register(key, factory);
    debug!(key, replaced = previous.is_some(), "patched module factory");
}

/// Replace `record`'s registered factory with its instrumented source.
pub fn replace(runtime: &Runtime, record: &ModuleRecord) -> Result<()> {
    let factory = instrumented_factory(record)?;
    install(runtime, record.key(), factory);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn replace_swaps_factory_and_drops_cache() {
        let runtime = Runtime::new();
        runtime.register(
            "m/index.js",
            Factory::from_body(&Factory::LOADER_PARAMS, "exports.v = 1;").unwrap(),
        );
        runtime.register(
            "m/other.js",
            Factory::from_body(&Factory::LOADER_PARAMS, "exports.v = 3;").unwrap(),
        );
        runtime.require("m").unwrap();
        runtime.require("m/other").unwrap();

        let tree = probar_js::parse("exports.v = 2;").unwrap();
        let mut record = ModuleRecord::new("m/index.js", "m", "exports.v = 2;", tree);
        crate::generator::regenerate(&mut record).unwrap();
        replace(&runtime, &record).unwrap();

        assert!(!runtime.is_loaded("m/index.js"));
        assert!(runtime.is_loaded("m/other.js"));
        let exports = runtime.require("m").unwrap();
        assert_eq!(
            runtime.get_property(&exports, "v").unwrap().as_number(),
            Some(2.0)
        );
        let registry = runtime.registry();
        assert_eq!(
            registry.factory("m/index.js").unwrap().params(),
            ["exports", "require", "module"]
        );
    }
}
