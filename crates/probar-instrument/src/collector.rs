//! Source Collector: finds a component's modules and parses their source.

use crate::error::{InstrumentError, Result};
use crate::record::ModuleRecord;
use probar_js_runtime::ModuleRegistry;
use tracing::{debug, trace};

/// Nesting accepted in collected sources. One level below the loader's
/// limit leaves room for parentheses the code generator may add, so
/// instrumented text always compiles when the original did.
const PARSE_LIMIT: usize = probar_js::MAX_NESTING_DEPTH - 1;

/// Select the keys belonging to `component`, excluding its dependency tree.
///
/// A key is selected when it starts with `"<component>/"` and does not
/// start with `"<component>/<deps_dir>/"`. Input order is kept.
///
/// # Example
///
/// ```rust
/// use probar_instrument::collector::select_keys;
///
/// let keys = ["math/index.js", "math/deps/lodash/index.js", "mathx/a.js", "math/deps"];
/// assert_eq!(
///     select_keys(keys, "math", "deps"),
///     vec!["math/index.js", "math/deps"]
/// );
/// ```
pub fn select_keys<'a>(
    keys: impl IntoIterator<Item = &'a str>,
    component: &str,
    deps_dir: &str,
) -> Vec<&'a str> {
    let prefix = format!("{component}/");
    let deps = format!("{component}/{deps_dir}/");
    keys.into_iter()
        .filter(|key| key.starts_with(&prefix) && !key.starts_with(&deps))
        .collect()
}

/// Collect a record for every module of `component`, in ascending key order.
///
/// Records are produced lazily; each one parses its module's body as the
/// source-extraction capability reports it.
pub fn collect<'a>(
    registry: &'a ModuleRegistry,
    component: &'a str,
    deps_dir: &str,
) -> impl Iterator<Item = Result<ModuleRecord>> + 'a {
    let keys = select_keys(registry.keys(), component, deps_dir);
    debug!(component, modules = keys.len(), "collected module keys");
    keys.into_iter().filter_map(move |key| {
        let factory = registry.factory(key)?;
        Some(collect_one(key, component, &factory.source()))
    })
}

fn collect_one(key: &str, component: &str, source: &str) -> Result<ModuleRecord> {
    trace!(key, bytes = source.len(), "parsing module");
    let tree = probar_js::parse_with_limit(source, PARSE_LIMIT).map_err(|source| InstrumentError::Parse {
        key: key.to_string(),
        source,
    })?;
    Ok(ModuleRecord::new(key, component, source, tree))
}
