//! Code Regenerator: turns an instrumented tree back into source text.

use crate::error::{InstrumentError, Result};
use crate::record::ModuleRecord;
use tracing::trace;

/// Generate the instrumented source of `record`, dropping its tree.
///
/// Returns the generated text, which is also stored on the record. A record
/// whose tree was already consumed keeps its existing text.
pub fn regenerate(record: &mut ModuleRecord) -> Result<&str> {
    if let Some(tree) = record.take_tree() {
        let text = probar_js::generate(&tree).map_err(|source| InstrumentError::Generate {
            key: record.key().to_string(),
            source,
        })?;
        trace!(key = record.key(), bytes = text.len(), "generated instrumented source");
        record.set_instrumented(text);
    }
    Ok(record.instrumented())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::inserter::insert;
    use probar_js::Identifier;

    #[test]
    fn generated_source_reparses_with_calls() {
        let source = "var a = 1;\nif (a) { a = 2; }";
        let tree = probar_js::parse(source).unwrap();
        let mut record = ModuleRecord::new("m/index.js", "m", source, tree);
        insert(&mut record, &Identifier::new("__rec").unwrap());

        let text = regenerate(&mut record).unwrap().to_string();
        assert!(record.tree().is_none());
        assert!(text.starts_with("__rec(\"m/index.js\", 0, 10);\nvar a = 1;\n"));

        let reparsed = probar_js::parse(&text).unwrap();
        assert_eq!(reparsed.body.len(), 4);
    }

    #[test]
    fn regex_and_holes_survive_generation() {
        let source = "exports.re = /ab+c/;\nexports.holes = [1,,3];";
        let tree = probar_js::parse(source).unwrap();
        let mut record = ModuleRecord::new("m/index.js", "m", source, tree);
        insert(&mut record, &Identifier::new("__rec").unwrap());

        let text = regenerate(&mut record).unwrap().to_string();
        assert!(text.contains("/ab+c/"), "{text}");
        let program = probar_js::compile(&text).unwrap();
        assert_eq!(program.body.len(), 4);
    }

    #[test]
    fn regenerating_twice_keeps_text() {
        let tree = probar_js::parse("a();").unwrap();
        let mut record = ModuleRecord::new("m/index.js", "m", "a();", tree);
        let first = regenerate(&mut record).unwrap().to_string();
        assert_eq!(regenerate(&mut record).unwrap(), first);
    }
}
