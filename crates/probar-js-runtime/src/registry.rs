//! Module factories and the registry that maps keys to them.

use crate::error::{Result, RuntimeError};
use crate::source::function_source;
use probar_js::{Identifier, Program};
use std::collections::BTreeMap;

/// A registered module factory: a function `(exports, require, module)`
/// whose body builds the module's exports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Factory {
    params: Vec<String>,
    text: String,
    body: String,
}

impl Factory {
    /// Parameters every loader-built factory receives.
    pub const LOADER_PARAMS: [&'static str; 3] = ["exports", "require", "module"];

    /// Create a factory from the full text of a function expression, such
    /// as `function(exports, require, module){ ... }`.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::InvalidFactory`] if the text is not a
    /// function with a parameter list and a braced body.
    pub fn from_function_text(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        let (Some(open), Some(close)) = (text.find('{'), text.rfind('}')) else {
            return Err(invalid("missing function body braces"));
        };
        if close < open {
            return Err(invalid("missing function body braces"));
        }
        let params = parse_header(&text[..open])?;
        let body = text[open + 1..close].to_string();
        Ok(Self { params, text, body })
    }

    /// Create a factory from a parameter list and body source.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::InvalidFactory`] if a parameter is not a
    /// valid identifier.
    pub fn from_body(params: &[&str], body: impl Into<String>) -> Result<Self> {
        for param in params {
            Identifier::new(*param).map_err(|e| invalid(e.to_string()))?;
        }
        let body = body.into();
        let text = format!("function({}){{\n{}\n}}", params.join(", "), body);
        Ok(Self {
            params: params.iter().map(|p| (*p).to_string()).collect(),
            text,
            body,
        })
    }

    /// Parameter names in order.
    #[must_use]
    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// Full function text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Raw body text between the braces.
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Body text as the source-extraction capability reports it.
    #[must_use]
    pub fn source(&self) -> String {
        function_source(&self.text)
    }

    /// Parse and lower the body for execution.
    pub fn compile(&self) -> probar_js::Result<Program> {
        probar_js::compile(&self.body)
    }
}

fn invalid(reason: impl Into<String>) -> RuntimeError {
    RuntimeError::InvalidFactory {
        reason: reason.into(),
    }
}

/// Parse `function [name](a, b, ...)` and return the parameter names.
///
/// Parameter names may repeat, as in `function(_, _, module)`, which a
/// strict parse of the whole function would reject.
fn parse_header(header: &str) -> Result<Vec<String>> {
    let rest = header
        .trim()
        .strip_prefix("function")
        .ok_or_else(|| invalid("expected 'function'"))?;
    if !rest.starts_with(|c: char| c == '(' || c.is_whitespace()) {
        return Err(invalid("expected 'function'"));
    }
    let (name, rest) = rest
        .split_once('(')
        .ok_or_else(|| invalid("expected '(' before parameters"))?;
    let name = name.trim();
    if !name.is_empty() {
        Identifier::new(name).map_err(|e| invalid(e.to_string()))?;
    }
    let (list, trailing) = rest
        .split_once(')')
        .ok_or_else(|| invalid("expected ',' or ')' in parameter list"))?;
    if !trailing.trim().is_empty() {
        return Err(invalid("unexpected text before function body"));
    }
    if list.trim().is_empty() {
        return Ok(Vec::new());
    }
    list.split(',')
        .map(|param| {
            let param = param.trim();
            Identifier::new(param)
                .map(|_| param.to_string())
                .map_err(|_| invalid("expected parameter name"))
        })
        .collect()
}

/// Ordered map from module key to factory.
///
/// Keys follow `"<component>/<relative path>"`, e.g. `math/index.js`.
#[derive(Debug, Clone, Default)]
pub struct ModuleRegistry {
    factories: BTreeMap<String, Factory>,
}

impl ModuleRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace the factory for `key`, returning the previous one.
    pub fn register(&mut self, key: impl Into<String>, factory: Factory) -> Option<Factory> {
        self.factories.insert(key.into(), factory)
    }

    /// Factory registered under `key`.
    #[must_use]
    pub fn factory(&self, key: &str) -> Option<&Factory> {
        self.factories.get(key)
    }

    /// All keys in ascending order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Whether `key` is registered.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.factories.contains_key(key)
    }

    /// Number of registered modules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Whether no module is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}
