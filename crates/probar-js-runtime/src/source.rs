//! Recovering a module body from its factory function text.

/// Extract the body of a function from its source text.
///
/// Returns the text between the first `{` and the last `}`, with the
/// indentation of the first non-blank line removed from every line that
/// starts with it. Other whitespace is kept verbatim, so offsets into the
/// returned text are stable for a given factory.
///
/// Text without a brace pair yields an empty string.
///
/// # Example
///
/// ```rust
/// use probar_js_runtime::function_source;
///
/// let body = function_source("function(exports){\n    exports.a = 1;\n  }");
/// assert_eq!(body, "\nexports.a = 1;\n  ");
/// ```
#[must_use]
pub fn function_source(text: &str) -> String {
    let (Some(open), Some(close)) = (text.find('{'), text.rfind('}')) else {
        return String::new();
    };
    if close <= open {
        return String::new();
    }
    let body = &text[open + 1..close];

    let indent = body
        .lines()
        .find(|line| !line.trim().is_empty())
        .map_or("", |line| &line[..line.len() - line.trim_start().len()]);
    if indent.is_empty() {
        return body.to_string();
    }

    body.split_inclusive('\n')
        .map(|line| line.strip_prefix(indent).unwrap_or(line))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn strips_braces_and_common_indent() {
        let text = "function(exports, require){\n    exports.mul = require('./mul');\n    exports.add = require('./add');\n  }";
        assert_eq!(
            function_source(text),
            "\nexports.mul = require('./mul');\nexports.add = require('./add');\n  "
        );
    }

    #[test]
    fn keeps_deeper_indentation() {
        let text = "function(){\n    if (a) {\n      b();\n    }\n}";
        assert_eq!(function_source(text), "\nif (a) {\n  b();\n}\n");
    }

    #[test]
    fn lines_without_the_indent_are_untouched() {
        let text = "function(){\n    a();\n  b();\n}";
        assert_eq!(function_source(text), "\na();\n  b();\n");
    }

    #[test]
    fn single_line_body() {
        assert_eq!(function_source("function(){ return 1; }"), "return 1; ");
    }

    #[test]
    fn no_braces_is_empty() {
        assert_eq!(function_source("not a function"), "");
        assert_eq!(function_source("} backwards {"), "");
    }

    #[test]
    fn blank_first_lines_are_skipped_for_indent() {
        let text = "function(){\n\n   \n\tx();\n}";
        assert_eq!(function_source(text), "\n\n   \nx();\n");
    }
}
