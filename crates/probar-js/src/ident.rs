//! Validated identifiers.

/// A validated JavaScript identifier.
///
/// Identifiers are validated at construction time to ensure they:
/// - Are not reserved words
/// - Contain only valid characters
/// - Don't start with a digit
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier(String);

impl Identifier {
    /// JavaScript reserved words that cannot be used as identifiers.
    pub const RESERVED_WORDS: &'static [&'static str] = &[
        "break",
        "case",
        "catch",
        "continue",
        "debugger",
        "default",
        "delete",
        "do",
        "else",
        "finally",
        "for",
        "function",
        "if",
        "in",
        "instanceof",
        "new",
        "return",
        "switch",
        "this",
        "throw",
        "try",
        "typeof",
        "var",
        "void",
        "while",
        "with",
        "class",
        "const",
        "enum",
        "export",
        "extends",
        "import",
        "super",
        "implements",
        "interface",
        "let",
        "package",
        "private",
        "protected",
        "public",
        "static",
        "yield",
        "await",
        "null",
        "true",
        "false",
    ];

    /// Create a new identifier, validating it.
    ///
    /// # Errors
    ///
    /// Returns an error if the identifier is:
    /// - Empty
    /// - A reserved word
    /// - Contains invalid characters
    /// - Starts with a digit
    pub fn new(name: impl Into<String>) -> crate::Result<Self> {
        let name = name.into();

        if name.is_empty() {
            return Err(crate::ParseError::InvalidIdentifier {
                name,
                reason: "identifier cannot be empty".to_string(),
            });
        }

        let first = name.chars().next().unwrap_or(' ');
        if first.is_ascii_digit() {
            return Err(crate::ParseError::InvalidIdentifier {
                name,
                reason: "identifier cannot start with a digit".to_string(),
            });
        }

        if let Some(c) = name.chars().find(|c| !is_ident_char(*c)) {
            return Err(crate::ParseError::InvalidIdentifier {
                reason: format!("invalid character '{c}'"),
                name,
            });
        }

        if Self::is_reserved(&name) {
            return Err(crate::ParseError::InvalidIdentifier {
                name,
                reason: "reserved word".to_string(),
            });
        }

        Ok(Self(name))
    }

    /// Create an identifier without validation.
    ///
    /// Used when lowering parsed trees, whose names the parser already checked.
    #[must_use]
    pub(crate) fn new_unchecked(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Whether `name` is a reserved word.
    #[must_use]
    pub fn is_reserved(name: &str) -> bool {
        Self::RESERVED_WORDS.contains(&name)
    }

    /// Get the identifier string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Characters allowed after the first position of an identifier.
pub const fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

/// Characters allowed at the first position of an identifier.
pub const fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn identifier_valid() {
        assert!(Identifier::new("foo").is_ok());
        assert!(Identifier::new("_bar").is_ok());
        assert!(Identifier::new("$baz").is_ok());
        assert!(Identifier::new("foo123").is_ok());
        assert!(Identifier::new("____a1b2_3____").is_ok());
    }

    #[test]
    fn identifier_invalid_reserved() {
        let err = Identifier::new("class").unwrap_err();
        assert!(err.to_string().contains("reserved word"));
    }

    #[test]
    fn identifier_invalid_starts_digit() {
        let err = Identifier::new("123foo").unwrap_err();
        assert!(err.to_string().contains("cannot start with a digit"));
    }

    #[test]
    fn identifier_invalid_empty() {
        let err = Identifier::new("").unwrap_err();
        assert!(err.to_string().contains("cannot be empty"));
    }

    #[test]
    fn identifier_invalid_chars() {
        let err = Identifier::new("foo-bar").unwrap_err();
        assert!(err.to_string().contains("invalid character '-'"));
    }

    #[test]
    fn start_and_continue_characters() {
        assert!(is_ident_start('$'));
        assert!(!is_ident_start('7'));
        assert!(is_ident_char('7'));
    }
}
