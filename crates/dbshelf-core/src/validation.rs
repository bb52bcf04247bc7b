//! Name validation for database files and SQL identifiers
//!
//! Validation is purely lexical and runs before any filesystem or engine
//! access. Containment checks that need the filesystem live in
//! [`crate::path`].

use crate::error::ShelfError;

/// Validation rules for user-supplied names
#[derive(Debug, Clone, Copy)]
pub struct NameRules {
    /// Maximum allowed length in bytes
    pub max_length: usize,
    /// Whether to allow dots (.) in the name
    pub allow_dots: bool,
    /// Whether to allow hyphens (-) in the name
    pub allow_hyphens: bool,
    /// Whether the first character may be a digit
    pub allow_leading_digit: bool,
}

impl NameRules {
    /// Rules for database file names and backup artifact names
    ///
    /// - Max length: 255 bytes
    /// - Allows: alphanumeric, `_`, `-`, `.`
    /// - Rejects separators, `..`, `:` and a leading `.`
    pub const FILE_NAME: Self = Self {
        max_length: 255,
        allow_dots: true,
        allow_hyphens: true,
        allow_leading_digit: true,
    };

    /// Rules for table, column and index names used in generated DDL
    ///
    /// - Max length: 128 bytes
    /// - Allows: ASCII letters, digits and `_`, not starting with a digit
    pub const SQL_IDENTIFIER: Self = Self {
        max_length: 128,
        allow_dots: false,
        allow_hyphens: false,
        allow_leading_digit: false,
    };

    /// Validate a name against these rules
    pub fn validate(&self, input: &str) -> Result<(), ValidationError> {
        if input.is_empty() {
            return Err(ValidationError::Empty);
        }

        if input.len() > self.max_length {
            return Err(ValidationError::TooLong {
                length: input.len(),
                max: self.max_length,
            });
        }

        if input.contains('/') || input.contains('\\') {
            return Err(ValidationError::PathSeparator);
        }

        if input.contains("..") {
            return Err(ValidationError::PathTraversal);
        }

        if input.starts_with('.') {
            return Err(ValidationError::Hidden);
        }

        if !self.allow_leading_digit && input.starts_with(|c: char| c.is_ascii_digit()) {
            return Err(ValidationError::LeadingDigit);
        }

        for ch in input.chars() {
            let is_valid = ch.is_ascii_alphanumeric()
                || ch == '_'
                || (ch == '-' && self.allow_hyphens)
                || (ch == '.' && self.allow_dots);

            if !is_valid {
                return Err(ValidationError::InvalidChar { char: ch });
            }
        }

        Ok(())
    }
}

/// Errors that can occur during name validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Name is empty
    Empty,
    /// Name exceeds the maximum allowed length
    TooLong { length: usize, max: usize },
    /// Name contains `/` or `\`
    PathSeparator,
    /// Name contains a parent-directory sequence
    PathTraversal,
    /// Name starts with `.`
    Hidden,
    /// Identifier starts with a digit
    LeadingDigit,
    /// Name contains a character outside the allowed set
    InvalidChar { char: char },
    /// File name does not carry a recognized extension
    Extension { allowed: Vec<String> },
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Empty => write!(f, "name cannot be empty"),
            ValidationError::TooLong { length, max } => {
                write!(f, "name too long: {} bytes (max {})", length, max)
            }
            ValidationError::PathSeparator => write!(f, "path separators are not allowed"),
            ValidationError::PathTraversal => {
                write!(f, "parent-directory sequences (..) are not allowed")
            }
            ValidationError::Hidden => write!(f, "name cannot start with '.'"),
            ValidationError::LeadingDigit => write!(f, "identifier cannot start with a digit"),
            ValidationError::InvalidChar { char } => {
                write!(f, "character {:?} is not allowed", char)
            }
            ValidationError::Extension { allowed } => {
                let list: Vec<String> = allowed.iter().map(|ext| format!(".{}", ext)).collect();
                write!(f, "file name must end with one of {}", list.join(", "))
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validate a database file name, including its extension
pub fn validate_database_name(name: &str, extensions: &[String]) -> Result<(), ShelfError> {
    NameRules::FILE_NAME
        .validate(name)
        .and_then(|()| check_extension(name, extensions))
        .map_err(|e| ShelfError::invalid_name(name, e.to_string()))
}

/// Validate a SQL identifier (table, column or index name)
pub fn validate_identifier(name: &str) -> Result<(), ShelfError> {
    NameRules::SQL_IDENTIFIER
        .validate(name)
        .map_err(|e| ShelfError::invalid_name(name, e.to_string()))
}

/// Quote a validated identifier for inclusion in generated SQL
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn check_extension(name: &str, extensions: &[String]) -> Result<(), ValidationError> {
    let matches = name
        .rsplit_once('.')
        .map(|(stem, ext)| {
            !stem.is_empty() && extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false);

    if matches {
        Ok(())
    } else {
        Err(ValidationError::Extension {
            allowed: extensions.to_vec(),
        })
    }
}
