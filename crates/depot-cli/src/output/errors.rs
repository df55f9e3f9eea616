//! Error message formatting with actionable suggestions.
//!
//! Adds the suggestion of a [`DepotError`], a file location for parse
//! errors and the chain of underlying causes.

use std::error::Error;

use depot_core::DepotError;

use super::colors::ColorSupport;

/// Error formatter with suggestions
pub struct ErrorFormatter {
    colors: ColorSupport,
}

impl ErrorFormatter {
    /// Create a new error formatter
    pub fn new() -> Self {
        Self {
            colors: ColorSupport::detect(),
        }
    }

    pub fn with_colors(colors: ColorSupport) -> Self {
        Self { colors }
    }

    /// Format an error with context and suggestions
    pub fn format_error(&self, error: &DepotError) -> String {
        let mut output = format!("{}: {}\n", self.colors.red("error"), error);

        if let DepotError::TomlParse {
            file, line, column, ..
        } = error
        {
            output.push_str(&self.format_location(file, *line, *column));
            output.push('\n');
        }

        if let Some(suggestion) = error.suggestion() {
            output.push_str(&format!("{}: {}\n", self.colors.dim("help"), suggestion));
        }

        let mut source = error.source();
        while let Some(cause) = source {
            output.push_str(&format!("{}: {}\n", self.colors.dim("caused by"), cause));
            source = cause.source();
        }

        output
    }

    /// Format file location context
    pub fn format_location(&self, file: &str, line: usize, column: usize) -> String {
        format!("  {} {}:{}:{}", self.colors.dim("-->"), file, line, column)
    }
}

impl Default for ErrorFormatter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use depot_core::ResolveFailure;

    fn formatter() -> ErrorFormatter {
        ErrorFormatter::with_colors(ColorSupport::disabled())
    }

    #[test]
    fn test_format_with_suggestion() {
        let error = DepotError::VersionConflict {
            module: "org:lib".to_string(),
            versions: vec!["1.0".to_string(), "2.0".to_string()],
        };
        let formatted = formatter().format_error(&error);
        assert!(formatted.starts_with("error: Conflict found for module 'org:lib': 1.0 and 2.0\n"));
        assert!(formatted.contains("help: Declare a single version"));
    }

    #[test]
    fn test_format_parse_location() {
        let error = DepotError::TomlParse {
            file: "depot.toml".to_string(),
            message: "expected a value".to_string(),
            line: 3,
            column: 7,
        };
        assert!(formatter().format_error(&error).contains("--> depot.toml:3:7"));
    }

    #[test]
    fn test_format_source_chain() {
        let error = DepotError::io(
            "Failed to read depot.lock",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(formatter().format_error(&error).contains("caused by: denied"));
    }

    #[test]
    fn test_unresolved_message() {
        let error = DepotError::from(ResolveFailure::NotFound {
            selector: "org:lib:1.0".to_string(),
        });
        let formatted = formatter().format_error(&error);
        assert!(formatted.contains("Could not find org:lib:1.0."));
        assert!(formatted.contains("help: Check the module coordinates"));
    }
}
