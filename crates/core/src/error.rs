/// Result alias that carries the custom [`ArrangerError`] type.
pub type Result<T> = std::result::Result<T, ArrangerError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum ArrangerError {
    /// A project was requested from a file that is not a `.json` document.
    #[error("please select a JSON file (got `{0}`)")]
    InvalidFileType(String),
    /// The content could not be parsed as JSON at all.
    #[error("invalid JSON format: {0}")]
    Parse(String),
    /// The document parsed but failed one or more structural checks. Every
    /// violation found is carried, in the order the checks ran.
    #[error("invalid project file:\n{}", .0.join("\n"))]
    Validation(Vec<String>),
    /// Free-form message for failures that do not fit the taxonomy above.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl ArrangerError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    /// Returns the individual validation messages, if this is a validation
    /// failure.
    pub fn validation_errors(&self) -> Option<&[String]> {
        match self {
            Self::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}

impl From<&str> for ArrangerError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for ArrangerError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}

impl From<serde_json::Error> for ArrangerError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_display_lists_every_message() {
        let err = ArrangerError::Validation(vec!["first".into(), "second".into()]);
        let text = err.to_string();

        assert!(text.starts_with("invalid project file:"));
        assert!(text.contains("first\nsecond"));
        assert_eq!(err.validation_errors().unwrap().len(), 2);
    }

    #[test]
    fn plain_strings_become_messages() {
        let err: ArrangerError = "boom".into();
        assert!(matches!(err, ArrangerError::Message(ref m) if m == "boom"));
        assert!(err.validation_errors().is_none());
    }
}
