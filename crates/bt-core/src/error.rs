use crate::types::SourceSpan;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
#[error("{code}: {message}")]
pub struct BtError {
    pub code: String,
    pub message: String,
    pub span: Option<SourceSpan>,
}

impl BtError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            span: None,
        }
    }

    pub fn with_span(
        code: impl Into<String>,
        message: impl Into<String>,
        span: SourceSpan,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            span: Some(span),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SourceLocation, SourceSpan};

    #[test]
    fn display_includes_code_and_message() {
        let error = BtError::new("ARG_UNDEFINED", "Argument \"period\" is not bound.");
        assert_eq!(
            error.to_string(),
            "ARG_UNDEFINED: Argument \"period\" is not bound."
        );
        assert!(error.span.is_none());
    }

    #[test]
    fn with_span_carries_location() {
        let span = SourceSpan {
            start: SourceLocation { line: 3, column: 5 },
            end: SourceLocation { line: 3, column: 20 },
        };
        let error = BtError::with_span("XML_MISSING_ATTR", "Missing \"name\".", span.clone());
        assert_eq!(error.span, Some(span));
    }
}
