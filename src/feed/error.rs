use serde_json::error::Category;
use thiserror::Error;

/// Errors that abort one parse attempt.
///
/// Field-level problems (an unparseable date, an unusable box link) never
/// surface here; they are logged and the field or element is dropped.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Reading the underlying stream failed.
    #[error("Failed to read feed stream: {0}")]
    Stream(#[from] std::io::Error),

    /// The token stream is structurally invalid. Carries the reader position.
    #[error("Malformed feed document at line {line}, column {column}: {message}")]
    Malformed {
        line: usize,
        column: usize,
        message: String,
    },

    /// The background parse task panicked or was torn down.
    #[error("Parse task aborted: {0}")]
    Aborted(String),
}

impl From<serde_json::Error> for ParseError {
    fn from(err: serde_json::Error) -> Self {
        match err.classify() {
            Category::Io => ParseError::Stream(std::io::Error::from(err)),
            Category::Syntax | Category::Data | Category::Eof => ParseError::Malformed {
                line: err.line(),
                column: err.column(),
                message: err.to_string(),
            },
        }
    }
}

/// A content element that was rejected while the rest of the article survives.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ElementError {
    /// A box's internal link resolves to an empty target; the whole box is dropped.
    #[error("Box link resolves to an empty target")]
    BoxLinkMissing,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_error_keeps_position() {
        let err = serde_json::from_str::<serde_json::Value>("{\n  \"news\": [,]\n}").unwrap_err();
        match ParseError::from(err) {
            ParseError::Malformed { line, column, .. } => {
                assert_eq!(line, 2);
                assert!(column > 0);
            }
            other => panic!("Expected Malformed, got {:?}", other),
        }
    }

    #[test]
    fn test_eof_is_malformed() {
        let err = serde_json::from_str::<serde_json::Value>("{\"news\": [").unwrap_err();
        assert!(matches!(ParseError::from(err), ParseError::Malformed { .. }));
    }

    #[test]
    fn test_io_error_is_stream_failure() {
        struct Broken;
        impl std::io::Read for Broken {
            fn read(&mut self, _: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset"))
            }
        }
        let err = serde_json::from_reader::<_, serde_json::Value>(Broken).unwrap_err();
        match ParseError::from(err) {
            ParseError::Stream(e) => assert_eq!(e.kind(), std::io::ErrorKind::ConnectionReset),
            other => panic!("Expected Stream, got {:?}", other),
        }
    }
}
