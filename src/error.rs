//! Error types for the sampling engine.

/// Failure of a single counter source, record or requested operation.
///
/// Engine calls never hand these to their caller. The fallback resolver turns
/// every `SourceUnavailable` and `ParseError` into "try the next tier"; only
/// operation dispatch surfaces `UnsupportedOperation`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SampleError {
    /// A counter source could not be opened or queried.
    #[error("{source_name} unavailable: {reason}")]
    SourceUnavailable {
        source_name: &'static str,
        reason: String,
    },

    /// A record was read but did not have the expected shape.
    #[error("malformed record in {source_name}: {detail}")]
    ParseError {
        source_name: &'static str,
        detail: String,
    },

    /// The caller asked for an operation the engine does not implement.
    #[error("operation `{0}` is not implemented")]
    UnsupportedOperation(String),
}

impl SampleError {
    pub(crate) fn unavailable(source_name: &'static str, reason: impl Into<String>) -> Self {
        SampleError::SourceUnavailable {
            source_name,
            reason: reason.into(),
        }
    }

    pub(crate) fn parse(source_name: &'static str, detail: impl Into<String>) -> Self {
        SampleError::ParseError {
            source_name,
            detail: detail.into(),
        }
    }

    /// Wraps an I/O failure on `source_name` as `SourceUnavailable`.
    pub(crate) fn io(source_name: &'static str, err: std::io::Error) -> Self {
        Self::unavailable(source_name, err.to_string())
    }

    /// The platform does not offer this facility at all.
    pub(crate) fn unsupported(source_name: &'static str) -> Self {
        Self::unavailable(source_name, "not supported on this platform")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        let err = SampleError::unavailable("/proc/stat", "permission denied");
        assert_eq!(err.to_string(), "/proc/stat unavailable: permission denied");

        let err = SampleError::parse("/proc/stat", "expected 4 counters, got 2");
        assert_eq!(
            err.to_string(),
            "malformed record in /proc/stat: expected 4 counters, got 2"
        );

        let err = SampleError::UnsupportedOperation("getBatteryLevel".into());
        assert_eq!(err.to_string(), "operation `getBatteryLevel` is not implemented");
    }

    #[test]
    fn io_errors_become_unavailable() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = SampleError::io("/proc/meminfo", io);
        assert!(matches!(
            err,
            SampleError::SourceUnavailable {
                source_name: "/proc/meminfo",
                ..
            }
        ));
    }
}
