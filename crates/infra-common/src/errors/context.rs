use crate::errors::types::Error;
use std::fmt;

/// Where an error happened: the component and the operation it was running
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Component where the error occurred
    pub component: String,
    /// Operation that was being performed
    pub operation: String,
    /// Additional context information
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context
    pub fn new<S: Into<String>, T: Into<String>>(component: S, operation: T) -> Self {
        ErrorContext {
            component: component.into(),
            operation: operation.into(),
            details: None,
        }
    }

    /// Add details to the context
    pub fn with_details<S: Into<String>>(mut self, details: S) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "in component '{}' during operation '{}'", self.component, self.operation)?;
        if let Some(details) = &self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}

/// Extension trait for attaching context to errors
pub trait ErrorExt<T> {
    /// Attach a full context
    fn context(self, ctx: ErrorContext) -> std::result::Result<T, Error>;

    /// Attach component and operation
    fn with_context<S: Into<String>, O: Into<String>>(
        self,
        component: S,
        operation: O,
    ) -> std::result::Result<T, Error>;
}

impl Error {
    /// Wrap this error with context. `Config` keeps its variant so callers can
    /// still tell startup-fatal configuration problems apart.
    pub fn in_context(self, ctx: ErrorContext) -> Error {
        match self {
            Error::Config(msg) => Error::Config(format!("{} [{}]", msg, ctx)),
            Error::Internal(msg) => Error::Internal(format!("{} [{}]", msg, ctx)),
            other => Error::Custom(format!("{} [{}]", other, ctx)),
        }
    }
}

impl<T> ErrorExt<T> for std::result::Result<T, Error> {
    fn context(self, ctx: ErrorContext) -> std::result::Result<T, Error> {
        self.map_err(|e| e.in_context(ctx))
    }

    fn with_context<S: Into<String>, O: Into<String>>(
        self,
        component: S,
        operation: O,
    ) -> std::result::Result<T, Error> {
        self.context(ErrorContext::new(component, operation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_display() {
        let ctx = ErrorContext::new("gateway", "dispatch").with_details("sip queue");
        assert_eq!(
            ctx.to_string(),
            "in component 'gateway' during operation 'dispatch' (sip queue)"
        );
    }

    #[test]
    fn test_config_error_keeps_variant() {
        let res: std::result::Result<(), Error> = Err(Error::Config("missing api_id".into()));
        let err = res.with_context("launcher", "load settings").unwrap_err();
        match err {
            Error::Config(msg) => {
                assert!(msg.contains("missing api_id"));
                assert!(msg.contains("load settings"));
            }
            other => panic!("Expected Config error, got {:?}", other),
        }
    }

    #[test]
    fn test_other_errors_become_custom() {
        let err = Error::QueueClosed.in_context(ErrorContext::new("sip", "push"));
        assert!(matches!(err, Error::Custom(_)));
        assert!(err.to_string().starts_with("Event queue is closed"));
    }

    #[test]
    fn test_ok_passes_through() {
        let res: std::result::Result<u8, Error> = Ok(7);
        assert_eq!(res.with_context("x", "y").unwrap(), 7);
    }
}
