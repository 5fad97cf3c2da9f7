//! # Binding Error Types
//!
//! Error handling for metadata loading and the two-phase binder.
//!
//! ## Error Categories
//!
//! - **Annotation errors**: structurally invalid mappings (conflicting
//!   `mappedBy` and join columns, wrong override column count, a
//!   single-column directive on a multi-column property). Always fatal.
//! - **Recoverable errors**: a referenced entity, table or column is not
//!   available *yet*. Only raised while second passes drain; the scheduler
//!   retries the failing task before escalating.
//! - **Assertion failures**: an internal precondition was violated by the
//!   caller (superclass not bound before its subclass, an implicit column
//!   that turns out to be explicit).
//! - **Source errors**: descriptor files that cannot be read or parsed.
//!
//! Every binding error names the offending entity/property path so a failed
//! build can be traced back to the mapping that caused it:
//!
//! ```ignore
//! BindingError::annotation(
//!     "com.acme.Order.customer",
//!     "'@JoinColumn' is not allowed on the mapped-by side",
//! )
//! ```

use thiserror::Error;

pub type BindingResult<T> = Result<T, BindingError>;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum BindingError {
    #[error("Invalid mapping for '{path}': {message}")]
    Annotation { path: String, message: String },

    #[error("Unable to resolve '{path}' yet: {message}")]
    Recoverable { path: String, message: String },

    #[error("Assertion failure: {message}")]
    Assertion { message: String },

    #[error("Foreign key circularity dependency involving the following tables: {tables}")]
    ForeignKeyCircularity { tables: String },

    #[error("Failed to read metadata source: {error}")]
    SourceReadError { error: String },

    #[error("Failed to parse metadata source: {error}")]
    SourceParseError { error: String },
}

impl BindingError {
    /// Fatal configuration error for the mapping at `path`.
    pub fn annotation(path: impl Into<String>, message: impl Into<String>) -> Self {
        BindingError::Annotation {
            path: path.into(),
            message: message.into(),
        }
    }

    /// "Not available yet" failure raised from reference resolution.
    pub fn recoverable(path: impl Into<String>, message: impl Into<String>) -> Self {
        BindingError::Recoverable {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn assertion(message: impl Into<String>) -> Self {
        BindingError::Assertion {
            message: message.into(),
        }
    }

    /// Annotation error with extra operational context appended.
    ///
    /// # Example
    /// ```ignore
    /// BindingError::annotation_with_context(
    ///     "Order.lines",
    ///     "unknown target entity 'LineItem'",
    ///     "While binding the collection key",
    /// )
    /// ```
    pub fn annotation_with_context(
        path: impl Into<String>,
        message: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        BindingError::Annotation {
            path: path.into(),
            message: format!("{}\n  Context: {}", message.into(), context.into()),
        }
    }

    pub fn is_recoverable(&self) -> bool {
        matches!(self, BindingError::Recoverable { .. })
    }

    /// A recoverable error that is still failing after the retry budget is spent.
    pub fn into_fatal(self) -> Self {
        match self {
            BindingError::Recoverable { path, message } => {
                BindingError::Annotation { path, message }
            }
            other => other,
        }
    }

    /// Entity/property path the error refers to, when it has one.
    pub fn path(&self) -> Option<&str> {
        match self {
            BindingError::Annotation { path, .. } | BindingError::Recoverable { path, .. } => {
                Some(path)
            }
            _ => None,
        }
    }
}
