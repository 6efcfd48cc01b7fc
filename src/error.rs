//! Error types for the locator.
//!
//! Two classes exist. Input errors reject a call before any strategy runs. Offset
//! inconsistencies mean the word stream disagrees with itself and abort the call. Not finding a
//! passage is never an error.

/// Result type alias for locator operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while preparing a page or locating a passage.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Query is empty or whitespace only
    #[error("Query is empty")]
    EmptyQuery,

    /// Page number outside the document (page numbers are 1-indexed)
    #[error("Page {page} out of range: document has {count} page(s)")]
    PageOutOfRange {
        /// Requested 1-indexed page number
        page: usize,
        /// Number of pages in the document
        count: usize,
    },

    /// Page bounds are missing, zero, negative or not finite
    #[error("Invalid page bounds: {0}")]
    InvalidBounds(String),

    /// Some words carry character offsets and some do not
    #[error("Words must either all carry offsets or none: word {0} differs")]
    MixedOffsets(usize),

    /// Configuration value out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Word offsets violate the single-space join convention
    #[error("Inconsistent word offsets at word {index}: {reason}")]
    InconsistentOffsets {
        /// Index of the offending word
        index: usize,
        /// What was violated
        reason: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON input
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// True for errors caused by the caller's input, as opposed to internal inconsistencies.
    pub fn is_input_error(&self) -> bool {
        !matches!(self, Error::InconsistentOffsets { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        assert!(Error::EmptyQuery.is_input_error());
        assert!(Error::PageOutOfRange { page: 3, count: 2 }.is_input_error());
        let inconsistent = Error::InconsistentOffsets {
            index: 4,
            reason: "gap of 2".to_string(),
        };
        assert!(!inconsistent.is_input_error());
        assert_eq!(
            inconsistent.to_string(),
            "Inconsistent word offsets at word 4: gap of 2"
        );
    }

    #[test]
    fn test_page_out_of_range_message() {
        let err = Error::PageOutOfRange { page: 5, count: 2 };
        assert_eq!(err.to_string(), "Page 5 out of range: document has 2 page(s)");
    }
}
