//! Error surface of the freqcache library.
//!
//! The engine encodes routine operational outcomes (missing key, duplicate
//! key, expired entry, invalid key) in the `bool`/`Option` returns of its
//! API; none of those produce an error value. [`CacheError`] covers the two
//! places a caller can actually be handed one: constructing a cache with an
//! unusable capacity, and asking the request processor for a verb it does
//! not speak.
//!
//! ## Example Usage
//!
//! ```
//! use freqcache::engine::FreqCache;
//! use freqcache::error::CacheError;
//!
//! let err = FreqCache::<u64>::new(0).unwrap_err();
//! assert_eq!(err, CacheError::InvalidCapacity { requested: 0 });
//! assert!(err.to_string().contains("capacity"));
//! ```

use std::fmt;

/// Errors surfaced by cache construction and request dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Cache construction asked for fewer than one entry of capacity.
    InvalidCapacity { requested: usize },
    /// The request processor received an operation verb it does not speak.
    InvalidOperation { verb: String },
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidCapacity { requested } => write!(
                f,
                "invalid capacity {requested}: a cache must hold at least one entry"
            ),
            // The response envelope pins this exact wording; the offending
            // verb stays reachable through Debug.
            Self::InvalidOperation { .. } => f.write_str("Invalid operation"),
        }
    }
}

impl std::error::Error for CacheError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_capacity_display_names_the_parameter() {
        let err = CacheError::InvalidCapacity { requested: 0 };
        let msg = err.to_string();
        assert!(msg.contains("capacity"));
        assert!(msg.contains('0'));
    }

    #[test]
    fn invalid_operation_display_matches_the_envelope_wording() {
        let err = CacheError::InvalidOperation {
            verb: "Fetch".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid operation");
    }

    #[test]
    fn invalid_operation_debug_keeps_the_verb() {
        let err = CacheError::InvalidOperation {
            verb: "Fetch".to_string(),
        };
        assert!(format!("{:?}", err).contains("Fetch"));
    }

    #[test]
    fn variants_compare_by_payload() {
        let a = CacheError::InvalidCapacity { requested: 0 };
        assert_eq!(a.clone(), a);
        assert_ne!(
            a,
            CacheError::InvalidOperation {
                verb: "x".to_string()
            }
        );
    }

    #[test]
    fn implements_std_error() {
        fn assert_error<T: std::error::Error>() {}
        assert_error::<CacheError>();
    }
}
