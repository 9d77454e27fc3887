//! Error taxonomy shared by every toporeg crate.
//!
//! Input contract violations are fatal and reported before sampling starts.
//! Numeric degeneracy is never an error; the sampler handles it in the log
//! domain.

use thiserror::Error;

/// Errors raised by the region model and its inputs.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ModelError {
    /// A non-stopword token names a word outside the vocabulary.
    #[error("token {token} references word id {word_id} beyond vocabulary size W={vocabulary}")]
    WordOutOfRange {
        token: usize,
        word_id: usize,
        vocabulary: usize,
    },

    /// A non-stopword token names a document outside the corpus.
    #[error("token {token} references document id {document_id} beyond document count D={documents}")]
    DocumentOutOfRange {
        token: usize,
        document_id: usize,
        documents: usize,
    },

    /// The parallel corpus vectors disagree in length.
    #[error("corpus vector `{field}` has {actual} entries, expected {expected}")]
    LengthMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A coordinate record cannot be placed on the sphere.
    #[error("malformed coordinate for toponym {word_id}: {reason}")]
    MalformedCoordinate { word_id: usize, reason: String },

    /// A hyperparameter is outside its admissible range.
    #[error("invalid hyperparameter {name}={value}: {reason}")]
    InvalidHyperparameter {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },

    /// The temperature schedule cannot be executed.
    #[error("invalid annealing schedule: {0}")]
    InvalidSchedule(String),

    /// The initial region capacity must hold at least one region.
    #[error("invalid region capacity {0}: must be at least 1")]
    InvalidCapacity(usize),

    /// A required input was not configured.
    #[error("missing input: {0}")]
    MissingInput(String),

    /// Nothing to sample.
    #[error("corpus contains no non-stopword tokens")]
    EmptyCorpus,

    /// Region tables no longer agree with the token assignments.
    #[error("inconsistent counts in region {region}: {detail}")]
    InconsistentCounts { region: usize, detail: String },

    /// Sampling was requested before the model was seeded.
    #[error("model has not been initialized")]
    NotInitialized,
}

impl ModelError {
    /// Convenience constructor for [`ModelError::InconsistentCounts`].
    pub fn inconsistent(region: usize, detail: impl Into<String>) -> Self {
        Self::InconsistentCounts {
            region,
            detail: detail.into(),
        }
    }

    /// Convenience constructor for [`ModelError::MalformedCoordinate`].
    pub fn malformed(word_id: usize, reason: impl Into<String>) -> Self {
        Self::MalformedCoordinate {
            word_id,
            reason: reason.into(),
        }
    }

    /// True for errors caused by bad input rather than by a sampler bug.
    pub fn is_input_error(&self) -> bool {
        !matches!(
            self,
            Self::InconsistentCounts { .. } | Self::NotInitialized
        )
    }
}

/// Result alias used throughout the library crates.
pub type Result<T> = std::result::Result<T, ModelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_out_of_range_names_the_invariant() {
        let err = ModelError::WordOutOfRange {
            token: 7,
            word_id: 12,
            vocabulary: 10,
        };
        let msg = err.to_string();
        assert!(msg.contains("beyond vocabulary size W=10"), "got: {msg}");
        assert!(msg.contains("token 7"));
        assert!(err.is_input_error());
    }

    #[test]
    fn test_inconsistent_is_not_input_error() {
        let err = ModelError::inconsistent(3, "total underflow");
        assert_eq!(
            err.to_string(),
            "inconsistent counts in region 3: total underflow"
        );
        assert!(!err.is_input_error());
    }
}
