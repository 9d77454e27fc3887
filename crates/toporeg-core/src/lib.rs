//! # toporeg-core
//!
//! Input data and shared types for the toporeg region model.
//!
//! ## Corpus
//!
//! A [`Corpus`] holds the four parallel token vectors (word id, document id,
//! toponym flag, stopword flag) and derives the vocabulary size `W` and the
//! document count `D` from the non-stopword tokens:
//!
//! ```rust
//! use toporeg_core::Corpus;
//!
//! let corpus = Corpus::new(
//!     vec![0, 1, 2, 0],
//!     vec![0, 0, 1, 1],
//!     vec![true, false, false, true],
//!     vec![false, false, true, false],
//! )
//! .unwrap();
//! assert_eq!(corpus.len(), 4);
//! assert_eq!(corpus.active_len(), 3);
//! assert_eq!(corpus.document_count(), 2);
//! ```
//!
//! ## Coordinate lexicon
//!
//! A [`CoordinateLexicon`] maps each toponym word id to its candidate points on
//! the unit sphere, converted once from longitude/latitude:
//!
//! ```rust
//! use indexmap::IndexMap;
//! use toporeg_core::{CoordinateLexicon, GeoPoint};
//!
//! let mut records = IndexMap::new();
//! records.insert(0, vec![GeoPoint::new(-89.65, 39.80), GeoPoint::new(-72.59, 42.10)]);
//! let lexicon = CoordinateLexicon::from_records(&records).unwrap();
//! assert_eq!(lexicon.candidate_count(0), 2);
//! ```

pub mod config;
pub mod corpus;
pub mod error;
pub mod geometry;
pub mod lexicon;

pub use config::*;
pub use corpus::*;
pub use error::*;
pub use geometry::*;
pub use lexicon::*;
