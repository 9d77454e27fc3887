//! Corpus vectors: the fixed, already-tokenized training stream.

use crate::error::{ModelError, Result};
use serde::{Deserialize, Serialize};

/// One line of the token stream as supplied by a reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub word_id: u32,
    pub document_id: u32,
    pub is_toponym: bool,
    pub is_stopword: bool,
}

/// Parallel token vectors plus derived dimensions.
///
/// `W` (vocabulary size) counts the word ids used by non-stopword tokens;
/// stopwords never reach the region tables so their ids are unconstrained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Corpus {
    words: Vec<u32>,
    documents: Vec<u32>,
    toponyms: Vec<bool>,
    stopwords: Vec<bool>,
    vocabulary_size: usize,
    document_count: usize,
    active: usize,
}

impl Corpus {
    /// Builds a corpus and derives `W` and `D` from the data.
    pub fn new(
        words: Vec<u32>,
        documents: Vec<u32>,
        toponyms: Vec<bool>,
        stopwords: Vec<bool>,
    ) -> Result<Self> {
        check_lengths(&words, &documents, &toponyms, &stopwords)?;

        let vocabulary_size = words
            .iter()
            .zip(&stopwords)
            .filter(|&(_, &stop)| !stop)
            .map(|(&w, _)| w as usize + 1)
            .max()
            .unwrap_or(0);
        let document_count = documents.iter().map(|&d| d as usize + 1).max().unwrap_or(0);

        Self::with_dimensions(
            words,
            documents,
            toponyms,
            stopwords,
            vocabulary_size,
            document_count,
        )
    }

    /// Builds a corpus against externally declared dimensions.
    ///
    /// Every non-stopword token must satisfy `word < vocabulary_size` and
    /// `document < document_count`; the first violation is reported.
    pub fn with_dimensions(
        words: Vec<u32>,
        documents: Vec<u32>,
        toponyms: Vec<bool>,
        stopwords: Vec<bool>,
        vocabulary_size: usize,
        document_count: usize,
    ) -> Result<Self> {
        check_lengths(&words, &documents, &toponyms, &stopwords)?;

        let mut active = 0;
        for (token, ((&w, &d), &stop)) in words.iter().zip(&documents).zip(&stopwords).enumerate() {
            if stop {
                continue;
            }
            if w as usize >= vocabulary_size {
                return Err(ModelError::WordOutOfRange {
                    token,
                    word_id: w as usize,
                    vocabulary: vocabulary_size,
                });
            }
            if d as usize >= document_count {
                return Err(ModelError::DocumentOutOfRange {
                    token,
                    document_id: d as usize,
                    documents: document_count,
                });
            }
            active += 1;
        }

        Ok(Self {
            words,
            documents,
            toponyms,
            stopwords,
            vocabulary_size,
            document_count,
            active,
        })
    }

    /// Builds a corpus from reader records.
    pub fn from_records<I>(records: I) -> Result<Self>
    where
        I: IntoIterator<Item = TokenRecord>,
    {
        let records = records.into_iter();
        let (lower, _) = records.size_hint();
        let mut words = Vec::with_capacity(lower);
        let mut documents = Vec::with_capacity(lower);
        let mut toponyms = Vec::with_capacity(lower);
        let mut stopwords = Vec::with_capacity(lower);
        for r in records {
            words.push(r.word_id);
            documents.push(r.document_id);
            toponyms.push(r.is_toponym);
            stopwords.push(r.is_stopword);
        }
        Self::new(words, documents, toponyms, stopwords)
    }

    /// Total number of tokens `N`, stopwords included.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Number of non-stopword tokens.
    pub fn active_len(&self) -> usize {
        self.active
    }

    /// Vocabulary size `W`.
    pub fn vocabulary_size(&self) -> usize {
        self.vocabulary_size
    }

    /// Document count `D`.
    pub fn document_count(&self) -> usize {
        self.document_count
    }

    #[inline]
    pub fn word(&self, token: usize) -> usize {
        self.words[token] as usize
    }

    #[inline]
    pub fn document(&self, token: usize) -> usize {
        self.documents[token] as usize
    }

    #[inline]
    pub fn is_toponym(&self, token: usize) -> bool {
        self.toponyms[token]
    }

    #[inline]
    pub fn is_stopword(&self, token: usize) -> bool {
        self.stopwords[token]
    }

    /// The record view of token `token`.
    pub fn record(&self, token: usize) -> TokenRecord {
        TokenRecord {
            word_id: self.words[token],
            document_id: self.documents[token],
            is_toponym: self.toponyms[token],
            is_stopword: self.stopwords[token],
        }
    }

    /// Iterates over all tokens in corpus order.
    pub fn records(&self) -> impl Iterator<Item = TokenRecord> + '_ {
        (0..self.len()).map(|i| self.record(i))
    }
}

fn check_lengths(
    words: &[u32],
    documents: &[u32],
    toponyms: &[bool],
    stopwords: &[bool],
) -> Result<()> {
    let expected = words.len();
    for (field, actual) in [
        ("documents", documents.len()),
        ("toponyms", toponyms.len()),
        ("stopwords", stopwords.len()),
    ] {
        if actual != expected {
            return Err(ModelError::LengthMismatch {
                field,
                expected,
                actual,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimensions_ignore_stopword_ids() {
        let corpus = Corpus::new(
            vec![0, 3, 99],
            vec![0, 1, 1],
            vec![false, true, false],
            vec![false, false, true],
        )
        .unwrap();
        assert_eq!(corpus.vocabulary_size(), 4);
        assert_eq!(corpus.document_count(), 2);
        assert_eq!(corpus.active_len(), 2);
    }

    #[test]
    fn test_length_mismatch() {
        let err = Corpus::new(vec![0, 1], vec![0], vec![false, false], vec![false, false])
            .unwrap_err();
        assert_eq!(
            err,
            ModelError::LengthMismatch {
                field: "documents",
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn test_declared_vocabulary_is_enforced() {
        let err = Corpus::with_dimensions(
            vec![0, 5],
            vec![0, 0],
            vec![false, false],
            vec![false, false],
            4,
            1,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ModelError::WordOutOfRange {
                token: 1,
                word_id: 5,
                vocabulary: 4
            }
        ));
    }

    #[test]
    fn test_records_round_trip_order() {
        let records = vec![
            TokenRecord { word_id: 2, document_id: 0, is_toponym: true, is_stopword: false },
            TokenRecord { word_id: 1, document_id: 1, is_toponym: false, is_stopword: false },
        ];
        let corpus = Corpus::from_records(records.clone()).unwrap();
        assert_eq!(corpus.records().collect::<Vec<_>>(), records);
    }
}
