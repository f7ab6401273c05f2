//! TF-IDF feature extraction over normalized skill text

use crate::error::{JobAlertError, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// One row per posting, one column per vocabulary term.
pub type FeatureMatrix = Array2<f64>;

/// Fits TF-IDF weights on a corpus of skill texts.
#[derive(Debug, Clone, Default)]
pub struct TfidfVectorizer;

/// Learned vocabulary and term statistics.
///
/// `terms[i]` is the term for column `i`; terms are kept in lexicographic order
/// so repeated fits of the same corpus agree on every column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorizerModel {
    terms: Vec<String>,
    document_frequency: Vec<usize>,
    idf: Vec<f64>,
    n_documents: usize,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl TfidfVectorizer {
    pub fn new() -> Self {
        Self
    }

    /// Learn the vocabulary and idf weights of a corpus.
    pub fn fit(&self, corpus: &[&str]) -> VectorizerModel {
        let vocabulary: BTreeSet<&str> = corpus
            .iter()
            .flat_map(|doc| doc.split_whitespace())
            .collect();
        let terms: Vec<String> = vocabulary.into_iter().map(str::to_string).collect();
        let index = build_index(&terms);

        let mut document_frequency = vec![0usize; terms.len()];
        for doc in corpus {
            let unique: BTreeSet<&str> = doc.split_whitespace().collect();
            for term in unique {
                if let Some(&column) = index.get(term) {
                    document_frequency[column] += 1;
                }
            }
        }

        let n = corpus.len() as f64;
        // Smoothed idf: as if one extra document contained every term
        let idf = document_frequency
            .iter()
            .map(|&df| ((1.0 + n) / (1.0 + df as f64)).ln() + 1.0)
            .collect();

        VectorizerModel {
            terms,
            document_frequency,
            idf,
            n_documents: corpus.len(),
            index,
        }
    }

    /// Fit on `corpus` and return its feature matrix alongside the model.
    pub fn fit_transform(&self, corpus: &[&str]) -> (FeatureMatrix, VectorizerModel) {
        let model = self.fit(corpus);
        let matrix = model.transform(corpus);
        log::debug!(
            "Vectorized {} documents over {} terms",
            matrix.nrows(),
            matrix.ncols()
        );
        (matrix, model)
    }
}

impl VectorizerModel {
    /// Project documents into this model's feature space. Unknown terms are ignored.
    pub fn transform(&self, corpus: &[&str]) -> FeatureMatrix {
        let mut matrix = Array2::<f64>::zeros((corpus.len(), self.terms.len()));

        for (row, doc) in corpus.iter().enumerate() {
            let mut counts: HashMap<usize, f64> = HashMap::new();
            for term in doc.split_whitespace() {
                if let Some(&column) = self.index.get(term) {
                    *counts.entry(column).or_insert(0.0) += 1.0;
                }
            }

            for (column, tf) in counts {
                matrix[[row, column]] = tf * self.idf[column];
            }

            let norm = matrix.row(row).iter().map(|w| w * w).sum::<f64>().sqrt();
            if norm > 0.0 {
                matrix.row_mut(row).mapv_inplace(|w| w / norm);
            }
        }

        matrix
    }

    pub fn vocabulary_size(&self) -> usize {
        self.terms.len()
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn column_of(&self, term: &str) -> Option<usize> {
        self.index.get(term).copied()
    }

    pub fn idf(&self, term: &str) -> Option<f64> {
        self.column_of(term).map(|column| self.idf[column])
    }

    pub fn document_frequency(&self, term: &str) -> Option<usize> {
        self.column_of(term).map(|column| self.document_frequency[column])
    }

    pub fn n_documents(&self) -> usize {
        self.n_documents
    }

    /// Rebuild the term lookup after deserialization and check the model's shape.
    pub fn restore(mut self) -> Result<Self> {
        let columns = self.terms.len();
        if self.idf.len() != columns || self.document_frequency.len() != columns {
            return Err(JobAlertError::Processing(format!(
                "vectorizer has {} terms but {} idf weights and {} document frequencies",
                columns,
                self.idf.len(),
                self.document_frequency.len()
            )));
        }
        if self.terms.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(JobAlertError::Processing(
                "vectorizer vocabulary is not strictly ordered".to_string(),
            ));
        }

        self.index = build_index(&self.terms);
        Ok(self)
    }
}

fn build_index(terms: &[String]) -> HashMap<String, usize> {
    terms
        .iter()
        .enumerate()
        .map(|(column, term)| (term.clone(), column))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matrix_shape_and_vocabulary_order() {
        let corpus = ["sql python", "java spring", "python pandas"];
        let (matrix, model) = TfidfVectorizer::new().fit_transform(&corpus);

        assert_eq!(matrix.nrows(), 3);
        assert_eq!(matrix.ncols(), 5);
        assert_eq!(model.terms(), &["java", "pandas", "python", "spring", "sql"]);
        assert_eq!(model.column_of("python"), Some(2));
    }

    #[test]
    fn test_refit_is_bit_identical() {
        let corpus = ["python sql", "machine learning python", "java", "sql sql excel"];
        let vectorizer = TfidfVectorizer::new();

        let (first, _) = vectorizer.fit_transform(&corpus);
        let (second, _) = vectorizer.fit_transform(&corpus);

        let first_bits: Vec<u64> = first.iter().map(|w| w.to_bits()).collect();
        let second_bits: Vec<u64> = second.iter().map(|w| w.to_bits()).collect();
        assert_eq!(first_bits, second_bits);
    }

    #[test]
    fn test_common_terms_are_downweighted() {
        let corpus = ["python sql", "python java", "python go"];
        let (matrix, model) = TfidfVectorizer::new().fit_transform(&corpus);

        assert_eq!(model.document_frequency("python"), Some(3));
        assert!(model.idf("python").unwrap() < model.idf("sql").unwrap());

        let python = model.column_of("python").unwrap();
        let sql = model.column_of("sql").unwrap();
        assert!(matrix[[0, python]] < matrix[[0, sql]]);
    }

    #[test]
    fn test_rows_are_unit_length() {
        let corpus = ["python sql sql", "java", "rust go python"];
        let (matrix, _) = TfidfVectorizer::new().fit_transform(&corpus);

        for row in matrix.rows() {
            let norm = row.iter().map(|w| w * w).sum::<f64>().sqrt();
            assert!((norm - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_smoothed_idf_values() {
        let corpus = ["a b", "a"];
        let model = TfidfVectorizer::new().fit(&corpus);

        assert!((model.idf("a").unwrap() - 1.0).abs() < 1e-12);
        let expected_b = (3.0f64 / 2.0).ln() + 1.0;
        assert!((model.idf("b").unwrap() - expected_b).abs() < 1e-12);
    }

    #[test]
    fn test_empty_corpus_has_no_columns() {
        let (matrix, model) = TfidfVectorizer::new().fit_transform(&[]);
        assert_eq!(matrix.dim(), (0, 0));
        assert_eq!(model.vocabulary_size(), 0);

        let (matrix, _) = TfidfVectorizer::new().fit_transform(&["", "  "]);
        assert_eq!(matrix.dim(), (2, 0));
    }

    #[test]
    fn test_transform_ignores_unknown_terms() {
        let model = TfidfVectorizer::new().fit(&["python sql", "java"]);
        let matrix = model.transform(&["haskell", "python haskell"]);

        assert!(matrix.row(0).iter().all(|&w| w == 0.0));
        assert!((matrix[[1, model.column_of("python").unwrap()]] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_restore_after_serialization() {
        let model = TfidfVectorizer::new().fit(&["python sql", "java"]);
        let json = serde_json::to_string(&model).unwrap();

        let restored: VectorizerModel = serde_json::from_str(&json).unwrap();
        let restored = restored.restore().unwrap();
        assert_eq!(restored, model);
        assert_eq!(restored.n_documents(), 2);
        assert_eq!(restored.column_of("sql"), model.column_of("sql"));
    }
}
