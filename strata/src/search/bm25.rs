//! Okapi BM25 inverted index

use std::collections::{HashMap, HashSet};

use crate::config::Bm25Config;
use crate::search::tokenizer::tokenize;

/// Inverted index scoring documents with Okapi BM25.
///
/// `score(d, q) = Σ idf(t) · tf · (k1 + 1) / (tf + k1 · (1 - b + b · |d| / avgdl))`
/// with `idf(t) = ln(1 + (N - df + 0.5) / (df + 0.5))`, which stays positive
/// even for terms present in every document.
#[derive(Debug, Clone)]
pub struct Bm25Index {
    params: Bm25Config,
    /// term -> documents containing it
    postings: HashMap<String, HashSet<String>>,
    /// document -> term frequencies
    documents: HashMap<String, HashMap<String, u32>>,
    /// document -> token count
    lengths: HashMap<String, u32>,
    total_length: u64,
}

impl Bm25Index {
    pub fn new(params: Bm25Config) -> Self {
        Self {
            params,
            postings: HashMap::new(),
            documents: HashMap::new(),
            lengths: HashMap::new(),
            total_length: 0,
        }
    }

    /// Index a document, replacing any previous version with the same id
    pub fn add(&mut self, id: &str, text: &str) {
        self.remove(id);

        let tokens = tokenize(text);
        let mut frequencies: HashMap<String, u32> = HashMap::new();
        for token in &tokens {
            *frequencies.entry(token.clone()).or_insert(0) += 1;
        }
        for term in frequencies.keys() {
            self.postings
                .entry(term.clone())
                .or_default()
                .insert(id.to_string());
        }

        let length = tokens.len() as u32;
        self.total_length += u64::from(length);
        self.lengths.insert(id.to_string(), length);
        self.documents.insert(id.to_string(), frequencies);
    }

    /// Drop a document from the index
    pub fn remove(&mut self, id: &str) -> bool {
        let Some(frequencies) = self.documents.remove(id) else {
            return false;
        };
        for term in frequencies.keys() {
            if let Some(docs) = self.postings.get_mut(term) {
                docs.remove(id);
                if docs.is_empty() {
                    self.postings.remove(term);
                }
            }
        }
        if let Some(length) = self.lengths.remove(id) {
            self.total_length -= u64::from(length);
        }
        true
    }

    pub fn clear(&mut self) {
        self.postings.clear();
        self.documents.clear();
        self.lengths.clear();
        self.total_length = 0;
    }

    /// Number of indexed documents
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Number of distinct indexed terms
    pub fn vocabulary_size(&self) -> usize {
        self.postings.len()
    }

    fn idf(&self, term: &str) -> f32 {
        let n = self.documents.len() as f32;
        let df = self.postings.get(term).map_or(0, HashSet::len) as f32;
        (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
    }

    /// Score every document sharing at least one term with the query.
    ///
    /// Scores are raw (unbounded) BM25 values; repeated query terms count once.
    pub fn search(&self, query: &str) -> HashMap<String, f32> {
        let mut scores: HashMap<String, f32> = HashMap::new();
        if self.documents.is_empty() {
            return scores;
        }

        let avg_length = (self.total_length as f32 / self.documents.len() as f32).max(1.0);
        let Bm25Config { k1, b } = self.params;

        let terms: HashSet<String> = tokenize(query).into_iter().collect();
        for term in &terms {
            let Some(docs) = self.postings.get(term) else {
                continue;
            };
            let idf = self.idf(term);
            for doc in docs {
                let tf = self
                    .documents
                    .get(doc)
                    .and_then(|freqs| freqs.get(term))
                    .copied()
                    .unwrap_or(0) as f32;
                let length = self.lengths.get(doc).copied().unwrap_or(0) as f32;
                let norm = k1 * (1.0 - b + b * length / avg_length);
                *scores.entry(doc.clone()).or_insert(0.0) += idf * tf * (k1 + 1.0) / (tf + norm);
            }
        }

        scores
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(docs: &[(&str, &str)]) -> Bm25Index {
        let mut index = Bm25Index::new(Bm25Config::default());
        for (id, text) in docs {
            index.add(id, text);
        }
        index
    }

    #[test]
    fn test_rare_terms_outweigh_common_terms() {
        let index = index(&[
            ("a", "the cat sat on the mat"),
            ("b", "the dog sat on the log"),
            ("c", "the bird flew"),
        ]);

        let scores = index.search("the cat");
        assert!(scores["a"] > scores["b"]);
        assert!(scores["b"] > 0.0);
        assert_eq!(scores.len(), 3);
    }

    #[test]
    fn test_shorter_documents_score_higher_for_same_tf() {
        let index = index(&[
            ("short", "rust memory"),
            ("long", "rust is a language and this sentence is about many other things"),
        ]);
        let scores = index.search("rust");
        assert!(scores["short"] > scores["long"]);
    }

    #[test]
    fn test_readd_and_remove() {
        let mut index = index(&[("a", "alpha beta"), ("b", "gamma")]);
        index.add("a", "delta");
        assert!(index.search("alpha").is_empty());
        assert!(index.search("delta").contains_key("a"));
        assert_eq!(index.len(), 2);

        assert!(index.remove("a"));
        assert!(!index.remove("a"));
        assert!(index.search("delta").is_empty());
        assert_eq!(index.vocabulary_size(), 1);

        index.clear();
        assert!(index.is_empty());
    }

    #[test]
    fn test_unknown_terms_score_nothing() {
        let index = index(&[("a", "alpha")]);
        assert!(index.search("omega").is_empty());
    }
}
