//! TF-IDF vectorisation of failure reason texts
//!
//! - tokens: lowercase runs of 2+ alphanumeric/underscore characters
//! - English stop words are dropped
//! - idf is smoothed: `ln((1 + n) / (1 + df)) + 1`
//! - every document vector is L2-normalised (all-zero vectors stay zero)

use std::collections::BTreeMap;
use trueno::Vector;

/// Common English words carrying no failure signal.
const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "across", "after", "afterwards", "again", "against", "all", "almost",
    "alone", "along", "already", "also", "although", "always", "am", "among", "amongst", "an",
    "and", "another", "any", "anyhow", "anyone", "anything", "anyway", "anywhere", "are",
    "around", "as", "at", "be", "became", "because", "become", "becomes", "been", "before",
    "beforehand", "behind", "being", "below", "beside", "besides", "between", "beyond", "both",
    "but", "by", "can", "cannot", "could", "did", "do", "does", "done", "down", "due", "during",
    "each", "eg", "either", "else", "elsewhere", "enough", "etc", "even", "ever", "every",
    "everyone", "everything", "everywhere", "except", "few", "for", "former", "formerly", "from",
    "further", "had", "has", "have", "he", "hence", "her", "here", "hereafter", "hereby",
    "herein", "hers", "herself", "him", "himself", "his", "how", "however", "ie", "if", "in",
    "inc", "indeed", "into", "is", "it", "its", "itself", "just", "last", "latter", "latterly",
    "least", "less", "ltd", "made", "many", "may", "me", "meanwhile", "might", "more",
    "moreover", "most", "mostly", "much", "must", "my", "myself", "namely", "neither", "never",
    "nevertheless", "next", "no", "nobody", "none", "noone", "nor", "not", "nothing", "now",
    "nowhere", "of", "off", "often", "on", "once", "one", "only", "onto", "or", "other",
    "others", "otherwise", "our", "ours", "ourselves", "out", "over", "own", "per", "perhaps",
    "please", "rather", "re", "same", "seem", "seemed", "seeming", "seems", "several", "she",
    "should", "since", "so", "some", "somehow", "someone", "something", "sometime", "sometimes",
    "somewhere", "still", "such", "than", "that", "the", "their", "them", "themselves", "then",
    "thence", "there", "thereafter", "thereby", "therefore", "therein", "thereupon", "these",
    "they", "this", "those", "though", "through", "throughout", "thru", "thus", "to", "together",
    "too", "toward", "towards", "un", "under", "until", "up", "upon", "us", "very", "via", "was",
    "we", "well", "were", "what", "whatever", "when", "whence", "whenever", "where",
    "whereafter", "whereas", "whereby", "wherein", "whereupon", "wherever", "whether", "which",
    "while", "who", "whoever", "whole", "whom", "whose", "why", "will", "with", "within",
    "without", "would", "yet", "you", "your", "yours", "yourself", "yourselves",
];

/// Split text into lowercase tokens, dropping stop words.
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| t.chars().count() >= 2 && !STOP_WORDS.contains(t))
        .map(str::to_string)
        .collect()
}

/// Fitted vocabulary and document vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct TfIdf {
    vocabulary: Vec<String>,
    idf: Vec<f32>,
    vectors: Vec<Vec<f32>>,
}

impl TfIdf {
    /// Fit on a corpus and vectorise every document.
    #[must_use]
    pub fn fit_transform<S: AsRef<str>>(documents: &[S]) -> Self {
        let tokenized: Vec<Vec<String>> = documents.iter().map(|d| tokenize(d.as_ref())).collect();

        let mut document_frequency: BTreeMap<&str, usize> = BTreeMap::new();
        for tokens in &tokenized {
            let mut seen: Vec<&str> = tokens.iter().map(String::as_str).collect();
            seen.sort_unstable();
            seen.dedup();
            for token in seen {
                *document_frequency.entry(token).or_default() += 1;
            }
        }

        #[allow(clippy::cast_precision_loss)]
        let n = documents.len() as f32;
        let vocabulary: Vec<String> = document_frequency.keys().map(|t| (*t).to_string()).collect();
        #[allow(clippy::cast_precision_loss)]
        let idf: Vec<f32> = document_frequency
            .values()
            .map(|&df| ((1.0 + n) / (1.0 + df as f32)).ln() + 1.0)
            .collect();

        let vectors = tokenized
            .iter()
            .map(|tokens| {
                let mut v = vec![0.0_f32; vocabulary.len()];
                for token in tokens {
                    if let Ok(j) = vocabulary.binary_search_by(|w| w.as_str().cmp(token)) {
                        v[j] += 1.0;
                    }
                }
                for (x, w) in v.iter_mut().zip(&idf) {
                    *x *= w;
                }
                let norm = squared_norm(&v).sqrt();
                if norm > 0.0 {
                    v.iter_mut().for_each(|x| *x /= norm);
                }
                v
            })
            .collect();

        Self {
            vocabulary,
            idf,
            vectors,
        }
    }

    /// Sorted vocabulary.
    #[must_use]
    pub fn vocabulary(&self) -> &[String] {
        &self.vocabulary
    }

    /// Smoothed idf per vocabulary term.
    #[must_use]
    pub fn idf(&self) -> &[f32] {
        &self.idf
    }

    /// Document vectors, one per input document.
    #[must_use]
    pub fn vectors(&self) -> &[Vec<f32>] {
        &self.vectors
    }

    /// Take the document vectors.
    #[must_use]
    pub fn into_vectors(self) -> Vec<Vec<f32>> {
        self.vectors
    }
}

/// `Σ x²` through the SIMD dot product, scalar on backend failure.
#[must_use]
pub fn squared_norm(v: &[f32]) -> f32 {
    if v.is_empty() {
        return 0.0;
    }
    let vector = Vector::from_slice(v);
    vector
        .dot(&vector)
        .unwrap_or_else(|_| v.iter().map(|x| x * x).sum())
}

/// Squared Euclidean distance.
#[must_use]
pub fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
    let diff: Vec<f32> = a.iter().zip(b).map(|(x, y)| x - y).collect();
    squared_norm(&diff)
}
