//! Transaction description categorization
//!
//! TF-IDF over unigrams and bigrams feeding a multinomial naive-Bayes
//! classifier, trained on a small bundled description/label set. Prediction
//! is deterministic for a fitted model; callers that cannot tolerate a
//! categorization failure substitute (Other, 0.5).

use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::Category;

/// Vocabulary cap for the TF-IDF representation
const MAX_FEATURES: usize = 1000;

/// Lidstone smoothing for the naive-Bayes likelihoods
const NB_ALPHA: f64 = 0.1;

/// Bundled training set: synthetic description/label pairs
///
/// Seven categories carry examples; the classifier can only ever emit labels
/// it has seen here.
const TRAINING_SET: &[(&str, Category)] = &[
    // Food & Dining
    ("mcdonalds restaurant", Category::FoodDining),
    ("starbucks coffee", Category::FoodDining),
    ("pizza hut delivery", Category::FoodDining),
    ("grocery store walmart", Category::FoodDining),
    ("restaurant dinner", Category::FoodDining),
    // Shopping
    ("amazon purchase", Category::Shopping),
    ("target store", Category::Shopping),
    ("clothing store", Category::Shopping),
    ("online shopping", Category::Shopping),
    ("retail purchase", Category::Shopping),
    // Transportation
    ("uber ride", Category::Transportation),
    ("gas station fuel", Category::Transportation),
    ("parking fee", Category::Transportation),
    ("public transport", Category::Transportation),
    ("car maintenance", Category::Transportation),
    // Bills & Utilities
    ("electric bill", Category::BillsUtilities),
    ("internet service", Category::BillsUtilities),
    ("phone bill", Category::BillsUtilities),
    ("water utility", Category::BillsUtilities),
    ("rent payment", Category::BillsUtilities),
    // Entertainment
    ("netflix subscription", Category::Entertainment),
    ("movie theater", Category::Entertainment),
    ("spotify premium", Category::Entertainment),
    ("gaming purchase", Category::Entertainment),
    ("concert ticket", Category::Entertainment),
    // Healthcare
    ("pharmacy cvs", Category::Healthcare),
    ("doctor visit", Category::Healthcare),
    ("dental care", Category::Healthcare),
    ("hospital bill", Category::Healthcare),
    ("insurance premium", Category::Healthcare),
    // Income
    ("salary deposit", Category::Income),
    ("freelance payment", Category::Income),
    ("bonus payment", Category::Income),
    ("investment return", Category::Income),
    ("refund received", Category::Income),
];

fn punct_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\w\s]").expect("static regex"))
}

fn digits_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+").expect("static regex"))
}

/// Normalize a transaction description for tokenization
///
/// Lowercases, strips punctuation, collapses digit runs into a `num`
/// placeholder token, and squeezes whitespace.
pub fn normalize_description(text: &str) -> String {
    let lowered = text.to_lowercase();
    let no_punct = punct_re().replace_all(&lowered, " ");
    let no_digits = digits_re().replace_all(&no_punct, "num");
    no_digits.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Unigrams plus adjacent bigrams of a normalized description
fn terms_of(normalized: &str) -> Vec<String> {
    let tokens: Vec<&str> = normalized.split_whitespace().collect();
    let mut terms: Vec<String> = tokens.iter().map(|t| t.to_string()).collect();
    for pair in tokens.windows(2) {
        terms.push(format!("{} {}", pair[0], pair[1]));
    }
    terms
}

/// TF-IDF vectorizer with a bounded vocabulary
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TfidfVectorizer {
    /// Term -> column index
    vocabulary: HashMap<String, usize>,
    /// Smoothed inverse document frequency per column
    idf: Vec<f64>,
}

impl TfidfVectorizer {
    fn fit(documents: &[String]) -> Self {
        let n_docs = documents.len();

        // Corpus term counts and document frequencies
        let mut corpus_counts: HashMap<String, usize> = HashMap::new();
        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        for doc in documents {
            let terms = terms_of(doc);
            for term in &terms {
                *corpus_counts.entry(term.clone()).or_insert(0) += 1;
            }
            let mut seen: Vec<&String> = terms.iter().collect();
            seen.sort();
            seen.dedup();
            for term in seen {
                *doc_freq.entry(term.clone()).or_insert(0) += 1;
            }
        }

        // Keep the most frequent terms; ties broken lexicographically so the
        // fitted vocabulary is stable across runs
        let mut ranked: Vec<(String, usize)> = corpus_counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(MAX_FEATURES);

        let mut kept: Vec<String> = ranked.into_iter().map(|(t, _)| t).collect();
        kept.sort();

        let mut vocabulary = HashMap::new();
        let mut idf = Vec::with_capacity(kept.len());
        for (j, term) in kept.into_iter().enumerate() {
            let df = doc_freq.get(&term).copied().unwrap_or(0);
            idf.push((((1 + n_docs) as f64) / ((1 + df) as f64)).ln() + 1.0);
            vocabulary.insert(term, j);
        }

        Self { vocabulary, idf }
    }

    /// L2-normalized tf-idf row for one normalized document
    fn transform(&self, normalized: &str) -> Vec<f64> {
        let mut row = vec![0.0; self.idf.len()];
        for term in terms_of(normalized) {
            if let Some(&j) = self.vocabulary.get(&term) {
                row[j] += 1.0;
            }
        }
        for (j, v) in row.iter_mut().enumerate() {
            *v *= self.idf[j];
        }
        let norm = row.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            for v in &mut row {
                *v /= norm;
            }
        }
        row
    }
}

/// Multinomial naive Bayes over tf-idf rows
#[derive(Debug, Clone, Serialize, Deserialize)]
struct MultinomialNb {
    class_log_prior: Vec<f64>,
    /// Per class, per feature: log P(feature | class)
    feature_log_prob: Vec<Vec<f64>>,
}

impl MultinomialNb {
    fn fit(rows: &[Vec<f64>], labels: &[usize], n_classes: usize) -> Self {
        let n = rows.len();
        let width = rows[0].len();

        let mut class_counts = vec![0usize; n_classes];
        let mut feature_sums = vec![vec![0.0; width]; n_classes];
        for (row, &label) in rows.iter().zip(labels) {
            class_counts[label] += 1;
            for (j, v) in row.iter().enumerate() {
                feature_sums[label][j] += v;
            }
        }

        let class_log_prior = class_counts
            .iter()
            .map(|&c| ((c as f64).max(f64::MIN_POSITIVE) / n as f64).ln())
            .collect();

        let feature_log_prob = feature_sums
            .iter()
            .map(|sums| {
                let total: f64 = sums.iter().sum::<f64>() + NB_ALPHA * width as f64;
                sums.iter().map(|s| ((s + NB_ALPHA) / total).ln()).collect()
            })
            .collect();

        Self {
            class_log_prior,
            feature_log_prob,
        }
    }

    /// Normalized class posteriors for one row
    fn predict_proba(&self, row: &[f64]) -> Vec<f64> {
        let joint: Vec<f64> = self
            .class_log_prior
            .iter()
            .zip(&self.feature_log_prob)
            .map(|(prior, log_prob)| {
                prior
                    + row
                        .iter()
                        .zip(log_prob)
                        .map(|(x, lp)| x * lp)
                        .sum::<f64>()
            })
            .collect();

        let max = joint.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let exp: Vec<f64> = joint.iter().map(|j| (j - max).exp()).collect();
        let total: f64 = exp.iter().sum();
        exp.into_iter().map(|e| e / total).collect()
    }
}

/// Fitted transaction categorizer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Categorizer {
    vectorizer: TfidfVectorizer,
    model: MultinomialNb,
    /// Class index -> category, in training order
    classes: Vec<Category>,
}

impl Categorizer {
    /// Train on the bundled synthetic description/label set
    pub fn train() -> Result<Self> {
        Self::train_on(TRAINING_SET)
    }

    fn train_on(examples: &[(&str, Category)]) -> Result<Self> {
        if examples.is_empty() {
            return Err(Error::Training("empty categorizer training set".into()));
        }

        // Stable class ordering: first appearance in the training data
        let mut classes: Vec<Category> = Vec::new();
        for (_, cat) in examples {
            if !classes.contains(cat) {
                classes.push(*cat);
            }
        }

        let documents: Vec<String> = examples
            .iter()
            .map(|(desc, _)| normalize_description(desc))
            .collect();
        let labels: Vec<usize> = examples
            .iter()
            .map(|(_, cat)| classes.iter().position(|c| c == cat).unwrap())
            .collect();

        let vectorizer = TfidfVectorizer::fit(&documents);
        let rows: Vec<Vec<f64>> = documents.iter().map(|d| vectorizer.transform(d)).collect();
        let model = MultinomialNb::fit(&rows, &labels, classes.len());

        Ok(Self {
            vectorizer,
            model,
            classes,
        })
    }

    /// Predict a category and confidence for a raw description
    pub fn predict(&self, description: &str) -> Result<(Category, f64)> {
        let normalized = normalize_description(description);
        if normalized.is_empty() {
            return Err(Error::InvalidData(
                "description is empty after normalization".into(),
            ));
        }

        let row = self.vectorizer.transform(&normalized);
        let proba = self.model.predict_proba(&row);
        let (best, confidence) = proba
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .ok_or_else(|| Error::Training("no classes in fitted model".into()))?;

        Ok((self.classes[best], *confidence))
    }

    /// Save the fitted model to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer(file, self)?;
        Ok(())
    }

    /// Load a previously saved model
    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Ok(serde_json::from_reader(file)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_strips_punct_and_digits() {
        assert_eq!(
            normalize_description("STARBUCKS #1234, Coffee!"),
            "starbucks num coffee"
        );
        assert_eq!(normalize_description("   "), "");
    }

    #[test]
    fn starbucks_is_food_and_dining() {
        let model = Categorizer::train().unwrap();
        let (category, confidence) = model.predict("starbucks coffee").unwrap();
        assert_eq!(category, Category::FoodDining);
        assert!(confidence > 0.5, "confidence {}", confidence);
    }

    #[test]
    fn prediction_is_deterministic_and_bounded() {
        let model = Categorizer::train().unwrap();
        let (cat_a, conf_a) = model.predict("uber ride to the airport").unwrap();
        let (cat_b, conf_b) = model.predict("uber ride to the airport").unwrap();
        assert_eq!(cat_a, cat_b);
        assert_eq!(conf_a, conf_b);
        assert!((0.0..=1.0).contains(&conf_a));
    }

    #[test]
    fn unseen_tokens_still_produce_a_label() {
        let model = Categorizer::train().unwrap();
        let (category, confidence) = model.predict("zzzzqqq xyzzy").unwrap();
        assert!(model.classes.contains(&category));
        assert!((0.0..=1.0).contains(&confidence));
    }

    #[test]
    fn empty_description_is_an_error() {
        let model = Categorizer::train().unwrap();
        assert!(model.predict("!!!").is_err());
    }

    #[test]
    fn save_load_round_trip() {
        let model = Categorizer::train().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("categorizer.json");

        model.save(&path).unwrap();
        let loaded = Categorizer::load(&path).unwrap();

        assert_eq!(
            model.predict("netflix subscription").unwrap(),
            loaded.predict("netflix subscription").unwrap()
        );
    }
}
