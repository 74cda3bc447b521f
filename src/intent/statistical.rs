//! Statistical intent backend: TF-IDF vectorizer + linear classifier.
//!
//! The trained pipeline ships as one JSON artifact exported from the training
//! notebook. It is loaded once at startup; a missing or inconsistent artifact
//! makes the backend unusable for the process lifetime.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::ClassifierError;
use crate::intent::labels::{ClassifierBackendKind, IntentLabel};
use crate::intent::text::{ngrams, tokenize};
use crate::intent::IntentBackend;

const BACKEND: &str = "statistical";

/// Opaque inference object: raw text in, native class name out.
pub trait InferencePipeline: Send + Sync {
    fn predict(&self, text: &str) -> Result<String, ClassifierError>;
}

// ── Artifact ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct PipelineArtifact {
    vectorizer: TfidfVectorizer,
    classifier: LinearClassifier,
}

#[derive(Debug, Clone, Deserialize)]
struct TfidfVectorizer {
    vocabulary: HashMap<String, usize>,
    idf: Vec<f32>,
    #[serde(default = "default_ngram_range")]
    ngram_range: (usize, usize),
    #[serde(default = "default_lowercase")]
    lowercase: bool,
    #[serde(default)]
    sublinear_tf: bool,
}

fn default_ngram_range() -> (usize, usize) {
    (1, 1)
}

fn default_lowercase() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
struct LinearClassifier {
    classes: Vec<String>,
    coef: Vec<Vec<f32>>,
    intercept: Vec<f32>,
}

impl TfidfVectorizer {
    /// Sparse, L2-normalized TF-IDF features.
    fn transform(&self, text: &str) -> Vec<(usize, f32)> {
        let tokens = tokenize(text, self.lowercase);
        let (min_n, max_n) = self.ngram_range;

        let mut counts: HashMap<usize, f32> = HashMap::new();
        for gram in ngrams(&tokens, min_n, max_n) {
            if let Some(&idx) = self.vocabulary.get(&gram) {
                *counts.entry(idx).or_insert(0.0) += 1.0;
            }
        }

        let mut features: Vec<(usize, f32)> = counts
            .into_iter()
            .map(|(idx, count)| {
                let tf = if self.sublinear_tf {
                    1.0 + count.ln()
                } else {
                    count
                };
                (idx, tf * self.idf[idx])
            })
            .collect();

        let norm = features.iter().map(|(_, v)| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for (_, v) in &mut features {
                *v /= norm;
            }
        }
        features.sort_by_key(|(idx, _)| *idx);
        features
    }
}

impl LinearClassifier {
    fn decision(&self, features: &[(usize, f32)]) -> Vec<f32> {
        self.coef
            .iter()
            .zip(&self.intercept)
            .map(|(row, bias)| bias + features.iter().map(|(i, v)| row[*i] * v).sum::<f32>())
            .collect()
    }

    /// Binary models store a single row: positive score picks the second class.
    fn is_binary(&self) -> bool {
        self.classes.len() == 2 && self.coef.len() == 1
    }
}

// ── Pipeline ────────────────────────────────────────────────────────

/// The bundled TF-IDF + linear model.
#[derive(Debug, Clone)]
pub struct LinearTextPipeline {
    vectorizer: TfidfVectorizer,
    classifier: LinearClassifier,
}

impl LinearTextPipeline {
    /// Load and validate an artifact from disk.
    pub fn load(path: &Path) -> Result<Self, ClassifierError> {
        let shown = path.display().to_string();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ClassifierError::model_load(BACKEND, shown.as_str(), e))?;
        let pipeline = Self::from_json(&raw)
            .map_err(|reason| ClassifierError::model_load(BACKEND, shown.as_str(), reason))?;
        info!(
            path = %shown,
            classes = pipeline.classifier.classes.len(),
            features = pipeline.vectorizer.idf.len(),
            "Loaded statistical intent pipeline"
        );
        Ok(pipeline)
    }

    /// Parse an artifact from its JSON text.
    pub fn from_json(raw: &str) -> Result<Self, String> {
        let artifact: PipelineArtifact =
            serde_json::from_str(raw).map_err(|e| format!("JSON parse error: {e}"))?;
        let pipeline = Self {
            vectorizer: artifact.vectorizer,
            classifier: artifact.classifier,
        };
        pipeline.validate()?;
        Ok(pipeline)
    }

    fn validate(&self) -> Result<(), String> {
        let v = &self.vectorizer;
        let c = &self.classifier;
        let width = v.idf.len();

        if c.classes.is_empty() {
            return Err("classifier has no classes".into());
        }
        if v.ngram_range.0 == 0 || v.ngram_range.0 > v.ngram_range.1 {
            return Err(format!("invalid ngram_range {:?}", v.ngram_range));
        }
        if let Some((token, idx)) = v.vocabulary.iter().find(|(_, idx)| **idx >= width) {
            return Err(format!(
                "vocabulary entry '{token}' -> {idx} is outside the {width} idf weights"
            ));
        }
        if c.coef.len() != c.classes.len() && !c.is_binary() {
            return Err(format!(
                "{} coefficient rows for {} classes",
                c.coef.len(),
                c.classes.len()
            ));
        }
        if c.intercept.len() != c.coef.len() {
            return Err(format!(
                "{} intercepts for {} coefficient rows",
                c.intercept.len(),
                c.coef.len()
            ));
        }
        if let Some(row) = c.coef.iter().find(|row| row.len() != width) {
            return Err(format!(
                "coefficient row has {} weights, expected {width}",
                row.len()
            ));
        }
        Ok(())
    }

    pub fn classes(&self) -> &[String] {
        &self.classifier.classes
    }
}

impl InferencePipeline for LinearTextPipeline {
    fn predict(&self, text: &str) -> Result<String, ClassifierError> {
        let features = self.vectorizer.transform(text);
        let scores = self.classifier.decision(&features);

        if scores.iter().any(|s| !s.is_finite()) {
            return Err(ClassifierError::inference(
                BACKEND,
                "decision function produced a non-finite score",
            ));
        }

        let classes = &self.classifier.classes;
        let label = if self.classifier.is_binary() {
            if scores[0] > 0.0 { &classes[1] } else { &classes[0] }
        } else {
            let best = scores
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.total_cmp(b.1))
                .map(|(i, _)| i)
                .ok_or_else(|| ClassifierError::inference(BACKEND, "no classes scored"))?;
            &classes[best]
        };

        debug!(features = features.len(), label = %label, "Statistical prediction");
        Ok(label.clone())
    }
}

// ── Backend ─────────────────────────────────────────────────────────

/// Intent backend over any `InferencePipeline`.
pub struct StatisticalBackend {
    pipeline: Arc<dyn InferencePipeline>,
}

impl StatisticalBackend {
    pub fn new(pipeline: Arc<dyn InferencePipeline>) -> Self {
        Self { pipeline }
    }

    /// Load the bundled pipeline artifact.
    pub fn load(path: &Path) -> Result<Self, ClassifierError> {
        Ok(Self::new(Arc::new(LinearTextPipeline::load(path)?)))
    }
}

impl IntentBackend for StatisticalBackend {
    fn kind(&self) -> ClassifierBackendKind {
        ClassifierBackendKind::Statistical
    }

    fn classify(&self, text: &str) -> Result<IntentLabel, ClassifierError> {
        let native = self.pipeline.predict(text)?;
        Ok(IntentLabel::from_native(&native))
    }
}
