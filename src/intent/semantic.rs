//! Semantic intent backend over a sequence-classification model.
//!
//! The model yields one raw score per label; the adapter turns those into a
//! softmax confidence and refuses to answer below the configured threshold,
//! so a weak guess never triggers a capability.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::ClassifierError;
use crate::intent::labels::{ClassifierBackendKind, IntentLabel};
use crate::intent::text::tokenize;
use crate::intent::IntentBackend;

const BACKEND: &str = "semantic";

/// A pre-trained sequence classifier, inference only.
pub trait SequenceClassifier: Send + Sync {
    /// Native label names, in score order.
    fn labels(&self) -> &[String];

    /// One raw (pre-softmax) score per label.
    fn scores(&self, text: &str) -> Result<Vec<f32>, ClassifierError>;
}

/// Top label of a semantic prediction.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub label: IntentLabel,
    pub native_label: String,
    /// Softmax probability of the top label, in [0, 1].
    pub confidence: f32,
}

impl Prediction {
    pub fn is_confident(&self, threshold: f32) -> bool {
        self.confidence >= threshold
    }
}

fn softmax(scores: &[f32]) -> Vec<f32> {
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = scores.iter().map(|s| (s - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

// ── Backend ─────────────────────────────────────────────────────────

pub struct SemanticBackend {
    model: Arc<dyn SequenceClassifier>,
    threshold: f32,
}

impl SemanticBackend {
    pub fn new(model: Arc<dyn SequenceClassifier>, threshold: f32) -> Self {
        Self { model, threshold }
    }

    /// Load the bundled prototype model artifact.
    pub fn load(path: &Path, threshold: f32) -> Result<Self, ClassifierError> {
        Ok(Self::new(Arc::new(PrototypeModel::load(path)?), threshold))
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Top label and its confidence, before the threshold is applied.
    pub fn predict(&self, text: &str) -> Result<Prediction, ClassifierError> {
        let labels = self.model.labels();
        let scores = self.model.scores(text)?;
        if scores.len() != labels.len() || scores.is_empty() {
            return Err(ClassifierError::inference(
                BACKEND,
                format!("{} scores for {} labels", scores.len(), labels.len()),
            ));
        }
        if scores.iter().any(|s| !s.is_finite()) {
            return Err(ClassifierError::inference(BACKEND, "non-finite score"));
        }

        let probs = softmax(&scores);
        let (best, confidence) = probs
            .iter()
            .copied()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .ok_or_else(|| ClassifierError::inference(BACKEND, "no labels scored"))?;

        let native_label = labels[best].clone();
        Ok(Prediction {
            label: IntentLabel::from_native(&native_label),
            native_label,
            confidence,
        })
    }
}

impl IntentBackend for SemanticBackend {
    fn kind(&self) -> ClassifierBackendKind {
        ClassifierBackendKind::Semantic
    }

    fn classify(&self, text: &str) -> Result<IntentLabel, ClassifierError> {
        let prediction = self.predict(text)?;
        if !prediction.is_confident(self.threshold) {
            debug!(
                label = %prediction.native_label,
                confidence = prediction.confidence,
                threshold = self.threshold,
                "Semantic prediction below threshold"
            );
            return Ok(IntentLabel::Unknown);
        }
        Ok(prediction.label)
    }
}

// ── Prototype model ─────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct PrototypeArtifact {
    labels: Vec<String>,
    dim: usize,
    embeddings: HashMap<String, Vec<f32>>,
    prototypes: Vec<Vec<f32>>,
    #[serde(default = "default_temperature")]
    temperature: f32,
    #[serde(default = "default_lowercase")]
    lowercase: bool,
}

fn default_temperature() -> f32 {
    0.1
}

fn default_lowercase() -> bool {
    true
}

/// Mean-pooled token embeddings scored by cosine similarity against one
/// prototype vector per label.
#[derive(Debug, Clone)]
pub struct PrototypeModel {
    labels: Vec<String>,
    dim: usize,
    embeddings: HashMap<String, Vec<f32>>,
    prototypes: Vec<Vec<f32>>,
    temperature: f32,
    lowercase: bool,
}

impl PrototypeModel {
    pub fn load(path: &Path) -> Result<Self, ClassifierError> {
        let shown = path.display().to_string();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ClassifierError::model_load(BACKEND, shown.as_str(), e))?;
        let model = Self::from_json(&raw)
            .map_err(|reason| ClassifierError::model_load(BACKEND, shown.as_str(), reason))?;
        info!(
            path = %shown,
            labels = model.labels.len(),
            vocabulary = model.embeddings.len(),
            "Loaded semantic intent model"
        );
        Ok(model)
    }

    pub fn from_json(raw: &str) -> Result<Self, String> {
        let a: PrototypeArtifact =
            serde_json::from_str(raw).map_err(|e| format!("JSON parse error: {e}"))?;

        if a.labels.is_empty() {
            return Err("model has no labels".into());
        }
        if a.dim == 0 {
            return Err("embedding dimension must be positive".into());
        }
        if a.prototypes.len() != a.labels.len() {
            return Err(format!(
                "{} prototypes for {} labels",
                a.prototypes.len(),
                a.labels.len()
            ));
        }
        if !(a.temperature > 0.0) {
            return Err(format!("temperature must be positive, got {}", a.temperature));
        }
        if let Some(p) = a.prototypes.iter().find(|p| p.len() != a.dim) {
            return Err(format!("prototype has {} dims, expected {}", p.len(), a.dim));
        }
        if let Some((token, v)) = a.embeddings.iter().find(|(_, v)| v.len() != a.dim) {
            return Err(format!(
                "embedding for '{token}' has {} dims, expected {}",
                v.len(),
                a.dim
            ));
        }

        Ok(Self {
            labels: a.labels,
            dim: a.dim,
            embeddings: a.embeddings,
            prototypes: a.prototypes,
            temperature: a.temperature,
            lowercase: a.lowercase,
        })
    }

    fn encode(&self, text: &str) -> Option<Vec<f32>> {
        let mut pooled = vec![0.0_f32; self.dim];
        let mut hits = 0_usize;
        for token in tokenize(text, self.lowercase) {
            if let Some(v) = self.embeddings.get(&token) {
                for (acc, x) in pooled.iter_mut().zip(v) {
                    *acc += x;
                }
                hits += 1;
            }
        }
        if hits == 0 {
            return None;
        }
        for acc in &mut pooled {
            *acc /= hits as f32;
        }
        Some(pooled)
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

impl SequenceClassifier for PrototypeModel {
    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn scores(&self, text: &str) -> Result<Vec<f32>, ClassifierError> {
        let embedding = self
            .encode(text)
            .ok_or_else(|| ClassifierError::inference(BACKEND, "no in-vocabulary tokens"))?;
        Ok(self
            .prototypes
            .iter()
            .map(|p| cosine(&embedding, p) / self.temperature)
            .collect())
    }
}
