//! Signature classification.

use mirage_core::{ClassifierConfig, Query, Verdict};

/// Known injection idioms: set-operation stacking, tautologies, destructive
/// DDL, blind-injection delays and comment markers.
pub const DEFAULT_SIGNATURES: &[&str] = &["UNION", "OR 1=1", "DROP", "SLEEP", "--", "WAITFOR"];

/// An ordered, upper-cased, de-duplicated set of signatures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureSet {
    signatures: Vec<String>,
}

impl SignatureSet {
    /// Build a set. Blank entries are dropped, the rest upper-cased.
    pub fn new<I, S>(signatures: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set: Vec<String> = Vec::new();
        for signature in signatures {
            let signature = signature.as_ref().trim().to_uppercase();
            if !signature.is_empty() && !set.contains(&signature) {
                set.push(signature);
            }
        }
        Self { signatures: set }
    }

    pub fn defaults() -> Self {
        Self::new(DEFAULT_SIGNATURES)
    }

    /// Built-in or replaced set, plus configured extras.
    pub fn from_config(config: &ClassifierConfig) -> Self {
        let base: Vec<String> = match &config.signatures {
            Some(replacement) => replacement.clone(),
            None => DEFAULT_SIGNATURES.iter().map(|s| s.to_string()).collect(),
        };
        Self::new(base.iter().chain(&config.extra_signatures))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.signatures.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }
}

/// Labels queries benign or malicious.
///
/// Stateless: the verdict is a pure function of the upper-cased text.
#[derive(Debug, Clone)]
pub struct ClassificationPolicy {
    signatures: SignatureSet,
}

impl ClassificationPolicy {
    pub fn new(signatures: SignatureSet) -> Self {
        Self { signatures }
    }

    pub fn from_config(config: &ClassifierConfig) -> Self {
        let signatures = SignatureSet::from_config(config);
        tracing::debug!(
            count = signatures.len(),
            replaced = config.signatures.is_some(),
            "Loaded classifier signature set"
        );
        Self::new(signatures)
    }

    pub fn signatures(&self) -> &SignatureSet {
        &self.signatures
    }

    /// Every matching signature is reported.
    pub fn classify(&self, query: &Query) -> Verdict {
        self.verdict_for(&query.normalized())
    }

    /// Classify raw text, as `classify` would a query with this text.
    pub fn classify_text(&self, text: &str) -> Verdict {
        self.verdict_for(&text.to_uppercase())
    }

    fn verdict_for(&self, upper: &str) -> Verdict {
        let matched: Vec<String> = self
            .signatures
            .iter()
            .filter(|signature| upper.contains(signature))
            .map(String::from)
            .collect();

        if matched.is_empty() {
            Verdict::benign()
        } else {
            Verdict::malicious(matched)
        }
    }
}

impl Default for ClassificationPolicy {
    fn default() -> Self {
        Self::new(SignatureSet::defaults())
    }
}
