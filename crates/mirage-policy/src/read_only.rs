//! Read-only gate for the real path.

use mirage_core::RealPathConfig;

/// Admits only statements that open with a read keyword.
#[derive(Debug, Clone)]
pub struct ReadOnlyGate {
    keywords: Vec<String>,
}

impl ReadOnlyGate {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_uppercase())
            .filter(|k| !k.is_empty())
            .collect();
        Self { keywords }
    }

    pub fn from_config(config: &RealPathConfig) -> Self {
        Self::new(&config.read_keywords)
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// True when the statement, after leading whitespace and parentheses,
    /// starts with a read keyword as a whole word.
    pub fn permits(&self, sql: &str) -> bool {
        let statement = sql
            .trim_start_matches(|c: char| c.is_whitespace() || c == '(')
            .to_uppercase();

        self.keywords.iter().any(|keyword| {
            statement.starts_with(keyword.as_str())
                && statement[keyword.len()..]
                    .chars()
                    .next()
                    .is_none_or(|c| !(c.is_alphanumeric() || c == '_'))
        })
    }
}

impl Default for ReadOnlyGate {
    fn default() -> Self {
        Self::from_config(&RealPathConfig::default())
    }
}
