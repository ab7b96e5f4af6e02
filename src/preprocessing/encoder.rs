//! Categorical label encoding

use serde::{Deserialize, Serialize};

/// Label encoder for one categorical column.
///
/// Codes follow the alphabetical order of the distinct values seen at fit
/// time. Values unseen at fit time (and missing cells) map to the reserved
/// unknown code — one past the last learned category — rather than failing,
/// so a prediction-time request never aborts on a new label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryEncoder {
    categories: Vec<String>,
}

impl CategoryEncoder {
    pub fn fit(values: &[Option<String>]) -> Self {
        let mut categories: Vec<String> = values.iter().flatten().cloned().collect();
        categories.sort_unstable();
        categories.dedup();
        Self { categories }
    }

    /// Code reserved for unseen or missing values.
    pub fn unknown_code(&self) -> f64 {
        self.categories.len() as f64
    }

    pub fn encode_one(&self, value: Option<&str>) -> f64 {
        match value {
            Some(v) => self
                .categories
                .binary_search_by(|c| c.as_str().cmp(v))
                .map(|i| i as f64)
                .unwrap_or_else(|_| self.unknown_code()),
            None => self.unknown_code(),
        }
    }

    pub fn encode(&self, values: &[Option<String>]) -> Vec<f64> {
        values
            .iter()
            .map(|v| self.encode_one(v.as_deref()))
            .collect()
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(values: &[&str]) -> Vec<Option<String>> {
        values.iter().map(|s| Some(s.to_string())).collect()
    }

    #[test]
    fn test_alphabetical_codes() {
        let encoder = CategoryEncoder::fit(&opts(&["remote", "hybrid", "onsite", "remote"]));
        assert_eq!(encoder.categories(), &["hybrid", "onsite", "remote"]);
        assert_eq!(encoder.encode_one(Some("hybrid")), 0.0);
        assert_eq!(encoder.encode_one(Some("onsite")), 1.0);
        assert_eq!(encoder.encode_one(Some("remote")), 2.0);
    }

    #[test]
    fn test_unseen_maps_to_unknown_code() {
        let encoder = CategoryEncoder::fit(&opts(&["a", "b"]));
        assert_eq!(encoder.encode_one(Some("z")), 2.0);
        assert_eq!(encoder.encode_one(None), 2.0);
    }
}
