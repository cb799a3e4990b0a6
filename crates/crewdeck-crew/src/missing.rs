use crate::output::ExecutionOutput;
use regex::Regex;
use serde_json::Value;

/// Flags outputs that look complete but probably lack the requested data.
pub trait MissingDataDetector: Send + Sync {
    /// True when `output` looks incomplete.
    fn is_data_missing(&self, output: &ExecutionOutput) -> bool;
}

const DEFAULT_PATTERNS: &[&str] = &[
    r"(?i)\bno (relevant )?(data|results|information) (was |were )?(found|available)\b",
    r"(?i)\b(data|information) (is )?(not available|unavailable|missing)\b",
    r"(?i)\bi (could not|couldn't|was unable to|am unable to) (find|locate|access|retrieve)\b",
    r"(?i)\binsufficient (data|information)\b",
];

/// Pattern-based detector.
///
/// A success output is considered incomplete when its `result` is absent,
/// null or blank, or when the text matches one of the configured patterns.
/// Error outputs are never "missing data": they already failed.
pub struct HeuristicMissingDataDetector {
    patterns: Vec<Regex>,
}

impl HeuristicMissingDataDetector {
    /// Detector with the built-in patterns.
    pub fn new() -> Self {
        Self {
            // The built-in patterns are static and known to compile.
            patterns: DEFAULT_PATTERNS
                .iter()
                .filter_map(|p| Regex::new(p).ok())
                .collect(),
        }
    }

    /// Detector with custom patterns. Fails on the first pattern that does not compile.
    pub fn with_patterns(patterns: &[&str]) -> Result<Self, regex::Error> {
        let patterns = patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    fn text_is_missing(&self, text: &str) -> bool {
        text.trim().is_empty() || self.patterns.iter().any(|p| p.is_match(text))
    }
}

impl Default for HeuristicMissingDataDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl MissingDataDetector for HeuristicMissingDataDetector {
    fn is_data_missing(&self, output: &ExecutionOutput) -> bool {
        if output.is_error() {
            return false;
        }
        match output.result() {
            None | Some(Value::Null) => true,
            Some(Value::String(text)) => self.text_is_missing(text),
            Some(other) => self.text_is_missing(&other.to_string()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_result() {
        let d = HeuristicMissingDataDetector::new();
        let out = ExecutionOutput::typed("Revenue grew 12% in Q3.", "processed");
        assert!(!d.is_data_missing(&out));
    }

    #[test]
    fn test_blank_and_absent_results() {
        let d = HeuristicMissingDataDetector::new();
        assert!(d.is_data_missing(&ExecutionOutput::typed("  ", "processed")));
        assert!(d.is_data_missing(&ExecutionOutput::Success(Default::default())));
    }

    #[test]
    fn test_phrases() {
        let d = HeuristicMissingDataDetector::new();
        for text in [
            "No data found for the requested period.",
            "The information is not available.",
            "I couldn't find any matching records",
        ] {
            assert!(d.is_data_missing(&ExecutionOutput::typed(text, "processed")), "{text}");
        }
    }

    #[test]
    fn test_errors_are_not_missing_data() {
        let d = HeuristicMissingDataDetector::new();
        assert!(!d.is_data_missing(&ExecutionOutput::error("boom")));
    }

    #[test]
    fn test_custom_patterns() {
        let d = HeuristicMissingDataDetector::with_patterns(&[r"TBD"]).unwrap();
        assert!(d.is_data_missing(&ExecutionOutput::typed("Totals: TBD", "processed")));
        assert!(HeuristicMissingDataDetector::with_patterns(&["("]).is_err());
    }
}
