//! Validation reporter

use crate::engine::Violation;
use std::fmt;

/// Path label of a violation at the document root
pub const ROOT_PATH: &str = "root";

/// Successful validation of one document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub rs: String,
    pub description: String,
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Validation successful for {}", self.description)
    }
}

/// Aggregated failure of one document.
///
/// `fallback` is set when pruning discarded every violation and the full
/// list is reported instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    pub rs: String,
    pub description: String,
    pub messages: Vec<String>,
    pub fallback: bool,
}

impl ValidationFailure {
    pub fn from_violations(
        rs: impl Into<String>,
        description: impl Into<String>,
        violations: &[Violation],
        fallback: bool,
    ) -> Self {
        Self {
            rs: rs.into(),
            description: description.into(),
            messages: format_messages(violations),
            fallback,
        }
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Validation failed for {} ({}):", self.rs, self.description)?;
        if self.fallback {
            write!(
                f,
                "\n  note: no violation matched the selected branches; all violations are listed"
            )?;
        }
        for (i, message) in self.messages.iter().enumerate() {
            write!(f, "\n  {}. {message}", i + 1)?;
        }
        Ok(())
    }
}

/// `"<message> (<dotted path>)"` per violation, duplicates dropped, order kept.
pub fn format_messages(violations: &[Violation]) -> Vec<String> {
    let mut messages: Vec<String> = Vec::with_capacity(violations.len());
    for violation in violations {
        let path = if violation.path.is_empty() {
            ROOT_PATH.to_string()
        } else {
            violation.path.join(".")
        };
        let message = format!("{} ({path})", violation.message);
        if !messages.contains(&message) {
            messages.push(message);
        }
    }
    messages
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(fallback: bool) -> ValidationFailure {
        ValidationFailure {
            rs: "RS0001".to_string(),
            description: "chiller".to_string(),
            messages: vec!["a (x)".to_string(), "b (root)".to_string()],
            fallback,
        }
    }

    #[test]
    fn test_failure_display() {
        assert_eq!(
            failure(false).to_string(),
            "Validation failed for RS0001 (chiller):\n  1. a (x)\n  2. b (root)"
        );
    }

    #[test]
    fn test_failure_display_marks_fallback() {
        let text = failure(true).to_string();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[1].contains("note:"));
        assert_eq!(lines[2], "  1. a (x)");
    }

    #[test]
    fn test_report_display() {
        let report = ValidationReport {
            rs: "RS0004".to_string(),
            description: "blower".to_string(),
        };
        assert_eq!(report.to_string(), "Validation successful for blower");
    }
}
