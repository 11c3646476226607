//! Path-exclusion rules
//!
//! Ignore patterns are regular expressions tested anywhere in a
//! vault-relative path (unanchored search, no precedence). A path matching
//! any rule is excluded from indexing, diffing, uploads, downloads and
//! deletions.
//!
//! ```text
//! pattern  \.git
//! ignored  .git/config, sub/.git/x
//! kept     notes/gitignore.md
//! ```

use regex::Regex;

use super::errors::DomainError;

/// Ordered, compiled set of ignore patterns
#[derive(Debug, Clone, Default)]
pub struct IgnoreRuleSet {
    rules: Vec<Regex>,
}

impl IgnoreRuleSet {
    /// Compile a list of pattern strings
    ///
    /// Blank patterns are skipped.
    ///
    /// # Errors
    /// Returns `DomainError::InvalidPattern` for the first pattern that is
    /// not a valid regular expression
    pub fn compile<S: AsRef<str>>(patterns: &[S]) -> Result<Self, DomainError> {
        let mut rules = Vec::with_capacity(patterns.len());
        for pattern in patterns.iter().map(AsRef::as_ref) {
            if pattern.trim().is_empty() {
                continue;
            }
            rules.push(compile_one(pattern)?);
        }
        Ok(Self { rules })
    }

    /// An empty rule set that ignores nothing
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// True iff any rule matches somewhere in `path`
    #[must_use]
    pub fn is_ignored(&self, path: &str) -> bool {
        self.rules.iter().any(|rule| rule.is_match(path))
    }

    /// Pattern sources, in configuration order
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(Regex::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Check a single pattern without building a rule set
///
/// # Errors
/// Returns `DomainError::InvalidPattern` if `pattern` does not compile
pub fn validate_pattern(pattern: &str) -> Result<(), DomainError> {
    compile_one(pattern).map(|_| ())
}

/// Check every pattern, returning each failure with its index
///
/// Used to reject a configuration before persisting it.
pub fn validate_patterns<S: AsRef<str>>(patterns: &[S]) -> Vec<(usize, DomainError)> {
    patterns
        .iter()
        .enumerate()
        .filter(|(_, p)| !p.as_ref().trim().is_empty())
        .filter_map(|(i, p)| validate_pattern(p.as_ref()).err().map(|e| (i, e)))
        .collect()
}

/// Drop blank patterns, keeping order
#[must_use]
pub fn sanitize_patterns<S: AsRef<str>>(patterns: &[S]) -> Vec<String> {
    patterns
        .iter()
        .map(|p| p.as_ref().to_string())
        .filter(|p| !p.trim().is_empty())
        .collect()
}

fn compile_one(pattern: &str) -> Result<Regex, DomainError> {
    Regex::new(pattern).map_err(|e| DomainError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}
