//! CI variable domain model
//!
//! Repository-scoped key/value pairs injected into job environments.

use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Replacement text for masked values in job output
pub const MASK: &str = "[MASKED]";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CiVariable {
    pub id: Uuid,
    pub repository_id: Uuid,
    pub key: String,
    pub value: String,
    /// Value must never appear verbatim in job logs
    pub masked: bool,
    /// Only injected when the pipeline's ref is protected
    pub protected: bool,
    /// Glob restricting which refs receive the variable
    pub scope: Option<String>,
}

impl CiVariable {
    /// Whether this variable is injected into a pipeline running on `ref_name`
    pub fn applies_to(&self, ref_name: &str, ref_is_protected: bool) -> bool {
        if self.protected && !ref_is_protected {
            return false;
        }
        match self.scope.as_deref().map(str::trim) {
            None | Some("") | Some("*") => true,
            Some(pattern) => glob_matches(pattern, ref_name),
        }
    }

    /// Copy with the value hidden when masked, for listings
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.masked {
            copy.value = MASK.to_string();
        }
        copy
    }
}

/// Match a ref against a glob where `*` spans any run of characters and `?` one
pub fn glob_matches(pattern: &str, candidate: &str) -> bool {
    let mut translated = String::with_capacity(pattern.len() + 8);
    translated.push('^');
    for ch in pattern.chars() {
        match ch {
            '*' => translated.push_str(".*"),
            '?' => translated.push('.'),
            other => translated.push_str(&regex::escape(&other.to_string())),
        }
    }
    translated.push('$');

    Regex::new(&translated)
        .map(|re| re.is_match(candidate))
        .unwrap_or(false)
}

/// Replace every occurrence of each secret with [`MASK`]
///
/// Longer secrets are replaced first so a secret containing another is
/// hidden in full. Empty secrets are ignored.
pub fn mask_secrets(text: &str, secrets: &[String]) -> String {
    let mut ordered: Vec<&str> = secrets
        .iter()
        .map(String::as_str)
        .filter(|secret| !secret.is_empty())
        .collect();
    ordered.sort_by_key(|secret| std::cmp::Reverse(secret.len()));

    let mut masked = text.to_string();
    for secret in ordered {
        if masked.contains(secret) {
            masked = masked.replace(secret, MASK);
        }
    }
    masked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variable(protected: bool, scope: Option<&str>) -> CiVariable {
        CiVariable {
            id: Uuid::new_v4(),
            repository_id: Uuid::new_v4(),
            key: "DEPLOY_TOKEN".to_string(),
            value: "s3cr3t".to_string(),
            masked: true,
            protected,
            scope: scope.map(String::from),
        }
    }

    #[test]
    fn test_protected_variable_needs_protected_ref() {
        let var = variable(true, None);
        assert!(!var.applies_to("feature/x", false));
        assert!(var.applies_to("main", true));
    }

    #[test]
    fn test_scope_glob() {
        let var = variable(false, Some("release/*"));
        assert!(var.applies_to("release/1.2", false));
        assert!(!var.applies_to("main", false));
        assert!(variable(false, Some("*")).applies_to("anything", false));
    }

    #[test]
    fn test_glob_escapes_regex_metacharacters() {
        assert!(glob_matches("v1.?", "v1.2"));
        assert!(!glob_matches("v1.2", "v1x2"));
        assert!(glob_matches("main", "main"));
        assert!(!glob_matches("main", "main2"));
    }

    #[test]
    fn test_mask_secrets() {
        let secrets = vec!["s3cr3t".to_string(), String::new(), "s3cr3t-long".to_string()];
        assert_eq!(
            mask_secrets("token=s3cr3t-long and s3cr3t", &secrets),
            "token=[MASKED] and [MASKED]"
        );
        assert_eq!(mask_secrets("nothing here", &secrets), "nothing here");
    }

    #[test]
    fn test_redacted_hides_only_masked_values() {
        assert_eq!(variable(false, None).redacted().value, MASK);

        let mut plain = variable(false, None);
        plain.masked = false;
        assert_eq!(plain.redacted().value, "s3cr3t");
    }
}
