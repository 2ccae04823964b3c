//! Rule evaluation
//!
//! Decides whether a job template is included in a pipeline and, if so, its
//! when-type. Rules are evaluated in declared order against the pipeline's
//! flat environment; the first matching rule wins.
//!
//! Supported expressions:
//! - `$VAR == "literal"`: exact, case-sensitive equality
//! - `$VAR =~ "regex"`: the regex finds a match anywhere in the value
//! - `$VAR !~ "regex"`: the regex finds no match
//! - `$CI_CHANGED_PATHS ~= "regex"`: older spelling of `=~` for changed paths
//! - `$VAR`: true when the value is non-empty
//!
//! Unknown variables read as the empty string. An invalid regex makes its
//! rule non-matching; it never aborts expansion.

use regex::Regex;
use sluice_core::JobEnv;
use sluice_core::domain::job::WhenType;
use sluice_core::env::CI_CHANGED_PATHS;
use thiserror::Error;
use tracing::warn;

use crate::definition::RuleSpec;

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("invalid regular expression '{pattern}': {source}")]
    InvalidRegex {
        pattern: String,
        source: regex::Error,
    },
}

/// Outcome of evaluating one job template's rules
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleDecision {
    pub when: WhenType,
    pub start_after_seconds: Option<u32>,
    pub allow_failure: bool,
    /// Expression of the rule that decided, if it had one
    pub matched_rule: Option<String>,
}

impl RuleDecision {
    fn unconditional() -> Self {
        Self {
            when: WhenType::OnSuccess,
            start_after_seconds: None,
            allow_failure: false,
            matched_rule: None,
        }
    }

    fn never() -> Self {
        Self {
            when: WhenType::Never,
            ..Self::unconditional()
        }
    }

    /// The job is dropped during expansion
    pub fn is_never(&self) -> bool {
        self.when == WhenType::Never
    }
}

/// Evaluate a rule list against an environment
///
/// An empty list includes the job with `on_success`. Otherwise the first rule
/// whose condition holds (or that has no condition) decides; when none does,
/// the decision is `never`.
pub fn evaluate_rules(rules: &[RuleSpec], env: &JobEnv) -> RuleDecision {
    if rules.is_empty() {
        return RuleDecision::unconditional();
    }

    for rule in rules {
        let matched = match rule.condition.as_deref() {
            None => true,
            Some(condition) => match evaluate_expression(condition, env) {
                Ok(matched) => matched,
                Err(e) => {
                    warn!("Rule '{}' treated as non-matching: {}", condition, e);
                    false
                }
            },
        };

        if matched {
            return RuleDecision {
                when: rule
                    .when
                    .as_deref()
                    .map(WhenType::from_keyword)
                    .unwrap_or_default(),
                start_after_seconds: rule.start_in_seconds,
                allow_failure: rule.allow_failure.unwrap_or(false),
                matched_rule: rule.condition.clone(),
            };
        }
    }

    RuleDecision::never()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Equals,
    Matches,
    NotMatches,
}

impl Operator {
    const ALL: [(Operator, &'static str); 3] = [
        (Operator::Equals, "=="),
        (Operator::Matches, "=~"),
        (Operator::NotMatches, "!~"),
    ];
}

/// Evaluate a single rule expression
pub fn evaluate_expression(expression: &str, env: &JobEnv) -> Result<bool, RuleError> {
    let expression = expression.trim();

    if let Some((at, operator, token)) = find_operator(expression) {
        let left = expression[..at].trim();
        let right = strip_quotes(expression[at + token.len()..].trim());
        let value = env.value(strip_variable(left));

        return match operator {
            Operator::Equals => Ok(value == right),
            Operator::Matches => Ok(compile(right)?.is_match(value)),
            Operator::NotMatches => Ok(!compile(right)?.is_match(value)),
        };
    }

    if let Some(pattern) = legacy_changed_paths_pattern(expression) {
        return Ok(compile(pattern)?.is_match(env.value(CI_CHANGED_PATHS)));
    }

    Ok(!env.value(strip_variable(expression)).is_empty())
}

/// Earliest operator occurrence; an operator at position 0 has no left side and is ignored
fn find_operator(expression: &str) -> Option<(usize, Operator, &'static str)> {
    Operator::ALL
        .iter()
        .filter_map(|&(operator, token)| {
            expression
                .find(token)
                .filter(|&at| at > 0)
                .map(|at| (at, operator, token))
        })
        .min_by_key(|&(at, _, _)| at)
}

/// `$CI_CHANGED_PATHS ~= "pattern"`
fn legacy_changed_paths_pattern(expression: &str) -> Option<&str> {
    let rest = expression.strip_prefix('$')?.strip_prefix(CI_CHANGED_PATHS)?;
    let pattern = rest.trim_start().strip_prefix("~=")?;
    Some(strip_quotes(pattern.trim()))
}

fn strip_variable(reference: &str) -> &str {
    let reference = reference.trim();
    reference.strip_prefix('$').unwrap_or(reference)
}

fn strip_quotes(literal: &str) -> &str {
    for quote in ['"', '\''] {
        if literal.len() >= 2 && literal.starts_with(quote) && literal.ends_with(quote) {
            return &literal[1..literal.len() - 1];
        }
    }
    literal
}

fn compile(pattern: &str) -> Result<Regex, RuleError> {
    Regex::new(pattern).map_err(|source| RuleError::InvalidRegex {
        pattern: pattern.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> JobEnv {
        pairs.iter().copied().collect()
    }

    fn eval(expression: &str, env: &JobEnv) -> bool {
        evaluate_expression(expression, env).unwrap()
    }

    #[test]
    fn test_equality_is_exact() {
        let env = env(&[("CI_PIPELINE_SOURCE", "push")]);
        assert!(eval(r#"$CI_PIPELINE_SOURCE == "push""#, &env));
        assert!(eval("$CI_PIPELINE_SOURCE == 'push'", &env));
        assert!(eval("CI_PIPELINE_SOURCE == push", &env));
        assert!(!eval(r#"$CI_PIPELINE_SOURCE == "Push""#, &env));
        assert!(!eval(r#"$CI_PIPELINE_SOURCE == "pus""#, &env));
    }

    #[test]
    fn test_unknown_variable_is_empty() {
        let env = JobEnv::new();
        assert!(eval(r#"$MISSING == """#, &env));
        assert!(!eval("$MISSING", &env));
        assert!(eval(r#"$MISSING !~ "."#, &env));
    }

    #[test]
    fn test_regex_is_contains_not_anchored() {
        let env = env(&[("CI_COMMIT_BRANCH", "feature/login")]);
        assert!(eval(r#"$CI_COMMIT_BRANCH =~ "login""#, &env));
        assert!(!eval(r#"$CI_COMMIT_BRANCH =~ "^login""#, &env));
        assert!(eval(r#"$CI_COMMIT_BRANCH !~ "^release/""#, &env));
        assert!(!eval(r#"$CI_COMMIT_BRANCH !~ "feature""#, &env));
    }

    #[test]
    fn test_variable_value_is_never_compiled() {
        let env = env(&[("WEIRD", "a(b[")]);
        assert!(eval(r#"$WEIRD == "a(b[""#, &env));
        assert!(eval("$WEIRD", &env));
    }

    #[test]
    fn test_earliest_operator_wins() {
        // `=~` comes first; the `==` inside the pattern is part of the regex
        let env = env(&[("EXPR", "a==b")]);
        assert!(eval(r#"$EXPR =~ "a==b""#, &env));

        let env = self::env(&[("OP", "=~x")]);
        assert!(eval(r#"$OP == "=~x""#, &env));
    }

    #[test]
    fn test_operator_at_start_is_ignored() {
        // Falls through to a truthiness check on the whole text
        let env = JobEnv::new();
        assert!(!eval(r#"== "x""#, &env));
    }

    #[test]
    fn test_truthy_variable() {
        let env = env(&[("DEPLOY", "1"), ("EMPTY", "")]);
        assert!(eval("$DEPLOY", &env));
        assert!(eval("  DEPLOY  ", &env));
        assert!(!eval("$EMPTY", &env));
    }

    #[test]
    fn test_legacy_changed_paths_form() {
        let env = env(&[("CI_CHANGED_PATHS", "docs/readme.md src/main.rs")]);
        assert!(eval(r#"$CI_CHANGED_PATHS ~= "^docs/""#, &env));
        assert!(eval(r#"$CI_CHANGED_PATHS ~= "\.rs$""#, &env));
        assert!(!eval(r#"$CI_CHANGED_PATHS ~= "\.py""#, &env));
    }

    #[test]
    fn test_invalid_regex_is_an_error() {
        let env = env(&[("A", "x")]);
        assert!(matches!(
            evaluate_expression(r#"$A =~ "(unclosed""#, &env),
            Err(RuleError::InvalidRegex { .. })
        ));
    }

    #[test]
    fn test_empty_rules_run_on_success() {
        let decision = evaluate_rules(&[], &JobEnv::new());
        assert_eq!(decision.when, WhenType::OnSuccess);
        assert!(!decision.allow_failure);
        assert_eq!(decision.matched_rule, None);
    }

    #[test]
    fn test_no_matching_rule_is_never() {
        let env = env(&[("CI_PIPELINE_SOURCE", "schedule")]);
        let rules = vec![RuleSpec::when(r#"$CI_PIPELINE_SOURCE == "push""#, "manual")];
        assert!(evaluate_rules(&rules, &env).is_never());
    }

    #[test]
    fn test_first_matching_rule_decides() {
        let env = env(&[("CI_COMMIT_BRANCH", "main")]);
        let rules = vec![
            RuleSpec::when(r#"$CI_COMMIT_BRANCH == "dev""#, "never"),
            RuleSpec {
                condition: Some(r#"$CI_COMMIT_BRANCH == "main""#.to_string()),
                when: Some("Delayed".to_string()),
                start_in_seconds: Some(30),
                allow_failure: Some(true),
            },
            RuleSpec::when("$CI_COMMIT_BRANCH", "manual"),
        ];

        let decision = evaluate_rules(&rules, &env);
        assert_eq!(decision.when, WhenType::Delayed);
        assert_eq!(decision.start_after_seconds, Some(30));
        assert!(decision.allow_failure);
        assert_eq!(
            decision.matched_rule.as_deref(),
            Some(r#"$CI_COMMIT_BRANCH == "main""#)
        );
    }

    #[test]
    fn test_rule_without_condition_always_matches() {
        let rules = vec![RuleSpec {
            when: Some("bogus".to_string()),
            ..Default::default()
        }];
        let decision = evaluate_rules(&rules, &JobEnv::new());
        assert_eq!(decision.when, WhenType::OnSuccess);
        assert_eq!(decision.matched_rule, None);
    }

    #[test]
    fn test_bad_regex_fails_closed_and_later_rules_still_apply() {
        let env = env(&[("A", "x")]);
        let rules = vec![
            RuleSpec::when(r#"$A =~ "[""#, "manual"),
            RuleSpec::when("$A", "on_failure"),
        ];
        assert_eq!(evaluate_rules(&rules, &env).when, WhenType::OnFailure);

        let only_bad = vec![RuleSpec::when(r#"$A !~ "(""#, "manual")];
        assert!(evaluate_rules(&only_bad, &env).is_never());
    }
}
