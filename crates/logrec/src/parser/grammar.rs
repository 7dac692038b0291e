use std::collections::HashSet;

use regex::Regex;

use super::model::{GrammarError, RuleKind, Token, TokenStructure};

/// A named, immutable recognizer for one category of physical line.
///
/// Named capture groups become tokens. Groups listed as integer tokens are
/// cast to [`Token::Integer`]; a cast failure means the rule does not match.
#[derive(Debug, Clone)]
pub struct GrammarRule {
    name: &'static str,
    kind: RuleKind,
    pattern: Regex,
    integer_tokens: &'static [&'static str],
}

impl GrammarRule {
    pub fn new(name: &'static str, kind: RuleKind, pattern: &str) -> Result<Self, GrammarError> {
        let pattern = Regex::new(pattern).map_err(|source| GrammarError::InvalidPattern {
            rule: name.to_string(),
            source,
        })?;

        Ok(Self {
            name,
            kind,
            pattern,
            integer_tokens: &[],
        })
    }

    pub fn with_integers(mut self, names: &'static [&'static str]) -> Self {
        self.integer_tokens = names;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> RuleKind {
        self.kind
    }

    /// Match one line, returning its tokens.
    pub fn recognize(&self, line: &str) -> Option<TokenStructure> {
        let captures = self.pattern.captures(line)?;
        let mut tokens = TokenStructure::new();

        for name in self.pattern.capture_names().flatten() {
            let Some(value) = captures.name(name) else {
                continue;
            };

            if self.integer_tokens.iter().any(|n| *n == name) {
                let parsed: i64 = value.as_str().parse().ok()?;
                tokens.push(name, Token::Integer(parsed));
            } else {
                tokens.push(name, Token::Text(value.as_str().to_string()));
            }
        }

        Some(tokens)
    }
}

/// The rule that matched a line plus the tokens it extracted.
#[derive(Debug, Clone)]
pub struct RuleMatch<'r> {
    pub rule: &'r GrammarRule,
    pub tokens: TokenStructure,
}

/// Named, priority-ordered set of rules for one log format.
#[derive(Debug, Clone)]
pub struct RuleSet {
    name: &'static str,
    rules: Vec<GrammarRule>,
    ignore_blank_lines: bool,
}

impl RuleSet {
    /// Build a rule set. Rules are tried in the order given.
    pub fn new(name: &'static str, rules: Vec<GrammarRule>) -> Result<Self, GrammarError> {
        let mut seen = HashSet::new();
        for rule in &rules {
            if !seen.insert(rule.name) {
                return Err(GrammarError::DuplicateRule {
                    set: name.to_string(),
                    rule: rule.name.to_string(),
                });
            }
        }

        if !rules.iter().any(|r| r.kind == RuleKind::Start) {
            return Err(GrammarError::MissingStartRule(name.to_string()));
        }

        Ok(Self {
            name,
            rules,
            ignore_blank_lines: false,
        })
    }

    /// Skip whitespace-only lines silently instead of reporting them.
    pub fn ignoring_blank_lines(mut self) -> Self {
        self.ignore_blank_lines = true;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn ignores_blank_lines(&self) -> bool {
        self.ignore_blank_lines
    }

    pub fn rules(&self) -> &[GrammarRule] {
        &self.rules
    }

    /// First rule, in priority order, that recognizes `line`.
    pub fn classify(&self, line: &str) -> Option<RuleMatch<'_>> {
        self.rules.iter().find_map(|rule| {
            rule.recognize(line).map(|tokens| RuleMatch { rule, tokens })
        })
    }

    /// Like [`classify`](Self::classify), restricted to rules of one kind.
    pub fn classify_kind(&self, line: &str, kind: RuleKind) -> Option<RuleMatch<'_>> {
        self.rules
            .iter()
            .filter(|rule| rule.kind == kind)
            .find_map(|rule| rule.recognize(line).map(|tokens| RuleMatch { rule, tokens }))
    }
}
