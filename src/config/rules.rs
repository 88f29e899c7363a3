//! Rules and the rule table.
//!
//! A rule maps a path pattern to dependency globs and an ordered command
//! list. [`RuleTable::matches`] picks the single rule for a source path:
//!
//! ```text
//! 1. exact path          "blog/index.html"
//! 2. exact basename      "index.html"
//! 3. glob on full path   "blog/*.md"
//! 4. glob on basename    "*.md"
//! ```
//!
//! Inside a glob tier the lexicographically smallest pattern wins, which is
//! just the iteration order of the underlying `BTreeMap`.

use super::ConfigError;
use glob::{MatchOptions, Pattern};
use serde::{Serialize, Serializer, ser::SerializeMap};
use std::{collections::BTreeMap, fmt, sync::Arc};

/// `*` and `?` never cross a `/`.
pub const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Compile a glob, mapping the error into a [`ConfigError`].
pub fn compile_glob(pattern: &str) -> Result<Pattern, ConfigError> {
    Pattern::new(pattern).map_err(|e| ConfigError::Glob(pattern.to_owned(), e))
}

/// Last `/`-separated component of a relative path.
pub fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

// ============================================================================
// Command
// ============================================================================

/// One processor invocation: `name arg1 arg2 ...`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Command {
    pub name: String,
    pub args: Vec<String>,
}

impl Command {
    pub fn new(name: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    /// Parse a command line. `:prog args` is shorthand for `external prog args`.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix(':') {
            let args = rest.split_whitespace().map(str::to_owned).collect();
            return Some(Self::new("external", args));
        }

        let mut words = line.split_whitespace();
        let name = words.next()?;
        Some(Self::new(name, words.map(str::to_owned).collect()))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

// ============================================================================
// Rule
// ============================================================================

#[derive(Debug, Clone, Default, Serialize)]
pub struct Rule {
    #[serde(serialize_with = "serialize_patterns")]
    pub deps: Vec<Pattern>,
    pub commands: Vec<Command>,
}

impl Rule {
    /// Does `source` count as one of this rule's build inputs?
    pub fn depends_on(&self, source: &str) -> bool {
        self.deps
            .iter()
            .any(|dep| dep.matches_with(source, MATCH_OPTIONS))
    }

    /// Copy of this rule with `command` run before every other command.
    pub fn with_leading(&self, command: Command) -> Self {
        let mut commands = Vec::with_capacity(self.commands.len() + 1);
        commands.push(command);
        commands.extend(self.commands.iter().cloned());
        Self {
            deps: self.deps.clone(),
            commands,
        }
    }
}

fn serialize_patterns<S: Serializer>(patterns: &[Pattern], s: S) -> Result<S::Ok, S::Error> {
    s.collect_seq(patterns.iter().map(Pattern::as_str))
}

// ============================================================================
// RuleTable
// ============================================================================

#[derive(Debug, Clone)]
struct Entry {
    glob: Pattern,
    rule: Arc<Rule>,
}

/// Immutable once the config is parsed.
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    entries: BTreeMap<String, Entry>,
}

impl RuleTable {
    /// Register `rule` under `pattern`. A pattern may only be declared once.
    pub fn insert(&mut self, pattern: &str, rule: Arc<Rule>) -> Result<(), ConfigError> {
        if self.entries.contains_key(pattern) {
            return Err(ConfigError::DuplicatePattern(pattern.to_owned()));
        }
        let glob = compile_glob(pattern)?;
        self.entries.insert(pattern.to_owned(), Entry { glob, rule });
        Ok(())
    }

    /// Best rule for a relative source path, with the pattern that selected it.
    pub fn matches(&self, path: &str) -> Option<(&str, Arc<Rule>)> {
        let base = basename(path);

        let exact = |key: &str| {
            self.entries
                .get_key_value(key)
                .map(|(pattern, entry)| (pattern.as_str(), Arc::clone(&entry.rule)))
        };
        let glob = |target: &str| {
            self.entries
                .iter()
                .find(|(_, entry)| entry.glob.matches_with(target, MATCH_OPTIONS))
                .map(|(pattern, entry)| (pattern.as_str(), Arc::clone(&entry.rule)))
        };

        exact(path)
            .or_else(|| exact(base))
            .or_else(|| glob(path))
            .or_else(|| glob(base))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<Rule>)> {
        self.entries
            .iter()
            .map(|(pattern, entry)| (pattern.as_str(), &entry.rule))
    }
}

impl Serialize for RuleTable {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        let mut map = s.serialize_map(Some(self.entries.len()))?;
        for (pattern, entry) in &self.entries {
            map.serialize_entry(pattern, entry.rule.as_ref())?;
        }
        map.end()
    }
}

// ============================================================================
// Tests
// ============================================================================
