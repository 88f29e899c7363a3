//! Line-oriented parser for the rule DSL.
//!
//! ```text
//! TEMPLATES = templates
//! SOURCE = src
//! OUTPUT = site
//! TITLE = My Blog             # lands in `vars`
//!
//! blog/*.md:
//!     config
//!     ext .html
//!     template post
//!
//! index.html, feed.atom: blog/*.md
//!     :tidy -q                # `external tidy -q`
//! ```

use super::{
    ConfigError, SiteConfig,
    rules::{Command, Rule, RuleTable, compile_glob},
};
use regex::Regex;
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    sync::{Arc, LazyLock},
    time::{Duration, SystemTime},
};

static VAR_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\(([A-Za-z0-9_]+)\)").expect("valid regex"));

const DEFAULT_SOURCE: &str = "src";
const DEFAULT_OUTPUT: &str = "site";
const TEMPLATE_EXT: &str = "tmpl";

/// A rule header whose command block is still being read.
struct OpenRule {
    patterns: Vec<String>,
    rule: Rule,
    body_indent: Option<usize>,
}

#[derive(Default)]
struct Parser {
    /// Every variable as written, used for `$(KEY)` substitution
    vars: BTreeMap<String, String>,
    timeout: Option<Duration>,
    rules: RuleTable,
    open: Option<OpenRule>,
}

/// Parse config text. Relative paths resolve against `base`.
pub fn parse(text: &str, base: &Path) -> Result<SiteConfig, ConfigError> {
    let mut parser = Parser::default();

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = strip_comment(raw);
        let line = line.trim_end();
        if line.trim().is_empty() {
            continue;
        }

        let indent = line.len() - line.trim_start().len();
        if indent == 0 {
            parser.close_rule()?;
            parser.top_level(line, line_no)?;
        } else {
            parser.body_line(line.trim_start(), indent, line_no)?;
        }
    }
    parser.close_rule()?;
    parser.finish(base)
}

impl Parser {
    fn top_level(&mut self, line: &str, line_no: usize) -> Result<(), ConfigError> {
        let eq = line.find('=');
        let colon = line.find(':');

        match (eq, colon) {
            (Some(eq), colon) if colon.is_none_or(|c| eq < c) => self.variable(line, eq, line_no),
            (_, Some(colon)) => self.rule_header(line, colon, line_no),
            _ => Err(ConfigError::syntax(line_no, "unhandled situation")),
        }
    }

    fn variable(&mut self, line: &str, eq: usize, line_no: usize) -> Result<(), ConfigError> {
        let name = line[..eq].trim();
        let valid = !name.is_empty()
            && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return Err(ConfigError::syntax(line_no, "unparseable variable"));
        }

        let value = self.substitute(line[eq + 1..].trim());
        if name == "TIMEOUT" {
            let secs: u64 = value
                .parse()
                .map_err(|_| ConfigError::syntax(line_no, "TIMEOUT must be a number of seconds"))?;
            self.timeout = Some(Duration::from_secs(secs));
        }
        self.vars.insert(name.to_owned(), value);
        Ok(())
    }

    fn rule_header(&mut self, line: &str, colon: usize, line_no: usize) -> Result<(), ConfigError> {
        let patterns: Vec<String> = self
            .substitute(&line[..colon])
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_owned)
            .collect();
        if patterns.is_empty() {
            return Err(ConfigError::syntax(line_no, "rule without a pattern"));
        }

        let deps = self
            .substitute(&line[colon + 1..])
            .split_whitespace()
            .map(compile_glob)
            .collect::<Result<Vec<_>, _>>()?;

        self.open = Some(OpenRule {
            patterns,
            rule: Rule {
                deps,
                commands: Vec::new(),
            },
            body_indent: None,
        });
        Ok(())
    }

    fn body_line(&mut self, line: &str, indent: usize, line_no: usize) -> Result<(), ConfigError> {
        let line = self.substitute(line);
        let Some(open) = self.open.as_mut() else {
            return Err(ConfigError::syntax(line_no, "indentation without an open rule"));
        };

        match open.body_indent {
            None => open.body_indent = Some(indent),
            Some(expected) if expected != indent => {
                return Err(ConfigError::syntax(line_no, "inconsistent indentation"));
            }
            Some(_) => {}
        }

        let command =
            Command::parse(&line).ok_or_else(|| ConfigError::syntax(line_no, "empty command"))?;
        open.rule.commands.push(command);
        Ok(())
    }

    fn close_rule(&mut self) -> Result<(), ConfigError> {
        if let Some(open) = self.open.take() {
            let rule = Arc::new(open.rule);
            for pattern in &open.patterns {
                self.rules.insert(pattern, Arc::clone(&rule))?;
            }
        }
        Ok(())
    }

    /// Replace `$(KEY)` with an earlier variable; unknown keys become "".
    fn substitute(&self, text: &str) -> String {
        VAR_REF
            .replace_all(text, |caps: &regex::Captures<'_>| {
                self.vars.get(&caps[1]).cloned().unwrap_or_default()
            })
            .into_owned()
    }

    fn finish(mut self, base: &Path) -> Result<SiteConfig, ConfigError> {
        let source = resolve(
            base,
            self.vars.remove("SOURCE").as_deref().unwrap_or(DEFAULT_SOURCE),
        );
        let output = resolve(
            base,
            self.vars.remove("OUTPUT").as_deref().unwrap_or(DEFAULT_OUTPUT),
        );
        let templates = match self.vars.remove("TEMPLATES") {
            Some(list) => expand_templates(base, &list)?,
            None => Vec::new(),
        };
        self.vars.remove("TIMEOUT");

        Ok(SiteConfig {
            config_path: PathBuf::new(),
            base: base.to_path_buf(),
            templates,
            source,
            output,
            timeout: self.timeout,
            vars: self.vars,
            rules: self.rules,
            changed_at: SystemTime::UNIX_EPOCH,
        })
    }
}

/// Cut the line at the first unescaped `#`, then unescape `\#`.
fn strip_comment(line: &str) -> String {
    let mut prev = None;
    let cut = line.char_indices().find_map(|(i, c)| {
        let hit = c == '#' && prev != Some('\\');
        prev = Some(c);
        hit.then_some(i)
    });
    let kept = cut.map_or(line, |i| &line[..i]);
    kept.replace("\\#", "#")
}

fn resolve(base: &Path, value: &str) -> PathBuf {
    let expanded = shellexpand::tilde(value);
    base.join(expanded.as_ref())
}

/// Each entry is a template file, or a directory contributing its `*.tmpl` files.
fn expand_templates(base: &Path, list: &str) -> Result<Vec<PathBuf>, ConfigError> {
    let mut templates = Vec::new();
    for entry in list.split_whitespace() {
        let path = resolve(base, entry);
        if path.is_dir() {
            let read = fs::read_dir(&path).map_err(|e| ConfigError::Io(path.clone(), e))?;
            let mut found: Vec<PathBuf> = read
                .filter_map(Result::ok)
                .map(|e| e.path())
                .filter(|p| p.is_file() && p.extension().is_some_and(|e| e == TEMPLATE_EXT))
                .collect();
            found.sort();
            templates.extend(found);
        } else if path.is_file() {
            templates.push(path);
        } else {
            return Err(ConfigError::Template(path));
        }
    }
    Ok(templates)
}

// ============================================================================
// Tests
// ============================================================================
