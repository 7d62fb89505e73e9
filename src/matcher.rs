//! Ignore and target pattern compilation

use regex::RegexBuilder;
use tracing::warn;

/// A compiled ignore/target spec. `%` in a spec means "zero or more of any
/// character"; everything else is literal.
#[derive(Debug, Clone)]
pub enum Matcher {
    /// Spec was a literal process id; matches that id only.
    Pid(u32),
    Name(regex::Regex),
    /// Fallback for a pattern the regex engine rejected.
    Never,
}

impl Matcher {
    /// Whole-name matcher as used by the ignore list: case-insensitive and
    /// anchored, so `chrome` matches `Chrome` but not `Google Chrome Helper`.
    pub fn anchored(spec: &str) -> Self {
        if let Ok(pid) = spec.parse::<u32>() {
            return Matcher::Pid(pid);
        }
        Self::compile(spec, true)
    }

    /// Substring matcher as used by target resolution.
    pub fn substring(spec: &str) -> Self {
        Self::compile(spec, false)
    }

    fn compile(spec: &str, anchor: bool) -> Self {
        let escaped: Vec<String> = spec.split('%').map(regex::escape).collect();
        let body = escaped.join(".*");
        let pattern = if anchor {
            format!("^{}$", body)
        } else {
            body
        };
        match RegexBuilder::new(&pattern).case_insensitive(true).build() {
            Ok(rx) => Matcher::Name(rx),
            Err(e) => {
                warn!("Ignoring unusable pattern {:?}: {}", spec, e);
                Matcher::Never
            }
        }
    }

    pub fn matches(&self, name: &str, pid: u32) -> bool {
        match self {
            Matcher::Pid(p) => *p == pid,
            Matcher::Name(rx) => rx.is_match(name),
            Matcher::Never => false,
        }
    }
}

/// The set of processes exempt from alerts and kills. Configured specs are
/// immutable; "ignore from now on" appends pid entries for this run only.
#[derive(Debug, Default)]
pub struct IgnoreList {
    matchers: Vec<Matcher>,
}

impl IgnoreList {
    pub fn from_specs<S: AsRef<str>>(specs: &[S]) -> Self {
        Self {
            matchers: specs.iter().map(|s| Matcher::anchored(s.as_ref())).collect(),
        }
    }

    pub fn push_pid(&mut self, pid: u32) {
        self.matchers.push(Matcher::Pid(pid));
    }

    pub fn is_ignored(&self, name: &str, pid: u32) -> bool {
        self.matchers.iter().any(|m| m.matches(name, pid))
    }
}
