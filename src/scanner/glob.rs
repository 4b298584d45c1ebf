//! Shell-style glob patterns, compiled per path component.
//!
//! Supported syntax, matched one component at a time (never across `/`):
//! - `*`  → any run of characters (`**` behaves the same, there is no recursion)
//! - `?`  → exactly one character
//! - `[abc]`, `[a-z]`, `[!abc]` → character classes; an unclosed `[` is literal
//!
//! Wildcards do not match a leading `.` unless the pattern component itself
//! starts with `.`. Components without wildcards are compared literally.

#![allow(missing_docs)]

use std::ffi::OsString;
use std::fs;
use std::path::{Component, Path, PathBuf};

use regex::Regex;

use crate::core::errors::{DfgError, Result};

/// One `/`-separated piece of a pattern.
#[derive(Debug, Clone)]
enum Segment {
    Literal(String),
    Wild { compiled: Regex, match_hidden: bool },
}

impl Segment {
    fn accepts(&self, name: &str) -> bool {
        match self {
            Self::Literal(literal) => literal == name,
            Self::Wild {
                compiled,
                match_hidden,
            } => (*match_hidden || !name.starts_with('.')) && compiled.is_match(name),
        }
    }
}

/// A compiled glob pattern.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    raw: String,
    absolute: bool,
    dir_only: bool,
    segments: Vec<Segment>,
}

impl GlobPattern {
    /// Compile `pattern`. Fails only if a component cannot be turned into a regex.
    pub fn compile(pattern: &str) -> Result<Self> {
        let segments = pattern
            .split('/')
            .filter(|component| !component.is_empty())
            .map(|component| compile_segment(pattern, component))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            raw: pattern.to_string(),
            absolute: pattern.starts_with('/'),
            dir_only: pattern.len() > 1 && pattern.ends_with('/'),
            segments,
        })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether any component contains wildcard syntax.
    #[must_use]
    pub fn has_wildcards(&self) -> bool {
        self.segments
            .iter()
            .any(|segment| matches!(segment, Segment::Wild { .. }))
    }

    /// Match a path purely syntactically, without touching the filesystem.
    #[must_use]
    pub fn matches(&self, path: &Path) -> bool {
        if path.is_absolute() != self.absolute {
            return false;
        }
        if self.segments.is_empty() {
            return self.absolute && path.parent().is_none();
        }

        let names: Vec<String> = path
            .components()
            .filter_map(|component| match component {
                Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
                Component::CurDir => Some(".".to_string()),
                Component::ParentDir => Some("..".to_string()),
                Component::RootDir | Component::Prefix(_) => None,
            })
            .collect();

        names.len() == self.segments.len()
            && self
                .segments
                .iter()
                .zip(&names)
                .all(|(segment, name)| segment.accepts(name))
    }

    /// Expand against the live filesystem.
    ///
    /// Relative patterns resolve against the working directory. Unreadable
    /// directories contribute no matches. Matches within one directory come
    /// back in lexicographic order.
    #[must_use]
    pub fn expand(&self) -> Vec<PathBuf> {
        if self.segments.is_empty() {
            return if self.absolute {
                vec![PathBuf::from("/")]
            } else {
                Vec::new()
            };
        }

        let root = if self.absolute {
            PathBuf::from("/")
        } else {
            PathBuf::new()
        };
        let mut frontier = vec![root];
        let last = self.segments.len() - 1;

        for (index, segment) in self.segments.iter().enumerate() {
            let descending = index < last;
            let mut next = Vec::new();
            for base in &frontier {
                match segment {
                    Segment::Literal(name) => {
                        let candidate = base.join(name);
                        // Intermediate literals are validated by the next listing.
                        if descending || fs::symlink_metadata(&candidate).is_ok() {
                            next.push(candidate);
                        }
                    }
                    Segment::Wild { .. } => {
                        next.extend(list_matching(base, segment, descending));
                    }
                }
            }
            frontier = next;
        }

        if self.dir_only {
            frontier.retain(|path| path.is_dir());
        }
        frontier
    }
}

/// Check that a pattern compiles.
pub fn validate_glob_pattern(pattern: &str) -> Result<()> {
    GlobPattern::compile(pattern).map(|_| ())
}

fn list_matching(base: &Path, segment: &Segment, dirs_only: bool) -> Vec<PathBuf> {
    let listing_dir = if base.as_os_str().is_empty() {
        Path::new(".")
    } else {
        base
    };
    let Ok(entries) = fs::read_dir(listing_dir) else {
        return Vec::new();
    };

    let mut names: Vec<OsString> = entries
        .flatten()
        .filter(|entry| !dirs_only || entry.path().is_dir())
        .map(|entry| entry.file_name())
        .filter(|name| segment.accepts(&name.to_string_lossy()))
        .collect();
    names.sort();
    names.into_iter().map(|name| base.join(name)).collect()
}

fn has_wildcard(component: &str) -> bool {
    component.contains(['*', '?', '['])
}

fn compile_segment(pattern: &str, component: &str) -> Result<Segment> {
    if !has_wildcard(component) {
        return Ok(Segment::Literal(component.to_string()));
    }

    let compiled =
        Regex::new(&component_to_regex(component)).map_err(|err| DfgError::InvalidGlob {
            pattern: pattern.to_string(),
            details: err.to_string(),
        })?;
    Ok(Segment::Wild {
        compiled,
        match_hidden: component.starts_with('.'),
    })
}

/// Convert one glob component to an anchored regex.
fn component_to_regex(component: &str) -> String {
    let chars: Vec<char> = component.chars().collect();
    let mut regex_str = String::with_capacity(component.len() * 2 + 8);
    regex_str.push_str("(?s)^");

    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => {
                while i + 1 < chars.len() && chars[i + 1] == '*' {
                    i += 1;
                }
                regex_str.push_str(".*");
                i += 1;
            }
            '?' => {
                regex_str.push('.');
                i += 1;
            }
            '[' => match class_end(&chars, i) {
                Some(end) => {
                    push_class(&mut regex_str, &chars[i + 1..end]);
                    i = end + 1;
                }
                None => {
                    regex_str.push_str(r"\[");
                    i += 1;
                }
            },
            c => {
                regex_str.push_str(&regex::escape(c.encode_utf8(&mut [0; 4])));
                i += 1;
            }
        }
    }

    regex_str.push('$');
    regex_str
}

/// Index of the `]` closing the class opened at `open`, if any.
///
/// A `]` directly after `[` or `[!` is a literal member, not the terminator.
fn class_end(chars: &[char], open: usize) -> Option<usize> {
    let mut j = open + 1;
    if chars.get(j) == Some(&'!') {
        j += 1;
    }
    if chars.get(j) == Some(&']') {
        j += 1;
    }
    (j..chars.len()).find(|&k| chars[k] == ']')
}

/// Emit a glob class as explicit regex members.
///
/// `a-z` is a range, a `-` first or last is literal. Reversed ranges are
/// empty; a class left with no members matches nothing (negated: any char).
fn push_class(regex_str: &mut String, body: &[char]) {
    let (negated, members) = match body.split_first() {
        Some(('!', rest)) => (true, rest),
        _ => (false, body),
    };

    let mut class = String::new();
    let mut i = 0;
    while i < members.len() {
        let lo = members[i];
        if members.get(i + 1) == Some(&'-') && i + 2 < members.len() {
            let hi = members[i + 2];
            if lo <= hi {
                push_class_char(&mut class, lo);
                class.push('-');
                push_class_char(&mut class, hi);
            }
            i += 3;
        } else {
            push_class_char(&mut class, lo);
            i += 1;
        }
    }

    match (class.is_empty(), negated) {
        // Contradictory assertions: never matches.
        (true, false) => regex_str.push_str(r"\b\B"),
        (true, true) => regex_str.push('.'),
        (false, negated) => {
            regex_str.push('[');
            if negated {
                regex_str.push('^');
            }
            regex_str.push_str(&class);
            regex_str.push(']');
        }
    }
}

fn push_class_char(class: &mut String, c: char) {
    if matches!(c, '\\' | '[' | ']' | '^' | '&' | '~' | '-') {
        class.push('\\');
    }
    class.push(c);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn star_matches_within_component_only() {
        let glob = GlobPattern::compile("/var/log/*.gz").unwrap();
        assert!(glob.matches(Path::new("/var/log/syslog.1.gz")));
        assert!(!glob.matches(Path::new("/var/log/nginx/access.gz")));
        assert!(!glob.matches(Path::new("/var/log/syslog")));
        assert!(glob.has_wildcards());
    }

    #[test]
    fn double_star_is_not_recursive() {
        let glob = GlobPattern::compile("/data/**/target").unwrap();
        assert!(glob.matches(Path::new("/data/proj/target")));
        assert!(!glob.matches(Path::new("/data/a/b/target")));
        assert!(!glob.matches(Path::new("/data/target")));
    }

    #[test]
    fn question_mark_matches_exactly_one_char() {
        let glob = GlobPattern::compile("/tmp/build-?").unwrap();
        assert!(glob.matches(Path::new("/tmp/build-A")));
        assert!(!glob.matches(Path::new("/tmp/build-AB")));
        assert!(!glob.matches(Path::new("/tmp/build-")));
    }

    #[test]
    fn character_classes_and_negation() {
        let glob = GlobPattern::compile("/opt/backup.[3-5]*").unwrap();
        assert!(glob.matches(Path::new("/opt/backup.3")));
        assert!(glob.matches(Path::new("/opt/backup.5.tar")));
        assert!(!glob.matches(Path::new("/opt/backup.6")));

        let negated = GlobPattern::compile("/opt/log.[!0-9]").unwrap();
        assert!(negated.matches(Path::new("/opt/log.a")));
        assert!(!negated.matches(Path::new("/opt/log.7")));
    }

    #[test]
    fn leading_bracket_is_a_class_member() {
        let glob = GlobPattern::compile("/x/[]a]").unwrap();
        assert!(glob.matches(Path::new("/x/]")));
        assert!(glob.matches(Path::new("/x/a")));
        assert!(!glob.matches(Path::new("/x/b")));
    }

    #[test]
    fn reversed_range_compiles_and_matches_nothing() {
        assert!(validate_glob_pattern("/opt/backup.[z-a]").is_ok());
        let glob = GlobPattern::compile("/opt/backup.[z-a]").unwrap();
        assert!(!glob.matches(Path::new("/opt/backup.m")));
        assert!(!glob.matches(Path::new("/opt/backup.a")));
        assert!(!glob.matches(Path::new("/opt/backup.-")));

        let negated = GlobPattern::compile("/opt/backup.[!z-a]").unwrap();
        assert!(negated.matches(Path::new("/opt/backup.m")));
        assert!(!negated.matches(Path::new("/opt/backup.mm")));
    }

    #[test]
    fn dash_range_and_literal_dash_in_class() {
        let range = GlobPattern::compile("/opt/f[--0]").unwrap();
        assert!(range.matches(Path::new("/opt/f.")));
        assert!(range.matches(Path::new("/opt/f-")));
        assert!(range.matches(Path::new("/opt/f0")));
        assert!(!range.matches(Path::new("/opt/fa")));

        let trailing = GlobPattern::compile("/opt/g[a-]").unwrap();
        assert!(trailing.matches(Path::new("/opt/g-")));
        assert!(trailing.matches(Path::new("/opt/ga")));
        assert!(!trailing.matches(Path::new("/opt/gb")));

        let mixed = GlobPattern::compile("/opt/h[a-c-e]").unwrap();
        assert!(mixed.matches(Path::new("/opt/hb")));
        assert!(mixed.matches(Path::new("/opt/h-")));
        assert!(mixed.matches(Path::new("/opt/he")));
        assert!(!mixed.matches(Path::new("/opt/hd")));
    }

    #[test]
    fn unclosed_bracket_is_literal() {
        let glob = GlobPattern::compile("/x/file[1*").unwrap();
        assert!(glob.matches(Path::new("/x/file[1")));
        assert!(glob.matches(Path::new("/x/file[12")));
        assert!(!glob.matches(Path::new("/x/file1")));
    }

    #[test]
    fn regex_metacharacters_are_literal() {
        let glob = GlobPattern::compile("/x/a+b(1)*.log").unwrap();
        assert!(glob.matches(Path::new("/x/a+b(1).log")));
        assert!(glob.matches(Path::new("/x/a+b(1)-old.log")));
        assert!(!glob.matches(Path::new("/x/aab1.log")));
    }

    #[test]
    fn wildcards_skip_hidden_names_unless_pattern_is_hidden() {
        let glob = GlobPattern::compile("/home/u/*").unwrap();
        assert!(glob.matches(Path::new("/home/u/notes")));
        assert!(!glob.matches(Path::new("/home/u/.cache")));

        let hidden = GlobPattern::compile("/home/u/.*").unwrap();
        assert!(hidden.matches(Path::new("/home/u/.cache")));
    }

    #[test]
    fn absolute_and_relative_never_mix() {
        let glob = GlobPattern::compile("tmp/*").unwrap();
        assert!(glob.matches(Path::new("tmp/a")));
        assert!(!glob.matches(Path::new("/tmp/a")));
    }

    #[test]
    fn empty_pattern_matches_nothing() {
        let glob = GlobPattern::compile("").unwrap();
        assert!(!glob.matches(Path::new("")));
        assert!(glob.expand().is_empty());
    }

    #[test]
    fn expand_lists_sorted_matches() {
        let dir = tempfile::tempdir().unwrap();
        for n in 1..=7 {
            touch(&dir.path().join(format!("backup.{n}")));
        }
        touch(&dir.path().join("run.log"));

        let pattern = format!("{}/backup.[3-5]*", dir.path().display());
        let found = GlobPattern::compile(&pattern).unwrap().expand();
        let names: Vec<String> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["backup.3", "backup.4", "backup.5"]);
    }

    #[test]
    fn expand_literal_requires_existence() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("run.log");
        touch(&present);

        let hit = GlobPattern::compile(&present.to_string_lossy())
            .unwrap()
            .expand();
        assert_eq!(hit, vec![present]);

        let miss = GlobPattern::compile(&dir.path().join("gone.log").to_string_lossy())
            .unwrap()
            .expand();
        assert!(miss.is_empty());
    }

    #[test]
    fn expand_descends_only_through_directories() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a/cache/x.bin"));
        touch(&dir.path().join("b/cache/y.bin"));
        touch(&dir.path().join("c"));
        touch(&dir.path().join(".hidden/cache/z.bin"));

        let pattern = format!("{}/*/cache/*.bin", dir.path().display());
        let found = GlobPattern::compile(&pattern).unwrap().expand();
        assert_eq!(
            found,
            vec![
                dir.path().join("a/cache/x.bin"),
                dir.path().join("b/cache/y.bin"),
            ]
        );
    }

    #[test]
    fn expand_trailing_slash_keeps_directories_only() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("logs/a.log"));
        touch(&dir.path().join("logfile"));

        let pattern = format!("{}/log*/", dir.path().display());
        let found = GlobPattern::compile(&pattern).unwrap().expand();
        assert_eq!(found, vec![dir.path().join("logs")]);
    }

    #[test]
    fn expand_missing_directory_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let pattern = format!("{}/nope/*", dir.path().display());
        assert!(GlobPattern::compile(&pattern).unwrap().expand().is_empty());
    }

    #[test]
    fn validate_accepts_ordinary_patterns() {
        assert!(validate_glob_pattern("/opt/run.log").is_ok());
        assert!(validate_glob_pattern("/opt/backup.[3-5]*").is_ok());
        assert!(validate_glob_pattern("/opt/[&~]").is_ok());
    }
}
