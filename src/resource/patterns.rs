//! Ant-style path patterns used to select candidate inputs.
//!
//! `*` and `?` match within one path segment, `**` matches zero or more segments.
//! A pattern ending in a separator is shorthand for `<pattern>/**`. Both `/` and `\`
//! are accepted as separators. Matching is pure string work; nothing touches disk.

/// One compiled pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchPattern {
    source: String,
    tokens: Vec<String>,
}

impl MatchPattern {
    pub fn new(pattern: &str) -> Self {
        let mut normalized = pattern.replace('\\', "/");
        if normalized.ends_with('/') {
            normalized.push_str("**");
        }
        Self {
            tokens: tokenize(&normalized).map(str::to_string).collect(),
            source: normalized,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whole-path match.
    pub fn matches(&self, name: &str, case_sensitive: bool) -> bool {
        let normalized = name.replace('\\', "/");
        let name_tokens: Vec<&str> = tokenize(&normalized).collect();
        match_tokens(&self.tokens, &name_tokens, case_sensitive)
    }

    /// Whether some path below `name` could still match, used to prune directory descent.
    pub fn matches_start(&self, name: &str, case_sensitive: bool) -> bool {
        let normalized = name.replace('\\', "/");
        let mut name_tokens = tokenize(&normalized);
        for pattern_token in &self.tokens {
            if pattern_token == "**" {
                return true;
            }
            match name_tokens.next() {
                Some(segment) => {
                    if !match_segment(pattern_token, segment, case_sensitive) {
                        return false;
                    }
                }
                None => return true,
            }
        }
        name_tokens.next().is_none()
    }
}

/// A list of patterns; a name matches if any pattern matches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchPatterns {
    patterns: Vec<MatchPattern>,
}

impl MatchPatterns {
    pub fn from<I, S>(sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            patterns: sources
                .into_iter()
                .map(|s| MatchPattern::new(s.as_ref()))
                .collect(),
        }
    }

    pub fn push(&mut self, pattern: &str) {
        self.patterns.push(MatchPattern::new(pattern));
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn matches(&self, name: &str, case_sensitive: bool) -> bool {
        self.patterns.iter().any(|p| p.matches(name, case_sensitive))
    }

    pub fn matches_pattern_start(&self, name: &str, case_sensitive: bool) -> bool {
        self.patterns
            .iter()
            .any(|p| p.matches_start(name, case_sensitive))
    }
}

fn tokenize(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|t| !t.is_empty() && *t != ".")
}

fn match_tokens(pattern: &[String], name: &[&str], case_sensitive: bool) -> bool {
    match pattern.split_first() {
        None => name.is_empty(),
        Some((head, rest)) if head == "**" => {
            (0..=name.len()).any(|skip| match_tokens(rest, &name[skip..], case_sensitive))
        }
        Some((head, rest)) => match name.split_first() {
            Some((segment, name_rest)) => {
                match_segment(head, segment, case_sensitive)
                    && match_tokens(rest, name_rest, case_sensitive)
            }
            None => false,
        },
    }
}

/// Wildcard match of a single segment (`*`, `?`), iterative with one backtrack point.
fn match_segment(pattern: &str, segment: &str, case_sensitive: bool) -> bool {
    let fold = |c: char| {
        if case_sensitive {
            c
        } else {
            c.to_lowercase().next().unwrap_or(c)
        }
    };
    let p: Vec<char> = pattern.chars().map(fold).collect();
    let s: Vec<char> = segment.chars().map(fold).collect();

    let (mut pi, mut si) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;
    while si < s.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == s[si]) {
            pi += 1;
            si += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, si));
            pi += 1;
        } else if let Some((star_pi, star_si)) = star {
            pi = star_pi + 1;
            si = star_si + 1;
            star = Some((star_pi, star_si + 1));
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}
