//! Path template routing.
//!
//! Templates are made of literal segments, `:name` parameters matching exactly
//! one non-empty segment, and a trailing `*` matching whatever remains (a
//! template of just `*` matches every path). Route markers are recognized on
//! the raw template text; only literal segments are percent-decoded, so `%2C`
//! matches a literal comma in either direction while `%3A` and `%2A` stay
//! literals. Trailing slashes are dropped, so `/a/` and `/a` are the same route.
//!
//! Matching itself is delegated to [`path_tree`]. Every segment is put in a
//! canonical encoded form before it reaches the tree, so decoded text can
//! never be read as tree syntax.

use path_tree::PathTree;
use std::fmt;

/// Name bound to the remainder captured by a catch-all segment.
pub const CATCH_ALL: &str = "*";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    /// Decoded literal text
    Static(String),
    Param(String),
    CatchAll,
}

/// Parsed path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    segments: Vec<Segment>,
}

impl PathTemplate {
    pub fn parse(template: &str) -> Self {
        let parts = raw_segments(template);
        let last = parts.len().saturating_sub(1);
        let segments = parts
            .iter()
            .enumerate()
            .map(|(i, part)| {
                if *part == CATCH_ALL && i == last {
                    Segment::CatchAll
                } else if let Some(name) = part.strip_prefix(':').filter(|n| !n.is_empty()) {
                    Segment::Param(name.to_string())
                } else {
                    Segment::Static(decode_segment(part))
                }
            })
            .collect();
        Self { segments }
    }

    /// Names of the bound segments in path order; a catch-all is named `*`.
    pub fn param_names(&self) -> Vec<String> {
        self.segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::Static(_) => None,
                Segment::Param(name) => Some(name.clone()),
                Segment::CatchAll => Some(CATCH_ALL.to_string()),
            })
            .collect()
    }

    /// Canonical tree path of the template.
    ///
    /// Parameters are named by position, so templates that differ only in
    /// parameter names share a key.
    pub fn key(&self) -> String {
        let mut position = 0;
        let parts: Vec<String> = self
            .segments
            .iter()
            .map(|segment| match segment {
                Segment::Static(s) => urlencoding::encode(s).into_owned(),
                Segment::Param(_) => {
                    position += 1;
                    format!(":p{}", position)
                }
                Segment::CatchAll => CATCH_ALL.to_string(),
            })
            .collect();
        format!("/{}", parts.join("/"))
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.segments {
            match segment {
                Segment::Static(s) => write!(f, "/{}", s)?,
                Segment::Param(name) => write!(f, "/:{}", name)?,
                Segment::CatchAll => f.write_str("/*")?,
            }
        }
        Ok(())
    }
}

/// A successful lookup: the stored value and the decoded bound segments.
#[derive(Debug)]
pub struct PathMatch<'a, T> {
    pub value: &'a T,
    pub params: Vec<String>,
}

/// Path templates compiled into a [`PathTree`].
pub struct PathRouter<T> {
    tree: PathTree<T>,
    len: usize,
}

impl<T> Default for PathRouter<T> {
    fn default() -> Self {
        Self {
            tree: PathTree::new(),
            len: 0,
        }
    }
}

impl<T> fmt::Debug for PathRouter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathRouter").field("len", &self.len).finish_non_exhaustive()
    }
}

impl<T> PathRouter<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Add a template. Callers insert each key once.
    pub fn insert(&mut self, template: &PathTemplate, value: T) {
        let _id = self.tree.insert(&template.key(), value);
        self.len += 1;
    }

    /// Match a concrete path.
    pub fn find(&self, path: &str) -> Option<PathMatch<'_, T>> {
        let key = request_key(path);
        let (value, matched) = self.tree.find(&key)?;
        let params = matched
            .params()
            .into_iter()
            .map(|(_, raw)| decode_segment(raw))
            .collect();
        Some(PathMatch { value, params })
    }
}

/// Split a path into percent-decoded segments, ignoring leading and trailing
/// slashes.
pub fn split_path(path: &str) -> Vec<String> {
    raw_segments(path).into_iter().map(decode_segment).collect()
}

fn raw_segments(path: &str) -> Vec<&str> {
    let trimmed = path.trim_start_matches('/').trim_end_matches('/');
    if trimmed.is_empty() {
        return Vec::new();
    }
    trimmed.split('/').collect()
}

/// Canonical tree path of a concrete request path.
fn request_key(path: &str) -> String {
    let parts: Vec<String> = split_path(path)
        .iter()
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect();
    format!("/{}", parts.join("/"))
}

fn decode_segment(segment: &str) -> String {
    match urlencoding::decode(segment) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => segment.to_string(),
    }
}
