//! Radix tree implementation for HTTP route matching
//!
//! This module provides a radix tree (also called compact prefix tree) that
//! resolves a request path in O(k) where k is the path length, independent of
//! the number of registered routes.
//!
//! ## Node layout
//!
//! Every node stores a `path` segment. Concatenating the segments from the root
//! down to a node yields the route prefix that node represents:
//!
//! ```text
//! Priority   Path             Value
//! 9          /                -
//! 3          ├s               -
//! 2          |├earch/         *<2>
//! 1          ||└:query        *<3>
//! 1          |└rc/            -
//! 1          | └*filepath     *<4>
//! 2          ├blog/           *<5>
//! 1          |└:post          -
//! 1          |  └/            *<6>
//! ...
//! ```
//!
//! - **Static** nodes match their segment byte-for-byte. Sibling static
//!   children never share a first character; `indices` holds those first
//!   characters in the same order as the children so branch selection is a
//!   short linear probe.
//! - **Param** nodes (`:name`) match one path element, i.e. everything up to
//!   the next `/`.
//! - **CatchAll** nodes (`*name`) match the rest of the path, slashes
//!   included. They hang off a static node ending in `/` and have no children.
//!
//! At most one wildcard child exists per fork and it is always the last child,
//! so static children are probed first. When a static branch dead-ends the
//! lookup backtracks into the wildcard, which is how `/user/list` and
//! `/user/:name` can live side by side.
//!
//! Children are kept sorted by `priority` (the number of routes in their
//! subtree) so that crowded branches are probed first. Ordering never changes
//! which route a path resolves to.

use std::sync::Arc;

use super::error::RouteError;
use super::params::Params;

/// Node kinds in the radix tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// The tree root
    Root,
    /// Literal segment
    Static,
    /// `:name`, one path element
    Param,
    /// `*name`, the remainder of the path
    CatchAll,
}

/// Result of a tree lookup
///
/// `value` is set on a match, in which case `params` holds one entry per
/// wildcard traversed. On a miss `tsr` (trailing slash redirect) reports
/// whether the same path with one trailing slash added or removed would have
/// matched.
#[derive(Debug)]
pub struct Lookup<'a, T> {
    pub value: Option<&'a T>,
    pub params: Params,
    pub tsr: bool,
}

impl<T> Lookup<'_, T> {
    pub(crate) fn miss(tsr: bool) -> Self {
        Self {
            value: None,
            params: Params::new(),
            tsr,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_match(&self) -> bool {
        self.value.is_some()
    }
}

/// Node in the radix tree
///
/// Each node owns its children by value; nothing points back up the tree.
#[derive(Debug, Clone)]
pub struct Node<T> {
    /// Segment represented by this node (`:name`/`*name` for wildcards)
    path: String,
    kind: NodeKind,
    /// Bound name for wildcard nodes, shared with every `Param` produced
    param_name: Option<Arc<str>>,
    /// Whether the last child is a wildcard
    wild_child: bool,
    /// First characters of the static children, parallel to `children`
    indices: Vec<char>,
    children: Vec<Node<T>>,
    /// Number of routes registered in this subtree
    priority: u32,
    value: Option<T>,
    /// Registration pattern that created (or last claimed) this node
    full_path: String,
}

impl<T> Default for Node<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Node<T> {
    /// Create an empty tree root
    #[must_use]
    pub fn new() -> Self {
        Self::with_kind(NodeKind::Root, String::new())
    }

    fn with_kind(kind: NodeKind, full_path: String) -> Self {
        Self {
            path: String::new(),
            kind,
            param_name: None,
            wild_child: false,
            indices: Vec::new(),
            children: Vec::new(),
            priority: 0,
            value: None,
            full_path,
        }
    }

    fn wildcard(kind: NodeKind, wildcard: &str, full_path: &str) -> Self {
        let mut node = Self::with_kind(kind, full_path.to_string());
        node.path = wildcard.to_string();
        node.param_name = Some(Arc::from(&wildcard[1..]));
        node.priority = 1;
        node
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Number of routes stored below (and at) this node
    #[inline]
    #[must_use]
    pub fn priority(&self) -> u32 {
        self.priority
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.priority == 0
    }

    /// Register `value` under the route `path`.
    ///
    /// The tree is left untouched when a conflict is reported, apart from
    /// edge splits, which never change what a lookup resolves to.
    ///
    /// # Errors
    ///
    /// Returns a [`RouteError`] for malformed patterns, wildcard conflicts and
    /// duplicate registrations.
    pub fn insert(&mut self, path: &str, value: T) -> Result<(), RouteError> {
        validate_pattern(path)?;

        // Empty tree
        if self.path.is_empty() && self.children.is_empty() {
            self.insert_child(path, path, value);
            self.kind = NodeKind::Root;
            return Ok(());
        }

        self.add_route(path, path, 0, value)
    }

    /// Walk down from this node, splitting edges as needed, until the place
    /// for `path` is found. `depth` is the offset of `self.path` within
    /// `full_path`.
    fn add_route(
        &mut self,
        path: &str,
        full_path: &str,
        depth: usize,
        value: T,
    ) -> Result<(), RouteError> {
        // The existing segment never contains ':' or '*', so neither does
        // the common prefix.
        let i = longest_common_prefix(path, &self.path);

        // Split edge
        if i < self.path.len() {
            let mut child = Self::with_kind(NodeKind::Static, self.full_path.clone());
            child.path = self.path[i..].to_string();
            child.wild_child = self.wild_child;
            child.indices = std::mem::take(&mut self.indices);
            child.children = std::mem::take(&mut self.children);
            child.value = self.value.take();
            child.priority = self.priority;

            self.indices = first_char(&child.path).into_iter().collect();
            self.children = vec![child];
            self.path.truncate(i);
            self.wild_child = false;
            self.full_path = full_path[..depth + i].to_string();
        }

        // Make this node the leaf
        if i == path.len() {
            if self.value.is_some() {
                return Err(RouteError::Duplicate {
                    method: String::new(),
                    path: full_path.to_string(),
                });
            }
            if let Some(catch_all) = self.catch_all_child() {
                return Err(RouteError::CatchAllConflict {
                    path: full_path.to_string(),
                    existing: catch_all.full_path.clone(),
                });
            }
            self.value = Some(value);
            self.full_path = full_path.to_string();
            self.priority += 1;
            return Ok(());
        }

        let rest = &path[i..];
        let depth = depth + i;
        let Some(c) = first_char(rest) else {
            return Ok(());
        };

        if c != ':' && c != '*' {
            // Check if a child with the next path character exists
            if let Some(pos) = self.indices.iter().position(|&idx| idx == c) {
                self.children[pos].add_route(rest, full_path, depth, value)?;
                self.priority += 1;
                self.reorder_child(pos);
                return Ok(());
            }

            // A static sibling of a catch-all could never be reached
            if let Some(catch_all) = self.catch_all_child() {
                return Err(RouteError::CatchAllConflict {
                    path: full_path.to_string(),
                    existing: catch_all.full_path.clone(),
                });
            }

            let mut child = Self::with_kind(NodeKind::Static, full_path.to_string());
            child.insert_child(rest, full_path, value);
            let pos = self.indices.len();
            self.indices.push(c);
            self.children.insert(pos, child);
            self.priority += 1;
            self.reorder_child(pos);
            return Ok(());
        }

        if self.wild_child {
            let existing = match self.children.last_mut() {
                Some(wild) => wild,
                None => return Ok(()),
            };

            // Check if the wildcard matches, rejecting longer names like
            // :name vs :names
            let same_wildcard = rest.starts_with(existing.path.as_str())
                && rest[existing.path.len()..]
                    .chars()
                    .next()
                    .map_or(true, |next| next == '/');

            if same_wildcard && existing.kind == NodeKind::CatchAll {
                return Err(RouteError::Duplicate {
                    method: String::new(),
                    path: full_path.to_string(),
                });
            }
            if same_wildcard {
                existing.add_route(rest, full_path, depth, value)?;
                self.priority += 1;
                return Ok(());
            }

            let segment = if existing.kind == NodeKind::CatchAll {
                rest
            } else {
                rest.split('/').next().unwrap_or(rest)
            };
            return Err(RouteError::WildcardConflict {
                segment: segment.to_string(),
                path: full_path.to_string(),
                existing: existing.path.clone(),
                prefix: format!("{}{}", &full_path[..depth], existing.path),
            });
        }

        if c == '*' {
            // Catch-all must own its fork, and would shadow a route ending
            // exactly at the mount point
            if let Some(sibling) = self.children.first() {
                return Err(RouteError::CatchAllConflict {
                    path: full_path.to_string(),
                    existing: sibling.full_path.clone(),
                });
            }
            if self.value.is_some() {
                return Err(RouteError::CatchAllConflict {
                    path: full_path.to_string(),
                    existing: self.full_path.clone(),
                });
            }
        }

        self.insert_child(rest, full_path, value);
        Ok(())
    }

    /// Build the chain of nodes for `path` below `self`, which is either a
    /// fresh node or a fork that has no wildcard child yet. The pattern has
    /// already been validated.
    fn insert_child(&mut self, path: &str, full_path: &str, value: T) {
        self.priority += 1;

        let mut path = path;
        let mut node = self;
        while let Some((wildcard, i)) = find_wildcard(path) {
            if wildcard.starts_with(':') {
                // Insert prefix before the current wildcard
                if i > 0 {
                    node.path = path[..i].to_string();
                    path = &path[i..];
                }

                node.children
                    .push(Self::wildcard(NodeKind::Param, wildcard, full_path));
                node.wild_child = true;
                let last = node.children.len() - 1;
                node = &mut node.children[last];

                // If the path doesn't end with the wildcard, then there will
                // be another subpath starting with '/'
                if wildcard.len() < path.len() {
                    path = &path[wildcard.len()..];

                    let mut child = Self::with_kind(NodeKind::Static, full_path.to_string());
                    child.priority = 1;
                    node.indices.push('/');
                    node.children.push(child);
                    node = &mut node.children[0];
                    continue;
                }

                // Otherwise we're done. Insert the value in the new leaf
                node.value = Some(value);
                return;
            }

            // Catch-all: the preceding '/' stays in this node's segment
            if i > 0 {
                node.path = path[..i].to_string();
            }
            let mut catch_all = Self::wildcard(NodeKind::CatchAll, wildcard, full_path);
            catch_all.value = Some(value);
            node.children.push(catch_all);
            node.wild_child = true;
            return;
        }

        // No wildcard left, simply insert the path and value
        node.path = path.to_string();
        node.value = Some(value);
        node.full_path = full_path.to_string();
    }

    /// Bubble the static child at `pos` towards the front while it has a
    /// higher priority than its predecessor. Ties keep insertion order.
    fn reorder_child(&mut self, pos: usize) -> usize {
        let prio = self.children[pos].priority;
        let mut new_pos = pos;
        while new_pos > 0 && self.children[new_pos - 1].priority < prio {
            self.children.swap(new_pos - 1, new_pos);
            self.indices.swap(new_pos - 1, new_pos);
            new_pos -= 1;
        }
        new_pos
    }

    fn static_child(&self, c: char) -> Option<&Self> {
        self.indices
            .iter()
            .position(|&idx| idx == c)
            .map(|pos| &self.children[pos])
    }

    fn wildcard_child(&self) -> Option<&Self> {
        if self.wild_child {
            self.children.last()
        } else {
            None
        }
    }

    fn catch_all_child(&self) -> Option<&Self> {
        self.wildcard_child()
            .filter(|child| child.kind == NodeKind::CatchAll)
    }

    /// True when `path` ending exactly at this node would match, counting a
    /// catch-all mounted here (it accepts the empty remainder).
    fn terminates(&self) -> bool {
        self.value.is_some() || self.catch_all_child().is_some()
    }

    /// True when this node's only contribution is a trailing `/` that leads
    /// to a route.
    fn is_slash_leaf(&self) -> bool {
        self.path == "/" && self.terminates()
    }

    /// Resolve a concrete request path.
    ///
    /// Matching is byte-exact. Static children win over a wildcard at the
    /// same fork; the lookup falls back to the wildcard only when the static
    /// branch cannot complete the match.
    #[must_use]
    pub fn get_value(&self, path: &str) -> Lookup<'_, T> {
        let mut params = Params::new();
        let mut tsr = false;
        match self.walk(path, &mut params, &mut tsr) {
            Some(value) => Lookup {
                value: Some(value),
                params,
                tsr: false,
            },
            None => Lookup::miss(tsr),
        }
    }

    /// Match `path` against this (static or root) node and its subtree.
    fn walk<'n>(&'n self, path: &str, params: &mut Params, tsr: &mut bool) -> Option<&'n T> {
        let Some(rest) = path.strip_prefix(self.path.as_str()) else {
            // Nothing found. We can recommend to redirect to the same URL
            // with an extra trailing slash if a leaf exists for that path.
            if self.path.len() == path.len() + 1
                && self.path.ends_with('/')
                && self.path.starts_with(path)
                && self.terminates()
            {
                *tsr = true;
            }
            return None;
        };

        if rest.is_empty() {
            if let Some(value) = self.value.as_ref() {
                return Some(value);
            }
            if let Some(catch_all) = self.catch_all_child() {
                if let Some(name) = catch_all.param_name.as_ref() {
                    params.push(name, "");
                }
                return catch_all.value.as_ref();
            }
            // Check if a route for this path plus a trailing slash exists
            if self.static_child('/').is_some_and(Self::is_slash_leaf) {
                *tsr = true;
            }
            return None;
        }

        self.walk_children(rest, params, tsr)
    }

    /// Match the non-empty remainder `rest` against the children of `self`.
    fn walk_children<'n>(
        &'n self,
        rest: &str,
        params: &mut Params,
        tsr: &mut bool,
    ) -> Option<&'n T> {
        if let Some(child) = first_char(rest).and_then(|c| self.static_child(c)) {
            if let Some(value) = child.walk(rest, params, tsr) {
                return Some(value);
            }
        }

        if let Some(wild) = self.wildcard_child() {
            match wild.kind {
                NodeKind::Param => {
                    if let Some(value) = wild.walk_param(rest, params, tsr) {
                        return Some(value);
                    }
                }
                NodeKind::CatchAll => {
                    if let Some(name) = wild.param_name.as_ref() {
                        params.push(name, rest);
                    }
                    return wild.value.as_ref();
                }
                NodeKind::Root | NodeKind::Static => {}
            }
        }

        // We can recommend to redirect to the same URL without a trailing
        // slash if a leaf exists for that path.
        if rest == "/" && self.value.is_some() {
            *tsr = true;
        }
        None
    }

    /// Bind one path element to this param node and continue below it.
    fn walk_param<'n>(&'n self, rest: &str, params: &mut Params, tsr: &mut bool) -> Option<&'n T> {
        // Find param end (either '/' or path end)
        let end = rest.find('/').unwrap_or(rest.len());
        if end == 0 {
            return None;
        }

        let mark = params.len();
        if let Some(name) = self.param_name.as_ref() {
            params.push(name, &rest[..end]);
        }

        if end < rest.len() {
            // We need to go deeper!
            let tail = &rest[end..];
            if let Some(child) = self.children.first() {
                if let Some(value) = child.walk(tail, params, tsr) {
                    return Some(value);
                }
            }
            if tail == "/" && self.value.is_some() {
                *tsr = true;
            }
        } else {
            if let Some(value) = self.value.as_ref() {
                return Some(value);
            }
            // No value found. Check if a value for this path plus a
            // trailing slash exists for trailing slash recommendation
            if self.children.first().is_some_and(Self::is_slash_leaf) {
                *tsr = true;
            }
        }

        params.truncate(mark);
        None
    }

    /// Case-insensitive lookup of a path.
    ///
    /// Returns the path with the casing registered in the tree, copying the
    /// values of wildcard segments verbatim from `path`. With
    /// `fix_trailing_slash` a missing or superfluous trailing slash is
    /// repaired as well.
    #[must_use]
    pub fn find_case_insensitive_path(&self, path: &str, fix_trailing_slash: bool) -> Option<String> {
        // Use a buffer slightly larger than the path to avoid a realloc when
        // a trailing slash gets appended.
        let mut out = String::with_capacity(path.len() + 1);
        if self.find_ci(path, &mut out, fix_trailing_slash) {
            Some(out)
        } else {
            None
        }
    }

    fn find_ci(&self, path: &str, out: &mut String, fix_trailing_slash: bool) -> bool {
        let mark = out.len();

        let Some(rest) = strip_prefix_fold(path, &self.path) else {
            // Nothing found. We can recommend adding a trailing slash if a
            // leaf exists for that path.
            if fix_trailing_slash
                && strip_prefix_fold(&self.path, path) == Some("/")
                && self.terminates()
            {
                out.push_str(&self.path);
                return true;
            }
            return false;
        };

        out.push_str(&self.path);

        if rest.is_empty() {
            if self.terminates() {
                return true;
            }
            if fix_trailing_slash && self.static_child('/').is_some_and(Self::is_slash_leaf) {
                out.push('/');
                return true;
            }
            out.truncate(mark);
            return false;
        }

        if self.find_ci_children(rest, out, fix_trailing_slash) {
            return true;
        }

        // The path minus its trailing slash ends here
        if fix_trailing_slash && rest == "/" && self.value.is_some() {
            return true;
        }

        out.truncate(mark);
        false
    }

    fn find_ci_children(&self, rest: &str, out: &mut String, fix_trailing_slash: bool) -> bool {
        if let Some(c) = first_char(rest) {
            // Several static children may match once case is ignored
            for (pos, &idx) in self.indices.iter().enumerate() {
                if chars_eq_fold(idx, c)
                    && self.children[pos].find_ci(rest, out, fix_trailing_slash)
                {
                    return true;
                }
            }
        }

        let Some(wild) = self.wildcard_child() else {
            return false;
        };

        match wild.kind {
            NodeKind::Param => {
                let end = rest.find('/').unwrap_or(rest.len());
                if end == 0 {
                    return false;
                }

                let mark = out.len();
                out.push_str(&rest[..end]);

                if end < rest.len() {
                    let tail = &rest[end..];
                    if let Some(child) = wild.children.first() {
                        if child.find_ci(tail, out, fix_trailing_slash) {
                            return true;
                        }
                    }
                    if fix_trailing_slash && tail == "/" && wild.value.is_some() {
                        return true;
                    }
                } else {
                    if wild.value.is_some() {
                        return true;
                    }
                    if fix_trailing_slash && wild.children.first().is_some_and(Self::is_slash_leaf) {
                        out.push('/');
                        return true;
                    }
                }

                out.truncate(mark);
                false
            }
            NodeKind::CatchAll => {
                out.push_str(rest);
                true
            }
            NodeKind::Root | NodeKind::Static => false,
        }
    }

    /// Registration patterns of every route stored in this tree, in probe
    /// order.
    #[must_use]
    pub fn patterns(&self) -> Vec<&str> {
        let mut out = Vec::with_capacity(self.priority as usize);
        self.collect_patterns(&mut out);
        out
    }

    fn collect_patterns<'n>(&'n self, out: &mut Vec<&'n str>) {
        if self.value.is_some() {
            out.push(self.full_path.as_str());
        }
        for child in &self.children {
            child.collect_patterns(out);
        }
    }
}

/// Reject malformed patterns before the tree is touched.
fn validate_pattern(path: &str) -> Result<(), RouteError> {
    if path.is_empty() {
        return Err(RouteError::Empty);
    }
    if !path.starts_with('/') {
        return Err(RouteError::MissingLeadingSlash {
            path: path.to_string(),
        });
    }

    let mut offset = 0;
    while let Some((wildcard, i)) = find_wildcard(&path[offset..]) {
        let start = offset + i;

        if wildcard[1..].contains([':', '*']) {
            return Err(RouteError::MultipleWildcardsInSegment {
                segment: wildcard.to_string(),
                path: path.to_string(),
            });
        }
        if wildcard.len() < 2 {
            return Err(RouteError::UnnamedWildcard {
                path: path.to_string(),
            });
        }
        if wildcard.starts_with('*') {
            if start + wildcard.len() != path.len() {
                return Err(RouteError::CatchAllNotAtEnd {
                    path: path.to_string(),
                });
            }
            if !path[..start].ends_with('/') {
                return Err(RouteError::CatchAllWithoutSlash {
                    path: path.to_string(),
                });
            }
        }

        offset = start + wildcard.len();
    }
    Ok(())
}

/// Search for a wildcard segment and return it together with its byte
/// offset. The wildcard runs up to the next `/` and may contain further
/// `:`/`*` characters, which [`validate_pattern`] rejects.
fn find_wildcard(path: &str) -> Option<(&str, usize)> {
    let start = path.find([':', '*'])?;
    let end = path[start + 1..]
        .find('/')
        .map_or(path.len(), |e| start + 1 + e);
    Some((&path[start..end], start))
}

/// Byte length of the longest common prefix, backed off to a character
/// boundary so both halves of a split stay valid UTF-8.
fn longest_common_prefix(a: &str, b: &str) -> usize {
    let mut i = a
        .bytes()
        .zip(b.bytes())
        .take_while(|(x, y)| x == y)
        .count();
    while !a.is_char_boundary(i) {
        i -= 1;
    }
    i
}

#[inline]
fn first_char(s: &str) -> Option<char> {
    s.chars().next()
}

fn chars_eq_fold(a: char, b: char) -> bool {
    a == b || a.to_lowercase().eq(b.to_lowercase())
}

/// Case-insensitive `strip_prefix`: `prefix` is matched against the start of
/// `path` one character at a time.
fn strip_prefix_fold<'p>(path: &'p str, prefix: &str) -> Option<&'p str> {
    let mut chars = path.char_indices();
    let mut consumed = 0;
    for pc in prefix.chars() {
        let (idx, c) = chars.next()?;
        if !chars_eq_fold(c, pc) {
            return None;
        }
        consumed = idx + c.len_utf8();
    }
    Some(&path[consumed..])
}
