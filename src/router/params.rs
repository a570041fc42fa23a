//! Path parameters extracted by a successful lookup.

use smallvec::SmallVec;
use std::ops::Index;
use std::sync::Arc;

/// Maximum number of path parameters before heap allocation.
/// Most routes have ≤4 wildcards (e.g. `/users/:id/posts/:post`).
pub const MAX_INLINE_PARAMS: usize = 8;

/// A single `name = value` binding produced by a wildcard segment.
///
/// The name is shared with the tree node that declared it, so handing out a
/// `Param` never copies the name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub key: Arc<str>,
    pub value: String,
}

impl Param {
    pub fn new(key: impl Into<Arc<str>>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Ordered parameter list, one entry per wildcard segment traversed, in
/// left-to-right declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(SmallVec<[Param; MAX_INLINE_PARAMS]>);

impl Params {
    #[must_use]
    pub fn new() -> Self {
        Self(SmallVec::new())
    }

    /// Value of the first parameter whose key matches `name`.
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|p| p.key.as_ref() == name)
            .map(|p| p.value.as_str())
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|p| (p.key.as_ref(), p.value.as_str()))
    }

    pub(crate) fn push(&mut self, key: &Arc<str>, value: &str) {
        self.0.push(Param {
            key: Arc::clone(key),
            value: value.to_owned(),
        });
    }

    /// Drop everything recorded after `len`; used when a lookup backtracks.
    pub(crate) fn truncate(&mut self, len: usize) {
        self.0.truncate(len);
    }
}

impl Index<usize> for Params {
    type Output = str;

    fn index(&self, i: usize) -> &Self::Output {
        &self.0[i].value
    }
}

impl FromIterator<Param> for Params {
    fn from_iter<I: IntoIterator<Item = Param>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Params {
    type Item = &'a Param;
    type IntoIter = std::slice::Iter<'a, Param>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_returns_first_match() {
        let params: Params = vec![Param::new("id", "1"), Param::new("id", "2")]
            .into_iter()
            .collect();
        assert_eq!(params.get("id"), Some("1"));
        assert_eq!(params.get("missing"), None);
    }

    #[test]
    fn test_index_and_truncate() {
        let key: Arc<str> = Arc::from("name");
        let mut params = Params::new();
        params.push(&key, "gopher");
        params.push(&key, "ferris");
        assert_eq!(&params[1], "ferris");
        params.truncate(1);
        assert_eq!(params.len(), 1);
        assert_eq!(&params[0], "gopher");
    }
}
