//! Alias → bucket mapping used by the router.

use std::collections::HashMap;

/// A single `(alias, bucket)` pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BucketAlias {
    pub alias: String,
    pub bucket: String,
}

/// A resolved request: which bucket to read and which key inside it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedObject<'a> {
    pub alias: &'a str,
    pub bucket: &'a str,
    pub key: String,
}

/// Immutable, ordered list of aliases.
///
/// Sorted by descending alias length (ties broken alphabetically) so the
/// first prefix match is always the longest one.
#[derive(Clone, Debug, Default)]
pub struct BucketAliases {
    entries: Vec<BucketAlias>,
}

impl BucketAliases {
    pub fn new(entries: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut entries: Vec<BucketAlias> = entries
            .into_iter()
            .map(|(alias, bucket)| BucketAlias { alias, bucket })
            .collect();
        entries.sort_by(|a, b| {
            b.alias
                .len()
                .cmp(&a.alias.len())
                .then_with(|| a.alias.cmp(&b.alias))
        });
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BucketAlias> {
        self.entries.iter()
    }

    /// Resolve a request path to a bucket and object key.
    ///
    /// An alias matches when `"/" + alias` is a literal prefix of `path`.
    /// The key is whatever follows `"/" + alias + "/"`; a path that matches
    /// without that separator keeps the remainder after `"/" + alias`, minus
    /// any leading slash.
    pub fn resolve(&self, path: &str) -> Option<ResolvedObject<'_>> {
        self.entries.iter().find_map(|entry| {
            let rest = path.strip_prefix('/')?.strip_prefix(entry.alias.as_str())?;
            let key = rest.strip_prefix('/').unwrap_or(rest);
            Some(ResolvedObject {
                alias: &entry.alias,
                bucket: &entry.bucket,
                key: key.to_string(),
            })
        })
    }
}

impl From<HashMap<String, String>> for BucketAliases {
    fn from(map: HashMap<String, String>) -> Self {
        Self::new(map)
    }
}
