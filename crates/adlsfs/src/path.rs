//! Path resolution: caller-supplied strings to (filesystem scope, key) pairs.
//!
//! Two spellings are accepted:
//!
//! * plain paths, `"fs/dir/file"` for account-wide handlers or
//!   `"dir/file"` for handlers bound to one filesystem. Leading and
//!   trailing separators are ignored and the empty string is the root.
//! * fully qualified URLs,
//!   `abfss://{filesystem}@{account}.dfs.core.windows.net/{key}`.

use crate::error::{Error, Result};
use std::fmt;

pub const SEPARATOR: char = '/';

const URL_SCHEMES: [&str; 2] = ["abfss://", "abfs://"];

/// Object key within a filesystem scope; the empty key is the scope root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(Vec<String>);

impl Key {
    #[must_use]
    pub fn root() -> Self {
        Key(Vec::new())
    }

    /// Builds a key from a name returned by the backend (`a/b/c`).
    #[must_use]
    pub fn from_backend_name(name: &str) -> Self {
        Key(name
            .split(SEPARATOR)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect())
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Final segment, `None` for the root
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// Parent key, `None` for the root
    #[must_use]
    pub fn parent(&self) -> Option<Key> {
        if self.0.is_empty() {
            return None;
        }
        Some(Key(self.0[..self.0.len() - 1].to_vec()))
    }

    #[must_use]
    pub fn join(&self, segment: &str) -> Key {
        let mut segments = self.0.clone();
        segments.push(segment.to_string());
        Key(segments)
    }

    /// True when `self` is `other` or lies beneath it.
    #[must_use]
    pub fn starts_with(&self, other: &Key) -> bool {
        self.0.starts_with(&other.0)
    }

    /// Backend spelling, `a/b/c`, empty for the root
    #[must_use]
    pub fn as_backend_name(&self) -> String {
        self.0.join("/")
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_backend_name())
    }
}

/// Structured, normalized path.
///
/// `scope` is `None` only for the root of an account-wide handler.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DataLakePath {
    pub scope: Option<String>,
    pub key: Key,
}

impl DataLakePath {
    #[must_use]
    pub fn is_account_root(&self) -> bool {
        self.scope.is_none()
    }

    /// True for the root of a filesystem scope (the scope itself).
    #[must_use]
    pub fn is_scope_root(&self) -> bool {
        self.scope.is_some() && self.key.is_root()
    }
}

/// Stateless resolver bound to an account and optionally one filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathResolver {
    account: String,
    filesystem: Option<String>,
}

impl PathResolver {
    #[must_use]
    pub fn account<S: Into<String>>(account: S) -> Self {
        Self {
            account: account.into(),
            filesystem: None,
        }
    }

    #[must_use]
    pub fn filesystem<A: Into<String>, F: Into<String>>(account: A, filesystem: F) -> Self {
        Self {
            account: account.into(),
            filesystem: Some(filesystem.into()),
        }
    }

    #[must_use]
    pub fn account_name(&self) -> &str {
        &self.account
    }

    /// The filesystem this resolver is pinned to, if any
    #[must_use]
    pub fn bound_filesystem(&self) -> Option<&str> {
        self.filesystem.as_deref()
    }

    /// True when `path` is this resolver's own root: the account root, or
    /// the root of the bound filesystem.
    #[must_use]
    pub fn is_root(&self, path: &DataLakePath) -> bool {
        path.scope.is_none() || (self.filesystem.is_some() && path.key.is_root())
    }

    /// Scope and key of a path that must name an object inside a filesystem.
    ///
    /// The resolver's root is `InvalidPath`; a whole filesystem named from
    /// the account is `IsADirectory`.
    pub fn object<'a>(&self, raw: &str, path: &'a DataLakePath) -> Result<(&'a str, &'a Key)> {
        if self.is_root(path) {
            return Err(Error::invalid_path(raw, "names the root, a file path is required"));
        }
        match &path.scope {
            Some(scope) if !path.key.is_root() => Ok((scope, &path.key)),
            _ => Err(Error::is_a_directory(
                self.display(path.scope.as_deref(), &path.key),
            )),
        }
    }

    pub fn resolve(&self, raw: &str) -> Result<DataLakePath> {
        if raw.contains('\0') {
            return Err(Error::invalid_path(raw, "contains a NUL character"));
        }

        let (url_scope, rest) = match split_url(raw)? {
            Some((scope, account, rest)) => {
                if account != self.account {
                    return Err(Error::invalid_path(
                        raw,
                        format!("names account {account}, expected {}", self.account),
                    ));
                }
                (Some(scope), rest)
            }
            None => (None, raw),
        };

        let segments = split_segments(raw, rest)?;

        match (&self.filesystem, url_scope) {
            (Some(bound), Some(scope)) if bound != scope => Err(Error::invalid_path(
                raw,
                format!("names filesystem {scope}, handler is bound to {bound}"),
            )),
            (Some(bound), _) => Ok(DataLakePath {
                scope: Some(bound.clone()),
                key: Key(segments),
            }),
            (None, Some(scope)) => Ok(DataLakePath {
                scope: Some(scope.to_string()),
                key: Key(segments),
            }),
            (None, None) => {
                let mut segments = segments.into_iter();
                match segments.next() {
                    None => Ok(DataLakePath {
                        scope: None,
                        key: Key::root(),
                    }),
                    Some(scope) => Ok(DataLakePath {
                        scope: Some(scope),
                        key: Key(segments.collect()),
                    }),
                }
            }
        }
    }

    /// Caller-visible spelling of a resolved path.
    ///
    /// Account-wide resolvers prefix the filesystem name; bound resolvers
    /// produce scope-relative paths. `resolve(display(p)) == p`.
    #[must_use]
    pub fn display(&self, scope: Option<&str>, key: &Key) -> String {
        match (&self.filesystem, scope) {
            (Some(_), _) => key.as_backend_name(),
            (None, None) => String::new(),
            (None, Some(scope)) if key.is_root() => scope.to_string(),
            (None, Some(scope)) => format!("{scope}/{key}"),
        }
    }
}

/// Splits `abfs[s]://{scope}@{account}.{host}/{rest}` into its parts.
fn split_url(raw: &str) -> Result<Option<(&str, &str, &str)>> {
    let Some(after_scheme) = URL_SCHEMES.iter().find_map(|s| raw.strip_prefix(s)) else {
        return Ok(None);
    };
    let (authority, rest) = after_scheme
        .split_once(SEPARATOR)
        .unwrap_or((after_scheme, ""));
    let Some((scope, host)) = authority.split_once('@') else {
        return Err(Error::invalid_path(raw, "URL is missing the filesystem@account part"));
    };
    let account = host.split('.').next().unwrap_or_default();
    if scope.is_empty() || account.is_empty() {
        return Err(Error::invalid_path(raw, "URL has an empty filesystem or account"));
    }
    Ok(Some((scope, account, rest)))
}

fn split_segments(raw: &str, rest: &str) -> Result<Vec<String>> {
    let trimmed = rest.trim_matches(SEPARATOR);
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    trimmed
        .split(SEPARATOR)
        .map(|segment| match segment {
            "" => Err(Error::invalid_path(raw, "contains an empty segment")),
            "." | ".." => Err(Error::invalid_path(raw, "relative segments are not supported")),
            s => Ok(s.to_string()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn key(s: &str) -> Key {
        Key::from_backend_name(s)
    }

    #[test]
    fn test_account_resolution() {
        let resolver = PathResolver::account("acct");

        let p = resolver.resolve("").unwrap();
        assert!(p.is_account_root());

        let p = resolver.resolve("/testfs/").unwrap();
        assert_eq!(p.scope.as_deref(), Some("testfs"));
        assert!(p.is_scope_root());

        let p = resolver.resolve("testfs/folder/content").unwrap();
        assert_eq!(p.scope.as_deref(), Some("testfs"));
        assert_eq!(p.key, key("folder/content"));
    }

    #[test]
    fn test_filesystem_resolution() {
        let resolver = PathResolver::filesystem("acct", "testfs");

        let p = resolver.resolve("").unwrap();
        assert!(p.is_scope_root());

        let p = resolver.resolve("/a/b.parquet").unwrap();
        assert_eq!(p.scope.as_deref(), Some("testfs"));
        assert_eq!(p.key, key("a/b.parquet"));
    }

    #[test]
    fn test_url_resolution() {
        let resolver = PathResolver::filesystem("acct", "testfs");
        let p = resolver
            .resolve("abfss://testfs@acct.dfs.core.windows.net/a/b")
            .unwrap();
        assert_eq!(p.key, key("a/b"));

        let err = resolver
            .resolve("abfss://otherfs@acct.dfs.core.windows.net/a/b")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPath);

        let err = resolver
            .resolve("abfs://testfs@elsewhere.dfs.core.windows.net/a")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPath);

        let account = PathResolver::account("acct");
        let p = account
            .resolve("abfs://data@acct.dfs.core.windows.net")
            .unwrap();
        assert_eq!(p.scope.as_deref(), Some("data"));
        assert!(p.key.is_root());
    }

    #[test]
    fn test_malformed_paths() {
        let resolver = PathResolver::account("acct");
        for raw in ["fs//a", "fs/./a", "fs/../a", "fs/a\0b", "abfs://nouser/a"] {
            let err = resolver.resolve(raw).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidPath, "{raw}");
        }
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let raws = ["", "/", "fs", "/fs/a/", "fs/a/b/c.txt", "//fs/x//"];
        for resolver in [
            PathResolver::account("acct"),
            PathResolver::filesystem("acct", "fs"),
        ] {
            for raw in raws {
                let Ok(first) = resolver.resolve(raw) else {
                    continue;
                };
                let shown = resolver.display(first.scope.as_deref(), &first.key);
                let second = resolver.resolve(&shown).unwrap();
                assert_eq!(first, second, "{raw} -> {shown}");
            }
        }
    }

    #[test]
    fn test_object_paths() {
        let bound = PathResolver::filesystem("acct", "fs");
        for raw in ["", "/"] {
            let p = bound.resolve(raw).unwrap();
            assert!(bound.is_root(&p));
            let err = bound.object(raw, &p).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidPath, "{raw:?}");
        }
        let p = bound.resolve("a/b").unwrap();
        let (scope, k) = bound.object("a/b", &p).unwrap();
        assert_eq!((scope, k), ("fs", &key("a/b")));

        let account = PathResolver::account("acct");
        let p = account.resolve("").unwrap();
        assert_eq!(account.object("", &p).unwrap_err().kind(), ErrorKind::InvalidPath);
        let p = account.resolve("fs").unwrap();
        assert!(!account.is_root(&p));
        assert_eq!(account.object("fs", &p).unwrap_err().kind(), ErrorKind::IsADirectory);
    }

    #[test]
    fn test_key_helpers() {
        let k = key("a/b/c");
        assert_eq!(k.name(), Some("c"));
        assert_eq!(k.parent(), Some(key("a/b")));
        assert!(k.starts_with(&key("a")));
        assert!(!key("ab").starts_with(&key("a/b")));
        assert_eq!(Key::root().parent(), None);
        assert_eq!(key("a").join("b").to_string(), "a/b");
    }
}
