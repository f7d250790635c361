//! Session store: persisted cookies used to seed an authenticated feed.
//!
//! The file is produced by an external login step and only ever read here.
//! Two layouts are accepted:
//!
//! ```json
//! { "facebook": { "cookies": { "c_user": "…", "xs": "…" } } }
//! { "cookies": { "c_user": "…" } }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::Error;

/// A read-only bag of cookie name/value pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStore {
    cookies: BTreeMap<String, String>,
}

#[derive(Deserialize)]
struct SessionFile {
    #[serde(default)]
    facebook: Option<CookieSection>,
    #[serde(default)]
    cookies: Option<BTreeMap<String, String>>,
}

#[derive(Deserialize)]
struct CookieSection {
    #[serde(default)]
    cookies: BTreeMap<String, String>,
}

impl SessionStore {
    /// Build a store from explicit pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            cookies: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Parse the JSON session document.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let file: SessionFile = serde_json::from_str(json)?;
        let cookies = match (file.facebook, file.cookies) {
            (Some(section), _) if !section.cookies.is_empty() => section.cookies,
            (_, Some(flat)) => flat,
            _ => BTreeMap::new(),
        };
        Ok(Self { cookies })
    }

    /// Load the session file. A missing file yields an empty store, so the
    /// feed opens unauthenticated and the login check decides what happens.
    pub async fn load(path: &Path) -> Result<Self, Error> {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => {
                let store = Self::from_json(&content)?;
                debug!(path = %path.display(), cookies = store.len(), "Loaded session");
                Ok(store)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "No session file found; starting without cookies");
                Ok(Self::default())
            }
            Err(e) => Err(Error::Config {
                message: format!("cannot read session file {}: {e}", path.display()),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// Cookie pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.cookies.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_layout() {
        let store =
            SessionStore::from_json(r#"{"facebook":{"cookies":{"c_user":"42","xs":"abc"}}}"#)
                .unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.get("c_user"), Some("42"));
    }

    #[test]
    fn flat_layout() {
        let store = SessionStore::from_json(r#"{"cookies":{"datr":"zz"}}"#).unwrap();
        assert_eq!(store.get("datr"), Some("zz"));
    }

    #[test]
    fn unrelated_document_is_empty() {
        let store = SessionStore::from_json(r#"{"other":1}"#).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn invalid_json_is_an_error() {
        assert!(SessionStore::from_json("not json").is_err());
    }

    #[tokio::test]
    async fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::load(&dir.path().join("absent.json")).await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auth.json");
        std::fs::write(&path, r#"{"facebook":{"cookies":{"a":"1","b":"2"}}}"#).unwrap();
        let store = SessionStore::load(&path).await.unwrap();
        let names: Vec<_> = store.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
