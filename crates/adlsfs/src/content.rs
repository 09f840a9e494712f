//! Content metadata accepted when opening an output stream.
//!
//! Callers use HTTP header spelling; the service stores the values under its
//! own property names. The translation table is fixed:
//!
//! | option                | property              |
//! |-----------------------|-----------------------|
//! | `Content-Type`        | `content_type`        |
//! | `Content-Encoding`    | `content_encoding`    |
//! | `Content-Language`    | `content_language`    |
//! | `Content-Disposition` | `content_disposition` |
//! | `Cache-Control`       | `cache_control`       |
//! | `Content-MD5`         | `content_md5`         |
//!
//! Option names match case-insensitively. Anything else is rejected with
//! [`Error::UnknownOption`].

use crate::error::{Error, Result};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

pub const CONTENT_OPTIONS: [(&str, &str); 6] = [
    ("Content-Type", "content_type"),
    ("Content-Encoding", "content_encoding"),
    ("Content-Language", "content_language"),
    ("Content-Disposition", "content_disposition"),
    ("Cache-Control", "cache_control"),
    ("Content-MD5", "content_md5"),
];

/// Backend property name for a caller-facing option name
#[must_use]
pub fn backend_field(option: &str) -> Option<&'static str> {
    CONTENT_OPTIONS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(option))
        .map(|(_, field)| *field)
}

/// Content properties applied to an object when it is committed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentSettings {
    pub content_type: Option<String>,
    pub content_encoding: Option<String>,
    pub content_language: Option<String>,
    pub content_disposition: Option<String>,
    pub cache_control: Option<String>,
    /// Raw 16-byte digest
    pub content_md5: Option<Vec<u8>>,
}

impl ContentSettings {
    /// Translates caller options; the last value wins for repeated names.
    pub fn from_options<I, K, V>(options: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut settings = ContentSettings::default();
        for (name, value) in options {
            let (name, value) = (name.as_ref(), value.as_ref());
            let field = backend_field(name).ok_or_else(|| Error::unknown_option(name))?;
            settings.set_field(field, value)?;
        }
        Ok(settings)
    }

    fn set_field(&mut self, field: &str, value: &str) -> Result<()> {
        let value = value.to_string();
        match field {
            "content_type" => self.content_type = Some(value),
            "content_encoding" => self.content_encoding = Some(value),
            "content_language" => self.content_language = Some(value),
            "content_disposition" => self.content_disposition = Some(value),
            "cache_control" => self.cache_control = Some(value),
            "content_md5" => {
                let digest = STANDARD.decode(value.trim()).map_err(|e| {
                    Error::invalid_argument("Content-MD5", format!("not base64: {e}"))
                })?;
                if digest.len() != 16 {
                    return Err(Error::invalid_argument(
                        "Content-MD5",
                        format!("expected a 16 byte digest, got {} bytes", digest.len()),
                    ));
                }
                self.content_md5 = Some(digest);
            }
            other => return Err(Error::unknown_option(other)),
        }
        Ok(())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == ContentSettings::default()
    }

    /// Base64 form of the digest, as carried in headers
    #[must_use]
    pub fn content_md5_base64(&self) -> Option<String> {
        self.content_md5.as_ref().map(|d| STANDARD.encode(d))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_translation_is_case_insensitive() {
        let settings = ContentSettings::from_options([
            ("content-type", "application/vnd.apache.parquet"),
            ("CACHE-CONTROL", "no-cache"),
            ("Content-Language", "nb-NO"),
        ])
        .unwrap();
        assert_eq!(
            settings.content_type.as_deref(),
            Some("application/vnd.apache.parquet")
        );
        assert_eq!(settings.cache_control.as_deref(), Some("no-cache"));
        assert_eq!(settings.content_language.as_deref(), Some("nb-NO"));
        assert!(settings.content_encoding.is_none());
    }

    #[test]
    fn test_unknown_option_rejected() {
        let err = ContentSettings::from_options([("X-Ms-Meta-Owner", "me")]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownOption);
        assert!(err.to_string().contains("X-Ms-Meta-Owner"));
    }

    #[test]
    fn test_md5_is_base64_digest() {
        // md5("data")
        let encoded = "jXd/OF09/siBXSD3SWAm3A==";
        let settings = ContentSettings::from_options([("Content-MD5", encoded)]).unwrap();
        assert_eq!(settings.content_md5.as_ref().map(Vec::len), Some(16));
        assert_eq!(settings.content_md5_base64().as_deref(), Some(encoded));

        let err = ContentSettings::from_options([("Content-MD5", "AAAA")]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        let err = ContentSettings::from_options([("Content-MD5", "***")]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_empty() {
        let empty: [(&str, &str); 0] = [];
        assert!(ContentSettings::from_options(empty).unwrap().is_empty());
        assert_eq!(backend_field("Content-Disposition"), Some("content_disposition"));
        assert_eq!(backend_field("Content-Length"), None);
    }
}
