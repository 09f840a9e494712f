//! Data Lake Storage Gen2 REST backend over `reqwest::blocking`.
//!
//! The credential is opaque: a SAS query string is appended to every URL
//! and bearer tokens are fetched from the [`TokenProvider`] per request and
//! forwarded unchanged.

use crate::backend::{
    BackendError, BackendResult, DataLakeBackend, FilesystemItem, ListRequest, Page,
    PathProperties, ResourceType,
};
use crate::content::ContentSettings;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use diagnostics::emit::debug;
use reqwest::Method;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::HeaderMap;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

pub const API_VERSION: &str = "2021-06-08";

const CONTINUATION: &str = "x-ms-continuation";
const ERROR_CODE: &str = "x-ms-error-code";
/// Longest per-request deadline handed to the client; the transport adds
/// timeouts to `Instant::now()`, which overflows near `Duration::MAX`.
const MAX_REQUEST_TIMEOUT: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Source of bearer tokens. Refresh is the provider's business.
pub trait TokenProvider: Send + Sync {
    fn token(&self) -> BackendResult<String>;
}

/// A fixed token, for short-lived tools
pub struct StaticToken(String);

impl StaticToken {
    #[must_use]
    pub fn new<S: Into<String>>(token: S) -> Self {
        Self(token.into())
    }
}

impl TokenProvider for StaticToken {
    fn token(&self) -> BackendResult<String> {
        Ok(self.0.clone())
    }
}

#[derive(Clone)]
pub enum Credential {
    Anonymous,
    /// Shared access signature query string, with or without the leading `?`
    SasToken(String),
    Bearer(Arc<dyn TokenProvider>),
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Anonymous => f.write_str("Anonymous"),
            Credential::SasToken(_) => f.write_str("SasToken(..)"),
            Credential::Bearer(_) => f.write_str("Bearer(..)"),
        }
    }
}

pub struct RestBackend {
    account: String,
    endpoint: Url,
    credential: Credential,
    client: Client,
}

impl RestBackend {
    pub fn new<S: Into<String>>(
        account: S,
        endpoint: Url,
        credential: Credential,
    ) -> BackendResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(BackendError::transport)?;
        Ok(Self {
            account: account.into(),
            endpoint,
            credential,
            client,
        })
    }

    /// Default public endpoint for an account
    pub fn default_endpoint(account: &str) -> BackendResult<Url> {
        Url::parse(&format!("https://{account}.dfs.core.windows.net/"))
            .map_err(BackendError::transport)
    }

    fn url(&self, filesystem: Option<&str>, path: &str, query: &[(&str, String)]) -> Url {
        let mut url = build_url(&self.endpoint, filesystem, path, query);
        if let Credential::SasToken(sas) = &self.credential {
            let sas = sas.trim_start_matches('?');
            let combined = match url.query() {
                Some(existing) if !existing.is_empty() => format!("{existing}&{sas}"),
                _ => sas.to_string(),
            };
            url.set_query(Some(&combined));
        }
        url
    }

    fn request(&self, method: Method, url: Url) -> BackendResult<RequestBuilder> {
        let builder = self
            .client
            .request(method, url)
            .header("x-ms-version", API_VERSION);
        Ok(match &self.credential {
            Credential::Bearer(provider) => builder.bearer_auth(provider.token()?),
            Credential::Anonymous | Credential::SasToken(_) => builder,
        })
    }

    fn execute(&self, builder: RequestBuilder, timeout: Option<Duration>) -> BackendResult<Response> {
        let builder = match timeout {
            Some(timeout) => builder.timeout(timeout.min(MAX_REQUEST_TIMEOUT)),
            None => builder,
        };
        let response = builder.send().map_err(transport_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let code = header_string(response.headers(), ERROR_CODE);
        let body = response.text().unwrap_or_default();
        let err = error_from_response(status.as_u16(), code.as_deref(), &body);
        let status = status.as_u16();
        let code = err.code().unwrap_or("none").to_string();
        debug!("Service returned {status} {code}");
        Err(err)
    }
}

impl DataLakeBackend for RestBackend {
    fn account_name(&self) -> &str {
        &self.account
    }

    fn list_filesystems(
        &self,
        continuation: Option<&str>,
        timeout: Option<Duration>,
    ) -> BackendResult<Page<FilesystemItem>> {
        let mut query = vec![("resource", "account".to_string())];
        if let Some(token) = continuation {
            query.push(("continuation", token.to_string()));
        }
        let url = self.url(None, "", &query);
        let response = self.execute(self.request(Method::GET, url)?, timeout)?;
        let next = header_string(response.headers(), CONTINUATION).filter(|t| !t.is_empty());
        let body = response.text().map_err(transport_error)?;
        Ok(Page {
            items: parse_filesystem_list(&body)?,
            continuation: next,
        })
    }

    fn get_filesystem_properties(
        &self,
        filesystem: &str,
        timeout: Option<Duration>,
    ) -> BackendResult<FilesystemItem> {
        let url = self.url(Some(filesystem), "", &[("resource", "filesystem".to_string())]);
        let response = self.execute(self.request(Method::HEAD, url)?, timeout)?;
        Ok(FilesystemItem {
            name: filesystem.to_string(),
            last_modified: header_string(response.headers(), "last-modified")
                .and_then(|d| parse_http_date(&d)),
        })
    }

    fn create_filesystem(&self, filesystem: &str, timeout: Option<Duration>) -> BackendResult<()> {
        let url = self.url(Some(filesystem), "", &[("resource", "filesystem".to_string())]);
        _ = self.execute(self.request(Method::PUT, url)?, timeout)?;
        Ok(())
    }

    fn delete_filesystem(&self, filesystem: &str, timeout: Option<Duration>) -> BackendResult<()> {
        let url = self.url(Some(filesystem), "", &[("resource", "filesystem".to_string())]);
        _ = self.execute(self.request(Method::DELETE, url)?, timeout)?;
        Ok(())
    }

    fn list_paths(
        &self,
        request: &ListRequest<'_>,
        timeout: Option<Duration>,
    ) -> BackendResult<Page<PathProperties>> {
        let url = self.url(Some(request.filesystem), "", &list_query(request));
        let response = self.execute(self.request(Method::GET, url)?, timeout)?;
        let next = header_string(response.headers(), CONTINUATION).filter(|t| !t.is_empty());
        let body = response.text().map_err(transport_error)?;
        Ok(Page {
            items: parse_path_list(&body)?,
            continuation: next,
        })
    }

    fn get_properties(
        &self,
        filesystem: &str,
        path: &str,
        timeout: Option<Duration>,
    ) -> BackendResult<PathProperties> {
        if path.is_empty() {
            let fs = self.get_filesystem_properties(filesystem, timeout)?;
            return Ok(PathProperties {
                name: String::new(),
                resource: ResourceType::Directory,
                content_length: 0,
                last_modified: fs.last_modified,
                content: ContentSettings::default(),
            });
        }
        let url = self.url(Some(filesystem), path, &[]);
        let response = self.execute(self.request(Method::HEAD, url)?, timeout)?;
        Ok(properties_from_headers(path, response.headers()))
    }

    fn create_file(
        &self,
        filesystem: &str,
        path: &str,
        overwrite: bool,
        timeout: Option<Duration>,
    ) -> BackendResult<()> {
        let url = self.url(Some(filesystem), path, &[("resource", "file".to_string())]);
        let mut builder = self.request(Method::PUT, url)?;
        if !overwrite {
            builder = builder.header("If-None-Match", "*");
        }
        _ = self.execute(builder, timeout)?;
        Ok(())
    }

    fn create_directory(
        &self,
        filesystem: &str,
        path: &str,
        timeout: Option<Duration>,
    ) -> BackendResult<()> {
        if path.is_empty() {
            return Ok(());
        }
        let url = self.url(Some(filesystem), path, &[("resource", "directory".to_string())]);
        _ = self.execute(self.request(Method::PUT, url)?, timeout)?;
        Ok(())
    }

    fn append(
        &self,
        filesystem: &str,
        path: &str,
        offset: u64,
        data: &[u8],
        timeout: Option<Duration>,
    ) -> BackendResult<()> {
        let url = self.url(
            Some(filesystem),
            path,
            &[
                ("action", "append".to_string()),
                ("position", offset.to_string()),
            ],
        );
        let builder = self.request(Method::PATCH, url)?.body(data.to_vec());
        _ = self.execute(builder, timeout)?;
        Ok(())
    }

    fn flush(
        &self,
        filesystem: &str,
        path: &str,
        position: u64,
        content: &ContentSettings,
        timeout: Option<Duration>,
    ) -> BackendResult<()> {
        let url = self.url(
            Some(filesystem),
            path,
            &[
                ("action", "flush".to_string()),
                ("position", position.to_string()),
            ],
        );
        let mut builder = self.request(Method::PATCH, url)?.body(Vec::new());
        for (name, value) in content_headers(content) {
            builder = builder.header(name, value);
        }
        _ = self.execute(builder, timeout)?;
        Ok(())
    }

    fn read(
        &self,
        filesystem: &str,
        path: &str,
        offset: u64,
        len: u64,
        timeout: Option<Duration>,
    ) -> BackendResult<Bytes> {
        if len == 0 {
            return Ok(Bytes::new());
        }
        let url = self.url(Some(filesystem), path, &[]);
        let builder = self
            .request(Method::GET, url)?
            .header("Range", range_header(offset, len));
        match self.execute(builder, timeout) {
            Ok(response) => response.bytes().map_err(transport_error),
            // Range starting at or past the end of the object
            Err(err) if err.status == Some(416) => Ok(Bytes::new()),
            Err(err) => Err(err),
        }
    }

    fn rename(
        &self,
        source_filesystem: &str,
        source: &str,
        dest_filesystem: &str,
        dest: &str,
        overwrite: bool,
        timeout: Option<Duration>,
    ) -> BackendResult<()> {
        let url = self.url(Some(dest_filesystem), dest, &[]);
        let mut builder = self
            .request(Method::PUT, url)?
            .header(
                "x-ms-rename-source",
                rename_source(&self.endpoint, source_filesystem, source),
            )
            .body(Vec::new());
        if !overwrite {
            builder = builder.header("If-None-Match", "*");
        }
        _ = self.execute(builder, timeout)?;
        Ok(())
    }

    fn delete(
        &self,
        filesystem: &str,
        path: &str,
        recursive: bool,
        timeout: Option<Duration>,
    ) -> BackendResult<()> {
        // Large recursive deletes are resumed with a continuation token
        let mut continuation: Option<String> = None;
        loop {
            let mut query = vec![("recursive", recursive.to_string())];
            if let Some(token) = &continuation {
                query.push(("continuation", token.clone()));
            }
            let url = self.url(Some(filesystem), path, &query);
            let response = self.execute(self.request(Method::DELETE, url)?, timeout)?;
            continuation = header_string(response.headers(), CONTINUATION).filter(|t| !t.is_empty());
            if continuation.is_none() {
                return Ok(());
            }
            debug!("Resuming delete of {path}");
        }
    }
}

fn transport_error(err: reqwest::Error) -> BackendError {
    if err.is_timeout() {
        BackendError::timeout(err.to_string()).with_source(Box::new(err))
    } else {
        BackendError::transport(err)
    }
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// `{endpoint}/{filesystem}/{path...}?{query}` with every segment escaped
fn build_url(
    endpoint: &Url,
    filesystem: Option<&str>,
    path: &str,
    query: &[(&str, String)],
) -> Url {
    let mut url = endpoint.clone();
    if let Ok(mut segments) = url.path_segments_mut() {
        _ = segments.pop_if_empty();
        if let Some(filesystem) = filesystem {
            _ = segments.push(filesystem);
            _ = segments.extend(path.split('/').filter(|s| !s.is_empty()));
        }
    }
    if filesystem.is_none() && url.path().is_empty() {
        url.set_path("/");
    }
    if !query.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (name, value) in query {
            _ = pairs.append_pair(name, value);
        }
    }
    url
}

fn list_query(request: &ListRequest<'_>) -> Vec<(&'static str, String)> {
    let mut query = vec![
        ("resource", "filesystem".to_string()),
        ("recursive", request.recursive.to_string()),
    ];
    if !request.directory.is_empty() {
        query.push(("directory", request.directory.to_string()));
    }
    if let Some(token) = request.continuation {
        query.push(("continuation", token.to_string()));
    }
    if let Some(max) = request.max_results {
        query.push(("maxResults", max.to_string()));
    }
    query
}

/// Escaped absolute path of the rename source, `/{filesystem}/{path}`
fn rename_source(endpoint: &Url, filesystem: &str, path: &str) -> String {
    build_url(endpoint, Some(filesystem), path, &[]).path().to_string()
}

fn range_header(offset: u64, len: u64) -> String {
    format!("bytes={offset}-{}", offset.saturating_add(len) - 1)
}

fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

/// Flag and number fields arrive either as JSON values or as strings.
fn json_bool(value: Option<&serde_json::Value>) -> bool {
    match value {
        Some(serde_json::Value::Bool(b)) => *b,
        Some(serde_json::Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

fn json_u64(value: Option<&serde_json::Value>) -> u64 {
    match value {
        Some(serde_json::Value::Number(n)) => n.as_u64().unwrap_or_default(),
        Some(serde_json::Value::String(s)) => s.parse().unwrap_or_default(),
        _ => 0,
    }
}

#[derive(Deserialize)]
struct PathList {
    #[serde(default)]
    paths: Vec<PathEntry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PathEntry {
    name: String,
    #[serde(default)]
    is_directory: Option<serde_json::Value>,
    #[serde(default)]
    content_length: Option<serde_json::Value>,
    #[serde(default)]
    last_modified: Option<String>,
}

fn parse_path_list(body: &str) -> BackendResult<Vec<PathProperties>> {
    let list: PathList = serde_json::from_str(body).map_err(BackendError::transport)?;
    Ok(list
        .paths
        .into_iter()
        .map(|entry| {
            let directory = json_bool(entry.is_directory.as_ref());
            PathProperties {
                name: entry.name,
                resource: if directory {
                    ResourceType::Directory
                } else {
                    ResourceType::File
                },
                content_length: if directory {
                    0
                } else {
                    json_u64(entry.content_length.as_ref())
                },
                last_modified: entry.last_modified.as_deref().and_then(parse_http_date),
                content: ContentSettings::default(),
            }
        })
        .collect())
}

#[derive(Deserialize)]
struct FilesystemList {
    #[serde(default)]
    filesystems: Vec<FilesystemEntry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FilesystemEntry {
    name: String,
    #[serde(default)]
    last_modified: Option<String>,
}

fn parse_filesystem_list(body: &str) -> BackendResult<Vec<FilesystemItem>> {
    let list: FilesystemList = serde_json::from_str(body).map_err(BackendError::transport)?;
    Ok(list
        .filesystems
        .into_iter()
        .map(|fs| FilesystemItem {
            name: fs.name,
            last_modified: fs.last_modified.as_deref().and_then(parse_http_date),
        })
        .collect())
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Service error from the status, the `x-ms-error-code` header and the JSON
/// body. HEAD responses carry no body, so the header wins when present.
fn error_from_response(status: u16, header_code: Option<&str>, body: &str) -> BackendError {
    let detail = serde_json::from_str::<ErrorBody>(body).ok().map(|b| b.error);
    let (body_code, message) = match detail {
        Some(detail) => (detail.code, detail.message),
        None => (None, None),
    };
    let code = header_code.map(str::to_string).or(body_code);
    let message = message
        .or_else(|| (!body.trim().is_empty()).then(|| body.trim().to_string()))
        .unwrap_or_else(|| format!("HTTP {status}"));
    BackendError {
        status: Some(status),
        code,
        message,
        timed_out: false,
        source: None,
    }
}

/// Request headers that carry content settings on flush
fn content_headers(content: &ContentSettings) -> Vec<(&'static str, String)> {
    let mut headers = Vec::new();
    let fields = [
        ("x-ms-content-type", &content.content_type),
        ("x-ms-content-encoding", &content.content_encoding),
        ("x-ms-content-language", &content.content_language),
        ("x-ms-content-disposition", &content.content_disposition),
        ("x-ms-cache-control", &content.cache_control),
    ];
    for (name, value) in fields {
        if let Some(value) = value {
            headers.push((name, value.clone()));
        }
    }
    if let Some(md5) = content.content_md5_base64() {
        headers.push(("x-ms-content-md5", md5));
    }
    headers
}

fn properties_from_headers(path: &str, headers: &HeaderMap) -> PathProperties {
    let resource = match header_string(headers, "x-ms-resource-type").as_deref() {
        Some("directory") => ResourceType::Directory,
        _ => ResourceType::File,
    };
    PathProperties {
        name: path.to_string(),
        resource,
        content_length: header_string(headers, "content-length")
            .and_then(|v| v.parse().ok())
            .unwrap_or_default(),
        last_modified: header_string(headers, "last-modified").and_then(|d| parse_http_date(&d)),
        content: ContentSettings {
            content_type: header_string(headers, "content-type"),
            content_encoding: header_string(headers, "content-encoding"),
            content_language: header_string(headers, "content-language"),
            content_disposition: header_string(headers, "content-disposition"),
            cache_control: header_string(headers, "cache-control"),
            content_md5: header_string(headers, "content-md5")
                .and_then(|v| STANDARD.decode(v).ok()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use reqwest::header::HeaderValue;

    fn endpoint() -> Url {
        Url::parse("https://acct.dfs.core.windows.net").unwrap()
    }

    #[test]
    fn test_url_construction() {
        let url = build_url(
            &endpoint(),
            Some("data"),
            "year=2024/part 0.parquet",
            &[("action", "append".to_string()), ("position", "10".to_string())],
        );
        assert_eq!(
            url.as_str(),
            "https://acct.dfs.core.windows.net/data/year=2024/part%200.parquet?action=append&position=10"
        );

        let url = build_url(&endpoint(), None, "", &[("resource", "account".to_string())]);
        assert_eq!(
            url.as_str(),
            "https://acct.dfs.core.windows.net/?resource=account"
        );

        assert_eq!(rename_source(&endpoint(), "data", "a/b c"), "/data/a/b%20c");
    }

    #[test]
    fn test_sas_token_is_appended() {
        let backend = RestBackend::new(
            "acct",
            endpoint(),
            Credential::SasToken("?sv=2022-11-02&sig=abc%2B".to_string()),
        )
        .unwrap();
        let url = backend.url(Some("fs"), "f", &[("resource", "file".to_string())]);
        assert_eq!(url.query(), Some("resource=file&sv=2022-11-02&sig=abc%2B"));
        let url = backend.url(Some("fs"), "f", &[]);
        assert_eq!(url.query(), Some("sv=2022-11-02&sig=abc%2B"));
    }

    #[test]
    fn test_list_query() {
        let request = ListRequest {
            filesystem: "fs",
            directory: "a/b",
            recursive: true,
            continuation: Some("tok"),
            max_results: Some(2),
        };
        let query = list_query(&request);
        assert!(query.contains(&("directory", "a/b".to_string())));
        assert!(query.contains(&("recursive", "true".to_string())));
        assert!(query.contains(&("continuation", "tok".to_string())));
        assert!(query.contains(&("maxResults", "2".to_string())));
    }

    #[test]
    fn test_parse_path_list() {
        let body = r#"{"paths":[
            {"name":"a","isDirectory":"true","lastModified":"Tue, 01 Oct 2024 10:00:00 GMT"},
            {"name":"a/f.parquet","contentLength":"1234","lastModified":"Tue, 01 Oct 2024 10:00:00 GMT"},
            {"name":"a/g","contentLength":7}
        ]}"#;
        let paths = parse_path_list(body).unwrap();
        assert_eq!(paths.len(), 3);
        assert!(paths[0].is_directory());
        assert_eq!(paths[1].content_length, 1234);
        assert_eq!(paths[2].content_length, 7);
        let modified = paths[1].last_modified.unwrap();
        assert_eq!((modified.year(), modified.month(), modified.hour()), (2024, 10, 10));
        assert!(paths[2].last_modified.is_none());

        assert!(parse_path_list("{}").unwrap().is_empty());
        assert!(parse_path_list("not json").is_err());
    }

    #[test]
    fn test_parse_filesystem_list() {
        let body = r#"{"filesystems":[{"name":"logs","lastModified":"Wed, 02 Oct 2024 08:30:00 GMT"},{"name":"data"}]}"#;
        let items = parse_filesystem_list(body).unwrap();
        assert_eq!(items[0].name, "logs");
        assert!(items[0].last_modified.is_some());
        assert_eq!(items[1].name, "data");
    }

    #[test]
    fn test_error_from_response() {
        let body = r#"{"error":{"code":"PathNotFound","message":"The specified path does not exist."}}"#;
        let err = error_from_response(404, None, body);
        assert_eq!(err.code(), Some("PathNotFound"));
        assert_eq!(err.message, "The specified path does not exist.");

        let err = error_from_response(409, Some("DirectoryNotEmpty"), "");
        assert_eq!(err.code(), Some("DirectoryNotEmpty"));
        assert_eq!(err.message, "HTTP 409");
        assert_eq!(err.status, Some(409));
    }

    #[test]
    fn test_content_headers() {
        let content = ContentSettings::from_options([
            ("Content-Type", "text/csv"),
            ("Content-MD5", "jXd/OF09/siBXSD3SWAm3A=="),
        ])
        .unwrap();
        let headers = content_headers(&content);
        assert_eq!(
            headers,
            vec![
                ("x-ms-content-type", "text/csv".to_string()),
                ("x-ms-content-md5", "jXd/OF09/siBXSD3SWAm3A==".to_string()),
            ]
        );
        assert!(content_headers(&ContentSettings::default()).is_empty());
    }

    #[test]
    fn test_properties_from_headers() {
        let mut headers = HeaderMap::new();
        _ = headers.insert("x-ms-resource-type", HeaderValue::from_static("file"));
        _ = headers.insert("content-length", HeaderValue::from_static("42"));
        _ = headers.insert("content-type", HeaderValue::from_static("text/plain"));
        _ = headers.insert(
            "last-modified",
            HeaderValue::from_static("Tue, 01 Oct 2024 10:00:00 GMT"),
        );
        let props = properties_from_headers("a/b", &headers);
        assert_eq!(props.resource, ResourceType::File);
        assert_eq!(props.content_length, 42);
        assert_eq!(props.content.content_type.as_deref(), Some("text/plain"));

        _ = headers.insert("x-ms-resource-type", HeaderValue::from_static("directory"));
        assert!(properties_from_headers("a", &headers).is_directory());
    }

    #[test]
    fn test_range_header() {
        assert_eq!(range_header(0, 4), "bytes=0-3");
        assert_eq!(range_header(100, 1), "bytes=100-100");
    }
}
