use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use adlsfs::{
    AccountHandler, AdapterConfig, Credential, FileInfo, FileSystem, FileType, FilesystemHandler,
    StaticToken,
};
use anyhow::{Context, Result, anyhow};
use std::sync::Arc;

/// YAML file holding an [`AdapterConfig`]
pub const CONFIG_ENV: &str = "ADLSFS_CONFIG";
pub const ACCOUNT_ENV: &str = "ADLSFS_ACCOUNT";
pub const FILESYSTEM_ENV: &str = "ADLSFS_FILESYSTEM";
pub const ENDPOINT_ENV: &str = "ADLSFS_ENDPOINT";
pub const SAS_TOKEN_ENV: &str = "ADLSFS_SAS_TOKEN";
pub const BEARER_TOKEN_ENV: &str = "ADLSFS_BEARER_TOKEN";

/// Config from an explicit path, then `ADLSFS_CONFIG`, then the
/// `ADLSFS_ACCOUNT`/`ADLSFS_FILESYSTEM`/`ADLSFS_ENDPOINT` variables.
pub fn load_config(override_path: Option<PathBuf>) -> Result<AdapterConfig> {
    let path = override_path.or_else(|| env::var_os(CONFIG_ENV).map(PathBuf::from));
    let config = match path {
        Some(path) => read_config_file(&path)?,
        None => config_from_vars(|name| env::var(name).ok())?,
    };
    config.validate()?;
    Ok(config)
}

pub fn read_config_file(path: &Path) -> Result<AdapterConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    serde_yaml_ng::from_str(&text)
        .with_context(|| format!("Failed to parse config file {}", path.display()))
}

/// Builds a config from variable lookups; the account is required.
pub fn config_from_vars<F>(lookup: F) -> Result<AdapterConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let account = lookup(ACCOUNT_ENV)
        .filter(|a| !a.is_empty())
        .ok_or_else(|| anyhow!("{ACCOUNT_ENV} is not set and no config file was given"))?;
    let mut config = AdapterConfig::new(account);
    config.filesystem = lookup(FILESYSTEM_ENV).filter(|f| !f.is_empty());
    config.endpoint = lookup(ENDPOINT_ENV).filter(|e| !e.is_empty());
    Ok(config)
}

/// SAS token wins over a bearer token; neither means anonymous access.
pub fn credential_from_vars<F>(lookup: F) -> Credential
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(sas) = lookup(SAS_TOKEN_ENV).filter(|s| !s.is_empty()) {
        return Credential::SasToken(sas);
    }
    if let Some(token) = lookup(BEARER_TOKEN_ENV).filter(|t| !t.is_empty()) {
        return Credential::Bearer(Arc::new(StaticToken::new(token)));
    }
    Credential::Anonymous
}

/// Account-wide handler, or one bound to `config.filesystem` when set
pub fn open_filesystem(config: &AdapterConfig, credential: Credential) -> Result<Box<dyn FileSystem>> {
    let fs: Box<dyn FileSystem> = if config.filesystem.is_some() {
        Box::new(FilesystemHandler::from_config(config, credential)?)
    } else {
        Box::new(AccountHandler::from_config(config, credential)?)
    };
    Ok(fs)
}

/// Helper function to format file sizes
#[must_use]
pub fn format_file_size(size: u64) -> String {
    if size >= 1024 * 1024 {
        format!("{:.1}MB", size as f64 / (1024.0 * 1024.0))
    } else if size >= 1024 {
        format!("{:.1}KB", size as f64 / 1024.0)
    } else {
        format!("{size}B")
    }
}

/// One listing line: type marker, size, modification time, path
#[must_use]
pub fn format_entry(info: &FileInfo) -> String {
    let marker = match info.file_type {
        FileType::Directory => 'd',
        FileType::File => '-',
        FileType::NotFound => '?',
    };
    let size = match info.size {
        Some(size) if info.is_file() => format_file_size(size),
        _ => "-".to_string(),
    };
    let modified = info.modified.map_or_else(
        || "unknown".to_string(),
        |t| t.format("%Y-%m-%d %H:%M:%S").to_string(),
    );
    format!("{marker} {size:>8} {modified:>19} {}", info.path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_config_from_vars() -> Result<()> {
        let config = config_from_vars(vars(&[(ACCOUNT_ENV, "acct"), (FILESYSTEM_ENV, "data")]))?;
        assert_eq!(config.account_name, "acct");
        assert_eq!(config.filesystem.as_deref(), Some("data"));
        assert_eq!(config.endpoint, None);

        assert!(config_from_vars(vars(&[(FILESYSTEM_ENV, "data")])).is_err());
        Ok(())
    }

    #[test]
    fn test_config_file() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(
            file,
            "account_name: acct\nfilesystem: logs\nblock_size: 1024\ntimeouts:\n  read: 2.5\n"
        )?;
        let config = load_config(Some(file.path().to_path_buf()))?;
        assert_eq!(config.filesystem.as_deref(), Some("logs"));
        assert_eq!(config.block_size, 1024);
        assert_eq!(config.timeouts.read, Some(2.5));

        let mut bad = tempfile::NamedTempFile::new()?;
        writeln!(bad, "account_name: acct\nblock_size: 0\n")?;
        assert!(load_config(Some(bad.path().to_path_buf())).is_err());
        Ok(())
    }

    #[test]
    fn test_credential_precedence() {
        let both = vars(&[(SAS_TOKEN_ENV, "sv=1"), (BEARER_TOKEN_ENV, "tok")]);
        assert!(matches!(credential_from_vars(both), Credential::SasToken(s) if s == "sv=1"));
        let bearer = vars(&[(BEARER_TOKEN_ENV, "tok")]);
        assert!(matches!(credential_from_vars(bearer), Credential::Bearer(_)));
        assert!(matches!(credential_from_vars(vars(&[])), Credential::Anonymous));
    }

    #[test]
    fn test_open_filesystem_picks_variant() -> Result<()> {
        let mut config = AdapterConfig::new("acct");
        assert_eq!(open_filesystem(&config, Credential::Anonymous)?.type_name(), "abfs+acct");
        config.filesystem = Some("data".to_string());
        assert_eq!(
            open_filesystem(&config, Credential::Anonymous)?.type_name(),
            "abfs+acct/data"
        );
        Ok(())
    }

    #[test]
    fn test_format_entry() {
        assert_eq!(format_file_size(512), "512B");
        assert_eq!(format_file_size(2048), "2.0KB");
        let dir = FileInfo::directory("fs/dir", None);
        assert_eq!(format_entry(&dir), format!("d {:>8} {:>19} fs/dir", "-", "unknown"));
    }
}
