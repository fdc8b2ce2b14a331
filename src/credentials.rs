//! API key resolution from the TOML secrets file.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("no API key found: {0}")]
    Missing(String),
    #[error("API key is invalid: {0}")]
    Invalid(String),
}

/// A validated API key. The Debug form never prints the key itself.
#[derive(Clone)]
pub struct Credential(String);

impl Credential {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(sk-***)")
    }
}

/// Parsed contents of the secrets file.
#[derive(Debug)]
pub struct SecretStore {
    table: toml::Table,
}

impl SecretStore {
    pub fn load(path: &Path) -> Result<Self, CredentialError> {
        let raw = fs::read_to_string(path).map_err(|e| {
            CredentialError::Missing(format!(
                "could not read secrets file {}: {e}",
                path.display()
            ))
        })?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self, CredentialError> {
        let table = raw
            .parse::<toml::Table>()
            .map_err(|e| CredentialError::Missing(format!("could not parse secrets file: {e}")))?;
        Ok(Self { table })
    }

    pub fn empty() -> Self {
        Self {
            table: toml::Table::new(),
        }
    }

    /// Default location: `secrets.toml` in the per-user config directory.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "mp3scribe", "mp3scribe")
            .map(|dirs| dirs.config_dir().join("secrets.toml"))
    }
}

/// Resolve the API key, trying the `[openai]` table, then the flat
/// `OPENAI_API_KEY` entry, then a key entered at invocation time.
///
/// A `[openai]` table that is present but unusable is an error in its own
/// right rather than a reason to fall through: a misconfigured entry should
/// be reported, not silently shadowed by another source.
pub fn resolve_credential(
    store: &SecretStore,
    entered: Option<&str>,
) -> Result<Credential, CredentialError> {
    if let Some(section) = store.table.get("openai") {
        let Some(table) = section.as_table() else {
            return Err(CredentialError::Invalid(
                "the [openai] entry in secrets is not a table".to_string(),
            ));
        };
        return match table.get("api_key") {
            Some(value) => match value.as_str() {
                Some(raw) => validate(raw, "'api_key' under [openai]"),
                None => Err(CredentialError::Invalid(
                    "'api_key' under [openai] is not a string".to_string(),
                )),
            },
            None => Err(CredentialError::Missing(
                "the [openai] section has no 'api_key' entry".to_string(),
            )),
        };
    }

    if let Some(value) = store.table.get("OPENAI_API_KEY") {
        return match value.as_str() {
            Some(raw) => validate(raw, "flat 'OPENAI_API_KEY'"),
            None => Err(CredentialError::Invalid(
                "flat 'OPENAI_API_KEY' is not a string".to_string(),
            )),
        };
    }

    if let Some(raw) = entered {
        return validate(raw, "the key entered at runtime");
    }

    Err(CredentialError::Missing(
        "no [openai] api_key, no flat OPENAI_API_KEY, and no key entered at runtime".to_string(),
    ))
}

fn validate(raw: &str, origin: &str) -> Result<Credential, CredentialError> {
    let cleaned = raw.trim();
    if cleaned.is_empty() {
        return Err(CredentialError::Invalid(format!("{origin} is empty")));
    }
    if !cleaned.starts_with("sk-") {
        return Err(CredentialError::Invalid(format!(
            "{origin} does not start with 'sk-'"
        )));
    }
    Ok(Credential(cleaned.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_section_wins() {
        let store = SecretStore::parse(
            "OPENAI_API_KEY = \"sk-flat\"\n[openai]\napi_key = \"sk-nested\"\n",
        )
        .unwrap();
        let cred = resolve_credential(&store, Some("sk-entered")).unwrap();
        assert_eq!(cred.expose(), "sk-nested");
    }

    #[test]
    fn flat_entry_used_when_section_absent() {
        let store = SecretStore::parse("OPENAI_API_KEY = \" sk-flat \"\n").unwrap();
        let cred = resolve_credential(&store, None).unwrap();
        assert_eq!(cred.expose(), "sk-flat");
    }

    #[test]
    fn entered_key_is_last_resort() {
        let store = SecretStore::empty();
        let cred = resolve_credential(&store, Some("sk-entered")).unwrap();
        assert_eq!(cred.expose(), "sk-entered");
    }

    #[test]
    fn missing_everywhere() {
        let err = resolve_credential(&SecretStore::empty(), None).unwrap_err();
        assert!(matches!(err, CredentialError::Missing(_)));
    }

    #[test]
    fn bad_prefix_is_invalid() {
        let store = SecretStore::parse("[openai]\napi_key = \"key-123\"\n").unwrap();
        let err = resolve_credential(&store, None).unwrap_err();
        assert!(matches!(err, CredentialError::Invalid(_)));
    }

    #[test]
    fn keyless_section_does_not_fall_through() {
        let store = SecretStore::parse(
            "OPENAI_API_KEY = \"sk-flat\"\n[openai]\nmodel = \"whisper-1\"\n",
        )
        .unwrap();
        let err = resolve_credential(&store, Some("sk-entered")).unwrap_err();
        assert!(matches!(err, CredentialError::Missing(_)));
    }

    #[test]
    fn non_string_key_is_invalid() {
        let store = SecretStore::parse("[openai]\napi_key = 42\n").unwrap();
        let err = resolve_credential(&store, None).unwrap_err();
        assert!(matches!(err, CredentialError::Invalid(_)));
    }

    #[test]
    fn loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secrets.toml");
        fs::write(&path, "[openai]\napi_key = \"sk-ondisk\"\n").unwrap();

        let store = SecretStore::load(&path).unwrap();
        let cred = resolve_credential(&store, None).unwrap();
        assert_eq!(cred.expose(), "sk-ondisk");
    }

    #[test]
    fn unreadable_file_is_a_missing_credential() {
        let dir = tempfile::tempdir().unwrap();
        let err = SecretStore::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, CredentialError::Missing(_)));
    }

    #[test]
    fn debug_does_not_leak_the_key() {
        let store = SecretStore::parse("OPENAI_API_KEY = \"sk-secret123\"\n").unwrap();
        let cred = resolve_credential(&store, None).unwrap();
        assert!(!format!("{cred:?}").contains("secret123"));
    }
}
