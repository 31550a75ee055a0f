use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::field_mapping::FieldMapping;
use crate::ConfigError;

/// One monitored source identity and the destination collection it mirrors into.
#[derive(Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub display_name: String,
    /// Source-platform bearer credential. May be empty when a credential was
    /// installed into the state store with `threadnote token install`.
    #[serde(default)]
    pub source_credential: String,
    pub destination_collection_id: String,
    /// Per-account destination credential; falls back to `NOTION_TOKEN`.
    #[serde(default)]
    pub destination_credential: Option<String>,
    /// Explicit role → field override. Skips schema auto-detection.
    #[serde(default)]
    pub field_mapping: Option<FieldMapping>,
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("source_credential", &"[redacted]")
            .field("destination_collection_id", &self.destination_collection_id)
            .field(
                "destination_credential",
                &self.destination_credential.as_ref().map(|_| "[redacted]"),
            )
            .field("field_mapping", &self.field_mapping)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
pub struct AccountsFile {
    pub accounts: Vec<Account>,
}

/// Load and validate the accounts configuration from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_accounts(path: &Path) -> Result<AccountsFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::AccountsFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_accounts(&content)
}

/// Parse and validate accounts YAML already in memory.
///
/// # Errors
///
/// Returns `ConfigError` if the YAML is malformed or fails validation.
pub fn parse_accounts(content: &str) -> Result<AccountsFile, ConfigError> {
    let accounts_file: AccountsFile = serde_yaml::from_str(content)?;
    validate_accounts(&accounts_file)?;
    Ok(accounts_file)
}

fn validate_accounts(accounts_file: &AccountsFile) -> Result<(), ConfigError> {
    if accounts_file.accounts.is_empty() {
        return Err(ConfigError::Validation(
            "at least one account must be configured".to_string(),
        ));
    }

    let mut seen_ids = HashSet::new();

    for account in &accounts_file.accounts {
        let id = account.id.trim();
        if id.is_empty() {
            return Err(ConfigError::Validation(
                "account id must be non-empty".to_string(),
            ));
        }

        if id.chars().any(char::is_whitespace) || id != account.id {
            return Err(ConfigError::Validation(format!(
                "account id '{}' must not contain whitespace",
                account.id
            )));
        }

        if account.destination_collection_id.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "account '{}' has no destination_collection_id",
                account.id
            )));
        }

        if !seen_ids.insert(id.to_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "duplicate account id: '{}'",
                account.id
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::field_mapping::Role;

    const VALID: &str = r"
accounts:
  - id: main
    display_name: Main account
    source_credential: THQVJ-main
    destination_collection_id: 0f9c2b7e
  - id: studio
    display_name: Studio
    source_credential: THQVJ-studio
    destination_collection_id: 44aa10c3
    destination_credential: secret_studio
    field_mapping:
      title: Name
      views: Views
";

    #[test]
    fn parses_valid_accounts() {
        let file = parse_accounts(VALID).expect("valid accounts should parse");
        assert_eq!(file.accounts.len(), 2);
        assert_eq!(file.accounts[0].id, "main");
        assert!(file.accounts[0].destination_credential.is_none());
        assert!(file.accounts[0].field_mapping.is_none());
        let mapping = file.accounts[1].field_mapping.as_ref().unwrap();
        assert_eq!(mapping.get(Role::Views), Some("Views"));
    }

    #[test]
    fn rejects_duplicate_ids_case_insensitively() {
        let yaml = r"
accounts:
  - id: main
    display_name: A
    destination_collection_id: one
  - id: MAIN
    display_name: B
    destination_collection_id: two
";
        let err = parse_accounts(yaml).unwrap_err();
        assert!(
            matches!(err, ConfigError::Validation(ref m) if m.contains("duplicate")),
            "got: {err:?}"
        );
    }

    #[test]
    fn rejects_missing_collection_id() {
        let yaml = r"
accounts:
  - id: main
    display_name: A
    destination_collection_id: '  '
";
        let err = parse_accounts(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref m) if m.contains("destination_collection_id")));
    }

    #[test]
    fn rejects_whitespace_in_id() {
        let yaml = r"
accounts:
  - id: my account
    display_name: A
    destination_collection_id: one
";
        assert!(matches!(
            parse_accounts(yaml),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn rejects_empty_account_list() {
        assert!(matches!(
            parse_accounts("accounts: []"),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn load_accounts_reports_io_error_with_path() {
        let err = load_accounts(Path::new("/definitely/not/here.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::AccountsFileIo { ref path, .. } if path.contains("not/here")));
    }

    #[test]
    fn load_accounts_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(VALID.as_bytes()).unwrap();
        let loaded = load_accounts(file.path()).unwrap();
        assert_eq!(loaded.accounts[1].display_name, "Studio");
    }

    #[test]
    fn debug_output_redacts_credentials() {
        let file = parse_accounts(VALID).unwrap();
        let rendered = format!("{:?}", file.accounts[1]);
        assert!(!rendered.contains("THQVJ-studio"));
        assert!(!rendered.contains("secret_studio"));
    }
}
