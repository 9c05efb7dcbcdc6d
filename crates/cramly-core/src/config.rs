// Configuration loading and parsing (cramly.toml, credentials.toml).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub backend: BackendConfig,
    pub ai: AiConfig,
    pub editor: EditorConfig,
    pub credentials: CredentialsConfig,
    pub db_path: PathBuf,
    pub export_dir: PathBuf,
}

impl Config {
    /// Project URL and anon key of the hosted backend, when hosted mode is
    /// selected and both are present.
    pub fn hosted_backend(&self) -> Option<(&str, &str)> {
        if self.backend.mode != BackendMode::Hosted {
            return None;
        }
        let url = self.backend.url.as_deref().filter(|u| !u.is_empty())?;
        let key = self
            .credentials
            .supabase_anon_key
            .as_deref()
            .filter(|k| !k.is_empty())?;
        Some((url, key))
    }
}

// ---------------------------------------------------------------------------
// cramly.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire cramly.toml file.
#[derive(Debug, Clone, Deserialize)]
struct CramlyFile {
    backend: BackendConfig,
    #[serde(default)]
    database: DatabaseSection,
    ai: AiConfig,
    editor: EditorConfig,
    #[serde(default)]
    export: ExportSection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendMode {
    Hosted,
    Local,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    pub mode: BackendMode,
    #[serde(default)]
    pub url: Option<String>,
    pub redirect_url: String,
    #[serde(default = "default_local_user_name")]
    pub local_user_name: String,
}

fn default_local_user_name() -> String {
    "Student".to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
struct DatabaseSection {
    path: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ExportSection {
    dir: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AiConfig {
    /// Chat-completion URL. Empty disables AI features.
    pub endpoint: String,
    /// Sent as `model` when set; the default endpoint picks its own.
    #[serde(default)]
    pub model: Option<String>,
    pub default_flashcard_count: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EditorConfig {
    pub autosave_interval_secs: u64,
    pub change_debounce_ms: u64,
}

impl EditorConfig {
    pub fn autosave_interval(&self) -> Duration {
        Duration::from_secs(self.autosave_interval_secs)
    }

    pub fn change_debounce(&self) -> Duration {
        Duration::from_millis(self.change_debounce_ms)
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        EditorConfig {
            autosave_interval_secs: 20,
            change_debounce_ms: 300,
        }
    }
}

// ---------------------------------------------------------------------------
// credentials.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CredentialsConfig {
    pub supabase_anon_key: Option<String>,
    pub ai_api_key: Option<String>,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/cramly.toml` and
/// (optionally) `config/credentials.toml`, both relative to `base_dir`.
///
/// Does not seed missing files; `load_config` does.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    // --- cramly.toml (required) ---
    let main_path = config_dir.join("cramly.toml");
    let main_text = read_file(&main_path)?;
    let file: CramlyFile = toml::from_str(&main_text).map_err(|e| ConfigError::ParseError {
        path: main_path.clone(),
        source: e,
    })?;

    // Keys live in an optional, untracked file
    let keys_path = config_dir.join("credentials.toml");
    let credentials: CredentialsConfig = if keys_path.exists() {
        let text = read_file(&keys_path)?;
        toml::from_str(&text).map_err(|e| ConfigError::ParseError {
            path: keys_path.clone(),
            source: e,
        })?
    } else {
        CredentialsConfig::default()
    };

    let db_path = match file.database.path {
        Some(p) => base_dir.join(p),
        None => default_data_dir()?.join("cramly.db"),
    };
    let export_dir = match file.export.dir {
        Some(d) => base_dir.join(d),
        None => default_export_dir(base_dir),
    };

    let config = Config {
        backend: file.backend,
        ai: file.ai,
        editor: file.editor,
        credentials,
        db_path,
        export_dir,
    };

    validate(&config)?;

    Ok(config)
}

/// Seed `config/` from `defaults/`: every default file without a
/// counterpart in `config/` is copied over, `*.example` templates excepted.
/// Existing files are never touched. Returns the paths that were created.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.is_dir() {
        if config_dir.is_dir() {
            return Ok(Vec::new());
        }
        return Err(copy_error(format!(
            "no defaults/ or config/ directory under {}; start cramly from the project root",
            base_dir.display()
        )));
    }

    std::fs::create_dir_all(&config_dir)
        .map_err(|e| copy_error(format!("cannot create {}: {e}", config_dir.display())))?;

    let entries = std::fs::read_dir(&defaults_dir)
        .map_err(|e| copy_error(format!("cannot list {}: {e}", defaults_dir.display())))?;

    let mut created = Vec::new();
    for entry in entries {
        let source = entry
            .map_err(|e| copy_error(format!("cannot list {}: {e}", defaults_dir.display())))?
            .path();
        let Some(name) = source.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !source.is_file() || name.ends_with(".example") {
            continue;
        }

        let target = config_dir.join(name);
        if copy_if_missing(&source, &target)? {
            created.push(target);
        }
    }

    Ok(created)
}

/// Copy `source` to `target` unless `target` already exists. `create_new`
/// keeps a concurrently created file intact.
fn copy_if_missing(source: &Path, target: &Path) -> Result<bool, ConfigError> {
    use std::io::Write;

    let mut dest = match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(target)
    {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(copy_error(format!("cannot create {}: {e}", target.display()))),
    };

    let bytes = std::fs::read(source)
        .map_err(|e| copy_error(format!("cannot read {}: {e}", source.display())))?;
    dest.write_all(&bytes)
        .map_err(|e| copy_error(format!("cannot write {}: {e}", target.display())))?;
    Ok(true)
}

fn copy_error(message: String) -> ConfigError {
    ConfigError::DefaultsCopyError { message }
}

/// Load configuration from the working directory, seeding `config/` from
/// `defaults/` first.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
    load_config_from(&cwd)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

fn default_data_dir() -> Result<PathBuf, ConfigError> {
    directories::ProjectDirs::from("app", "cramly", "cramly")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| ConfigError::ValidationError {
            field: "database.path".into(),
            message: "no path set and the platform data directory is unknown".into(),
        })
}

fn default_export_dir(base_dir: &Path) -> PathBuf {
    directories::UserDirs::new()
        .and_then(|dirs| dirs.document_dir().map(|d| d.join("Cramly")))
        .unwrap_or_else(|| base_dir.join("exports"))
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Largest number of cards a single generation request may ask for.
pub const MAX_FLASHCARD_COUNT: u32 = 20;

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.editor.autosave_interval_secs == 0 {
        return Err(ConfigError::ValidationError {
            field: "editor.autosave_interval_secs".into(),
            message: "must be greater than 0".into(),
        });
    }

    if config.editor.change_debounce_ms == 0 {
        return Err(ConfigError::ValidationError {
            field: "editor.change_debounce_ms".into(),
            message: "must be greater than 0".into(),
        });
    }

    let count = config.ai.default_flashcard_count;
    if !(1..=MAX_FLASHCARD_COUNT).contains(&count) {
        return Err(ConfigError::ValidationError {
            field: "ai.default_flashcard_count".into(),
            message: format!("must be between 1 and {MAX_FLASHCARD_COUNT}, got {count}"),
        });
    }

    let urls: &[(&str, Option<&str>)] = &[
        ("ai.endpoint", Some(config.ai.endpoint.as_str())),
        ("backend.url", config.backend.url.as_deref()),
        ("backend.redirect_url", Some(config.backend.redirect_url.as_str())),
    ];
    for (field, value) in urls {
        let Some(value) = value.filter(|v| !v.is_empty()) else {
            continue;
        };
        if let Err(e) = url::Url::parse(value) {
            return Err(ConfigError::ValidationError {
                field: field.to_string(),
                message: format!("not a valid URL ({e}): {value}"),
            });
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    /// Helper: the workspace root, where `defaults/` lives.
    fn project_root() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../..")
    }

    /// Helper: a temp dir whose `config/` holds the shipped defaults.
    fn temp_with_defaults() -> tempfile::TempDir {
        let tmp = tempfile::tempdir().unwrap();
        let config_dir = tmp.path().join("config");
        fs::create_dir_all(&config_dir).unwrap();
        fs::copy(
            project_root().join("defaults/cramly.toml"),
            config_dir.join("cramly.toml"),
        )
        .unwrap();
        tmp
    }

    /// Helper: rewrite one `key = value` line of config/cramly.toml.
    fn patch_main(tmp: &tempfile::TempDir, key: &str, value: &str) {
        let path = tmp.path().join("config/cramly.toml");
        let text = fs::read_to_string(&path).unwrap();
        let patched: Vec<String> = text
            .lines()
            .map(|line| {
                if line.trim_start().starts_with(&format!("{key} =")) {
                    format!("{key} = {value}")
                } else {
                    line.to_string()
                }
            })
            .collect();
        fs::write(&path, patched.join("\n")).unwrap();
    }

    #[test]
    fn load_valid_config_from_shipped_defaults() {
        let tmp = temp_with_defaults();
        let config = load_config_from(tmp.path()).expect("should load valid config");

        assert_eq!(config.backend.mode, BackendMode::Local);
        assert_eq!(config.backend.redirect_url, "http://localhost:3000/auth");
        assert_eq!(config.backend.local_user_name, "Student");
        assert_eq!(config.ai.endpoint, "https://ai.hackclub.com/chat/completions");
        assert_eq!(config.ai.default_flashcard_count, 5);
        assert!(config.ai.model.is_none());
        assert_eq!(config.editor.autosave_interval(), Duration::from_secs(20));
        assert_eq!(config.editor.change_debounce(), Duration::from_millis(300));
        assert_eq!(config.db_path, tmp.path().join("cramly.db"));
        assert_eq!(config.export_dir, tmp.path().join("exports"));
    }

    #[test]
    fn missing_credentials_toml_is_ok() {
        let tmp = temp_with_defaults();
        let config = load_config_from(tmp.path()).expect("should load without credentials.toml");
        assert!(config.credentials.supabase_anon_key.is_none());
        assert!(config.credentials.ai_api_key.is_none());
    }

    #[test]
    fn hosted_backend_needs_url_and_key() {
        let tmp = temp_with_defaults();
        patch_main(&tmp, "mode", "\"hosted\"");
        let config = load_config_from(tmp.path()).unwrap();
        assert!(config.hosted_backend().is_none(), "empty url means unconfigured");

        patch_main(&tmp, "url", "\"https://example.supabase.co\"");
        let config = load_config_from(tmp.path()).unwrap();
        assert!(config.hosted_backend().is_none(), "no anon key yet");

        fs::write(
            tmp.path().join("config/credentials.toml"),
            "supabase_anon_key = \"anon-123\"\n",
        )
        .unwrap();
        let config = load_config_from(tmp.path()).unwrap();
        assert_eq!(
            config.hosted_backend(),
            Some(("https://example.supabase.co", "anon-123"))
        );
    }

    #[test]
    fn local_mode_ignores_hosted_settings() {
        let tmp = temp_with_defaults();
        patch_main(&tmp, "url", "\"https://example.supabase.co\"");
        fs::write(
            tmp.path().join("config/credentials.toml"),
            "supabase_anon_key = \"anon-123\"\n",
        )
        .unwrap();
        let config = load_config_from(tmp.path()).unwrap();
        assert!(config.hosted_backend().is_none());
    }

    #[test]
    fn rejects_zero_autosave_interval() {
        let tmp = temp_with_defaults();
        patch_main(&tmp, "autosave_interval_secs", "0");
        match load_config_from(tmp.path()).unwrap_err() {
            ConfigError::ValidationError { field, .. } => {
                assert_eq!(field, "editor.autosave_interval_secs");
            }
            other => panic!("expected ValidationError, got: {other}"),
        }
    }

    #[test]
    fn rejects_flashcard_count_out_of_range() {
        let tmp = temp_with_defaults();
        patch_main(&tmp, "default_flashcard_count", "21");
        match load_config_from(tmp.path()).unwrap_err() {
            ConfigError::ValidationError { field, message } => {
                assert_eq!(field, "ai.default_flashcard_count");
                assert!(message.contains("got 21"));
            }
            other => panic!("expected ValidationError, got: {other}"),
        }
    }

    #[test]
    fn rejects_unparsable_backend_url() {
        let tmp = temp_with_defaults();
        patch_main(&tmp, "url", "\"not a url\"");
        match load_config_from(tmp.path()).unwrap_err() {
            ConfigError::ValidationError { field, .. } => assert_eq!(field, "backend.url"),
            other => panic!("expected ValidationError, got: {other}"),
        }
    }

    #[test]
    fn unknown_backend_mode_is_a_parse_error() {
        let tmp = temp_with_defaults();
        patch_main(&tmp, "mode", "\"cloud\"");
        assert!(matches!(
            load_config_from(tmp.path()).unwrap_err(),
            ConfigError::ParseError { .. }
        ));
    }

    #[test]
    fn file_not_found_for_missing_cramly_toml() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("config")).unwrap();
        match load_config_from(tmp.path()).unwrap_err() {
            ConfigError::FileNotFound { path } => assert!(path.ends_with("cramly.toml")),
            other => panic!("expected FileNotFound, got: {other}"),
        }
    }

    #[test]
    fn seeding_copies_defaults_but_not_examples() {
        let tmp = tempfile::tempdir().unwrap();
        let defaults_dir = tmp.path().join("defaults");
        fs::create_dir_all(&defaults_dir).unwrap();
        fs::copy(
            project_root().join("defaults/cramly.toml"),
            defaults_dir.join("cramly.toml"),
        )
        .unwrap();
        fs::write(
            defaults_dir.join("credentials.toml.example"),
            "supabase_anon_key = \"...\"\n",
        )
        .unwrap();

        let created = ensure_config_files(tmp.path()).expect("should succeed");
        assert_eq!(created, vec![tmp.path().join("config/cramly.toml")]);
        assert!(tmp.path().join("config/cramly.toml").exists());
        assert!(!tmp.path().join("config/credentials.toml.example").exists());
    }

    #[test]
    fn seeding_keeps_user_edited_config() {
        let tmp = tempfile::tempdir().unwrap();
        let defaults_dir = tmp.path().join("defaults");
        let config_dir = tmp.path().join("config");
        fs::create_dir_all(&defaults_dir).unwrap();
        fs::create_dir_all(&config_dir).unwrap();
        fs::copy(
            project_root().join("defaults/cramly.toml"),
            defaults_dir.join("cramly.toml"),
        )
        .unwrap();
        fs::write(config_dir.join("cramly.toml"), "# custom\n").unwrap();

        assert!(ensure_config_files(tmp.path()).expect("should succeed").is_empty());
        let content = fs::read_to_string(config_dir.join("cramly.toml")).unwrap();
        assert_eq!(content, "# custom\n");
    }

    #[test]
    fn seeding_fails_outside_project_root() {
        let tmp = tempfile::tempdir().unwrap();
        match ensure_config_files(tmp.path()).unwrap_err() {
            ConfigError::DefaultsCopyError { message } => {
                assert!(message.contains("no defaults/ or config/"));
            }
            other => panic!("expected DefaultsCopyError, got: {other}"),
        }
    }
}
