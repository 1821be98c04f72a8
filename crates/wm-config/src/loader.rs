//! YAML loader for the module configuration
//!
//! Supported tags:
//! - `!include path` - Include another YAML file (e.g. a shared channel list)
//! - `!include_dir_merge_list dir` - Concatenate the lists of all YAML files in a directory
//!   (e.g. one trigger-list file per floor)
//! - `!secret key` - Substitute from secrets.yaml
//! - `!env_var VAR` - Environment variable substitution

use crate::error::{ConfigError, ConfigResult};
use crate::secrets::Secrets;
use serde_yaml::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// YAML loader resolving the configuration tags
pub struct YamlLoader {
    config_dir: PathBuf,
    secrets: Secrets,
    /// Files currently being loaded, for cycle detection
    include_stack: HashSet<PathBuf>,
}

impl YamlLoader {
    pub fn new(config_dir: impl Into<PathBuf>) -> ConfigResult<Self> {
        let config_dir = config_dir.into();
        let secrets = Secrets::load(&config_dir)?;
        Ok(Self::with_secrets(config_dir, secrets))
    }

    pub fn with_secrets(config_dir: impl Into<PathBuf>, secrets: Secrets) -> Self {
        Self {
            config_dir: config_dir.into(),
            secrets,
            include_stack: HashSet::new(),
        }
    }

    /// Load and process a YAML file
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> ConfigResult<Value> {
        let path = self.resolve_path(path.as_ref());
        debug!(path = ?path, "Loading YAML file");

        if self.include_stack.contains(&path) {
            return Err(ConfigError::CircularInclude { path });
        }

        let content = fs::read_to_string(&path).map_err(|e| ConfigError::ReadFile {
            path: path.clone(),
            source: e,
        })?;

        self.include_stack.insert(path.clone());
        let result = self.load_string(&content, &path);
        self.include_stack.remove(&path);
        result
    }

    /// Load and process YAML from a string
    pub fn load_string(&mut self, content: &str, source_path: &Path) -> ConfigResult<Value> {
        let value: Value = serde_yaml::from_str(content).map_err(|e| ConfigError::ParseYaml {
            path: source_path.to_path_buf(),
            source: e,
        })?;
        self.process_value(value, source_path)
    }

    fn process_value(&mut self, value: Value, source_path: &Path) -> ConfigResult<Value> {
        match value {
            Value::Tagged(tagged) => self.process_tagged(*tagged, source_path),
            Value::Mapping(map) => {
                let mut result = serde_yaml::Mapping::new();
                for (k, v) in map {
                    let v = self.process_value(v, source_path)?;
                    result.insert(k, v);
                }
                Ok(Value::Mapping(result))
            }
            Value::Sequence(seq) => seq
                .into_iter()
                .map(|v| self.process_value(v, source_path))
                .collect::<ConfigResult<Vec<_>>>()
                .map(Value::Sequence),
            other => Ok(other),
        }
    }

    fn process_tagged(
        &mut self,
        tagged: serde_yaml::value::TaggedValue,
        source_path: &Path,
    ) -> ConfigResult<Value> {
        let tag = tagged.tag.to_string();
        trace!(tag = %tag, "Processing tag");

        match tag.as_str() {
            "!include" => {
                let path = self.value_to_path(&tagged.value, source_path)?;
                self.load_file(&path)
            }
            "!include_dir_merge_list" => {
                let dir = self.value_to_path(&tagged.value, source_path)?;
                self.merge_list_dir(&dir)
            }
            "!secret" => {
                let key = expect_string(tagged.value, "!secret")?;
                Ok(Value::String(self.secrets.get(&key)?.to_string()))
            }
            "!env_var" => {
                let var = expect_string(tagged.value, "!env_var")?;
                let value = std::env::var(&var)
                    .map_err(|_| ConfigError::EnvVarNotFound { var: var.clone() })?;
                Ok(Value::String(value))
            }
            // Unknown tags are dropped, the inner value is kept
            _ => self.process_value(tagged.value, source_path),
        }
    }

    fn merge_list_dir(&mut self, dir: &Path) -> ConfigResult<Value> {
        if !dir.is_dir() {
            return Err(ConfigError::DirectoryNotFound {
                path: dir.to_path_buf(),
            });
        }

        let mut files: Vec<PathBuf> = fs::read_dir(dir)
            .map_err(|e| ConfigError::ReadFile {
                path: dir.to_path_buf(),
                source: e,
            })?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
            .collect();
        files.sort();

        let mut merged = Vec::new();
        for file in files {
            match self.load_file(&file)? {
                Value::Sequence(items) => merged.extend(items),
                Value::Null => {}
                other => merged.push(other),
            }
        }
        Ok(Value::Sequence(merged))
    }

    /// Resolve a tag argument relative to the including file
    fn value_to_path(&self, value: &Value, source_path: &Path) -> ConfigResult<PathBuf> {
        let Value::String(raw) = value else {
            return Err(ConfigError::InvalidIncludePath {
                path: format!("{:?}", value),
                reason: "path must be a string".to_string(),
            });
        };
        let path = Path::new(raw);
        if path.is_absolute() {
            return Ok(path.to_path_buf());
        }
        let base = source_path.parent().unwrap_or(&self.config_dir);
        Ok(base.join(path))
    }

    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.config_dir.join(path)
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }
}

fn expect_string(value: Value, tag: &str) -> ConfigResult<String> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(ConfigError::InvalidValue {
            key: tag.to_string(),
            reason: format!("expected a string, got {:?}", other),
        }),
    }
}

/// Load a YAML file with tag processing
pub fn load_yaml(config_dir: impl Into<PathBuf>, file: impl AsRef<Path>) -> ConfigResult<Value> {
    YamlLoader::new(config_dir)?.load_file(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_file(dir: &Path, name: &str, content: &str) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    fn get<'a>(value: &'a Value, key: &str) -> &'a Value {
        value.get(key).unwrap()
    }

    #[test]
    fn test_include() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "channels.yaml", "- Use: true\n  ID: 12345\n");
        write_file(dir.path(), "warnmelder.yaml", "NotificationAlarm: !include channels.yaml\n");

        let value = load_yaml(dir.path(), "warnmelder.yaml").unwrap();
        assert_eq!(get(&value, "NotificationAlarm").as_sequence().unwrap().len(), 1);
    }

    #[test]
    fn test_include_dir_merge_list() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "triggers/eg.yaml", "- Designation: Flur\n- Designation: Kueche\n");
        write_file(dir.path(), "triggers/og.yaml", "- Designation: Bad\n");
        write_file(dir.path(), "warnmelder.yaml", "TriggerList: !include_dir_merge_list triggers\n");

        let value = load_yaml(dir.path(), "warnmelder.yaml").unwrap();
        assert_eq!(get(&value, "TriggerList").as_sequence().unwrap().len(), 3);
    }

    #[test]
    fn test_secret_and_env_var() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "secrets.yaml", "subject: Alarm Haus\n");
        std::env::set_var("WM_TEST_STATUS_TEXT", "Störung");
        write_file(
            dir.path(),
            "warnmelder.yaml",
            "Subject: !secret subject\nStatusTextAlarm: !env_var WM_TEST_STATUS_TEXT\n",
        );

        let value = load_yaml(dir.path(), "warnmelder.yaml").unwrap();
        assert_eq!(get(&value, "Subject").as_str(), Some("Alarm Haus"));
        assert_eq!(get(&value, "StatusTextAlarm").as_str(), Some("Störung"));
        std::env::remove_var("WM_TEST_STATUS_TEXT");
    }

    #[test]
    fn test_missing_env_var() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "warnmelder.yaml", "Note: !env_var WM_TEST_NOT_SET_ANYWHERE\n");
        assert!(matches!(
            load_yaml(dir.path(), "warnmelder.yaml"),
            Err(ConfigError::EnvVarNotFound { .. })
        ));
    }

    #[test]
    fn test_circular_include_detection() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "a.yaml", "b: !include b.yaml\n");
        write_file(dir.path(), "b.yaml", "a: !include a.yaml\n");
        assert!(matches!(
            load_yaml(dir.path(), "a.yaml"),
            Err(ConfigError::CircularInclude { .. })
        ));
    }
}
