//! Deployment configuration
//!
//! The resolved configuration is built from up to three layers, lowest
//! priority first: the embedded `config/default.yaml`, an optional user file,
//! and `--set` overrides. Once deserialized it is never mutated.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;
use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result};
use crate::values::{Values, parse_set_values};

/// Embedded default configuration
pub const DEFAULT_CONFIG: &str = include_str!("../config/default.yaml");

/// Fully resolved deployment configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentConfig {
    pub project: ProjectConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub artifacts: ArtifactsConfig,

    #[serde(default)]
    pub secrets: SecretsConfig,

    #[serde(default)]
    pub cloudformation: CloudFormationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
    pub environment: EnvironmentConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    pub name: String,
    pub region: String,
}

/// Logging section, consumed by the binaries when installing a subscriber
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing` filter directive (e.g. `info`, `kubestrap_provision=debug`)
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

/// Local inputs staged by the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactsConfig {
    /// Directory uploaded under the `scripts/` prefix
    #[serde(default = "default_scripts_dir")]
    pub scripts_dir: PathBuf,

    /// Directory uploaded under the `templates/` prefix; must contain `main.yaml`
    #[serde(default = "default_templates_dir")]
    pub templates_dir: PathBuf,

    /// Docker build context of the database bootstrap image
    #[serde(default = "default_image_context")]
    pub image_context: PathBuf,

    /// Where the cluster keypair is written (defaults to `~/.ssh`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_dir: Option<PathBuf>,
}

fn default_scripts_dir() -> PathBuf {
    PathBuf::from("scripts")
}

fn default_templates_dir() -> PathBuf {
    PathBuf::from("templates")
}

fn default_image_context() -> PathBuf {
    PathBuf::from("lambda/dbbootstrap")
}

impl ArtifactsConfig {
    fn expand_home(&mut self) {
        self.scripts_dir = expand_home(&self.scripts_dir);
        self.templates_dir = expand_home(&self.templates_dir);
        self.image_context = expand_home(&self.image_context);
        self.key_dir = self.key_dir.as_deref().map(expand_home);
    }
}

/// Replace a leading `~` component with the home directory
///
/// Paths without one, and `~` when no home directory is known, are kept as is.
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match dirs::home_dir() {
        Some(home) if rest.as_os_str().is_empty() => home,
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            scripts_dir: default_scripts_dir(),
            templates_dir: default_templates_dir(),
            image_context: default_image_context(),
            key_dir: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecretsConfig {
    /// Secret that receives the generated admin password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_password_id: Option<String>,
}

/// The `cloudformation` section, keyed the way CloudFormation names things
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CloudFormationConfig {
    #[serde(rename = "StackName", default, skip_serializing_if = "Option::is_none")]
    pub stack_name: Option<String>,

    /// Ignored at launch: the template URL is always derived from the artifact bucket
    #[serde(rename = "TemplateURL", default, skip_serializing_if = "Option::is_none")]
    pub template_url: Option<String>,

    #[serde(rename = "Parameters", default, deserialize_with = "null_as_default")]
    pub parameters: IndexMap<String, JsonValue>,

    #[serde(rename = "Capabilities", default, deserialize_with = "null_as_default")]
    pub capabilities: Vec<String>,

    /// Keys CloudFormation would not understand; reported and dropped
    #[serde(flatten, skip_serializing)]
    pub unknown: IndexMap<String, JsonValue>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl DeploymentConfig {
    /// Resolve configuration from defaults, an optional user file and `--set` overrides
    pub fn load(user_config: Option<&Path>, overrides: &[String]) -> Result<Self> {
        let mut values = Values::from_yaml(DEFAULT_CONFIG)?;

        if let Some(path) = user_config {
            tracing::debug!(path = %path.display(), "merging user configuration");
            values.merge(&Values::from_file(path)?);
        }

        if !overrides.is_empty() {
            values.merge(&parse_set_values(overrides)?);
        }

        Self::from_values(values)
    }

    /// Deserialize and validate a merged configuration tree
    pub fn from_values(values: Values) -> Result<Self> {
        let mut config: DeploymentConfig = serde_json::from_value(values.into_inner())
            .map_err(|e| CoreError::InvalidConfig {
                message: e.to_string(),
            })?;

        for key in config.cloudformation.unknown.keys() {
            tracing::warn!(key = %key, "ignoring invalid cloudformation config key");
        }

        config.artifacts.expand_home();
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        check_dns_label("project.name", &self.project.name)?;
        check_dns_label("project.environment.name", &self.project.environment.name)?;

        if self.project.environment.region.trim().is_empty() {
            return Err(CoreError::MissingField {
                field: "project.environment.region".to_string(),
            });
        }

        for (key, value) in &self.cloudformation.parameters {
            if value.is_object() || value.is_array() {
                return Err(CoreError::InvalidConfig {
                    message: format!("cloudformation parameter '{}' must be a scalar", key),
                });
            }
        }

        Ok(())
    }

    pub fn project_name(&self) -> &str {
        &self.project.name
    }

    pub fn environment_name(&self) -> &str {
        &self.project.environment.name
    }

    pub fn region(&self) -> &str {
        &self.project.environment.region
    }

    /// Configured stack name, or `<project>-<environment>`
    pub fn stack_name(&self) -> String {
        self.cloudformation
            .stack_name
            .clone()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| format!("{}-{}", self.project_name(), self.environment_name()))
    }

    /// Configured admin password secret id, or `<project>/<environment>/keycloak/admin-password`
    pub fn admin_password_secret_id(&self) -> String {
        self.secrets.admin_password_id.clone().unwrap_or_else(|| {
            format!(
                "{}/{}/keycloak/admin-password",
                self.project_name(),
                self.environment_name()
            )
        })
    }

    /// Render as YAML (used by `kubestrap config`)
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

/// Names end up inside S3 bucket names, so they are restricted to lowercase DNS labels
fn check_dns_label(field: &str, value: &str) -> Result<()> {
    let valid = !value.is_empty()
        && !value.starts_with('-')
        && !value.ends_with('-')
        && value
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');

    if valid {
        Ok(())
    } else {
        Err(CoreError::InvalidConfig {
            message: format!(
                "{} '{}' must be lowercase letters, digits and inner hyphens",
                field, value
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_load() {
        let config = DeploymentConfig::load(None, &[]).unwrap();

        assert_eq!(config.project_name(), "k8s");
        assert_eq!(config.environment_name(), "dev");
        assert_eq!(config.region(), "us-east-1");
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert_eq!(config.stack_name(), "k8s-dev");
        assert_eq!(config.cloudformation.capabilities.len(), 3);
        assert_eq!(config.artifacts.templates_dir, PathBuf::from("templates"));
    }

    #[test]
    fn test_user_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
project:
  name: acme
  environment:
    region: eu-west-1
cloudformation:
  StackName: acme-cluster
  Parameters:
    NodeCount: 3
    KeyPairName: acme
"#
        )
        .unwrap();

        let config = DeploymentConfig::load(Some(file.path()), &[]).unwrap();

        assert_eq!(config.project_name(), "acme");
        // untouched nested default survives
        assert_eq!(config.environment_name(), "dev");
        assert_eq!(config.region(), "eu-west-1");
        assert_eq!(config.stack_name(), "acme-cluster");
        let keys: Vec<_> = config.cloudformation.parameters.keys().collect();
        assert_eq!(keys, vec!["NodeCount", "KeyPairName"]);
    }

    #[test]
    fn test_set_overrides_win_over_file() {
        let config = DeploymentConfig::load(
            None,
            &["project.environment.name=prod".to_string()],
        )
        .unwrap();
        assert_eq!(config.environment_name(), "prod");
        assert_eq!(config.admin_password_secret_id(), "k8s/prod/keycloak/admin-password");
    }

    #[test]
    fn test_null_parameters_are_empty() {
        let values = Values::from_yaml(
            r#"
project:
  name: k8s
  environment: { name: dev, region: us-east-1 }
cloudformation:
  Parameters:
  Capabilities:
"#,
        )
        .unwrap();

        let config = DeploymentConfig::from_values(values).unwrap();
        assert!(config.cloudformation.parameters.is_empty());
        assert!(config.cloudformation.capabilities.is_empty());
    }

    #[test]
    fn test_unknown_cloudformation_keys_are_dropped() {
        let values = Values::from_yaml(
            r#"
project:
  name: k8s
  environment: { name: dev, region: us-east-1 }
cloudformation:
  OnFailure: DELETE
"#,
        )
        .unwrap();

        let config = DeploymentConfig::from_values(values).unwrap();
        assert!(config.cloudformation.unknown.contains_key("OnFailure"));
        assert!(!config.to_yaml().unwrap().contains("OnFailure"));
    }

    #[test]
    fn test_rejects_uppercase_project_name() {
        let err = DeploymentConfig::load(None, &["project.name=MyProject".to_string()]).unwrap_err();
        assert!(err.to_string().contains("project.name"));
    }

    #[test]
    fn test_rejects_nested_parameter_value() {
        let err = DeploymentConfig::load(
            None,
            &[r#"cloudformation.Parameters.Nested.Inner=1"#.to_string()],
        )
        .unwrap_err();
        assert!(err.to_string().contains("must be a scalar"));
    }

    #[test]
    fn test_artifact_paths_expand_home() {
        let home = dirs::home_dir().unwrap();
        let config = DeploymentConfig::load(
            None,
            &[
                "artifacts.key_dir=~/.ssh".to_string(),
                "artifacts.scripts_dir=~/cluster/scripts".to_string(),
            ],
        )
        .unwrap();

        assert_eq!(config.artifacts.key_dir, Some(home.join(".ssh")));
        assert_eq!(config.artifacts.scripts_dir, home.join("cluster/scripts"));
        assert_eq!(config.artifacts.templates_dir, PathBuf::from("templates"));
    }

    #[test]
    fn test_expand_home_only_touches_leading_tilde() {
        let home = dirs::home_dir().unwrap();

        assert_eq!(expand_home(Path::new("~")), home);
        assert_eq!(expand_home(Path::new("/srv/~/keys")), PathBuf::from("/srv/~/keys"));
        assert_eq!(expand_home(Path::new("~other/keys")), PathBuf::from("~other/keys"));
        assert_eq!(expand_home(Path::new("relative/dir")), PathBuf::from("relative/dir"));
    }

    #[test]
    fn test_missing_project_section() {
        let values = Values::from_yaml("logging: { level: debug }").unwrap();
        assert!(DeploymentConfig::from_values(values).is_err());
    }
}
