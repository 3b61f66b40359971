// SettingsService - layered loading of resolver settings

use crate::{FileFormat, ResolverSettings, Result, SettingsManager, ENV_PREFIX};

/// Loaded, validated settings plus the raw layers they came from
#[derive(Clone)]
pub struct SettingsService {
    manager: SettingsManager,
    settings: ResolverSettings,
}

impl SettingsService {
    /// Builder for creating a configured service
    pub fn builder() -> SettingsServiceBuilder {
        SettingsServiceBuilder::new()
    }

    /// Validated resolver settings
    pub fn settings(&self) -> &ResolverSettings {
        &self.settings
    }

    /// Consume the service, keeping only the settings
    pub fn into_settings(self) -> ResolverSettings {
        self.settings
    }

    /// Get underlying manager
    pub fn manager(&self) -> &SettingsManager {
        &self.manager
    }
}

/// Builder for [`SettingsService`].
///
/// Layers apply in a fixed order regardless of call order: files first,
/// then `.env`, then the process environment, so deployment-time variables
/// win over checked-in files.
pub struct SettingsServiceBuilder {
    manager: SettingsManager,
    load_env: bool,
    load_dotenv: bool,
    dotenv_path: Option<String>,
    files: Vec<(String, FileFormat)>,
}

impl SettingsServiceBuilder {
    pub fn new() -> Self {
        Self {
            manager: SettingsManager::with_prefix(ENV_PREFIX),
            load_env: false,
            load_dotenv: false,
            dotenv_path: None,
            files: Vec::new(),
        }
    }

    /// Override the `REFORGE` environment prefix
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.manager = SettingsManager::with_prefix(prefix);
        self
    }

    /// Enable loading from environment variables
    pub fn load_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    /// Enable loading from a .env file
    pub fn load_dotenv(mut self, path: Option<String>) -> Self {
        self.load_dotenv = true;
        self.dotenv_path = path;
        self
    }

    /// Add a settings file to load
    pub fn add_file(mut self, path: impl Into<String>, format: FileFormat) -> Self {
        self.files.push((path.into(), format));
        self
    }

    /// Load every layer and validate the result
    pub fn build(self) -> Result<SettingsService> {
        for (path, format) in &self.files {
            self.manager.load_file(path, *format)?;
        }

        if self.load_dotenv {
            self.manager.load_dotenv(self.dotenv_path.as_deref())?;
        } else if self.load_env {
            self.manager.load_env()?;
        }

        let settings = self.manager.resolver_settings()?;
        reforge_log::debug!(
            "resolver settings loaded: project_env_id={} namespace={:?} on_no_default={}",
            settings.project_env_id,
            settings.namespace,
            settings.on_no_default
        );

        Ok(SettingsService {
            manager: self.manager,
            settings,
        })
    }
}

impl Default for SettingsServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OnNoDefault;

    #[test]
    fn test_build_without_layers_uses_defaults() {
        let service = SettingsService::builder().build().unwrap();
        assert_eq!(service.settings(), &ResolverSettings::default());
    }

    #[test]
    fn test_missing_file_is_load_error() {
        let result = SettingsService::builder()
            .add_file("/definitely/not/here.json", FileFormat::Json)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_into_settings() {
        let settings = SettingsService::builder().build().unwrap().into_settings();
        assert_eq!(settings.on_no_default, OnNoDefault::Error);
    }
}
