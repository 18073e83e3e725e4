use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use super::{FeatureId, ProviderId};

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to write model settings: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode model settings: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Provider choice for one feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureRoute {
    pub provider: ProviderId,
}

impl Default for FeatureRoute {
    fn default() -> Self {
        Self {
            provider: ProviderId::Gemini,
        }
    }
}

/// Feature → provider routing table. Every feature is always present.
///
/// Unknown keys in stored files (older builds kept a `masterData` entry) are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(rename = "jobDescription")]
    pub job_description: FeatureRoute,
    #[serde(rename = "generateCV")]
    pub generate_cv: FeatureRoute,
    #[serde(rename = "jobHunt")]
    pub job_hunt: FeatureRoute,
    #[serde(rename = "jobTracker")]
    pub job_tracker: FeatureRoute,
}

impl ProviderSettings {
    pub fn provider_for(&self, feature: FeatureId) -> ProviderId {
        let route = match feature {
            FeatureId::JobDescription => &self.job_description,
            FeatureId::GenerateCv => &self.generate_cv,
            FeatureId::JobHunt => &self.job_hunt,
            FeatureId::JobTracker => &self.job_tracker,
        };
        route.provider
    }
}

/// Loads the routing table from disk.
///
/// A missing file yields the defaults, which are written back so the file
/// exists for the next edit. An unreadable or malformed file also yields the
/// defaults but is left untouched.
pub async fn load_settings(path: &Path) -> ProviderSettings {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let defaults = ProviderSettings::default();
            match save_settings(path, &defaults).await {
                Ok(()) => info!("Created default model settings at {}", path.display()),
                Err(e) => warn!("Could not write default model settings: {e}"),
            }
            return defaults;
        }
        Err(e) => {
            warn!("Could not read model settings from {}: {e}", path.display());
            return ProviderSettings::default();
        }
    };

    match serde_json::from_str::<ProviderSettings>(&raw) {
        Ok(settings) => settings,
        Err(e) => {
            warn!("Invalid model settings in {}, using defaults: {e}", path.display());
            ProviderSettings::default()
        }
    }
}

pub async fn save_settings(path: &Path, settings: &ProviderSettings) -> Result<(), SettingsError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    let json = serde_json::to_string_pretty(settings)?;
    tokio::fs::write(path, json).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_route_everything_to_gemini() {
        let settings = ProviderSettings::default();
        for feature in [
            FeatureId::JobDescription,
            FeatureId::GenerateCv,
            FeatureId::JobHunt,
            FeatureId::JobTracker,
        ] {
            assert_eq!(settings.provider_for(feature), ProviderId::Gemini);
        }
    }

    #[test]
    fn test_legacy_keys_are_ignored() {
        let raw = r#"{
            "jobDescription": {"provider": "local"},
            "generateCV": {"provider": "openrouter"},
            "jobHunt": {"provider": "gemini"},
            "jobTracker": {"provider": "anthropic"},
            "masterData": {"provider": "gemini"}
        }"#;
        let settings: ProviderSettings = serde_json::from_str(raw).unwrap();
        assert_eq!(settings.job_description.provider, ProviderId::Local);
        assert_eq!(settings.generate_cv.provider, ProviderId::OpenRouter);
        assert_eq!(settings.job_tracker.provider, ProviderId::Anthropic);
    }

    #[test]
    fn test_unknown_provider_is_rejected() {
        let raw = r#"{
            "jobDescription": {"provider": "mystery"},
            "generateCV": {"provider": "gemini"},
            "jobHunt": {"provider": "gemini"},
            "jobTracker": {"provider": "gemini"}
        }"#;
        assert!(serde_json::from_str::<ProviderSettings>(raw).is_err());
    }

    #[tokio::test]
    async fn test_load_missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("model-settings.json");

        let settings = load_settings(&path).await;
        assert_eq!(settings, ProviderSettings::default());
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_load_invalid_file_falls_back_without_overwriting() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model-settings.json");
        tokio::fs::write(&path, "{ not json").await.unwrap();

        let settings = load_settings(&path).await;
        assert_eq!(settings, ProviderSettings::default());
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "{ not json");
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model-settings.json");

        let mut settings = ProviderSettings::default();
        settings.generate_cv.provider = ProviderId::Local;
        save_settings(&path, &settings).await.unwrap();

        assert_eq!(load_settings(&path).await, settings);
    }
}
