//! Application registry
//!
//! Declares the hosted applications the kernel can launch, the
//! capabilities each one expects to ask for, and which files it opens.

use std::collections::BTreeSet;

use ncos_perm::Capability;
use serde::{Deserialize, Serialize};

/// Ids of the built-in applications
pub const FACTORY_APP_IDS: [&str; 8] = [
    "terminal", "calc", "settings", "textpad", "files", "media", "logs", "sysmon",
];

/// Errors from app registration.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// App id is not on the allow-list
    #[error("app not allowed: {0}")]
    NotAllowed(String),

    /// An app with this id is already registered
    #[error("app already registered: {0}")]
    Duplicate(String),

    /// Manifest is malformed
    #[error("invalid manifest: {0}")]
    InvalidManifest(String),
}

/// Application manifest declaring identity and capabilities
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppManifest {
    /// Unique identifier, also the window kind
    pub id: String,
    /// Human-readable name (window title)
    pub name: String,
    /// Semantic version
    pub version: String,
    /// Capabilities the app will request
    #[serde(default)]
    pub permissions: Vec<Capability>,
    /// Mime types (`text/plain`) and extensions (`.txt`) the app opens
    #[serde(default)]
    pub file_handlers: Vec<String>,
}

impl AppManifest {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: "1.0.0".to_string(),
            permissions: Vec::new(),
            file_handlers: Vec::new(),
        }
    }

    pub fn with_permissions(mut self, permissions: &[Capability]) -> Self {
        self.permissions = permissions.to_vec();
        self
    }

    pub fn with_handlers(mut self, handlers: &[&str]) -> Self {
        self.file_handlers = handlers.iter().map(|h| h.to_string()).collect();
        self
    }

    /// Check if this is a factory (built-in) app
    pub fn is_factory_app(&self) -> bool {
        FACTORY_APP_IDS.contains(&self.id.as_str())
    }

    fn handles_mime(&self, mime: &str) -> bool {
        self.file_handlers
            .iter()
            .any(|h| !h.starts_with('.') && h.eq_ignore_ascii_case(mime))
    }

    fn handles_extension(&self, ext: &str) -> bool {
        self.file_handlers
            .iter()
            .any(|h| h.starts_with('.') && h[1..].eq_ignore_ascii_case(ext))
    }
}

// ============================================================================
// Factory App Manifests
// ============================================================================

/// Manifests of the built-in applications
pub fn factory_manifests() -> Vec<AppManifest> {
    vec![
        AppManifest::new("terminal", "Terminal").with_permissions(&[Capability::SYSTEM_ADMIN]),
        AppManifest::new("calc", "Calculator"),
        AppManifest::new("settings", "Settings").with_permissions(&[Capability::SYSTEM_CONFIG]),
        AppManifest::new("textpad", "TextPad")
            .with_permissions(&[Capability::FILES_READ, Capability::FILES_WRITE])
            .with_handlers(&["text/plain", ".txt", ".md", ".json", ".js"]),
        AppManifest::new("files", "File Explorer")
            .with_permissions(&[Capability::FILES_MANAGE, Capability::MOUNT_MANAGE]),
        AppManifest::new("media", "Media Viewer")
            .with_permissions(&[Capability::FILES_READ])
            .with_handlers(&[
                "image/png",
                "image/jpeg",
                "video/mp4",
                ".png",
                ".jpg",
                ".mp4",
            ]),
        AppManifest::new("logs", "System Logs").with_permissions(&[Capability::SYSTEM_READ]),
        AppManifest::new("sysmon", "SysMon").with_permissions(&[Capability::SYSTEM_READ]),
    ]
}

/// Registered applications, in registration order
#[derive(Clone, Debug, Default)]
pub struct AppRegistry {
    apps: Vec<AppManifest>,
    allowed: BTreeSet<String>,
}

impl AppRegistry {
    /// Empty registry accepting only the listed ids
    pub fn new(allowed: &[String]) -> Self {
        Self {
            apps: Vec::new(),
            allowed: allowed.iter().cloned().collect(),
        }
    }

    /// Registry holding every allowed factory app
    pub fn with_factory_apps(allowed: &[String]) -> Self {
        let mut registry = Self::new(allowed);
        for manifest in factory_manifests() {
            let id = manifest.id.clone();
            if let Err(e) = registry.register(manifest) {
                log::debug!(target: "kernel", "skipping factory app {}: {}", id, e);
            }
        }
        registry
    }

    /// Register an app. The id must be allowed and unused.
    pub fn register(&mut self, manifest: AppManifest) -> Result<(), RegistryError> {
        if manifest.id.trim().is_empty() || manifest.name.trim().is_empty() {
            return Err(RegistryError::InvalidManifest(format!(
                "empty id or name in {:?}",
                manifest.id
            )));
        }
        if !self.allowed.contains(&manifest.id) {
            return Err(RegistryError::NotAllowed(manifest.id));
        }
        if self.get(&manifest.id).is_some() {
            return Err(RegistryError::Duplicate(manifest.id));
        }
        log::info!(target: "kernel", "registered app {} ({})", manifest.id, manifest.name);
        self.apps.push(manifest);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&AppManifest> {
        self.apps.iter().find(|m| m.id == id)
    }

    pub fn apps(&self) -> &[AppManifest] {
        &self.apps
    }

    /// App that opens a file: mime type match first, then extension.
    pub fn resolve_file_handler(&self, name: &str, mime: Option<&str>) -> Option<&str> {
        if let Some(mime) = mime {
            if let Some(app) = self.apps.iter().find(|a| a.handles_mime(mime)) {
                return Some(&app.id);
            }
        }
        let (_, ext) = name.rsplit_once('.')?;
        self.apps
            .iter()
            .find(|a| a.handles_extension(ext))
            .map(|a| a.id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factory() -> AppRegistry {
        let allowed: Vec<String> = FACTORY_APP_IDS.iter().map(|s| s.to_string()).collect();
        AppRegistry::with_factory_apps(&allowed)
    }

    #[test]
    fn test_factory_apps_registered() {
        let registry = factory();
        assert_eq!(registry.apps().len(), FACTORY_APP_IDS.len());
        let textpad = registry.get("textpad").unwrap();
        assert_eq!(textpad.name, "TextPad");
        assert!(textpad.permissions.contains(&Capability::FILES_WRITE));
        assert!(textpad.is_factory_app());
    }

    #[test]
    fn test_allow_list_filters_factory_apps() {
        let registry = AppRegistry::with_factory_apps(&["calc".to_string()]);
        assert_eq!(registry.apps().len(), 1);
        assert!(registry.get("terminal").is_none());
    }

    #[test]
    fn test_register_rules() {
        let mut registry = AppRegistry::new(&["notes".to_string()]);

        let err = registry.register(AppManifest::new("rogue", "Rogue")).unwrap_err();
        assert_eq!(err, RegistryError::NotAllowed("rogue".into()));

        registry.register(AppManifest::new("notes", "Notes")).unwrap();
        let err = registry.register(AppManifest::new("notes", "Notes 2")).unwrap_err();
        assert_eq!(err, RegistryError::Duplicate("notes".into()));

        let err = registry.register(AppManifest::new("notes", " ")).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidManifest(_)));
    }

    #[test]
    fn test_resolve_file_handler() {
        let registry = factory();
        assert_eq!(registry.resolve_file_handler("notes.md", None), Some("textpad"));
        assert_eq!(registry.resolve_file_handler("photo.JPG", None), Some("media"));
        assert_eq!(
            registry.resolve_file_handler("blob", Some("image/png")),
            Some("media")
        );
        // Mime wins over extension
        assert_eq!(
            registry.resolve_file_handler("readme.png", Some("text/plain")),
            Some("textpad")
        );
        assert_eq!(registry.resolve_file_handler("archive.zip", None), None);
        assert_eq!(registry.resolve_file_handler("Makefile", None), None);
    }
}
