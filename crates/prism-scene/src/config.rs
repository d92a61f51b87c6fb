//! Scene file I/O settings.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::file::SceneError;

// ---------------------------------------------------------------------------
// SceneIoConfig
// ---------------------------------------------------------------------------

/// How scene files are written and read back.
///
/// Missing keys in a config file take their default, so `{}` is a valid
/// config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneIoConfig {
    /// Pretty-print JSON on write.
    pub pretty: bool,
    /// Refuse to load a scene whose recorded hash does not match its
    /// contents.
    pub verify_hash: bool,
}

impl Default for SceneIoConfig {
    /// Pretty output, hashes verified.
    fn default() -> Self {
        Self {
            pretty: true,
            verify_hash: true,
        }
    }
}

impl SceneIoConfig {
    pub fn from_json(text: &str) -> Result<Self, SceneError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn read_from(path: impl AsRef<Path>) -> Result<Self, SceneError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_is_default() {
        assert_eq!(SceneIoConfig::from_json("{}").unwrap(), SceneIoConfig::default());
    }

    #[test]
    fn partial_override() {
        let config = SceneIoConfig::from_json(r#"{ "verify_hash": false }"#).unwrap();
        assert!(config.pretty);
        assert!(!config.verify_hash);
    }

    #[test]
    fn rejects_wrong_types() {
        assert!(matches!(
            SceneIoConfig::from_json(r#"{ "pretty": "yes" }"#),
            Err(SceneError::Json(_))
        ));
    }
}
