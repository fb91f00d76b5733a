//! Editor configuration.

use serde::{Deserialize, Serialize};

use crate::error::EditorError;

/// What deleting the last row or column of a table does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegenerateTablePolicy {
    /// Remove the whole table instead of leaving a zero-sized grid.
    #[default]
    RemoveTable,
    /// Refuse the deletion.
    KeepLast,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// `alt` text of uploaded images.
    pub image_alt: String,
    /// CSS `max-width` applied to uploaded images.
    pub image_max_width: String,
    pub link_target: String,
    pub link_rel: String,
    pub degenerate_table: DegenerateTablePolicy,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            image_alt: "Inserted image".to_string(),
            image_max_width: "100%".to_string(),
            link_target: "_blank".to_string(),
            link_rel: "noopener noreferrer".to_string(),
            degenerate_table: DegenerateTablePolicy::default(),
        }
    }
}

impl EditorConfig {
    pub fn from_json(json: &str) -> Result<Self, EditorError> {
        let config: EditorConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EditorError> {
        if self.image_max_width.trim().is_empty() {
            return Err(EditorError::InvalidConfig("image_max_width must not be empty".into()));
        }
        if self.link_target.trim().is_empty() {
            return Err(EditorError::InvalidConfig("link_target must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config = EditorConfig::from_json(r#"{"degenerate_table":"keep_last"}"#).unwrap();
        assert_eq!(config.degenerate_table, DegenerateTablePolicy::KeepLast);
        assert_eq!(config.image_alt, "Inserted image");
        assert_eq!(config.link_rel, "noopener noreferrer");
    }

    #[test]
    fn blank_values_are_rejected() {
        let err = EditorConfig::from_json(r#"{"image_max_width":"  "}"#).unwrap_err();
        assert!(matches!(err, EditorError::InvalidConfig(_)));
    }

    #[test]
    fn unparsable_json_is_a_json_error() {
        assert!(matches!(EditorConfig::from_json("{"), Err(EditorError::Json(_))));
    }
}
