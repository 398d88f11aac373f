use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::*;

/// Which neighbours disappear together with a deleted node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CascadeDirection {
    /// Every node with a path leading into the deleted node.
    #[default]
    Ancestors,
    /// Every node reachable from the deleted node.
    Descendants,
    /// Only the node itself (and its edges).
    None,
}

impl FromStr for CascadeDirection {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ancestors" => Ok(CascadeDirection::Ancestors),
            "descendants" => Ok(CascadeDirection::Descendants),
            "none" => Ok(CascadeDirection::None),
            _ => Err(format!(
                "expected ancestors, descendants or none, got '{value}'"
            )),
        }
    }
}

impl CascadeDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            CascadeDirection::Ancestors => "ancestors",
            CascadeDirection::Descendants => "descendants",
            CascadeDirection::None => "none",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub cascade_direction: CascadeDirection,
    pub helper_line_tolerance: f32,
    pub min_handle_spacing: f32,
    /// `None` keeps every snapshot.
    pub history_limit: Option<usize>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            cascade_direction: CascadeDirection::default(),
            helper_line_tolerance: DEFAULT_HELPER_LINE_TOLERANCE,
            min_handle_spacing: DEFAULT_MIN_HANDLE_SPACING,
            history_limit: None,
        }
    }
}

impl EditorConfig {
    /// Defaults overridden by `GOALGRAPH_CASCADE`, `GOALGRAPH_HELPER_TOLERANCE`,
    /// `GOALGRAPH_HANDLE_SPACING` and `GOALGRAPH_HISTORY_LIMIT`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            cascade_direction: lookup("GOALGRAPH_CASCADE")
                .and_then(|value| value.parse().ok())
                .unwrap_or(defaults.cascade_direction),
            helper_line_tolerance: lookup("GOALGRAPH_HELPER_TOLERANCE")
                .and_then(|value| value.parse().ok())
                .filter(|value: &f32| value.is_finite() && *value >= 0.0)
                .unwrap_or(defaults.helper_line_tolerance),
            min_handle_spacing: lookup("GOALGRAPH_HANDLE_SPACING")
                .and_then(|value| value.parse().ok())
                .filter(|value: &f32| value.is_finite() && *value >= 0.0)
                .unwrap_or(defaults.min_handle_spacing),
            history_limit: lookup("GOALGRAPH_HISTORY_LIMIT")
                .and_then(|value| value.parse().ok())
                .filter(|limit: &usize| *limit > 0)
                .or(defaults.history_limit),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn lookup_overrides_defaults() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("GOALGRAPH_CASCADE", "Descendants"),
            ("GOALGRAPH_HELPER_TOLERANCE", "3.5"),
            ("GOALGRAPH_HISTORY_LIMIT", "50"),
        ]);
        let config = EditorConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.cascade_direction, CascadeDirection::Descendants);
        assert_eq!(config.helper_line_tolerance, 3.5);
        assert_eq!(config.min_handle_spacing, DEFAULT_MIN_HANDLE_SPACING);
        assert_eq!(config.history_limit, Some(50));
    }

    #[test]
    fn invalid_values_fall_back() {
        let config = EditorConfig::from_lookup(|key| match key {
            "GOALGRAPH_CASCADE" => Some("sideways".to_string()),
            "GOALGRAPH_HELPER_TOLERANCE" => Some("-1".to_string()),
            "GOALGRAPH_HISTORY_LIMIT" => Some("0".to_string()),
            _ => None,
        });

        assert_eq!(config, EditorConfig::default());
    }

    #[test]
    fn cascade_direction_parses_case_insensitively() {
        assert_eq!(" None ".parse(), Ok(CascadeDirection::None));
        assert_eq!("ANCESTORS".parse(), Ok(CascadeDirection::Ancestors));
        assert!("sideways".parse::<CascadeDirection>().is_err());
        for direction in [
            CascadeDirection::Ancestors,
            CascadeDirection::Descendants,
            CascadeDirection::None,
        ] {
            assert_eq!(direction.as_str().parse(), Ok(direction));
        }
    }
}
