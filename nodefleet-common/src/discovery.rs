//! Node group discovery specs.
//!
//! Operators pin explicit bounds for a named group with `<minSize>:<maxSize>:<nodeGroupName>`.
//! Several specs can be passed comma-separated in one string.
use serde::{Deserialize, Serialize};

use crate::error::AutoscalerError;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct NodeGroupSpec {
    pub name: String,
    pub min_size: usize,
    pub max_size: usize,
}

impl NodeGroupSpec {
    /// Parse a single `<minSize>:<maxSize>:<nodeGroupName>` spec.
    ///
    /// `min_size` may only be 0 when scale-to-zero is supported.
    pub fn parse(raw: &str, scale_to_zero: bool) -> Result<Self, AutoscalerError> {
        let invalid = |reason: &str| {
            AutoscalerError::configuration(format!(
                "failed to parse node group spec '{}', format should be `<minSize>:<maxSize>:<nodeGroupName>`: {}",
                raw, reason
            ))
        };

        let tokens: Vec<&str> = raw.trim().splitn(3, ':').collect();
        if tokens.len() != 3 {
            return Err(invalid("expected 3 tokens"));
        }

        let min_size = tokens[0]
            .trim()
            .parse::<usize>()
            .map_err(|e| invalid(&format!("invalid min size '{}': {}", tokens[0], e)))?;
        let max_size = tokens[1]
            .trim()
            .parse::<usize>()
            .map_err(|e| invalid(&format!("invalid max size '{}': {}", tokens[1], e)))?;
        let name = tokens[2].trim();

        if name.is_empty() {
            return Err(invalid("node group name is empty"));
        }
        if min_size == 0 && !scale_to_zero {
            return Err(invalid("min size must be >= 1"));
        }
        if max_size < 1 {
            return Err(invalid("max size must be >= 1"));
        }
        if max_size < min_size {
            return Err(invalid("max size must be greater or equal to min size"));
        }

        Ok(Self {
            name: name.to_string(),
            min_size,
            max_size,
        })
    }
}

/// Split a comma-separated list of specs.
///
/// - Trims whitespace
/// - Drops empty entries
pub fn split_specs(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or("")
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_valid_spec() {
        let spec = NodeGroupSpec::parse("1:5:workers", false).unwrap();
        assert_eq!(
            spec,
            NodeGroupSpec {
                name: "workers".to_string(),
                min_size: 1,
                max_size: 5
            }
        );
        // Names may themselves contain colons.
        let spec = NodeGroupSpec::parse(" 2:3:pool:a ", false).unwrap();
        assert_eq!(spec.name, "pool:a");
    }

    #[test]
    fn parse_rejects_malformed() {
        for raw in ["", "1:2", "a:2:x", "1:b:x", "-1:2:x", "1:2:", "3:2:x", "1:0:x"] {
            let err = NodeGroupSpec::parse(raw, false).unwrap_err();
            assert!(matches!(err, AutoscalerError::Configuration(_)), "{raw}");
            assert!(err.to_string().contains(raw), "{raw}");
        }
    }

    #[test]
    fn zero_min_requires_scale_to_zero() {
        assert!(NodeGroupSpec::parse("0:3:x", false).is_err());
        let spec = NodeGroupSpec::parse("0:3:x", true).unwrap();
        assert_eq!(spec.min_size, 0);
    }

    #[test]
    fn split_specs_drops_empty_entries() {
        assert_eq!(
            split_specs(Some(" 1:2:one, ,11:20:two,")),
            vec!["1:2:one".to_string(), "11:20:two".to_string()]
        );
        assert!(split_specs(None).is_empty());
    }
}
