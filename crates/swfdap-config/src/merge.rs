use crate::config::Config;
use crate::error::ConfigError;

/// Applies a TOML fragment on top of `base`.
///
/// Keys present in `overlay_toml` win; everything else keeps the value
/// from `base`. Both sides are compared as [`toml::Value`] trees.
pub fn merge_configs(base: &Config, overlay_toml: &str) -> Result<Config, ConfigError> {
    let mut tree = toml::Value::try_from(base).map_err(|e| ConfigError::Parse(e.to_string()))?;
    let overlay: toml::Value =
        toml::from_str(overlay_toml).map_err(|e| ConfigError::Parse(e.to_string()))?;

    overlay_into(&mut tree, overlay);

    tree.try_into()
        .map_err(|e: toml::de::Error| ConfigError::Parse(e.to_string()))
}

/// Tables merge key by key; any other value replaces the base.
fn overlay_into(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, value) in overlay_table {
                match base_table.get_mut(&key) {
                    Some(existing) => overlay_into(existing, value),
                    None => {
                        base_table.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_overlay_returns_base() {
        let base = Config::default();
        assert_eq!(merge_configs(&base, "").unwrap(), base);
    }

    #[test]
    fn overlay_changes_one_field_only() {
        let base = Config::default();
        let merged = merge_configs(&base, "[adapter]\nnative_timeout_ms = 2500\n").unwrap();
        assert_eq!(merged.adapter.native_timeout_ms, 2500);
        assert_eq!(merged.adapter.poll_interval_ms, 50);
        assert_eq!(merged.server, base.server);
        assert_eq!(merged.log, base.log);
    }

    #[test]
    fn overlay_replaces_arrays_wholesale() {
        let base = Config::default();
        let merged = merge_configs(&base, "[adapter]\nsource_extensions = [\"as\"]\n").unwrap();
        assert_eq!(merged.adapter.source_extensions, vec!["as"]);
    }

    #[test]
    fn overlay_adds_optional_field() {
        let base = Config::default();
        let merged = merge_configs(&base, "[adapter]\nworkspace = \"/work\"\n").unwrap();
        assert_eq!(
            merged.adapter.workspace.as_deref(),
            Some(std::path::Path::new("/work"))
        );
    }

    #[test]
    fn invalid_overlay_is_a_parse_error() {
        let result = merge_configs(&Config::default(), "{{invalid}}");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
