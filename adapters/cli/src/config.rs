use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::Deserialize;
use stackfall_core::ResolverConfig;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    resolver: ResolverConfig,
}

/// Loads the resolver configuration, falling back to defaults without a file.
pub(crate) fn load(path: Option<&Path>) -> Result<ResolverConfig> {
    let Some(path) = path else {
        return Ok(ResolverConfig::default());
    };

    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    parse(&contents).with_context(|| format!("invalid config file {}", path.display()))
}

fn parse(contents: &str) -> Result<ResolverConfig> {
    let file: ConfigFile = toml::from_str(contents).context("failed to parse config toml")?;
    Ok(file.resolver)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_path_yields_defaults() {
        let config = load(None).expect("defaults");
        assert_eq!(config, ResolverConfig::default());
    }

    #[test]
    fn partial_section_keeps_remaining_defaults() {
        let config = parse(
            r#"
            [resolver]
            death_bound = -4
            player_exit_shortcut = true
            "#,
        )
        .expect("config parses");

        assert_eq!(config.death_bound, -4);
        assert!(config.player_exit_shortcut);
        assert_eq!(config.respawn_height, 10);
        assert_eq!(config.max_cascade_ticks, 100);
    }

    #[test]
    fn empty_file_is_default() {
        assert_eq!(parse("").expect("empty"), ResolverConfig::default());
    }

    #[test]
    fn unknown_sections_are_rejected() {
        assert!(parse("[renderer]\nscale = 2").is_err());
    }
}
