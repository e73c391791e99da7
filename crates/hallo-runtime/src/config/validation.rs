//! Configuration validation utilities.

use std::collections::{BTreeMap, HashSet};

use super::error::{ConfigError, ConfigResult};
use super::schema::{HalloConfig, LogOutput, ServerConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &HalloConfig) -> ConfigResult<()> {
    validate_logging(config)?;
    validate_rights("rights.permissions", &config.rights.permissions)?;
    for (group, rights) in &config.user_groups {
        if group.trim().is_empty() {
            return Err(ConfigError::validation("User group names cannot be empty"));
        }
        validate_rights(&format!("user_groups.{group}"), rights)?;
    }
    validate_servers(config)?;
    Ok(())
}

fn validate_logging(config: &HalloConfig) -> ConfigResult<()> {
    if config.logging.output == LogOutput::File && config.logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }
    if config.logging.filters.keys().any(|target| target.trim().is_empty()) {
        return Err(ConfigError::validation("Log filter targets cannot be empty"));
    }
    Ok(())
}

fn validate_rights(section: &str, rights: &BTreeMap<String, bool>) -> ConfigResult<()> {
    if rights.keys().any(|right| right.trim().is_empty()) {
        return Err(ConfigError::validation(format!(
            "Empty right name in {section}"
        )));
    }
    Ok(())
}

fn validate_prefix(prefix: Option<&str>, section: &str) -> ConfigResult<()> {
    if prefix.is_some_and(|p| p.trim().is_empty()) {
        return Err(ConfigError::validation(format!(
            "Command prefix in {section} cannot be empty; leave it unset to use the nickname"
        )));
    }
    Ok(())
}

fn validate_servers(config: &HalloConfig) -> ConfigResult<()> {
    let mut seen = HashSet::new();
    for server in &config.servers {
        if server.name.trim().is_empty() {
            return Err(ConfigError::missing_field("servers.name"));
        }
        if !seen.insert(server.name.to_lowercase()) {
            return Err(ConfigError::DuplicateServer(server.name.clone()));
        }
        validate_server(config, server)?;
    }
    Ok(())
}

fn validate_server(config: &HalloConfig, server: &ServerConfig) -> ConfigResult<()> {
    let section = format!("servers.{}", server.name);
    if server.nick.trim().is_empty() {
        return Err(ConfigError::missing_field(format!("{section}.nick")));
    }
    validate_prefix(server.prefix.as_deref(), &section)?;
    validate_rights(&section, &server.permissions)?;

    let mut channels = HashSet::new();
    for channel in &server.channels {
        if channel.name.trim().is_empty() {
            return Err(ConfigError::missing_field(format!("{section}.channels.name")));
        }
        if !channels.insert(channel.name.to_lowercase()) {
            return Err(ConfigError::DuplicateChannel {
                server: server.name.clone(),
                channel: channel.name.clone(),
            });
        }
        let channel_section = format!("{section}.channels.{}", channel.name);
        validate_prefix(channel.prefix.as_deref(), &channel_section)?;
        validate_rights(&channel_section, &channel.permissions)?;
    }

    for user in &server.users {
        if user.name.trim().is_empty() {
            return Err(ConfigError::missing_field(format!("{section}.users.name")));
        }
        validate_rights(&format!("{section}.users.{}", user.name), &user.permissions)?;
        if let Some(group) = user
            .groups
            .iter()
            .find(|g| !config.user_groups.keys().any(|k| k.eq_ignore_ascii_case(g)))
        {
            return Err(ConfigError::UnknownUserGroup {
                server: server.name.clone(),
                user: user.name.clone(),
                group: group.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{ChannelConfig, UserConfig};

    fn with_server(server: ServerConfig) -> HalloConfig {
        HalloConfig {
            servers: vec![server],
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_empty_config() {
        assert!(validate_config(&HalloConfig::default()).is_ok());
    }

    #[test]
    fn test_duplicate_server() {
        let config = HalloConfig {
            servers: vec![ServerConfig::new("libera"), ServerConfig::new("Libera")],
            ..Default::default()
        };
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::DuplicateServer(name)) if name == "Libera"
        ));
    }

    #[test]
    fn test_duplicate_channel() {
        let mut server = ServerConfig::new("libera");
        server.channels = vec![ChannelConfig::new("#hallo"), ChannelConfig::new("#HALLO")];
        assert!(matches!(
            validate_config(&with_server(server)),
            Err(ConfigError::DuplicateChannel { .. })
        ));
    }

    #[test]
    fn test_empty_prefix() {
        let mut server = ServerConfig::new("libera");
        server.prefix = Some(" ".into());
        assert!(validate_config(&with_server(server)).is_err());
    }

    #[test]
    fn test_empty_right_name() {
        let mut config = HalloConfig::default();
        config.rights.permissions.insert(String::new(), true);
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_unknown_user_group() {
        let mut server = ServerConfig::new("libera");
        server.users.push(UserConfig {
            name: "alice".into(),
            groups: vec!["god".into()],
            permissions: BTreeMap::new(),
        });
        let mut config = with_server(server);
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::UnknownUserGroup { group, .. }) if group == "god"
        ));

        config.user_groups.insert("God".into(), BTreeMap::new());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_file_output_needs_path() {
        let mut config = HalloConfig::default();
        config.logging.output = LogOutput::File;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::MissingField { .. })
        ));
    }
}
