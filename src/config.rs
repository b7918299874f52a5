use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_LISTEN_AT: &str = "127.0.0.1:8080";
pub const DEFAULT_PUBLIC_FOLDER: &str = "public";
/// 10 MiB, the body size the upload form has always advertised
pub const DEFAULT_UPLOAD_LIMIT: usize = 10 * 1024 * 1024;
pub const DEFAULT_MAX_EXTRACTED_BYTES: u64 = 512 * 1024 * 1024;
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// A command run after a deploy, as an explicit program and argument list.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    /// Split a configured command line on whitespace.
    /// Returns `None` for an empty or blank value.
    pub fn parse(line: &str) -> Option<CommandSpec> {
        let mut words = line.split_whitespace().map(String::from);
        let program = words.next()?;
        Some(CommandSpec {
            program,
            args: words.collect(),
        })
    }
}

impl std::fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Service configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub listen_at: SocketAddr,
    pub projects_root: PathBuf,
    pub public_folder: PathBuf,
    pub sanitize_command: Option<CommandSpec>,
    pub config_command: Option<CommandSpec>,
    pub upload_limit: usize,
    pub max_extracted_bytes: u64,
    pub command_timeout: Duration,
}

impl Config {
    pub fn new(projects_root: impl Into<PathBuf>) -> Config {
        Config {
            listen_at: DEFAULT_LISTEN_AT
                .parse()
                .unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], 8080))),
            projects_root: projects_root.into(),
            public_folder: PathBuf::from(DEFAULT_PUBLIC_FOLDER),
            sanitize_command: None,
            config_command: None,
            upload_limit: DEFAULT_UPLOAD_LIMIT,
            max_extracted_bytes: DEFAULT_MAX_EXTRACTED_BYTES,
            command_timeout: Duration::from_secs(DEFAULT_COMMAND_TIMEOUT_SECS),
        }
    }

    /// Read the configuration from the process environment
    pub fn from_env() -> Result<Config, ConfigError> {
        Config::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Config, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let projects_root = lookup("PROJECTS_ROOT_DIR")
            .filter(|value| !value.trim().is_empty())
            .ok_or(ConfigError::Missing("PROJECTS_ROOT_DIR"))?;
        let mut config = Config::new(projects_root);

        if let Some(value) = lookup("LISTEN_AT") {
            config.listen_at = parse_value("LISTEN_AT", value)?;
        }
        if let Some(value) = lookup("PUBLIC_FOLDER") {
            config.public_folder = PathBuf::from(value);
        }
        config.sanitize_command = lookup("SANITIZE_COMMAND").and_then(|v| CommandSpec::parse(&v));
        config.config_command = lookup("CONFIG_COMMAND").and_then(|v| CommandSpec::parse(&v));
        if let Some(value) = lookup("UPLOAD_LIMIT") {
            config.upload_limit = parse_value("UPLOAD_LIMIT", value)?;
        }
        if let Some(value) = lookup("MAX_EXTRACTED_BYTES") {
            config.max_extracted_bytes = parse_value("MAX_EXTRACTED_BYTES", value)?;
        }
        if let Some(value) = lookup("COMMAND_TIMEOUT_SECS") {
            config.command_timeout = Duration::from_secs(parse_value("COMMAND_TIMEOUT_SECS", value)?);
        }

        Ok(config)
    }

    /// Commands run after every successful extraction, in order
    pub fn post_deploy_commands(&self) -> Vec<&CommandSpec> {
        self.sanitize_command
            .iter()
            .chain(self.config_command.iter())
            .collect()
    }
}

fn parse_value<T: std::str::FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| ConfigError::Invalid { name, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn missing_projects_root_is_an_error() {
        let result = Config::from_lookup(lookup_from(&[("SANITIZE_COMMAND", "true")]));
        assert_eq!(
            result.unwrap_err(),
            ConfigError::Missing("PROJECTS_ROOT_DIR")
        );
    }

    #[test]
    fn blank_projects_root_is_an_error() {
        let result = Config::from_lookup(lookup_from(&[("PROJECTS_ROOT_DIR", "  ")]));
        assert!(matches!(result, Err(ConfigError::Missing(_))));
    }

    #[test]
    fn defaults_apply_when_only_root_is_set() {
        let config = Config::from_lookup(lookup_from(&[("PROJECTS_ROOT_DIR", "/srv/projects")]))
            .unwrap();
        assert_eq!(config.projects_root, PathBuf::from("/srv/projects"));
        assert_eq!(config.listen_at.to_string(), DEFAULT_LISTEN_AT);
        assert_eq!(config.upload_limit, DEFAULT_UPLOAD_LIMIT);
        assert_eq!(config.command_timeout, Duration::from_secs(60));
        assert!(config.post_deploy_commands().is_empty());
    }

    #[test]
    fn commands_are_split_into_program_and_args() {
        let config = Config::from_lookup(lookup_from(&[
            ("PROJECTS_ROOT_DIR", "/srv/projects"),
            ("SANITIZE_COMMAND", "  /usr/local/bin/sanitize --strict  ."),
            ("CONFIG_COMMAND", "systemctl reload nginx"),
        ]))
        .unwrap();

        let commands = config.post_deploy_commands();
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[0].program, "/usr/local/bin/sanitize");
        assert_eq!(commands[0].args, vec!["--strict", "."]);
        assert_eq!(commands[1].to_string(), "systemctl reload nginx");
    }

    #[test]
    fn empty_command_means_no_command() {
        let config = Config::from_lookup(lookup_from(&[
            ("PROJECTS_ROOT_DIR", "/srv/projects"),
            ("SANITIZE_COMMAND", ""),
            ("CONFIG_COMMAND", "reload"),
        ]))
        .unwrap();
        assert!(config.sanitize_command.is_none());
        assert_eq!(config.post_deploy_commands().len(), 1);
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        let result = Config::from_lookup(lookup_from(&[
            ("PROJECTS_ROOT_DIR", "/srv/projects"),
            ("UPLOAD_LIMIT", "10mb"),
        ]));
        assert_eq!(
            result.unwrap_err(),
            ConfigError::Invalid {
                name: "UPLOAD_LIMIT",
                value: "10mb".to_string()
            }
        );
    }

    #[test]
    fn malformed_listen_address_is_rejected() {
        let result = Config::from_lookup(lookup_from(&[
            ("PROJECTS_ROOT_DIR", "/srv/projects"),
            ("LISTEN_AT", "localhost"),
        ]));
        assert!(matches!(
            result,
            Err(ConfigError::Invalid { name: "LISTEN_AT", .. })
        ));
    }
}
