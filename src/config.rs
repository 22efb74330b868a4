//! Configuration for the lookup server and client.
//!
//! The server reads command-line arguments and an optional TOML file; CLI
//! arguments take precedence over file values. The client is configured from
//! the command line only.

use clap::{ArgAction, ArgGroup, Parser};
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::protocol::Command;

/// Command-line arguments for the lookup server
#[derive(Parser, Debug)]
#[command(name = "pwlookup-server")]
#[command(version = "0.1.0")]
#[command(about = "Serves user directory lookups over the Martinu protocol", long_about = None)]
pub struct CliArgs {
    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Address to bind to (defaults to all interfaces)
    #[arg(short, long)]
    pub bind: Option<IpAddr>,

    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// passwd-format file to serve instead of the system account database
    #[arg(long)]
    pub passwd: Option<PathBuf>,

    /// Listen backlog
    #[arg(long)]
    pub backlog: Option<i32>,

    /// Maximum number of concurrent sessions
    #[arg(long)]
    pub max_connections: Option<usize>,

    /// Per-session timeout in seconds (0 = no timeout)
    #[arg(long)]
    pub session_timeout: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub directory: DirectoryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server-related configuration
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: IpAddr,
    pub port: Option<u16>,
    #[serde(default = "default_backlog")]
    pub backlog: i32,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Seconds; 0 disables the timeout
    #[serde(default = "default_session_timeout")]
    pub session_timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: None,
            backlog: default_backlog(),
            max_connections: default_max_connections(),
            session_timeout: default_session_timeout(),
        }
    }
}

/// Directory source configuration
#[derive(Debug, Deserialize, Default)]
pub struct DirectoryConfig {
    /// passwd-format file; unset means the system account database
    pub passwd: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_bind() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_backlog() -> i32 {
    5
}

fn default_max_connections() -> usize {
    1024
}

fn default_session_timeout() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved server configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub bind: IpAddr,
    pub port: u16,
    pub backlog: i32,
    pub max_connections: usize,
    pub session_timeout: Option<Duration>,
    pub passwd: Option<PathBuf>,
    pub log_level: String,
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    pub fn load() -> Result<Self, ConfigError> {
        let cli: CliArgs = parse_args();

        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        Self::merge(cli, toml_config)
    }

    /// Merge CLI args with TOML config (CLI takes precedence).
    pub fn merge(cli: CliArgs, toml_config: TomlConfig) -> Result<Self, ConfigError> {
        let port = cli
            .port
            .or(toml_config.server.port)
            .ok_or(ConfigError::MissingPort)?;
        let session_timeout = cli
            .session_timeout
            .unwrap_or(toml_config.server.session_timeout);

        Ok(Config {
            bind: cli.bind.unwrap_or(toml_config.server.bind),
            port,
            backlog: cli.backlog.unwrap_or(toml_config.server.backlog),
            max_connections: cli
                .max_connections
                .unwrap_or(toml_config.server.max_connections),
            session_timeout: (session_timeout > 0)
                .then(|| Duration::from_secs(session_timeout)),
            passwd: cli.passwd.or(toml_config.directory.passwd),
            log_level: if cli.log_level != "info" {
                cli.log_level
            } else {
                toml_config.logging.level
            },
        })
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

/// Command-line arguments for the lookup client.
///
/// `-h` names the host, so help is only available as `--help`. A bare `-l`
/// with no prefix lists every login, like `-L`.
#[derive(Parser, Debug)]
#[command(name = "pwlookup-client")]
#[command(version = "0.1.0")]
#[command(about = "Queries a Martinu protocol lookup server", long_about = None)]
#[command(disable_help_flag = true)]
#[command(group(
    ArgGroup::new("query")
        .required(true)
        .args(["name", "dir", "list", "list_all"])
))]
pub struct ClientArgs {
    /// Server host name or address
    #[arg(short = 'h', long)]
    pub host: String,

    /// Server port
    #[arg(short, long)]
    pub port: u16,

    /// Print the descriptive name of LOGIN
    #[arg(short = 'n', value_name = "LOGIN")]
    pub name: Option<String>,

    /// Print the home directory of LOGIN
    #[arg(short = 'f', value_name = "LOGIN")]
    pub dir: Option<String>,

    /// List logins starting with PREFIX (all logins when PREFIX is omitted)
    #[arg(short = 'l', value_name = "PREFIX")]
    pub list: Option<Option<String>>,

    /// List all logins
    #[arg(short = 'L')]
    pub list_all: bool,

    /// Connect and response timeout in seconds (0 = no timeout)
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    pub log_level: String,

    /// Print help
    #[arg(long, action = ArgAction::Help)]
    pub help: Option<bool>,
}

impl ClientArgs {
    /// The single command selected on the command line.
    pub fn command(&self) -> Command {
        if let Some(login) = &self.name {
            Command::LookupById(login.clone())
        } else if let Some(login) = &self.dir {
            Command::LookupDir(login.clone())
        } else if let Some(Some(prefix)) = &self.list {
            Command::LookupByPrefix(prefix.clone())
        } else {
            Command::ListAll
        }
    }
}

/// Resolved client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub command: Command,
    pub timeout: Option<Duration>,
    pub log_level: String,
}

impl ClientConfig {
    pub fn load() -> Self {
        Self::from(parse_args::<ClientArgs>())
    }
}

impl From<ClientArgs> for ClientConfig {
    fn from(args: ClientArgs) -> Self {
        ClientConfig {
            command: args.command(),
            host: args.host,
            port: args.port,
            timeout: (args.timeout > 0).then(|| Duration::from_secs(args.timeout)),
            log_level: args.log_level,
        }
    }
}

/// Parse process arguments. Help and version exit 0; any argument error
/// exits 1.
pub fn parse_args<P: Parser>() -> P {
    P::try_parse().unwrap_or_else(|e| {
        if e.use_stderr() {
            let _ = e.print();
            std::process::exit(1);
        }
        e.exit()
    })
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    FileRead(PathBuf, std::io::Error),
    TomlParse(PathBuf, toml::de::Error),
    MissingPort,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileRead(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::TomlParse(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::MissingPort => {
                write!(f, "No port given: pass --port or set server.port in the config file")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn server_cli(args: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(std::iter::once("pwlookup-server").chain(args.iter().copied()))
            .unwrap()
    }

    fn client_cli(args: &[&str]) -> Result<ClientArgs, clap::Error> {
        ClientArgs::try_parse_from(std::iter::once("pwlookup-client").chain(args.iter().copied()))
    }

    #[test]
    fn test_default_config() {
        let config = TomlConfig::default();
        assert_eq!(config.server.bind, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        assert_eq!(config.server.port, None);
        assert_eq!(config.server.backlog, 5);
        assert_eq!(config.server.session_timeout, 30);
        assert_eq!(config.directory.passwd, None);
    }

    #[test]
    fn test_toml_parsing() {
        let toml_str = r#"
            [server]
            bind = "127.0.0.1"
            port = 4000
            backlog = 16
            max_connections = 8
            session_timeout = 0

            [directory]
            passwd = "/tmp/passwd"

            [logging]
            level = "debug"
        "#;

        let toml_config: TomlConfig = toml::from_str(toml_str).unwrap();
        let config = Config::merge(server_cli(&[]), toml_config).unwrap();
        assert_eq!(config.listen_addr(), "127.0.0.1:4000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.backlog, 16);
        assert_eq!(config.max_connections, 8);
        assert_eq!(config.session_timeout, None);
        assert_eq!(config.passwd, Some(PathBuf::from("/tmp/passwd")));
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_cli_overrides_toml() {
        let toml_config: TomlConfig = toml::from_str("[server]\nport = 4000\n").unwrap();
        let cli = server_cli(&[
            "-p",
            "5000",
            "--session-timeout",
            "10",
            "--log-level",
            "trace",
        ]);

        let config = Config::merge(cli, toml_config).unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.session_timeout, Some(Duration::from_secs(10)));
        assert_eq!(config.log_level, "trace");
    }

    #[test]
    fn test_passwd_override() {
        let toml_config: TomlConfig =
            toml::from_str("[directory]\npasswd = \"/tmp/passwd\"\n").unwrap();
        let cli = server_cli(&["-p", "4000", "--passwd", "/srv/passwd"]);

        let config = Config::merge(cli, toml_config).unwrap();
        assert_eq!(config.passwd, Some(PathBuf::from("/srv/passwd")));

        let config = Config::merge(server_cli(&["-p", "4000"]), TomlConfig::default()).unwrap();
        assert_eq!(config.passwd, None);
    }

    #[test]
    fn test_missing_port() {
        let result = Config::merge(server_cli(&[]), TomlConfig::default());
        assert!(matches!(result, Err(ConfigError::MissingPort)));
    }

    #[test]
    fn test_invalid_bind_rejected() {
        let cli = CliArgs::try_parse_from(["pwlookup-server", "-p", "4000", "-b", "not-an-ip"]);
        assert!(cli.is_err());

        let toml_config = toml::from_str::<TomlConfig>("[server]\nbind = \"not-an-ip\"\n");
        assert!(toml_config.is_err());
    }

    #[test]
    fn test_client_commands() {
        let args = client_cli(&["-h", "localhost", "-p", "4000", "-n", "alice"]).unwrap();
        assert_eq!(args.command(), Command::LookupById("alice".to_string()));

        let args = client_cli(&["-p", "4000", "-h", "localhost", "-f", "alice"]).unwrap();
        assert_eq!(args.command(), Command::LookupDir("alice".to_string()));

        let args = client_cli(&["-h", "localhost", "-p", "4000", "-l", "al"]).unwrap();
        assert_eq!(args.command(), Command::LookupByPrefix("al".to_string()));
    }

    #[test]
    fn test_client_list_all_forms() {
        let args = client_cli(&["-h", "localhost", "-p", "4000", "-l"]).unwrap();
        assert_eq!(args.command(), Command::ListAll);

        let args = client_cli(&["-h", "localhost", "-l", "-p", "4000"]).unwrap();
        assert_eq!(args.command(), Command::ListAll);

        let args = client_cli(&["-h", "localhost", "-p", "4000", "-L"]).unwrap();
        assert_eq!(args.command(), Command::ListAll);
    }

    #[test]
    fn test_client_requires_exactly_one_query() {
        assert!(client_cli(&["-h", "localhost", "-p", "4000"]).is_err());
        assert!(
            client_cli(&["-h", "localhost", "-p", "4000", "-n", "a", "-f", "b"]).is_err()
        );
        assert!(client_cli(&["-h", "localhost", "-p", "4000", "-n", "a", "-L"]).is_err());
    }

    #[test]
    fn test_client_timeout() {
        let args =
            client_cli(&["-h", "localhost", "-p", "4000", "-L", "--timeout", "0"]).unwrap();
        let config = ClientConfig::from(args);
        assert_eq!(config.timeout, None);
        assert_eq!(config.command, Command::ListAll);
    }
}
