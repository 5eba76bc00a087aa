//! SQL Server connection settings.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{parse_bool, ConfigError};

/// Default ODBC driver named in connection strings.
pub const DEFAULT_ODBC_DRIVER: &str = "ODBC Driver 17 for SQL Server";

/// Connection settings for the target database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Server as `host`, `host\instance` or `host,port`
    #[serde(default = "default_server")]
    pub server: String,
    /// Database name (required)
    #[serde(default)]
    pub database: Option<String>,
    /// SQL login; integrated authentication is used when this or the password is missing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    /// ODBC driver name rendered into the connection string
    #[serde(default = "default_driver")]
    pub driver: String,
    #[serde(default = "default_trust_server_certificate")]
    pub trust_server_certificate: bool,
    #[serde(default)]
    pub encrypt: bool,
    /// Sample rows per table included in the schema text given to the LLM
    #[serde(default = "default_sample_rows")]
    pub sample_rows: usize,
}

fn default_server() -> String {
    r"localhost\SQLEXPRESS".to_string()
}

fn default_driver() -> String {
    DEFAULT_ODBC_DRIVER.to_string()
}

fn default_trust_server_certificate() -> bool {
    true
}

fn default_sample_rows() -> usize {
    3
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            server: default_server(),
            database: None,
            username: None,
            password: None,
            driver: default_driver(),
            trust_server_certificate: default_trust_server_certificate(),
            encrypt: false,
            sample_rows: default_sample_rows(),
        }
    }
}

/// A parsed `SQL_SERVER` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAddress {
    pub host: String,
    pub instance: Option<String>,
    pub port: Option<u16>,
}

impl ServerAddress {
    /// Parse `host`, `host\instance`, `host,port` or `tcp:host,port`.
    pub fn parse(server: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidServer {
            server: server.to_string(),
            reason: reason.to_string(),
        };

        let mut rest = server.trim();
        if rest
            .get(..4)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("tcp:"))
        {
            rest = &rest[4..];
        }

        let (target, port) = match rest.split_once(',') {
            Some((target, port)) => {
                let port = port
                    .trim()
                    .parse::<u16>()
                    .map_err(|_| invalid("port must be a number between 0 and 65535"))?;
                (target.trim(), Some(port))
            }
            None => (rest, None),
        };

        let (host, instance) = match target.split_once('\\') {
            Some((host, instance)) if !instance.trim().is_empty() => {
                (host.trim(), Some(instance.trim().to_string()))
            }
            Some(_) => return Err(invalid("instance name is empty")),
            None => (target, None),
        };

        let host = match host {
            "" => return Err(invalid("host is empty")),
            "." | "(local)" | "(localdb)" => "localhost",
            other => other,
        };

        Ok(Self {
            host: host.to_string(),
            instance,
            port,
        })
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.host)?;
        if let Some(ref instance) = self.instance {
            write!(f, "\\{}", instance)?;
        }
        if let Some(port) = self.port {
            write!(f, ",{}", port)?;
        }
        Ok(())
    }
}

impl DatabaseConfig {
    /// Apply overrides from `SQL_*` variables.
    pub fn with_overrides_from<F>(mut self, var: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = var("SQL_SERVER") {
            self.server = val;
        }
        if let Some(val) = var("SQL_DATABASE") {
            self.database = Some(val);
        }
        if let Some(val) = var("SQL_USERNAME") {
            self.username = Some(val);
        }
        if let Some(val) = var("SQL_PASSWORD") {
            self.password = Some(val);
        }
        if let Some(val) = var("SQL_DRIVER") {
            self.driver = val;
        }
        if let Some(val) = var("SQL_TRUST_SERVER_CERTIFICATE").and_then(|v| parse_bool(&v)) {
            self.trust_server_certificate = val;
        }
        if let Some(val) = var("SQL_ENCRYPT").and_then(|v| parse_bool(&v)) {
            self.encrypt = val;
        }
        if let Some(n) = var("SQL_SAMPLE_ROWS").and_then(|v| v.parse().ok()) {
            self.sample_rows = n;
        }
        self
    }

    /// The configured database name, if set and non-blank.
    pub fn database_name(&self) -> Option<&str> {
        self.database.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    /// SQL credentials, or `None` for integrated authentication.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => Some((user, pass)),
            _ => None,
        }
    }

    pub fn uses_integrated_auth(&self) -> bool {
        self.credentials().is_none()
    }

    pub fn server_address(&self) -> Result<ServerAddress, ConfigError> {
        ServerAddress::parse(&self.server)
    }

    /// ODBC connection string for this database.
    pub fn connection_string(&self) -> Result<String, ConfigError> {
        self.render_connection_string(false)
    }

    /// Connection string with the password masked, safe for display and logs.
    pub fn redacted_connection_string(&self) -> Result<String, ConfigError> {
        self.render_connection_string(true)
    }

    fn render_connection_string(&self, redact: bool) -> Result<String, ConfigError> {
        let database = self.database_name().ok_or(ConfigError::MissingDatabase)?;
        let address = self.server_address()?;

        let mut parts = vec![
            format!("Driver={{{}}}", self.driver),
            format!("Server={}", odbc_value(&address.to_string())),
            format!("Database={}", odbc_value(database)),
        ];

        match self.credentials() {
            Some((user, pass)) => {
                parts.push(format!("UID={}", odbc_value(user)));
                let pass = if redact { "****" } else { pass };
                parts.push(format!("PWD={}", odbc_value(pass)));
            }
            None => parts.push("Trusted_Connection=yes".to_string()),
        }

        parts.push(format!(
            "TrustServerCertificate={}",
            yes_no(self.trust_server_certificate)
        ));
        parts.push(format!("Encrypt={}", yes_no(self.encrypt)));

        Ok(parts.join(";"))
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

/// Quote an ODBC attribute value when it contains delimiters.
fn odbc_value(value: &str) -> String {
    let needs_braces = value.contains([';', '{', '}', '='])
        || value.starts_with(' ')
        || value.ends_with(' ');
    if needs_braces {
        format!("{{{}}}", value.replace('}', "}}"))
    } else {
        value.to_string()
    }
}
