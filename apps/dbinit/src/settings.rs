use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgSslMode};
use tokio_postgres::config::{Host, SslMode as WireSslMode};

use crate::errors::DbError;

pub const DEFAULT_PORT: u16 = 5432;
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// TLS negotiation mode written into the `sslmode` key of the descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SslMode {
    #[default]
    Disable,
    Prefer,
    Require,
}

impl SslMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SslMode::Disable => "disable",
            SslMode::Prefer => "prefer",
            SslMode::Require => "require",
        }
    }
}

impl fmt::Display for SslMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SslMode {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "disable" => Ok(SslMode::Disable),
            "prefer" => Ok(SslMode::Prefer),
            "require" => Ok(SslMode::Require),
            other => Err(DbError::Open(format!("unknown sslmode '{other}'"))),
        }
    }
}

impl From<SslMode> for PgSslMode {
    fn from(mode: SslMode) -> Self {
        match mode {
            SslMode::Disable => PgSslMode::Disable,
            SslMode::Prefer => PgSslMode::Prefer,
            SslMode::Require => PgSslMode::Require,
        }
    }
}

/// Everything needed to reach one PostgreSQL database.
/// Strings are forwarded verbatim; nothing is validated until the pool is opened.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub username: String,
    pub password: String,
    pub database: String,
    pub host: String,
    pub port: u16,
    pub ssl_mode: SslMode,
    /// Upper bound on the startup liveness check.
    pub connect_timeout: Duration,
}

impl ConnectionSettings {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        database: impl Into<String>,
        host: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            database: database.into(),
            host: host.into(),
            port: DEFAULT_PORT,
            ssl_mode: SslMode::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_ssl_mode(mut self, ssl_mode: SslMode) -> Self {
        self.ssl_mode = ssl_mode;
        self
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// Formats the space-separated `key=value` descriptor handed to the open step.
    pub fn descriptor(&self) -> String {
        format!(
            "host={} port={} user={} password={} dbname={} sslmode={}",
            self.host, self.port, self.username, self.password, self.database, self.ssl_mode
        )
    }
}

impl fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("ssl_mode", &self.ssl_mode)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

/// A descriptor string after parsing. Keys absent from the string fall back to
/// the driver's own defaults; a repeated key keeps its last value.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct Descriptor {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub dbname: Option<String>,
    pub ssl_mode: SslMode,
}

impl FromStr for Descriptor {
    type Err = DbError;

    /// Reads libpq `key=value` syntax, including quoted and escaped values.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // The descriptor is built with plain spaces; any control character came
        // from a value and would split or truncate it.
        if let Some(c) = s.chars().find(|c| c.is_control()) {
            return Err(DbError::Open(format!("control character {c:?} in descriptor")));
        }

        let config = s
            .parse::<tokio_postgres::Config>()
            .map_err(|e| DbError::Open(e.to_string()))?;

        let host = config.get_hosts().last().map(|host| match host {
            Host::Tcp(name) => name.clone(),
            #[cfg(unix)]
            Host::Unix(path) => path.to_string_lossy().into_owned(),
        });

        let password = config
            .get_password()
            .map(|p| String::from_utf8(p.to_vec()))
            .transpose()
            .map_err(|_| DbError::Open("password is not valid UTF-8".to_string()))?;

        let ssl_mode = match config.get_ssl_mode() {
            WireSslMode::Disable => SslMode::Disable,
            WireSslMode::Prefer => SslMode::Prefer,
            WireSslMode::Require => SslMode::Require,
            other => return Err(DbError::Open(format!("unsupported sslmode {other:?}"))),
        };

        Ok(Descriptor {
            host,
            port: config.get_ports().last().copied(),
            user: config.get_user().map(str::to_string),
            password,
            dbname: config.get_dbname().map(str::to_string),
            ssl_mode,
        })
    }
}

impl Descriptor {
    pub fn connect_options(&self) -> PgConnectOptions {
        let mut options = PgConnectOptions::new_without_pgpass().ssl_mode(self.ssl_mode.into());
        match &self.host {
            Some(dir) if dir.starts_with('/') => options = options.socket(dir),
            Some(host) => options = options.host(host),
            None => {}
        }
        if let Some(port) = self.port {
            options = options.port(port);
        }
        if let Some(user) = &self.user {
            options = options.username(user);
        }
        if let Some(password) = &self.password {
            options = options.password(password);
        }
        if let Some(dbname) = &self.dbname {
            options = options.database(dbname);
        }
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_layout() {
        let settings = ConnectionSettings::new("app", "secret", "orders", "localhost");
        assert_eq!(
            settings.descriptor(),
            "host=localhost port=5432 user=app password=secret dbname=orders sslmode=disable"
        );
    }

    #[test]
    fn test_descriptor_keeps_defaults_for_any_input() {
        let inputs = [
            ("", "", "", ""),
            ("port=1", "sslmode=require", "db", "h"),
            ("user name", "p w", "d\tb", "host\n"),
        ];
        for (user, pass, db, host) in inputs {
            let d = ConnectionSettings::new(user, pass, db, host).descriptor();
            assert!(d.contains("port=5432"), "descriptor was {d:?}");
            assert!(d.contains("sslmode=disable"), "descriptor was {d:?}");
        }
    }

    #[test]
    fn test_overrides_flow_into_descriptor() {
        let d = ConnectionSettings::new("app", "secret", "orders", "db.internal")
            .with_port(6543)
            .with_ssl_mode(SslMode::Require)
            .descriptor();
        assert!(d.contains("port=6543"));
        assert!(d.ends_with("sslmode=require"));
    }

    #[test]
    fn test_debug_redacts_password() {
        let settings = ConnectionSettings::new("app", "hunter2", "orders", "localhost");
        let printed = format!("{settings:?}");
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("<redacted>"));
    }

    #[test]
    fn test_parse_descriptor() {
        let parsed: Descriptor = ConnectionSettings::new("app", "s3cret!", "orders", "localhost")
            .descriptor()
            .parse()
            .unwrap();
        assert_eq!(parsed.host.as_deref(), Some("localhost"));
        assert_eq!(parsed.port, Some(5432));
        assert_eq!(parsed.user.as_deref(), Some("app"));
        assert_eq!(parsed.password.as_deref(), Some("s3cret!"));
        assert_eq!(parsed.dbname.as_deref(), Some("orders"));
        assert_eq!(parsed.ssl_mode, SslMode::Disable);
    }

    #[test]
    fn test_parse_quoted_values() {
        let parsed: Descriptor = r"host=localhost password='two words' dbname='it\'s'"
            .parse()
            .unwrap();
        assert_eq!(parsed.password.as_deref(), Some("two words"));
        assert_eq!(parsed.dbname.as_deref(), Some("it's"));
    }

    #[test]
    fn test_parse_unix_socket_host() {
        let parsed: Descriptor = "host=/var/run/postgresql dbname=orders".parse().unwrap();
        assert_eq!(parsed.host.as_deref(), Some("/var/run/postgresql"));
        assert_eq!(parsed.port, None);
    }

    #[test]
    fn test_parse_rejects_control_characters() {
        for (user, pass, host) in [
            ("app", "sec\0ret", "localhost"),
            ("app", "secret", "localhost\n"),
            ("a\tpp", "secret", "localhost"),
        ] {
            let err = ConnectionSettings::new(user, pass, "orders", host)
                .descriptor()
                .parse::<Descriptor>()
                .unwrap_err();
            assert!(
                matches!(err, DbError::Open(ref msg) if msg.contains("control character")),
                "unexpected error: {err:?}"
            );
        }
    }

    #[test]
    fn test_parse_rejects_broken_descriptors() {
        for bad in [
            "host=localhost port=5432 user=app password=two words",
            "host=localhost password='unterminated",
            "host=localhost port=notaport",
            "host=localhost colour=blue",
            "sslmode=sometimes",
        ] {
            let result = bad.parse::<Descriptor>();
            assert!(matches!(result, Err(DbError::Open(_))), "accepted {bad:?}");
        }
    }
}
