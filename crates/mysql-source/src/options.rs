use mysql_async::{Opts, OptsBuilder};
use serde::Deserialize;

const DEFAULT_PORT: u16 = 3306;

/// Connection settings, read from the `mysql` section of the config file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MySqlOptions {
    /// `host:port`
    pub addr: String,
    pub username: String,
    pub password: String,
    /// Replica server id announced when requesting the binlog stream
    pub server_id: u32,
    /// Reconnect attempts after the binlog stream drops
    pub max_reconnect_attempts: u32,
}

impl Default for MySqlOptions {
    fn default() -> Self {
        Self {
            addr: format!("127.0.0.1:{DEFAULT_PORT}"),
            username: "canal".to_string(),
            password: "canal".to_string(),
            server_id: 88,
            max_reconnect_attempts: 5,
        }
    }
}

impl MySqlOptions {
    pub fn host_port(&self) -> (String, u16) {
        match self.addr.rsplit_once(':') {
            Some((host, port)) => match port.parse() {
                Ok(port) => (host.to_string(), port),
                Err(_) => (self.addr.clone(), DEFAULT_PORT),
            },
            None => (self.addr.clone(), DEFAULT_PORT),
        }
    }

    pub fn opts(&self) -> Opts {
        let (host, port) = self.host_port();
        OptsBuilder::default()
            .ip_or_hostname(host)
            .tcp_port(port)
            .user(Some(self.username.clone()))
            .pass(Some(self.password.clone()))
            .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_port() {
        let mut options = MySqlOptions::default();
        assert_eq!(options.host_port(), ("127.0.0.1".to_string(), 3306));
        options.addr = "db.internal:3307".into();
        assert_eq!(options.host_port(), ("db.internal".to_string(), 3307));
        options.addr = "db.internal".into();
        assert_eq!(options.host_port(), ("db.internal".to_string(), 3306));
    }

    #[test]
    fn test_defaults_from_partial_section() {
        let options: MySqlOptions = serde_json::from_str(r#"{"addr": "db:3306"}"#).unwrap();
        assert_eq!(options.server_id, 88);
        assert_eq!(options.username, "canal");
        assert_eq!(options.max_reconnect_attempts, 5);
    }
}
