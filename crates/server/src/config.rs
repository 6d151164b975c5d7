use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "dirt-server", version, about = "DirtCloud REST server")]
pub struct Config {
    /// Listen address; a bare `:port` binds all interfaces
    #[arg(long = "addr", env = "DIRT_HTTP_ADDR", default_value = "0.0.0.0:8080")]
    pub http_addr: String,

    /// Bearer token required on /v1 (empty disables auth)
    #[arg(long = "token", env = "DIRT_TOKEN", default_value = "", hide_env_values = true)]
    pub token: String,

    /// SQLite database path or `:memory:` (empty: ~/.dirt/dirt.db)
    #[arg(long = "db", env = "DIRT_SQLITE_DSN", default_value = "")]
    pub sqlite_dsn: String,

    /// Prometheus exporter listen address (host:port)
    #[arg(long = "metrics-addr", env = "DIRT_METRICS_ADDR")]
    pub metrics_addr: Option<String>,
}

impl Config {
    pub fn bind_addr(&self) -> String {
        if self.http_addr.starts_with(':') {
            format!("0.0.0.0{}", self.http_addr)
        } else {
            self.http_addr.clone()
        }
    }

    pub fn token(&self) -> Option<&str> {
        Some(self.token.as_str()).filter(|t| !t.is_empty())
    }
}
