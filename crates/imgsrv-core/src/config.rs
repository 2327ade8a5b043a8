use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 0; // 0 = OS-assigned ephemeral port
pub const DEFAULT_PROBE_ADDR: &str = "8.8.8.8:80"; // never actually contacted
pub const DEFAULT_FINISH_TIMEOUT_MS: u64 = 1_000;
pub const DEFAULT_FRAME_QUEUE: usize = 16;
pub const DEFAULT_VIEWER_QUEUE: usize = 8; // frames buffered per viewer before it is dropped
pub const DEFAULT_VIEWER_SEND_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_PAGE_TITLE: &str = "imgsrv";

/// Top-level config (imgsrv.toml + IMGSRV_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImgsrvConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub publisher: PublisherConfig,
    #[serde(default)]
    pub page: PageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default)]
    pub port: u16,
    /// Remote address used to discover the outbound-routable local IP.
    #[serde(default = "default_probe_addr")]
    pub probe_addr: String,
    /// When false the listener address is logged as-is, without probing.
    #[serde(default = "bool_true")]
    pub advertise: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: DEFAULT_PORT,
            probe_addr: default_probe_addr(),
            advertise: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublisherConfig {
    /// Upper bound on waiting for the final frame's delivery acknowledgment.
    #[serde(default = "default_finish_timeout_ms")]
    pub finish_timeout_ms: u64,
    /// Capacity of the Publisher -> Broadcaster frame queue.
    #[serde(default = "default_frame_queue")]
    pub frame_queue: usize,
    /// Capacity of each viewer's outbound queue.
    #[serde(default = "default_viewer_queue")]
    pub viewer_queue: usize,
    #[serde(default = "default_viewer_send_timeout_ms")]
    pub viewer_send_timeout_ms: u64,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            finish_timeout_ms: DEFAULT_FINISH_TIMEOUT_MS,
            frame_queue: DEFAULT_FRAME_QUEUE,
            viewer_queue: DEFAULT_VIEWER_QUEUE,
            viewer_send_timeout_ms: DEFAULT_VIEWER_SEND_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageConfig {
    #[serde(default = "default_page_title")]
    pub title: String,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            title: default_page_title(),
        }
    }
}

fn bool_true() -> bool {
    true
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_probe_addr() -> String {
    DEFAULT_PROBE_ADDR.to_string()
}
fn default_finish_timeout_ms() -> u64 {
    DEFAULT_FINISH_TIMEOUT_MS
}
fn default_frame_queue() -> usize {
    DEFAULT_FRAME_QUEUE
}
fn default_viewer_queue() -> usize {
    DEFAULT_VIEWER_QUEUE
}
fn default_viewer_send_timeout_ms() -> u64 {
    DEFAULT_VIEWER_SEND_TIMEOUT_MS
}
fn default_page_title() -> String {
    DEFAULT_PAGE_TITLE.to_string()
}

impl ImgsrvConfig {
    /// Load config from a TOML file with IMGSRV_* env var overrides.
    ///
    /// Uses the explicit path when given, otherwise `~/.imgsrv/imgsrv.toml`.
    /// A missing file is not an error: every field has a default.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        Self::figment(&path)
            .extract()
            .map_err(|e| crate::error::ImgsrvError::Config(e.to_string()))
    }

    fn figment(path: &str) -> Figment {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("IMGSRV_").split("__"))
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.imgsrv/imgsrv.toml", home)
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    // Jail serializes tests that touch the process environment.
    fn load(path: &str) -> figment::error::Result<ImgsrvConfig> {
        ImgsrvConfig::load(Some(path)).map_err(|e| e.to_string().into())
    }

    #[test]
    fn defaults_when_file_missing() {
        Jail::expect_with(|_jail| {
            let config = load("/nonexistent/imgsrv.toml")?;
            assert_eq!(config.server.port, 0);
            assert_eq!(config.server.bind, "0.0.0.0");
            assert_eq!(config.publisher.finish_timeout_ms, 1_000);
            assert_eq!(config.page.title, "imgsrv");
            Ok(())
        });
    }

    #[test]
    fn toml_overrides_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "imgsrv.toml",
                "[server]\nport = 8123\nadvertise = false\n\n[publisher]\nviewer_queue = 2\n\n[page]\ntitle = \"Monte Carlo\"",
            )?;

            let config = load("imgsrv.toml")?;
            assert_eq!(config.server.port, 8123);
            assert!(!config.server.advertise);
            assert_eq!(config.publisher.viewer_queue, 2);
            assert_eq!(config.publisher.frame_queue, DEFAULT_FRAME_QUEUE);
            assert_eq!(config.page.title, "Monte Carlo");
            Ok(())
        });
    }

    #[test]
    fn nested_env_vars_override_toml() {
        Jail::expect_with(|jail| {
            jail.create_file("imgsrv.toml", "[server]\nport = 9000\n")?;
            jail.set_env("IMGSRV_SERVER__PORT", "8123");
            jail.set_env("IMGSRV_PUBLISHER__FINISH_TIMEOUT_MS", "250");
            jail.set_env("IMGSRV_PAGE__TITLE", "from env");

            let config = load("imgsrv.toml")?;
            assert_eq!(config.server.port, 8123);
            assert_eq!(config.publisher.finish_timeout_ms, 250);
            assert_eq!(config.page.title, "from env");
            assert_eq!(config.server.bind, DEFAULT_BIND);
            Ok(())
        });
    }

    #[test]
    fn malformed_toml_is_config_error() {
        Jail::expect_with(|jail| {
            jail.create_file("imgsrv.toml", "[server\nport = ")?;

            let err = ImgsrvConfig::load(Some("imgsrv.toml")).unwrap_err();
            assert_eq!(err.code(), "CONFIG_ERROR");
            Ok(())
        });
    }
}
