use serde::Deserialize;
use std::fs;

static DEFAULT_CONFIG_PATH: &str = "/etc/vigil/config.yml";

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSettings {
    pub level: String,
    pub format: Option<String>,
    pub console: Option<bool>,
    pub file: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct XDisplaySettings {
    pub server_path: String,
    #[serde(default)]
    pub server_arguments: String,
    pub xauth_path: String,
    #[serde(default = "default_xauth_timeout_ms")]
    pub xauth_timeout_ms: u64,
    pub session_dir: String,
    pub display_command: Option<String>,
    #[serde(default = "default_minimum_vt")]
    pub minimum_vt: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UsersSettings {
    pub default_path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ThemeSettings {
    pub theme_dir: String,
    pub current: String,
}

impl ThemeSettings {
    /// Returns the path to the active theme, as handed to the greeter.
    pub fn current_theme_path(&self) -> String {
        format!("{}/{}", self.theme_dir, self.current)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GreeterSettings {
    pub path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HelperSettings {
    pub path: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AutologinSettings {
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub session: String,
    #[serde(default)]
    pub relogin: bool,
}

impl AutologinSettings {
    /// Autologin is only considered when both a user and a session are configured.
    pub fn is_configured(&self) -> bool {
        !self.user.is_empty() && !self.session.is_empty()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub runtime_dir: String,
    pub service_account: String,
    pub state_path: String,
    #[serde(default = "default_seat")]
    pub seat: String,
    pub x_display: XDisplaySettings,
    pub users: UsersSettings,
    pub theme: ThemeSettings,
    pub greeter: GreeterSettings,
    pub helper: HelperSettings,
    #[serde(default)]
    pub autologin: AutologinSettings,
}

fn default_xauth_timeout_ms() -> u64 {
    5000
}

fn default_minimum_vt() -> u32 {
    7
}

fn default_seat() -> String {
    "seat0".to_string()
}

impl Settings {
    pub fn new(config_path: &str) -> Result<Self, config::ConfigError> {
        let config_path = if config_path.is_empty() { DEFAULT_CONFIG_PATH } else { config_path };

        let settings_raw = config::Config::builder()
            .add_source(config::File::new(config_path, config::FileFormat::Yaml))
            .add_source(config::Environment::with_prefix("VIGIL").separator("__"))
            .build()?;

        settings_raw.try_deserialize()
    }

    pub fn verify(&self) -> bool {
        // The daemon spawns the X server and changes file ownership
        if !nix::unistd::geteuid().is_root() {
            error!("Vigil has to be run as root");
            return false;
        }

        if self.x_display.server_path.is_empty() {
            error!("X server path is missing from settings");
            return false;
        }

        if self.x_display.xauth_path.is_empty() {
            error!("xauth path is missing from settings");
            return false;
        }

        if self.helper.path.is_empty() || self.greeter.path.is_empty() {
            error!("Greeter and authentication helper paths must both be set");
            return false;
        }

        if let Err(error) = fs::create_dir_all(&self.runtime_dir) {
            error!("Cannot create runtime directory at {}: {}", self.runtime_dir, error);
            return false;
        }

        true
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Settings used by unit tests across the crate.
    pub fn test_settings(runtime_dir: &str, session_dir: &str) -> Settings {
        Settings {
            logging: LoggingSettings {
                level: "debug".to_string(),
                format: None,
                console: Some(false),
                file: None,
            },
            runtime_dir: runtime_dir.to_string(),
            service_account: "vigil".to_string(),
            state_path: format!("{}/state.json", runtime_dir),
            seat: "seat0".to_string(),
            x_display: XDisplaySettings {
                server_path: "/usr/bin/X".to_string(),
                server_arguments: "-nolisten tcp".to_string(),
                xauth_path: "/usr/bin/xauth".to_string(),
                xauth_timeout_ms: 1000,
                session_dir: session_dir.to_string(),
                display_command: None,
                minimum_vt: 7,
            },
            users: UsersSettings {
                default_path: "/usr/local/bin:/usr/bin:/bin".to_string(),
            },
            theme: ThemeSettings {
                theme_dir: "/usr/share/vigil/themes".to_string(),
                current: "maui".to_string(),
            },
            greeter: GreeterSettings {
                path: "/usr/bin/vigil-greeter".to_string(),
            },
            helper: HelperSettings {
                path: "/usr/lib/vigil/vigil-helper".to_string(),
            },
            autologin: AutologinSettings::default(),
        }
    }

    #[test]
    fn loads_yaml_configuration() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        fs::write(&path, r#"
logging:
  level: info
runtime_dir: /run/vigil
service_account: vigil
state_path: /var/lib/vigil/state.json
x_display:
  server_path: /usr/bin/X
  xauth_path: /usr/bin/xauth
  session_dir: /usr/share/xsessions
users:
  default_path: /usr/bin:/bin
theme:
  theme_dir: /usr/share/vigil/themes
  current: maui
greeter:
  path: /usr/bin/vigil-greeter
helper:
  path: /usr/lib/vigil/vigil-helper
autologin:
  user: alice
  session: plasma.desktop
"#).unwrap();

        let settings = Settings::new(path.to_str().unwrap()).unwrap();
        assert_eq!(settings.seat, "seat0");
        assert_eq!(settings.x_display.xauth_timeout_ms, 5000);
        assert_eq!(settings.x_display.minimum_vt, 7);
        assert!(settings.autologin.is_configured());
        assert!(!settings.autologin.relogin);
        assert_eq!(settings.theme.current_theme_path(), "/usr/share/vigil/themes/maui");
    }

    #[test]
    fn autologin_requires_user_and_session() {
        let mut autologin = AutologinSettings::default();
        assert!(!autologin.is_configured());
        autologin.user = "alice".to_string();
        assert!(!autologin.is_configured());
        autologin.session = "xterm".to_string();
        assert!(autologin.is_configured());
    }
}
