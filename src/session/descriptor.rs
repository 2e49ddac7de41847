use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

static DESKTOP_ENTRY_SUFFIX: &str = ".desktop";
static EXEC_KEY: &str = "Exec=";
static DESKTOP_NAMES_KEY: &str = "DesktopNames=";

/// What a session selector resolves to: the command the helper should run for the user,
/// the `XDG_CURRENT_DESKTOP` style class label and the short session name.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionDescriptor {
    pub exec_command: String,
    pub desktop_names: String,
    pub short_name: String,
}

impl SessionDescriptor {
    /// Resolves a session selector.
    ///
    /// A selector ending in `.desktop` names a desktop entry in `session_dir`. Anything else
    /// is taken as a raw command line and used verbatim as both command and short name.
    ///
    /// # Arguments
    /// * `session_dir` - Directory holding the session desktop entries.
    /// * `selector` - Desktop entry file name or raw command.
    pub fn resolve(session_dir: &Path, selector: &str) -> SessionDescriptor {
        match selector.strip_suffix(DESKTOP_ENTRY_SUFFIX) {
            Some(short_name) => {
                let (exec_command, desktop_names) = Self::read_desktop_entry(&session_dir.join(selector));
                SessionDescriptor {
                    exec_command,
                    desktop_names,
                    short_name: short_name.to_string(),
                }
            },
            None => SessionDescriptor {
                exec_command: selector.to_string(),
                desktop_names: String::new(),
                short_name: selector.to_string(),
            },
        }
    }

    /// A descriptor without a command cannot be started.
    pub fn is_runnable(&self) -> bool {
        !self.exec_command.is_empty()
    }

    fn read_desktop_entry(path: &Path) -> (String, String) {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(error) => {
                warn!("Could not read session file {}: {}", path.display(), error);
                return (String::new(), String::new());
            }
        };

        let mut exec_command: Option<String> = None;
        let mut desktop_names: Option<String> = None;
        for line in BufReader::new(file).lines().map_while(|line| line.ok()) {
            if exec_command.is_none() {
                if let Some(command) = line.strip_prefix(EXEC_KEY) {
                    exec_command = Some(command.to_string());
                }
            }
            if desktop_names.is_none() {
                if let Some(names) = line.strip_prefix(DESKTOP_NAMES_KEY) {
                    desktop_names = Some(names.split(';').filter(|name| !name.is_empty()).collect::<Vec<_>>().join(":"));
                }
            }
        }

        (exec_command.unwrap_or_default(), desktop_names.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn resolves_desktop_entry() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("gnome.desktop"),
            "[Desktop Entry]\nName=GNOME\nExec=gnome-session\nDesktopNames=GNOME;Unity\nExec=ignored\n").unwrap();

        let descriptor = SessionDescriptor::resolve(dir.path(), "gnome.desktop");
        assert_eq!(descriptor, SessionDescriptor {
            exec_command: "gnome-session".to_string(),
            desktop_names: "GNOME:Unity".to_string(),
            short_name: "gnome".to_string(),
        });
        assert!(descriptor.is_runnable());
    }

    #[test]
    fn trailing_separator_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("plasma.desktop"), "Exec=startplasma-x11\nDesktopNames=KDE;\n").unwrap();

        let descriptor = SessionDescriptor::resolve(dir.path(), "plasma.desktop");
        assert_eq!(descriptor.desktop_names, "KDE");
    }

    #[test]
    fn raw_command_is_used_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let descriptor = SessionDescriptor::resolve(dir.path(), "/usr/bin/xterm");
        assert_eq!(descriptor.exec_command, "/usr/bin/xterm");
        assert_eq!(descriptor.short_name, "/usr/bin/xterm");
        assert_eq!(descriptor.desktop_names, "");
    }

    #[test]
    fn missing_or_incomplete_entry_has_no_command() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!SessionDescriptor::resolve(dir.path(), "missing.desktop").is_runnable());

        fs::write(dir.path().join("broken.desktop"), "[Desktop Entry]\nName=Broken\n").unwrap();
        let descriptor = SessionDescriptor::resolve(dir.path(), "broken.desktop");
        assert!(!descriptor.is_runnable());
        assert_eq!(descriptor.short_name, "broken");
    }
}
