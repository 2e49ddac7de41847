use std::collections::BTreeMap;

use super::{SessionDescriptor, SessionPaths};

/// Where a user session runs: the display, its virtual terminal and seat.
pub struct SessionPlacement<'a> {
    pub display_name: &'a str,
    pub terminal_id: u32,
    pub seat: &'a str,
    pub default_path: &'a str,
}

/// Builds the environment handed to the helper for the user session.
///
/// Each call allocates a new session path from `paths`.
pub fn session_environment(placement: &SessionPlacement, descriptor: &SessionDescriptor, paths: &dyn SessionPaths) -> BTreeMap<String, String> {
    let session_name = format!("Session{}", paths.next_session_id());

    let mut environment = BTreeMap::new();
    let mut insert = |key: &str, value: String| {
        environment.insert(key.to_string(), value);
    };

    insert("PATH", placement.default_path.to_string());
    insert("DISPLAY", placement.display_name.to_string());
    insert("XDG_SEAT", placement.seat.to_string());
    insert("XDG_SEAT_PATH", paths.seat_path(placement.seat));
    insert("XDG_SESSION_PATH", paths.session_path(&session_name));
    insert("XDG_VTNR", placement.terminal_id.to_string());
    insert("DESKTOP_SESSION", descriptor.short_name.clone());
    insert("XDG_CURRENT_DESKTOP", descriptor.desktop_names.clone());
    insert("XDG_SESSION_CLASS", "user".to_string());
    insert("XDG_SESSION_TYPE", "x11".to_string());
    insert("XDG_SESSION_DESKTOP", descriptor.desktop_names.clone());

    environment
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::DisplayManagerPaths;

    #[test]
    fn environment_describes_the_session() {
        let paths = DisplayManagerPaths::new();
        let placement = SessionPlacement {
            display_name: ":0",
            terminal_id: 7,
            seat: "seat0",
            default_path: "/usr/bin:/bin",
        };
        let descriptor = SessionDescriptor {
            exec_command: "gnome-session".to_string(),
            desktop_names: "GNOME:Unity".to_string(),
            short_name: "gnome".to_string(),
        };

        let environment = session_environment(&placement, &descriptor, &paths);
        assert_eq!(environment["PATH"], "/usr/bin:/bin");
        assert_eq!(environment["DISPLAY"], ":0");
        assert_eq!(environment["XDG_SEAT"], "seat0");
        assert_eq!(environment["XDG_SEAT_PATH"], "/org/freedesktop/DisplayManager/seat0");
        assert_eq!(environment["XDG_SESSION_PATH"], "/org/freedesktop/DisplayManager/Session1");
        assert_eq!(environment["XDG_VTNR"], "7");
        assert_eq!(environment["DESKTOP_SESSION"], "gnome");
        assert_eq!(environment["XDG_CURRENT_DESKTOP"], "GNOME:Unity");
        assert_eq!(environment["XDG_SESSION_CLASS"], "user");
        assert_eq!(environment["XDG_SESSION_TYPE"], "x11");
        assert_eq!(environment["XDG_SESSION_DESKTOP"], "GNOME:Unity");

        let next = session_environment(&placement, &descriptor, &paths);
        assert_eq!(next["XDG_SESSION_PATH"], "/org/freedesktop/DisplayManager/Session2");
    }
}
