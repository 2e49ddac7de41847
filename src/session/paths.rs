use std::cell::Cell;

static DISPLAY_MANAGER_PATH: &str = "/org/freedesktop/DisplayManager";

/// Allocates the resource paths a session advertises to the desktop (`XDG_SEAT_PATH`,
/// `XDG_SESSION_PATH`).
pub trait SessionPaths {
    fn seat_path(&self, seat: &str) -> String;
    fn session_path(&self, session: &str) -> String;
    /// Returns a new session ordinal, never handed out before by this allocator.
    fn next_session_id(&self) -> u32;
}

/// `SessionPaths` following the freedesktop DisplayManager object layout.
pub struct DisplayManagerPaths {
    next_id: Cell<u32>,
}

impl DisplayManagerPaths {
    pub fn new() -> Self {
        Self {
            next_id: Cell::new(1),
        }
    }
}

impl Default for DisplayManagerPaths {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionPaths for DisplayManagerPaths {
    fn seat_path(&self, seat: &str) -> String {
        // Object paths cannot contain '-'
        format!("{}/{}", DISPLAY_MANAGER_PATH, seat.replace('-', "_"))
    }

    fn session_path(&self, session: &str) -> String {
        format!("{}/{}", DISPLAY_MANAGER_PATH, session)
    }

    fn next_session_id(&self) -> u32 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_increasing_session_ids() {
        let paths = DisplayManagerPaths::new();
        assert_eq!(paths.next_session_id(), 1);
        assert_eq!(paths.next_session_id(), 2);
        assert_eq!(paths.session_path("Session2"), "/org/freedesktop/DisplayManager/Session2");
        assert_eq!(paths.seat_path("seat0"), "/org/freedesktop/DisplayManager/seat0");
    }
}
