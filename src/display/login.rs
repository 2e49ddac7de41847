use zeroize::Zeroizing;

use crate::event::LoginRequest;
use super::Display;

impl Display {
    /// Starts an authentication attempt for a greeter login request.
    ///
    /// Only one attempt can be in flight: a request arriving while another greeter is waiting
    /// for its answer is refused.
    pub(super) fn on_login(&mut self, request: LoginRequest) {
        let LoginRequest { connection, user, password, session } = request;
        let password = Zeroizing::new(password);

        if self.pending_login.is_some() {
            warn!("Refusing login for {} on display {}: another login is in progress", user, self.name);
            self.socket.login_failed(&connection);
            return;
        }

        debug!("Login request for {} on display {}", user, self.name);
        self.pending_login = Some(connection);
        self.autologin = false;
        if let Err(error) = self.start_auth(&user, &password, &session) {
            warn!("Login for {} on display {} failed: {}", user, self.name, error);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::display::tests::Fixture;
    use crate::helper::HelperEvent;

    #[test]
    fn concurrent_login_is_refused() {
        let mut fixture = Fixture::started();
        let first = fixture.login(b"g1", "alice", "secret", "gnome.desktop");
        let second = fixture.login(b"g2", "bob", "hunter2", "gnome.desktop");

        assert_eq!(fixture.calls(), vec![
            "helper.configure alice gnome-session".to_string(),
            "helper.launch".to_string(),
            format!("socket.login_failed {}", second),
        ]);

        fixture.helper(HelperEvent::Authenticated { user: "alice".to_string(), success: true });
        assert_eq!(fixture.count(&format!("socket.login_succeeded {}", first)), 1);
    }

    #[test]
    fn unresolvable_session_answers_the_greeter() {
        let mut fixture = Fixture::started();
        let connection = fixture.login(b"g1", "alice", "secret", "broken.desktop");

        assert_eq!(fixture.calls(), vec![format!("socket.login_failed {}", connection)]);

        // The failed attempt does not block the next one
        fixture.login(b"g1", "alice", "secret", "missing.desktop");
        fixture.login(b"g1", "alice", "secret", "gnome.desktop");
        assert_eq!(fixture.count("socket.login_failed"), 2);
        assert_eq!(fixture.count("helper.launch"), 1);
    }

    #[test]
    fn helper_launch_failure_answers_the_greeter() {
        let mut fixture = Fixture::started();
        fixture.behaviour.fail_helper.set(true);
        let connection = fixture.login(b"g1", "alice", "secret", "gnome.desktop");

        assert_eq!(fixture.count(&format!("socket.login_failed {}", connection)), 1);
        assert!(fixture.display.is_started());
    }
}
