pub use account::Account;

mod account;

use nix::unistd::User;

/// Read-only view of the system user database.
pub trait UserDatabase {
    /// Looks up an account by name. `None` when the user does not exist or the lookup failed.
    fn lookup(&self, username: &str) -> Option<Account>;
}

/// `UserDatabase` backed by the NSS password database.
pub struct SystemUsers;

impl UserDatabase for SystemUsers {
    fn lookup(&self, username: &str) -> Option<Account> {
        match User::from_name(username) {
            Ok(Some(user)) => Some(Account::from(user)),
            Ok(None) => None,
            Err(error) => {
                warn!("Failed to look up user \"{}\": {}", username, error);
                None
            }
        }
    }
}
