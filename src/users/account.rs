use std::path::{Path, PathBuf};

use nix::unistd::User;

/// The `Account` struct represents the parts of a system user account the daemon needs:
/// where to merge the X authority cookie and who should own it.
#[derive(Clone, Debug, PartialEq)]
pub struct Account {
    username: String,
    home: PathBuf,
    uid: u32,
    gid: u32,
}

impl Account {
    /// Creates a new `Account` instance.
    ///
    /// # Arguments
    /// * `username` - The username of the account.
    /// * `home` - The home directory of the account.
    /// * `uid` - The user ID of the account.
    /// * `gid` - The primary group ID of the account.
    pub fn new(username: &str, home: impl Into<PathBuf>, uid: u32, gid: u32) -> Self {
        Account {
            username: username.into(),
            home: home.into(),
            uid,
            gid,
        }
    }

    /// Returns the username of the account.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns the home directory of the account.
    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Returns the user ID of the account.
    pub fn uid(&self) -> u32 {
        self.uid
    }

    /// Returns the group ID of the account.
    pub fn gid(&self) -> u32 {
        self.gid
    }

    /// Path of the personal authority file of this account.
    pub fn xauthority_path(&self) -> PathBuf {
        self.home.join(".Xauthority")
    }
}

impl From<User> for Account {
    fn from(user: User) -> Self {
        Account::new(&user.name, user.dir, user.uid.as_raw(), user.gid.as_raw())
    }
}
