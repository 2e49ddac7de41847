pub use cookie::Cookie;
pub use xauth::{AuthorityTool, XauthTool, authority_commands};

mod cookie;
mod xauth;

use std::path::Path;

use crate::fs::chown;
use crate::users::UserDatabase;

/// Hands a credential or IPC artifact over to a named account.
///
/// Best effort: a missing account or a failed chown is logged and otherwise ignored.
pub fn adopt_ownership(users: &dyn UserDatabase, path: &Path, account_name: &str) {
    match users.lookup(account_name) {
        None => warn!("Failed to find the {} user. Owner of {} will not be changed.", account_name, path.display()),
        Some(account) => {
            if let Err(error) = chown(path, account.uid(), account.gid()) {
                warn!("Failed to change owner of {}: {}", path.display(), error);
            }
        }
    }
}
