use std::ffi::CString;
use std::fs;
use std::fs::{OpenOptions, Permissions};
use std::io::ErrorKind;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use crate::common::{Result, DisplayError};

/// Changes the ownership of a file, directory or socket.
///
/// # Arguments
/// * `path` - The path to the file.
/// * `uid` - The user ID to set as the owner.
/// * `gid` - The group ID to set as the owner.
///
/// # Returns
/// A `Result` indicating success or a `DisplayError` if the operation fails.
pub fn chown(path: &Path, uid: u32, gid: u32) -> Result<()> {
    let cpath = CString::new(path.as_os_str().as_bytes())
        .map_err(|error| DisplayError::SystemError(format!("{}", error)))?;
    match unsafe { libc::chown(cpath.as_ptr(), uid, gid) } {
        0 => Ok(()),
        _ => Err(DisplayError::SystemError(format!("Error changing ownership of {}: {}", path.display(), std::io::Error::last_os_error()))),
    }
}

/// Creates a directory and all its parent directories if they do not exist.
pub fn mkdir(path: &Path) -> Result<()> {
    if let Err(error) = fs::create_dir_all(path) {
        return Err(DisplayError::SystemError(format!("Could not create directory {}: {}", path.display(), error)));
    }
    Ok(())
}

/// Changes the permissions of a file or directory.
///
/// # Arguments
/// * `path` - The path to the file or directory.
/// * `mode` - The permissions to set, in octal format (e.g., `0o600`).
pub fn chmod(path: &Path, mode: u32) -> Result<()> {
    let mode = Permissions::from_mode(mode);
    if fs::set_permissions(path, mode).is_err() {
        return Err(DisplayError::SystemError(format!("Could not change permissions: {}", path.display())));
    }
    Ok(())
}

/// Creates an empty file if it does not exist yet. Existing content is kept.
pub fn touch(path: &Path) -> Result<()> {
    if let Err(error) = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
    {
        return Err(DisplayError::SystemError(format!("Could not create file {}: {}", path.display(), error)));
    }
    Ok(())
}

/// Removes a file. A file that is already gone is not an error.
pub fn remove(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
        Err(error) => Err(DisplayError::SystemError(format!("Could not remove {}: {}", path.display(), error))),
    }
}
