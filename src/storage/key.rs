//! Object key derivation shared by every backend.

use chrono::{DateTime, TimeZone};

/// Root used by object stores when no folder is given.
pub const DEFAULT_ROOT: &str = "uploads";

/// Timestamp prefix format, e.g. `20240131235959`.
const STAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Formats the collision-avoiding timestamp prefix.
pub fn timestamp<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    now.format(STAMP_FORMAT).to_string()
}

/// `{timestamp}_{name}`; an empty name becomes `file_{timestamp}.png`.
pub fn stamped_name(file_name: &str, stamp: &str) -> String {
    let name = file_name.trim();
    if name.is_empty() {
        format!("{stamp}_file_{stamp}.png")
    } else {
        format!("{stamp}_{name}")
    }
}

/// `{folder}/{timestamp}_{name}`, or just the stamped name for an empty folder.
pub fn relative_key(folder: &str, file_name: &str, stamp: &str) -> String {
    let folder = folder.trim().trim_matches('/');
    let name = stamped_name(file_name, stamp);
    if folder.is_empty() {
        name
    } else {
        format!("{folder}/{name}")
    }
}

/// Object key rooted at `default_root` when no folder is given.
pub fn object_key(folder: &str, file_name: &str, stamp: &str, default_root: &str) -> String {
    if folder.trim().trim_matches('/').is_empty() {
        format!("{}/{}", default_root.trim_matches('/'), stamped_name(file_name, stamp))
    } else {
        relative_key(folder, file_name, stamp)
    }
}

/// Joins a URL prefix and a key with exactly one slash.
pub fn join_url(base: &str, key: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), key.trim_start_matches('/'))
}
