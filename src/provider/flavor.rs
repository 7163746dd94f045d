//! Server-specific behaviours
//!
//! Every supported server speaks CalDAV, but they differ on where the DAV root lives and on how calendars can be named.

use std::fmt::Debug;

use uuid::Uuid;

use crate::task::TaskListData;

/// What differs from one CalDAV server to another
pub trait ServerFlavor: Send + Sync + Debug {
    /// Turn the URL the user typed into the URL discovery should start from
    fn normalize_url(&self, url: &str, username: &str) -> String;

    /// The id of the calendar that a local list is pushed to
    fn remote_calendar_id_for(&self, list: &TaskListData) -> String {
        list.uid.clone()
    }
}

fn with_scheme(url: &str) -> String {
    let url = url.trim();
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{}", url)
    }
}

fn append_path(url: &str, path: &str) -> String {
    format!("{}/{}", url.trim_end_matches('/'), path.trim_start_matches('/'))
}


/// Any standard CalDAV server
#[derive(Clone, Copy, Debug, Default)]
pub struct GenericCalDav;

impl ServerFlavor for GenericCalDav {
    fn normalize_url(&self, url: &str, _username: &str) -> String {
        with_scheme(url)
    }
}


#[derive(Clone, Copy, Debug, Default)]
pub struct Nextcloud;

impl ServerFlavor for Nextcloud {
    fn normalize_url(&self, url: &str, _username: &str) -> String {
        let url = with_scheme(url);
        if url.contains("/remote.php/dav") {
            url
        } else {
            append_path(&url, "remote.php/dav/")
        }
    }
}


/// Vikunja only accepts calendars whose id is a UUID, and the principal must be given explicitly
#[derive(Clone, Copy, Debug, Default)]
pub struct Vikunja;

impl ServerFlavor for Vikunja {
    fn normalize_url(&self, url: &str, username: &str) -> String {
        let url = with_scheme(url);
        if url.contains("/dav/") || url.ends_with("/dav") {
            url
        } else {
            append_path(&url, &format!("dav/principals/{}/", username))
        }
    }

    fn remote_calendar_id_for(&self, list: &TaskListData) -> String {
        Uuid::new_v5(&Uuid::NAMESPACE_DNS, list.name.as_bytes())
            .to_hyphenated()
            .to_string()
    }
}
