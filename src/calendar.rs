//! Calendars, as they are advertised by a CalDAV server

use std::convert::TryFrom;

use bitflags::bitflags;
use url::Url;

use crate::error::RemoteError;

bitflags! {
    pub struct SupportedComponents: u8 {
        /// An event, such as a calendar meeting
        const EVENT = 1;
        /// A to-do item, such as a reminder
        const TODO = 2;
    }
}

impl TryFrom<&minidom::Element> for SupportedComponents {
    type Error = RemoteError;

    /// Create an instance from an XML <supported-calendar-component-set> element
    fn try_from(element: &minidom::Element) -> Result<Self, Self::Error> {
        if element.name() != "supported-calendar-component-set" {
            return Err(RemoteError::Protocol("Element must be a <supported-calendar-component-set>".to_string()));
        }

        let mut flags = Self::empty();
        for child in element.children() {
            match child.attr("name") {
                None => continue,
                Some("VEVENT") => flags.insert(Self::EVENT),
                Some("VTODO") => flags.insert(Self::TODO),
                Some(other) => {
                    log::debug!("Unimplemented supported component type: {:?}. Ignoring it", other);
                    continue
                },
            };
        }

        Ok(flags)
    }
}


/// A calendar collection on the server
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteCalendar {
    /// Last segment of the calendar URL. This is what local lists are matched against.
    pub id: String,
    pub name: String,
    pub url: Url,
    pub supported_components: SupportedComponents,
}

impl RemoteCalendar {
    pub fn new(id: String, name: String, url: Url, supported_components: SupportedComponents) -> Self {
        Self { id, name, url, supported_components }
    }

    pub fn supports_tasks(&self) -> bool {
        self.supported_components.contains(SupportedComponents::TODO)
    }
}

/// The last non-empty segment of a URL path, which servers use as a calendar id
pub fn id_from_path(path: &str) -> Option<String> {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .last()
        .map(|segment| segment.to_string())
}
