//! This module provides a client to connect to a CalDAV server

use std::collections::HashMap;
use std::convert::TryFrom;
use std::time::Duration;

use async_trait::async_trait;
use minidom::Element;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use url::Url;

use crate::calendar::{id_from_path, RemoteCalendar, SupportedComponents};
use crate::config::Credentials;
use crate::error::RemoteError;
use crate::provider::flavor::ServerFlavor;
use crate::resource::Resource;
use crate::task::TaskData;
use crate::traits::RemoteSource;
use crate::utils::{find_elem, find_elems, xml_escape};


static DAVCLIENT_BODY: &str = r#"
    <d:propfind xmlns:d="DAV:">
       <d:prop>
           <d:current-user-principal />
       </d:prop>
    </d:propfind>
"#;

static HOMESET_BODY: &str = r#"
    <d:propfind xmlns:d="DAV:" xmlns:c="urn:ietf:params:xml:ns:caldav" >
      <d:self/>
      <d:prop>
        <c:calendar-home-set />
      </d:prop>
    </d:propfind>
"#;

static CAL_BODY: &str = r#"
    <d:propfind xmlns:d="DAV:" xmlns:c="urn:ietf:params:xml:ns:caldav" >
       <d:prop>
         <d:displayname />
         <d:resourcetype />
         <c:supported-calendar-component-set />
       </d:prop>
    </d:propfind>
"#;

static TASKS_BODY: &str = r#"
    <c:calendar-query xmlns:d="DAV:" xmlns:c="urn:ietf:params:xml:ns:caldav">
        <d:prop>
            <d:getetag />
            <c:calendar-data />
        </d:prop>
        <c:filter>
            <c:comp-filter name="VCALENDAR">
                <c:comp-filter name="VTODO" />
            </c:comp-filter>
        </c:filter>
    </c:calendar-query>
"#;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

fn mkcalendar_body(name: &str) -> String {
    format!(r#"<?xml version="1.0" encoding="utf-8" ?>
    <c:mkcalendar xmlns:d="DAV:" xmlns:c="urn:ietf:params:xml:ns:caldav">
      <d:set>
        <d:prop>
          <d:displayname>{}</d:displayname>
          <c:supported-calendar-component-set>
            <c:comp name="VTODO"/>
          </c:supported-calendar-component-set>
        </d:prop>
      </d:set>
    </c:mkcalendar>
"#, xml_escape(name))
}

fn rename_body(name: &str) -> String {
    format!(r#"<?xml version="1.0" encoding="utf-8" ?>
    <d:propertyupdate xmlns:d="DAV:">
      <d:set>
        <d:prop>
          <d:displayname>{}</d:displayname>
        </d:prop>
      </d:set>
    </d:propertyupdate>
"#, xml_escape(name))
}


/// A task resource on the server
#[derive(Clone, Debug)]
struct RemoteItem {
    url: Url,
    /// The iCalendar data last fetched or sent. Updates are built on top of it, to keep what [`TaskData`] does not model
    ical: String,
}

/// A CalDAV source that fetches its data from a CalDAV server
pub struct Client {
    resource: Resource,
    http: reqwest::Client,

    principal: Option<Url>,
    calendar_home_set: Option<Url>,
    /// Calendars seen during the last discovery, by id
    calendars: HashMap<String, RemoteCalendar>,
    /// Known task resources, by (calendar id, task uid). Other clients do not always name resources after the uid
    items: HashMap<(String, String), RemoteItem>,
}

impl Client {
    /// Create a client. This does not start a connection
    pub fn new(credentials: &Credentials, flavor: &dyn ServerFlavor) -> Result<Self, RemoteError> {
        let normalized = flavor.normalize_url(&credentials.url, &credentials.username);
        let url = Url::parse(&normalized)
            .map_err(|source| RemoteError::InvalidUrl{ url: normalized.clone(), source })?;
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            resource: Resource::new(url, credentials.username.clone(), credentials.password.clone()),
            http,
            principal: None,
            calendar_home_set: None,
            calendars: HashMap::new(),
            items: HashMap::new(),
        })
    }

    /// Create a client and make sure the server can be logged in, by discovering the calendar home set
    pub async fn connect(credentials: &Credentials, flavor: &dyn ServerFlavor) -> Result<Self, RemoteError> {
        let mut client = Self::new(credentials, flavor)?;
        client.get_cal_home_set().await?;
        Ok(client)
    }

    pub fn url(&self) -> &Url {
        self.resource.url()
    }

    async fn request(&self, method: Method, url: &Url, depth: Option<u32>, body: Option<(String, &str)>) -> Result<reqwest::Response, RemoteError> {
        let mut builder = self.http
            .request(method.clone(), url.as_str())
            .basic_auth(self.resource.username(), Some(self.resource.password()));
        if let Some(depth) = depth {
            builder = builder.header("Depth", depth);
        }
        if let Some((body, content_type)) = body {
            builder = builder
                .header(CONTENT_TYPE, content_type)
                .header(CONTENT_LENGTH, body.len())
                .body(body);
        }

        log::trace!("{} {}", method, url);
        let response = builder.send().await?;
        check_status(response, url)
    }

    async fn sub_request(&self, method: &[u8], url: &Url, body: &str, depth: u32) -> Result<String, RemoteError> {
        let method = Method::from_bytes(method)
            .map_err(|err| RemoteError::Other(format!("cannot create HTTP method: {}", err)))?;
        let response = self.request(method, url, Some(depth), Some((body.to_string(), "application/xml"))).await?;
        Ok(response.text().await?)
    }

    /// Return the Principal URL, or fetch it from server if not known yet
    async fn get_principal(&mut self) -> Result<Url, RemoteError> {
        if let Some(p) = &self.principal {
            return Ok(p.clone());
        }

        let base = self.resource.url().clone();
        let text = self.sub_request(b"PROPFIND", &base, DAVCLIENT_BODY, 0).await?;
        let principal_url = match parse_href(&text, &["current-user-principal", "href"])? {
            Some(href) => join_href(&base, &href)?,
            None => {
                log::debug!("No current-user-principal advertised, using {} as the principal", base);
                base
            },
        };
        log::debug!("Principal URL is {}", principal_url);
        self.principal = Some(principal_url.clone());

        Ok(principal_url)
    }

    /// Return the Homeset URL, or fetch it from server if not known yet
    async fn get_cal_home_set(&mut self) -> Result<Url, RemoteError> {
        if let Some(h) = &self.calendar_home_set {
            return Ok(h.clone());
        }
        let principal_url = self.get_principal().await?;

        let text = self.sub_request(b"PROPFIND", &principal_url, HOMESET_BODY, 0).await?;
        let href = parse_href(&text, &["calendar-home-set", "href"])?
            .ok_or_else(|| RemoteError::Protocol("no calendar-home-set in server response".to_string()))?;
        let chs_url = join_href(&principal_url, &href)?;
        log::debug!("Calendar home set URL is {:?}", chs_url.path());
        self.calendar_home_set = Some(chs_url.clone());

        Ok(chs_url)
    }

    /// The URL of a calendar, re-discovering calendars if it is not known yet
    async fn calendar_url(&mut self, id: &str) -> Result<Url, RemoteError> {
        if let Some(cal) = self.calendars.get(id) {
            return Ok(cal.url.clone());
        }
        self.get_calendars().await?;
        self.calendars.get(id)
            .map(|cal| cal.url.clone())
            .ok_or_else(|| RemoteError::CalendarNotFound(id.to_string()))
    }

    async fn task_url(&mut self, calendar_id: &str, uid: &str) -> Result<Url, RemoteError> {
        if let Some(item) = self.items.get(&(calendar_id.to_string(), uid.to_string())) {
            return Ok(item.url.clone());
        }
        let calendar_url = self.calendar_url(calendar_id).await?;
        join_href(&with_trailing_slash(calendar_url), &format!("{}.ics", uid))
    }

    async fn put_task(&mut self, calendar_id: &str, task: &TaskData, create: bool) -> Result<(), RemoteError> {
        let key = (calendar_id.to_string(), task.uid.clone());
        let url = self.task_url(calendar_id, &task.uid).await?;
        let ical_text = match self.items.get(&key) {
            Some(item) if !create => crate::ical::build_from_existing(task, &item.ical),
            _ => crate::ical::build_from(task),
        };

        let mut builder = self.http
            .put(url.as_str())
            .header(CONTENT_TYPE, "text/calendar; charset=utf-8")
            .header(CONTENT_LENGTH, ical_text.len())
            .basic_auth(self.resource.username(), Some(self.resource.password()));
        if create {
            builder = builder.header("If-None-Match", "*");
        }
        log::trace!("PUT {}", url);
        let response = builder.body(ical_text.clone()).send().await?;
        check_status(response, &url)?;

        self.items.insert(key, RemoteItem { url, ical: ical_text });
        Ok(())
    }
}

#[async_trait]
impl RemoteSource for Client {
    async fn get_calendars(&mut self) -> Result<Vec<RemoteCalendar>, RemoteError> {
        let cal_home_set = self.get_cal_home_set().await?;
        let text = self.sub_request(b"PROPFIND", &cal_home_set, CAL_BODY, 1).await?;
        let calendars = parse_calendars(&cal_home_set, &text)?;

        self.calendars = calendars.iter()
            .map(|cal| (cal.id.clone(), cal.clone()))
            .collect();
        Ok(calendars)
    }

    async fn create_calendar(&mut self, id: &str, name: &str) -> Result<(), RemoteError> {
        let cal_home_set = self.get_cal_home_set().await?;
        let url = join_href(&with_trailing_slash(cal_home_set), &format!("{}/", id))?;
        let method = Method::from_bytes(b"MKCALENDAR")
            .map_err(|err| RemoteError::Other(format!("cannot create HTTP method: {}", err)))?;
        self.request(method, &url, None, Some((mkcalendar_body(name), "application/xml"))).await?;

        log::info!("Created calendar {} ({})", name, url);
        let calendar = RemoteCalendar::new(id.to_string(), name.to_string(), url, SupportedComponents::TODO);
        self.calendars.insert(id.to_string(), calendar);
        Ok(())
    }

    async fn rename_calendar(&mut self, id: &str, name: &str) -> Result<(), RemoteError> {
        let url = self.calendar_url(id).await?;
        self.sub_request(b"PROPPATCH", &url, &rename_body(name), 0).await?;
        if let Some(cal) = self.calendars.get_mut(id) {
            cal.name = name.to_string();
        }
        Ok(())
    }

    async fn delete_calendar(&mut self, id: &str) -> Result<(), RemoteError> {
        let url = self.calendar_url(id).await?;
        match self.request(Method::DELETE, &url, None, None).await {
            Ok(_) => {},
            Err(RemoteError::UnexpectedStatus{ status: StatusCode::NOT_FOUND, .. }) => {
                log::debug!("Calendar {} was already deleted", url);
            },
            Err(err) => return Err(err),
        }
        self.calendars.remove(id);
        self.items.retain(|(cal_id, _), _| cal_id != id);
        Ok(())
    }

    async fn get_tasks(&mut self, calendar_id: &str) -> Result<Vec<TaskData>, RemoteError> {
        let url = self.calendar_url(calendar_id).await?;
        let text = self.sub_request(b"REPORT", &url, TASKS_BODY, 1).await?;

        let mut tasks = Vec::new();
        for (item, task) in parse_tasks(&url, &text, calendar_id)? {
            self.items.insert((calendar_id.to_string(), task.uid.clone()), item);
            tasks.push(task);
        }
        Ok(tasks)
    }

    async fn add_task(&mut self, calendar_id: &str, task: &TaskData) -> Result<(), RemoteError> {
        self.put_task(calendar_id, task, true).await
    }

    async fn update_task(&mut self, calendar_id: &str, task: &TaskData) -> Result<(), RemoteError> {
        self.put_task(calendar_id, task, false).await
    }

    async fn delete_task(&mut self, calendar_id: &str, uid: &str) -> Result<(), RemoteError> {
        let url = self.task_url(calendar_id, uid).await?;
        match self.request(Method::DELETE, &url, None, None).await {
            Ok(_) => {},
            Err(RemoteError::UnexpectedStatus{ status: StatusCode::NOT_FOUND, .. }) => {
                log::debug!("Task {} was already deleted", url);
            },
            Err(err) => return Err(err),
        }
        self.items.remove(&(calendar_id.to_string(), uid.to_string()));
        Ok(())
    }
}


fn check_status(response: reqwest::Response, url: &Url) -> Result<reqwest::Response, RemoteError> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(RemoteError::Unauthorized(status));
    }
    if !status.is_success() {
        return Err(RemoteError::UnexpectedStatus{ status, url: url.to_string() });
    }
    Ok(response)
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

/// Resolve an href (either a full URL or an absolute path) against the server URL
fn join_href(base: &Url, href: &str) -> Result<Url, RemoteError> {
    base.join(href.trim())
        .map_err(|source| RemoteError::InvalidUrl{ url: href.to_string(), source })
}

/// Follow a path of element names in an XML document, and return the text of the last one
fn parse_href(text: &str, items: &[&str]) -> Result<Option<String>, RemoteError> {
    let root: Element = text.parse()?;
    let mut current_element = &root;
    for item in items {
        current_element = match find_elem(current_element, item) {
            None => return Ok(None),
            Some(el) => el,
        };
    }
    let href = current_element.text();
    if href.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(href))
}

/// Extract the calendar collections that support tasks from a depth-1 PROPFIND multistatus
fn parse_calendars(base: &Url, text: &str) -> Result<Vec<RemoteCalendar>, RemoteError> {
    let root: Element = text.parse()?;
    let mut calendars = Vec::new();

    for rep in find_elems(&root, "response") {
        let display_name = find_elem(rep, "displayname").map(|e| e.text()).unwrap_or_default();

        // We filter out non-calendar items
        let resource_types = match find_elem(rep, "resourcetype") {
            None => continue,
            Some(rt) => rt,
        };
        if !resource_types.children().any(|rt| rt.name() == "calendar") {
            continue;
        }

        let el_supported_comps = match find_elem(rep, "supported-calendar-component-set") {
            None => continue,
            Some(comps) => comps,
        };
        let supported_components = match SupportedComponents::try_from(el_supported_comps) {
            Err(err) => {
                log::warn!("Calendar {} has invalid supported components ({})! Ignoring it.", display_name, err);
                continue;
            },
            Ok(sc) => sc,
        };
        if !supported_components.contains(SupportedComponents::TODO) {
            log::debug!("Calendar {} does not support tasks, ignoring it", display_name);
            continue;
        }

        let calendar_href = match find_elem(rep, "href") {
            None => {
                log::warn!("Calendar {} has no URL! Ignoring it.", display_name);
                continue;
            },
            Some(h) => h.text(),
        };
        let url = join_href(base, &calendar_href)?;
        let id = match id_from_path(url.path()) {
            None => continue,
            Some(id) => id,
        };
        let name = if display_name.is_empty() { id.clone() } else { display_name };

        log::debug!("Found calendar {} ({})", name, id);
        calendars.push(RemoteCalendar::new(id, name, url, supported_components));
    }

    Ok(calendars)
}

/// Extract the tasks (and the resources they come from) from a calendar-query REPORT multistatus
fn parse_tasks(base: &Url, text: &str, calendar_id: &str) -> Result<Vec<(RemoteItem, TaskData)>, RemoteError> {
    let root: Element = text.parse()?;
    let mut tasks = Vec::new();

    for response in find_elems(&root, "response") {
        let href = match find_elem(response, "href") {
            None => {
                log::warn!("Unable to extract HREF");
                continue;
            },
            Some(h) => join_href(base, &h.text())?,
        };
        let data = match find_elem(response, "calendar-data") {
            None => {
                log::warn!("No calendar data for {}, ignoring it", href);
                continue;
            },
            Some(el) => el.text(),
        };

        match crate::ical::parse(&data, calendar_id) {
            Err(err) => log::warn!("Unable to parse task {}: {}", href, err),
            Ok(parsed) => {
                let item = RemoteItem { url: href, ical: data };
                tasks.extend(parsed.into_iter().map(|task| (item.clone(), task)));
            },
        }
    }

    Ok(tasks)
}
