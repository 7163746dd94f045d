//! A module to parse ICal files

use ical::parser::ical::component::IcalTodo;
use ical::property::Property;

use crate::error::IcalError;
use crate::task::{normalize_tags, TaskData};
use super::{normalize_date, split_escaped_list, unescape_text, COLOR_PROPERTY};


/// Parse an iCal file into tasks, one per `VTODO` it contains (events and journals are ignored).
///
/// Overrides of single occurrences (`VTODO`s with a `RECURRENCE-ID`) are not tasks of their own and are skipped.
/// `calendar_id` becomes the `list_uid` of the returned tasks.
pub fn parse(content: &str, calendar_id: &str) -> Result<Vec<TaskData>, IcalError> {
    let reader = ical::IcalParser::new(content.as_bytes());
    let mut tasks = Vec::new();
    let mut n_calendars = 0;

    for calendar in reader {
        let calendar = calendar.map_err(|err| IcalError(format!("unable to parse iCal data: {}", err)))?;
        n_calendars += 1;
        for todo in calendar.todos.iter().filter(|todo| recurrence_id(&todo.properties).is_none()) {
            tasks.push(parse_todo(todo, calendar_id)?);
        }
    }

    if n_calendars == 0 {
        return Err(IcalError("no VCALENDAR found".to_string()));
    }
    Ok(tasks)
}

fn parse_todo(todo: &IcalTodo, calendar_id: &str) -> Result<TaskData, IcalError> {
    let mut task = TaskData {
        list_uid: calendar_id.to_string(),
        synced: true,
        ..TaskData::default()
    };
    let mut completion_date = false;

    for prop in &todo.properties {
        let value = match &prop.value {
            None => continue,
            Some(value) => value.as_str(),
        };
        match prop.name.as_str() {
            "UID" => task.uid = value.trim().to_string(),
            "SUMMARY" => task.text = unescape_text(value),
            "DESCRIPTION" => task.notes = unescape_text(value),
            "RELATED-TO" => {
                if is_parent_relation(prop) {
                    task.parent = value.trim().to_string();
                }
            },
            "PRIORITY" => task.priority = parse_bounded(value, 9),
            "PERCENT-COMPLETE" => task.percent_complete = parse_bounded(value, 100),
            "STATUS" => task.completed = value.trim().eq_ignore_ascii_case("COMPLETED"),
            "COMPLETED" => completion_date = true,
            "CATEGORIES" => task.tags.extend(split_escaped_list(value)),
            "DTSTART" => task.start_date = normalize_date(value),
            "DUE" => task.end_date = normalize_date(value),
            "CREATED" => task.created_at = normalize_date(value),
            "LAST-MODIFIED" => task.changed_at = normalize_date(value),
            name if name == COLOR_PROPERTY => task.color = parse_color(value),
            _ => {},
        }
    }

    // A comma is a tag separator for the store, even an escaped one
    task.tags = normalize_tags(&task.tags);

    // Some clients only set a completion date
    if completion_date && !has_status(todo) {
        task.completed = true;
    }

    if task.uid.is_empty() {
        return Err(IcalError(format!("missing UID for task {:?}", task.text)));
    }
    Ok(task)
}

fn has_status(todo: &IcalTodo) -> bool {
    todo.properties.iter().any(|p| p.name == "STATUS")
}

/// Only the parent relationship (the default RELTYPE) is supported
pub(super) fn is_parent_relation(prop: &Property) -> bool {
    reltype(prop).map(|r| r.eq_ignore_ascii_case("PARENT")).unwrap_or(true)
}

pub(super) fn recurrence_id(properties: &[Property]) -> Option<&str> {
    properties.iter()
        .find(|p| p.name == "RECURRENCE-ID")
        .and_then(|p| p.value.as_deref())
}

fn reltype(prop: &Property) -> Option<&str> {
    prop.params.as_ref()?
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("RELTYPE"))
        .and_then(|(_, values)| values.first())
        .map(|s| s.as_str())
}

fn parse_bounded(value: &str, max: u8) -> u8 {
    match value.trim().parse::<i64>() {
        Ok(n) => n.clamp(0, i64::from(max)) as u8,
        Err(_) => {
            log::warn!("Ignoring invalid numeric value {:?}", value);
            0
        },
    }
}

fn parse_color(value: &str) -> String {
    let value = value.trim();
    match csscolorparser::parse(value) {
        Ok(_) => value.to_string(),
        Err(err) => {
            log::warn!("Ignoring invalid task color {:?}: {}", value, err);
            String::new()
        },
    }
}
