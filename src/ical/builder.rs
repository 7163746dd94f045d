//! A module to build ICal files

use chrono::Utc;
use ical::parser::ical::component::{IcalCalendar, IcalTimeZoneTransitionType};
use ics::components::{Component, Parameter, Property};
use ics::properties::{Categories, Completed, Description, LastModified, PercentComplete, Priority, RelatedTo, Status, Summary};
use ics::{escape_text, ICalendar, ToDo};

use crate::task::TaskData;
use super::parser::{is_parent_relation, recurrence_id};
use super::{default_prod_id, FloatingDate, COLOR_PROPERTY};

/// Properties of a `VTODO` that are generated from a [`TaskData`]
const MANAGED_PROPERTIES: &[&str] = &[
    "UID", "DTSTAMP", "CREATED", "LAST-MODIFIED", "SUMMARY", "DESCRIPTION", "PRIORITY", "PERCENT-COMPLETE",
    "STATUS", "COMPLETED", "CATEGORIES", "DTSTART", "DUE", COLOR_PROPERTY,
];

/// Create an iCal file that contains a single `VTODO` for this task
pub fn build_from(task: &TaskData) -> String {
    build_calendar(std::slice::from_ref(task))
}

/// Create an iCal file that contains a `VTODO` for every given task
pub fn build_calendar(tasks: &[TaskData]) -> String {
    let prod_id = default_prod_id();
    let mut calendar = ICalendar::new("2.0", prod_id.as_str());
    for task in tasks {
        calendar.add_todo(build_todo(task));
    }
    calendar.to_string()
}

/// Create an iCal file for this task, on top of `original`, the iCal file this task was last read from.
///
/// Everything a [`TaskData`] does not model is kept as is: the other properties of the `VTODO` (`RRULE`, `LOCATION`...),
/// its alarms, the time zones and the recurrence overrides of the calendar.
/// Falls back to [`build_from`] if `original` cannot be parsed or does not contain this task.
pub fn build_from_existing(task: &TaskData, original: &str) -> String {
    let mut reader = ical::IcalParser::new(original.as_bytes());
    let calendar = match reader.next() {
        Some(Ok(calendar)) => calendar,
        Some(Err(err)) => {
            log::warn!("Unable to parse the previous version of task {}, rebuilding it: {}", task.uid, err);
            return build_from(task);
        },
        None => return build_from(task),
    };
    match patch_calendar(task, &calendar) {
        Some(content) => content,
        None => {
            log::debug!("No previous version of task {} found, rebuilding it", task.uid);
            build_from(task)
        },
    }
}

fn patch_calendar(task: &TaskData, original: &IcalCalendar) -> Option<String> {
    let is_this_task = |props: &[ical::property::Property]| props.iter()
        .any(|p| p.name == "UID" && p.value.as_deref().map(str::trim) == Some(task.uid.as_str()));
    let master = original.todos.iter()
        .find(|todo| is_this_task(&todo.properties) && recurrence_id(&todo.properties).is_none())?;

    let prod_id = default_prod_id();
    let mut calendar = ICalendar::new("2.0", prod_id.as_str());
    for prop in &original.properties {
        if prop.name != "VERSION" && prop.name != "PRODID" {
            calendar.push(convert_property(prop));
        }
    }
    for timezone in &original.timezones {
        let mut component = Component::new("VTIMEZONE");
        for prop in &timezone.properties {
            component.add_property(convert_property(prop));
        }
        for transition in &timezone.transitions {
            let name = match transition.transition {
                IcalTimeZoneTransitionType::STANDARD => "STANDARD",
                IcalTimeZoneTransitionType::DAYLIGHT => "DAYLIGHT",
            };
            component.add_component(generic_component(name, &transition.properties));
        }
        calendar.add_component(component);
    }

    let mut todo = Component::from(build_todo(task));
    let due_or_no_start = !task.end_date.is_empty() || task.start_date.is_empty();
    for prop in &master.properties {
        let managed = MANAGED_PROPERTIES.contains(&prop.name.as_str())
            || (prop.name == "RELATED-TO" && is_parent_relation(prop))
            || (prop.name == "DURATION" && due_or_no_start);
        if !managed {
            todo.add_property(convert_property(prop));
        }
    }
    for alarm in &master.alarms {
        todo.add_component(generic_component("VALARM", &alarm.properties));
    }
    calendar.add_component(todo);

    for occurrence in original.todos.iter().filter(|todo| is_this_task(&todo.properties) && recurrence_id(&todo.properties).is_some()) {
        let mut component = generic_component("VTODO", &occurrence.properties);
        for alarm in &occurrence.alarms {
            component.add_component(generic_component("VALARM", &alarm.properties));
        }
        calendar.add_component(component);
    }

    Some(calendar.to_string())
}

fn generic_component(name: &'static str, properties: &[ical::property::Property]) -> Component<'static> {
    let mut component = Component::new(name);
    for prop in properties {
        component.add_property(convert_property(prop));
    }
    component
}

/// Copy a parsed property. Values are still escaped, so they are written back verbatim
fn convert_property(prop: &ical::property::Property) -> Property<'static> {
    let mut property = Property::new(prop.name.clone(), prop.value.clone().unwrap_or_default());
    for (name, values) in prop.params.iter().flatten() {
        let value = values.iter()
            .map(|v| quote_param_value(v))
            .collect::<Vec<_>>()
            .join(",");
        property.add(Parameter::new(name.clone(), value));
    }
    property
}

fn quote_param_value(value: &str) -> String {
    let value = value.trim_matches('"');
    if value.contains(|c: char| c == ':' || c == ';' || c == ',') {
        format!("\"{}\"", value)
    } else {
        value.to_string()
    }
}

fn build_todo(task: &TaskData) -> ToDo<'_> {
    let s_now = format_utc_now();
    let mut todo = ToDo::new(task.uid.as_str(), s_now.clone());

    if let Some(last_modified) = FloatingDate::parse(&task.changed_at) {
        todo.push(LastModified::new(format!("{}Z", last_modified.format())));
    }
    if let Some(created) = FloatingDate::parse(&task.created_at) {
        todo.push(Property::new("CREATED", format!("{}Z", created.format())));
    }

    todo.push(Summary::new(escape_text(task.text.as_str())));
    if !task.notes.is_empty() {
        todo.push(Description::new(escape_text(task.notes.as_str())));
    }
    if !task.parent.is_empty() {
        todo.push(RelatedTo::new(task.parent.as_str()));
    }
    todo.push(Priority::new(task.priority.min(9).to_string()));
    todo.push(PercentComplete::new(task.percent_complete.min(100).to_string()));

    if !task.tags.is_empty() {
        let tags = task.tags.iter()
            .map(|tag| escape_text(tag.as_str()).into_owned())
            .collect::<Vec<_>>()
            .join(",");
        todo.push(Categories::new(tags));
    }

    // Empty dates are simply not written, which clears them on the server
    if let Some(start) = FloatingDate::parse(&task.start_date) {
        todo.push(date_property("DTSTART", start));
    }
    if let Some(due) = FloatingDate::parse(&task.end_date) {
        todo.push(date_property("DUE", due));
    }

    if task.completed {
        todo.push(Completed::new(s_now));
        todo.push(Status::completed());
    } else {
        todo.push(Status::needs_action());
    }

    if !task.color.is_empty() {
        todo.push(Property::new(COLOR_PROPERTY, task.color.as_str()));
    }

    todo
}

fn date_property(name: &'static str, date: FloatingDate) -> Property<'static> {
    let mut property = Property::new(name, date.format());
    if date.is_date_only() {
        property.add(Parameter::new("VALUE", "DATE"));
    }
    property
}

fn format_utc_now() -> String {
    Utc::now().format("%Y%m%dT%H%M%SZ").to_string()
}


#[cfg(test)]
mod tests {
    use super::*;

    fn sample_task() -> TaskData {
        TaskData {
            list_uid: "L1".into(),
            uid: "T1".into(),
            parent: "T0".into(),
            text: "Buy milk, eggs".into(),
            notes: "At the\nmarket".into(),
            tags: vec!["food".into(), "weekly".into()],
            color: "blue".into(),
            priority: 5,
            percent_complete: 40,
            start_date: "20240105T100000".into(),
            end_date: "20240107".into(),
            ..TaskData::default()
        }
    }

    #[test]
    fn test_ical_from_task() {
        let ical = build_from(&sample_task());

        assert!(ical.starts_with("BEGIN:VCALENDAR\r\n"));
        assert!(ical.contains("BEGIN:VTODO\r\n"));
        assert!(ical.contains("UID:T1\r\n"));
        assert!(ical.contains("SUMMARY:Buy milk\\, eggs\r\n"));
        assert!(ical.contains("DESCRIPTION:At the\\nmarket\r\n"));
        assert!(ical.contains("RELATED-TO:T0\r\n"));
        assert!(ical.contains("PRIORITY:5\r\n"));
        assert!(ical.contains("PERCENT-COMPLETE:40\r\n"));
        assert!(ical.contains("CATEGORIES:food,weekly\r\n"));
        assert!(ical.contains("DTSTART:20240105T100000\r\n"));
        assert!(ical.contains("DUE;VALUE=DATE:20240107\r\n"));
        assert!(ical.contains("STATUS:NEEDS-ACTION\r\n"));
        assert!(ical.contains("X-ERRANDS-COLOR:blue\r\n"));
    }

    #[test]
    fn completed_task_and_empty_fields() {
        let task = TaskData {
            uid: "T2".into(),
            text: "Done".into(),
            completed: true,
            ..TaskData::default()
        };
        let ical = build_from(&task);
        assert!(ical.contains("STATUS:COMPLETED\r\n"));
        assert!(ical.contains("COMPLETED:"));
        assert!(!ical.contains("RELATED-TO"));
        assert!(!ical.contains("DUE"));
        assert!(!ical.contains("DTSTART"));
        assert!(!ical.contains("X-ERRANDS-COLOR"));
    }

    const RECURRING_ICAL: &str = "BEGIN:VCALENDAR\r
VERSION:2.0\r
PRODID:-//Other client//EN\r
CALSCALE:GREGORIAN\r
BEGIN:VTIMEZONE\r
TZID:Europe/Paris\r
BEGIN:STANDARD\r
DTSTART:19701025T030000\r
TZOFFSETFROM:+0200\r
TZOFFSETTO:+0100\r
END:STANDARD\r
END:VTIMEZONE\r
BEGIN:VTODO\r
UID:T1\r
DTSTAMP:20240101T000000Z\r
SUMMARY:Water the plants\r
RELATED-TO:T0\r
RELATED-TO;RELTYPE=SIBLING:T5\r
LOCATION:Balcony\\, left side\r
RRULE:FREQ=WEEKLY;BYDAY=SA\r
ATTENDEE;CN=\"Doe, Jane\":mailto:jane@example.com\r
X-ERRANDS-COLOR:red\r
BEGIN:VALARM\r
ACTION:DISPLAY\r
TRIGGER:-PT15M\r
DESCRIPTION:Reminder\r
END:VALARM\r
END:VTODO\r
BEGIN:VTODO\r
UID:T1\r
RECURRENCE-ID:20240113\r
SUMMARY:Water the plants twice\r
END:VTODO\r
END:VCALENDAR\r
";

    #[test]
    fn unmodelled_properties_are_kept() {
        let mut task = crate::ical::parse(RECURRING_ICAL, "L1").unwrap().remove(0);
        task.parent.clear();
        task.text = "Water the flowers".into();
        task.color = "green".into();

        let ical = build_from_existing(&task, RECURRING_ICAL);
        assert!(ical.contains("SUMMARY:Water the flowers\r\n"));
        assert!(!ical.contains("RELATED-TO:T0"));
        assert!(ical.contains("RELATED-TO;RELTYPE=SIBLING:T5\r\n"));
        assert!(ical.contains("LOCATION:Balcony\\, left side\r\n"));
        assert!(ical.contains("RRULE:FREQ=WEEKLY;BYDAY=SA\r\n"));
        assert!(ical.contains("ATTENDEE;CN=\"Doe, Jane\":mailto:jane@example.com\r\n"));
        assert!(ical.contains("BEGIN:VALARM\r\nACTION:DISPLAY\r\nTRIGGER:-PT15M\r\n"));
        assert!(ical.contains("TZID:Europe/Paris\r\n"));
        assert!(ical.contains("BEGIN:STANDARD\r\n"));
        assert!(ical.contains("CALSCALE:GREGORIAN\r\n"));
        assert!(ical.contains("RECURRENCE-ID:20240113\r\n"));
        assert_eq!(ical.matches("X-ERRANDS-COLOR").count(), 1);
        assert!(ical.contains("X-ERRANDS-COLOR:green\r\n"));
        assert!(!ical.contains("Other client"));

        let reparsed = crate::ical::parse(&ical, "L1").unwrap();
        assert_eq!(reparsed.len(), 1);
        assert_eq!(reparsed[0].text, "Water the flowers");
        assert_eq!(reparsed[0].parent, "");
    }

    #[test]
    fn unusable_original_is_rebuilt() {
        let task = sample_task();
        let ical = build_from_existing(&task, "not ical");
        assert!(ical.contains("UID:T1\r\n"));
        let other = build_from_existing(&task, RECURRING_ICAL.replace("UID:T1", "UID:T9").as_str());
        assert!(other.contains("SUMMARY:Buy milk\\, eggs\r\n"));
        assert!(!other.contains("RRULE"));
    }
}
