use chrono::{DateTime, NaiveDateTime, Utc};
use rust_mcp_sdk::macros;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    calendar_client::{Attendee, CalendarProvider, CalendarResponse, EventBody, EventTime},
    domain::{
        envelope::Envelope,
        utils::{present, record_id, EventSummary},
        validation::{
            require_non_empty, validate_clock_time, validate_date_only, validate_email,
            validate_rfc3339, Validate,
        },
    },
    errors::AppError,
};

/// Upcoming events returned by the event list resource.
pub const UPCOMING_EVENT_LIMIT: u32 = 30;

#[macros::mcp_tool(
    name = "create-google-calendar-event",
    description = "Creates a Google Calendar event and invites the given attendees"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct CreateEventTool {
    #[serde(rename = "eventTitle")]
    pub event_title: String,
    #[serde(rename = "eventDescription")]
    pub event_description: Option<String>,
    /// RFC 3339 timestamp, e.g. 2025-03-01T09:00:00-06:00
    #[serde(rename = "eventStart")]
    pub event_start: String,
    /// RFC 3339 timestamp after eventStart
    #[serde(rename = "eventEnd")]
    pub event_end: String,
    /// Attendee email addresses
    pub attendees: Vec<String>,
    /// IANA zone name; defaults to the configured calendar zone
    #[serde(rename = "timeZone")]
    pub time_zone: Option<String>,
}

#[macros::mcp_tool(
    name = "update-google-calendar-event",
    description = "Updates a Google Calendar event. Title, description and attendees are only changed when given."
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct UpdateEventTool {
    #[serde(rename = "eventId")]
    pub event_id: String,
    #[serde(rename = "eventTitle")]
    pub event_title: Option<String>,
    #[serde(rename = "eventDescription")]
    pub event_description: Option<String>,
    /// YYYY-MM-DD
    #[serde(rename = "eventStartDate")]
    pub event_start_date: String,
    /// HH:MM, 24-hour clock
    #[serde(rename = "eventStartTime")]
    pub event_start_time: String,
    #[serde(rename = "eventEndDate")]
    pub event_end_date: String,
    #[serde(rename = "eventEndTime")]
    pub event_end_time: String,
    pub attendees: Option<Vec<String>>,
    /// Zone the dates and times are in; UTC when omitted
    #[serde(rename = "timeZone")]
    pub time_zone: Option<String>,
}

#[macros::mcp_tool(
    name = "delete-google-calendar-event",
    description = "Deletes a Google Calendar event"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct DeleteEventTool {
    #[serde(rename = "eventId")]
    pub event_id: String,
}

#[macros::mcp_tool(
    name = "lookup-google-calendar-event-by-id",
    description = "Lookup a Google Calendar event by ID"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct LookupEventByIdTool {
    /// The ID of the Google Calendar event to look up
    #[serde(rename = "eventId")]
    pub event_id: String,
}

fn validate_attendees(attendees: &[String]) -> Result<(), AppError> {
    for (index, email) in attendees.iter().enumerate() {
        validate_email(&format!("attendees[{index}]"), email)?;
    }
    Ok(())
}

fn validate_time_zone(time_zone: Option<&String>) -> Result<(), AppError> {
    match time_zone {
        Some(zone) => require_non_empty("timeZone", zone),
        None => Ok(()),
    }
}

fn attendee_list(attendees: &[String]) -> Vec<Attendee> {
    attendees
        .iter()
        .map(|email| Attendee {
            email: email.trim().to_string(),
        })
        .collect()
}

impl Validate for CreateEventTool {
    fn validate(&self) -> Result<(), AppError> {
        require_non_empty("eventTitle", &self.event_title)?;
        validate_rfc3339("eventStart", &self.event_start)?;
        validate_rfc3339("eventEnd", &self.event_end)?;
        validate_attendees(&self.attendees)?;
        validate_time_zone(self.time_zone.as_ref())?;

        let start = DateTime::parse_from_rfc3339(self.event_start.trim());
        let end = DateTime::parse_from_rfc3339(self.event_end.trim());
        if let (Ok(start), Ok(end)) = (start, end) {
            if end <= start {
                return Err(AppError::validation("eventEnd", "must be after eventStart"));
            }
        }
        Ok(())
    }
}

impl UpdateEventTool {
    fn boundary(date: &str, time: &str) -> String {
        format!("{}T{}:00", date.trim(), time.trim())
    }

    fn event_time(&self, date: &str, time: &str) -> EventTime {
        let local = Self::boundary(date, time);
        match present(self.time_zone.clone()) {
            Some(zone) => EventTime {
                date_time: local,
                time_zone: Some(zone),
            },
            None => EventTime {
                date_time: format!("{local}Z"),
                time_zone: None,
            },
        }
    }
}

impl Validate for UpdateEventTool {
    fn validate(&self) -> Result<(), AppError> {
        require_non_empty("eventId", &self.event_id)?;
        validate_date_only("eventStartDate", &self.event_start_date)?;
        validate_clock_time("eventStartTime", &self.event_start_time)?;
        validate_date_only("eventEndDate", &self.event_end_date)?;
        validate_clock_time("eventEndTime", &self.event_end_time)?;
        if let Some(attendees) = &self.attendees {
            validate_attendees(attendees)?;
        }
        validate_time_zone(self.time_zone.as_ref())?;

        let parse = |date: &str, time: &str| {
            NaiveDateTime::parse_from_str(&Self::boundary(date, time), "%Y-%m-%dT%H:%M:%S")
        };
        let start = parse(&self.event_start_date, &self.event_start_time);
        let end = parse(&self.event_end_date, &self.event_end_time);
        if let (Ok(start), Ok(end)) = (start, end) {
            if end <= start {
                return Err(AppError::validation(
                    "eventEndDate",
                    "event must end after it starts",
                ));
            }
        }
        Ok(())
    }
}

impl Validate for DeleteEventTool {
    fn validate(&self) -> Result<(), AppError> {
        require_non_empty("eventId", &self.event_id)
    }
}

impl Validate for LookupEventByIdTool {
    fn validate(&self) -> Result<(), AppError> {
        require_non_empty("eventId", &self.event_id)
    }
}

fn unexpected_status(status: u16) -> AppError {
    AppError::ExternalCall {
        service: "Google Calendar",
        message: format!("unexpected status {status}"),
    }
}

/// Confirmation text for a written event, with its link when Google sent one.
fn written_event(verb: &str, response: CalendarResponse) -> Result<Envelope, AppError> {
    if response.status != 200 {
        return Err(unexpected_status(response.status));
    }
    let event_id = record_id(&response.body)
        .ok_or(AppError::missing_identifier("Google Calendar", "event"))?;

    let summary = match response.body.get("htmlLink").and_then(Value::as_str) {
        Some(link) => format!("Event {verb} successfully! Event ID: {event_id} ({link})"),
        None => format!("Event {verb} successfully! Event ID: {event_id}"),
    };
    Ok(Envelope::with_payload(summary, json!({"event": response.body})))
}

pub async fn create_event(
    calendar: &dyn CalendarProvider,
    default_time_zone: &str,
    input: CreateEventTool,
) -> Result<Envelope, AppError> {
    let time_zone = present(input.time_zone).unwrap_or_else(|| default_time_zone.to_string());
    let event = EventBody {
        summary: Some(input.event_title.trim().to_string()),
        description: present(input.event_description),
        attendees: Some(attendee_list(&input.attendees)),
        start: Some(EventTime {
            date_time: input.event_start.trim().to_string(),
            time_zone: Some(time_zone.clone()),
        }),
        end: Some(EventTime {
            date_time: input.event_end.trim().to_string(),
            time_zone: Some(time_zone),
        }),
    };

    let response = calendar.insert_event(&event).await?;
    written_event("created", response)
}

pub async fn update_event(
    calendar: &dyn CalendarProvider,
    input: UpdateEventTool,
) -> Result<Envelope, AppError> {
    let event = EventBody {
        summary: present(input.event_title.clone()),
        description: present(input.event_description.clone()),
        attendees: input.attendees.as_deref().map(attendee_list),
        start: Some(input.event_time(&input.event_start_date, &input.event_start_time)),
        end: Some(input.event_time(&input.event_end_date, &input.event_end_time)),
    };

    let response = calendar.patch_event(input.event_id.trim(), &event).await?;
    written_event("updated", response)
}

pub async fn delete_event(
    calendar: &dyn CalendarProvider,
    input: DeleteEventTool,
) -> Result<Envelope, AppError> {
    let event_id = input.event_id.trim();
    let response = calendar.delete_event(event_id).await?;
    if response.status != 204 {
        return Err(unexpected_status(response.status));
    }

    Ok(Envelope::with_payload(
        format!("Event deleted successfully. Event ID: {event_id}"),
        json!({"eventId": event_id, "deleted": true}),
    ))
}

pub async fn lookup_event_by_id(
    calendar: &dyn CalendarProvider,
    input: LookupEventByIdTool,
) -> Result<Envelope, AppError> {
    let event_id = input.event_id.trim();
    let response = match calendar.get_event(event_id).await {
        Ok(response) => response,
        Err(err) if err.is_not_found() => return Ok(Envelope::message("Event not found")),
        Err(err) => return Err(err.into()),
    };

    Ok(Envelope::with_payload(
        format!("Event found! Event ID: {event_id}"),
        json!({"event": response.body}),
    ))
}

pub async fn list_upcoming_events(calendar: &dyn CalendarProvider) -> Result<Envelope, AppError> {
    let response = calendar
        .list_upcoming_events(Utc::now(), UPCOMING_EVENT_LIMIT)
        .await?;
    let events: Vec<EventSummary> = response
        .body
        .get("items")
        .and_then(Value::as_array)
        .map(|items| items.iter().map(EventSummary::from_record).collect())
        .unwrap_or_default();

    if events.is_empty() {
        return Ok(Envelope::message("No upcoming events found"));
    }
    Ok(Envelope::with_payload(
        format!("Found {} upcoming event(s)", events.len()),
        json!({"events": events}),
    ))
}
