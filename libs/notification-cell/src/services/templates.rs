use crate::{NotificationEvent, NotificationType, RenderedNotification};

const CLOSING: &str = "<p>Thank you for choosing our healthcare services.</p>";
const ARRIVAL_NOTE: &str = "<p>Please arrive 15 minutes before your appointment time.</p>\n\
    <p>If you need to reschedule or cancel, please contact us at least 24 hours in advance.</p>";

/// Fixed subject and HTML body for an event. Pure.
pub fn render(event: &NotificationEvent) -> RenderedNotification {
    let patient = escape_html(non_empty_or(&event.patient_name, "Patient"));
    let doctor = escape_html(non_empty_or(&event.provider_name, "Doctor"));
    let time = event.appointment_time.format("%A, %B %-d, %Y at %H:%M").to_string();

    let (subject, heading, lines) = match event.kind {
        NotificationType::Created => (
            "Appointment Confirmation".to_string(),
            "Appointment Confirmation",
            format!(
                "<p>Your appointment with Dr. {} has been scheduled for {}.</p>\n{}",
                doctor, time, ARRIVAL_NOTE
            ),
        ),
        NotificationType::Updated => (
            "Appointment Update".to_string(),
            "Appointment Update",
            format!(
                "<p>Your appointment with Dr. {} has been updated to {}.</p>\n{}",
                doctor, time, ARRIVAL_NOTE
            ),
        ),
        NotificationType::Cancelled => (
            "Appointment Cancellation".to_string(),
            "Appointment Cancellation",
            format!(
                "<p>Your appointment with Dr. {} scheduled for {} has been cancelled.</p>\n\
                 <p>If you would like to reschedule, please contact our office.</p>",
                doctor, time
            ),
        ),
        NotificationType::StatusUpdated => {
            let status = humanize_status(event.status.as_deref().unwrap_or("updated"));
            (
                format!("Appointment Status: {}", capitalize(&status)),
                "Appointment Status Update",
                format!(
                    "<p>Your appointment with Dr. {} scheduled for {} has been marked as {}.</p>\n\
                     <p>If you have any questions, please contact our office.</p>",
                    doctor,
                    time,
                    escape_html(&status)
                ),
            )
        }
        NotificationType::Unknown => (
            "Healthcare Appointment Notification".to_string(),
            "Appointment Notification",
            format!(
                "<p>This is a notification regarding your appointment with Dr. {} scheduled for {}.</p>\n\
                 <p>If you have any questions, please contact our office.</p>",
                doctor, time
            ),
        ),
    };

    let html = format!(
        "<h2>{}</h2>\n<p>Dear {},</p>\n{}\n{}",
        heading, patient, lines, CLOSING
    );

    RenderedNotification { subject, html }
}

fn non_empty_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() {
        fallback
    } else {
        value
    }
}

fn humanize_status(status: &str) -> String {
    status.replace('_', " ")
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn event(kind: NotificationType, status: Option<&str>) -> NotificationEvent {
        NotificationEvent {
            kind,
            appointment_id: Uuid::new_v4(),
            patient_id: None,
            provider_id: None,
            patient_email: Some("jane@example.com".to_string()),
            patient_name: "Jane Doe".to_string(),
            provider_name: "Gregory House".to_string(),
            appointment_time: NaiveDate::from_ymd_opt(2024, 1, 2)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
            status: status.map(str::to_string),
        }
    }

    #[test]
    fn created_event_renders_confirmation() {
        let rendered = render(&event(NotificationType::Created, None));

        assert_eq!(rendered.subject, "Appointment Confirmation");
        assert!(rendered.html.contains("Dear Jane Doe,"));
        assert!(rendered.html.contains("Dr. Gregory House has been scheduled for Tuesday, January 2, 2024 at 10:00"));
        assert!(rendered.html.contains("15 minutes"));
    }

    #[test]
    fn status_subject_is_capitalized() {
        let rendered = render(&event(NotificationType::StatusUpdated, Some("no_show")));

        assert_eq!(rendered.subject, "Appointment Status: No show");
        assert!(rendered.html.contains("has been marked as no show"));
    }

    #[test]
    fn unknown_type_uses_generic_template() {
        let rendered = render(&event(NotificationType::Unknown, None));
        assert_eq!(rendered.subject, "Healthcare Appointment Notification");
    }

    #[test]
    fn names_are_escaped_and_defaulted() {
        let mut e = event(NotificationType::Cancelled, None);
        e.patient_name = String::new();
        e.provider_name = "<b>Evil</b>".to_string();

        let rendered = render(&e);

        assert!(rendered.html.contains("Dear Patient,"));
        assert!(rendered.html.contains("Dr. &lt;b&gt;Evil&lt;/b&gt;"));
        assert!(!rendered.html.contains("<b>"));
    }
}
