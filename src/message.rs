//! Rendering of the "I'm OK" status message.

use crate::api::models::{Coordinates, MeetingPoint};

pub const DEFAULT_TEMPLATE: &str =
    "I'm OK! This is {sender}. My location: {location} Meeting point: {meeting_point}";

const UNKNOWN_LOCATION: &str = "unavailable";
const NO_MEETING_POINT: &str = "not set";

/// Values shared by every recipient of one broadcast.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageContext<'a> {
    pub sender: &'a str,
    pub location: Option<Coordinates>,
    pub meeting_point: Option<&'a MeetingPoint>,
}

pub fn maps_link(at: Coordinates) -> String {
    format!("https://maps.google.com/?q={:.6},{:.6}", at.latitude, at.longitude)
}

fn meeting_point_text(point: &MeetingPoint) -> String {
    match (&point.address, point.coordinates()) {
        (Some(address), _) if !address.trim().is_empty() => format!("{} ({})", point.name, address.trim()),
        (_, Some(at)) => format!("{} ({})", point.name, maps_link(at)),
        _ => point.name.clone(),
    }
}

/// Fill `{name}`, `{sender}`, `{location}` and `{meeting_point}` in one pass.
///
/// Substituted values are never scanned again, and unknown placeholders are
/// kept as written.
pub fn render(template: &str, recipient_name: &str, ctx: &MessageContext<'_>) -> String {
    let mut out = String::with_capacity(template.len() + 64);
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        let Some(close) = tail.find('}') else {
            out.push_str(tail);
            return out;
        };
        let key = &tail[1..close];
        // A stray `{` only opens a placeholder from the last one before `}`.
        if let Some(inner) = key.rfind('{') {
            out.push_str(&tail[..=inner]);
            rest = &tail[inner + 1..];
            continue;
        }
        match key {
            "name" => out.push_str(recipient_name),
            "sender" => out.push_str(ctx.sender),
            "location" => match ctx.location {
                Some(at) => out.push_str(&maps_link(at)),
                None => out.push_str(UNKNOWN_LOCATION),
            },
            "meeting_point" => match ctx.meeting_point {
                Some(point) => out.push_str(&meeting_point_text(point)),
                None => out.push_str(NO_MEETING_POINT),
            },
            _ => out.push_str(&tail[..=close]),
        }
        rest = &tail[close + 1..];
    }
    out.push_str(rest);
    out
}
