//! Server-Sent Events frame rendering for connection layers.

use crate::event::Event;

/// Render one SSE frame.
///
/// `id:` is omitted when `id` is 0 and an empty type becomes `message`.
/// Each line of `data` gets its own `data:` field so embedded newlines
/// cannot terminate the frame early.
pub fn frame(id: i64, event_type: &str, data: &str) -> String {
    let event_type = if event_type.is_empty() {
        "message"
    } else {
        event_type
    };

    let mut out = String::with_capacity(data.len() + event_type.len() + 32);
    if id != 0 {
        out.push_str(&format!("id: {id}\n"));
    }
    out.push_str(&format!("event: {event_type}\n"));
    for line in data.split('\n') {
        out.push_str("data: ");
        out.push_str(line.strip_suffix('\r').unwrap_or(line));
        out.push('\n');
    }
    out.push('\n');
    out
}

/// Render an event as an SSE frame.
pub fn event_frame(event: &Event) -> String {
    frame(event.id, &event.event_type, &event.payload_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_with_id() {
        assert_eq!(frame(7, "msg", "hi"), "id: 7\nevent: msg\ndata: hi\n\n");
    }

    #[test]
    fn test_frame_without_id() {
        assert_eq!(frame(0, "msg", "hi"), "event: msg\ndata: hi\n\n");
    }

    #[test]
    fn test_frame_default_type() {
        assert_eq!(frame(0, "", "hi"), "event: message\ndata: hi\n\n");
    }

    #[test]
    fn test_frame_multiline_data() {
        assert_eq!(
            frame(1, "msg", "a\r\nb\nc"),
            "id: 1\nevent: msg\ndata: a\ndata: b\ndata: c\n\n"
        );
    }

    #[test]
    fn test_event_frame() {
        let event = Event::new(42, "chat.1", "msg", r#"{"text":"hi"}"#).with_session(3);
        assert_eq!(
            event_frame(&event),
            "id: 42\nevent: msg\ndata: {\"text\":\"hi\"}\n\n"
        );
    }
}
