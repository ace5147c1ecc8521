//! Decoding stored records and de-duplicating them against live delivery.
//!
//! Mirrors what a reconnecting consumer does: events arrive live through a
//! subscriber while the same records are read back from history in wire
//! form, and only the first sighting of each may be forwarded.

use std::sync::Arc;

use ripple_core::{sse, DuplicateWindow, Event, FanoutRegistry, Subscriber};

fn stored(events: &[Event]) -> Vec<Vec<u8>> {
    events.iter().map(Event::encode).collect()
}

#[test]
fn test_replayed_records_skip_live_duplicates() {
    let registry = Arc::new(FanoutRegistry::new());
    let mut sub = Subscriber::new(registry.clone(), 8);
    sub.subscribe("room");

    let events = vec![
        Event::new(1, "room", "msg", "one").with_session(3),
        Event::new(2, "room", "msg", "two").with_session(3).with_user(9),
        Event::new(3, "room", "msg", "three"),
    ];
    let records = stored(&events);

    // event 2 arrives live before the replay runs
    registry.deliver("room", &events[1]);
    let mut window = DuplicateWindow::new(16);
    let live = sub.try_recv().unwrap();
    assert!(!window.check(&live));

    let forwarded: Vec<i64> = records
        .iter()
        .filter_map(|raw| Event::decode(raw))
        .map(|event| event.with_key("room"))
        .filter(|event| !window.check(event))
        .map(|event| event.id)
        .collect();
    assert_eq!(forwarded, vec![1, 3]);
}

#[test]
fn test_replayed_record_renders_like_live_event() {
    let live = Event::new(5, "room", "note", "line one\nline two");
    let replayed = Event::decode(&live.encode()).unwrap().with_key("room");

    assert_eq!(replayed, live);
    assert_eq!(sse::event_frame(&replayed), sse::event_frame(&live));
    assert_eq!(
        sse::event_frame(&replayed),
        "id: 5\nevent: note\ndata: line one\ndata: line two\n\n"
    );
}

#[test]
fn test_corrupt_records_are_skipped_not_fatal() {
    let mut records = stored(&[Event::new(1, "k", "msg", "a")]);
    records.push(b"no-separators".to_vec());
    records.push(b"x:y msg bad-prefix".to_vec());
    records.extend(stored(&[Event::new(2, "k", "msg", "b")]));

    let ids: Vec<i64> = records
        .iter()
        .filter_map(|raw| Event::decode(raw))
        .map(|event| event.id)
        .collect();
    assert_eq!(ids, vec![1, 2]);
}
