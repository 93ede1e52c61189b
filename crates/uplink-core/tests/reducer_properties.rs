use proptest::prelude::*;
use uplink_core::{
    apply, reduce, BatchState, EventKind, ProgressEvent, UploadItem, UploadStatus,
};

fn initial_state() -> BatchState {
    let items = ["f-1", "f-2", "f-3"]
        .iter()
        .map(|id| {
            let mut item = UploadItem::new(format!("{id}.mp4"), 1024, "video/mp4").with_id(*id);
            item.status = UploadStatus::Uploading;
            item
        })
        .collect();
    BatchState::new("b-1", items)
}

fn rank(status: UploadStatus) -> u8 {
    match status {
        UploadStatus::Queued => 0,
        UploadStatus::Uploading => 1,
        UploadStatus::Processing => 2,
        UploadStatus::Complete | UploadStatus::Error => 3,
    }
}

fn event_strategy() -> impl Strategy<Value = ProgressEvent> {
    let kind = prop_oneof![
        Just(EventKind::BatchStatus),
        Just(EventKind::BatchProgress),
        Just(EventKind::FileProcessed),
        Just(EventKind::SyncProgress),
        Just(EventKind::BatchComplete),
    ];
    let batch = prop_oneof![9 => Just("b-1"), 1 => Just("b-2")];
    let file = prop_oneof![
        Just(None),
        Just(Some("f-1")),
        Just(Some("f-2")),
        Just(Some("f-3")),
        Just(Some("gone")),
    ];
    let progress = proptest::option::of(-10.0f64..120.0);
    let status = prop_oneof![
        Just(None),
        Just(Some("queued")),
        Just(Some("uploading")),
        Just(Some("processing")),
        Just(Some("complete")),
        Just(Some("error")),
        Just(Some("bogus")),
    ];

    (kind, batch, file, progress, status).prop_map(|(kind, batch, file, progress, status)| {
        let mut event = ProgressEvent::new(kind, batch);
        if let Some(file) = file {
            event = event.with_file(file);
        }
        if let Some(progress) = progress {
            event = event.with_progress(progress);
        }
        if let Some(status) = status {
            event = event.with_detail("status", status);
        }
        event
    })
}

fn without_completion() -> impl Strategy<Value = Vec<ProgressEvent>> {
    proptest::collection::vec(
        event_strategy().prop_filter("no batch_complete", |e| e.kind != EventKind::BatchComplete),
        0..40,
    )
}

proptest! {
    #[test]
    fn prop_batch_never_complete_without_batch_complete(events in without_completion()) {
        let state = events.iter().fold(initial_state(), reduce);
        prop_assert!(!state.is_complete());
    }

    #[test]
    fn prop_item_status_and_progress_are_monotonic(
        events in proptest::collection::vec(event_strategy(), 0..60)
    ) {
        let mut state = initial_state();
        for event in &events {
            let before = state.clone();
            apply(&mut state, event);
            for (old, new) in before.items.iter().zip(state.items.iter()) {
                prop_assert!(rank(new.status) >= rank(old.status));
                if old.status.is_terminal() {
                    prop_assert_eq!(old.status, new.status);
                }
                prop_assert!(new.progress >= old.progress);
                prop_assert!((0.0..=100.0).contains(&new.progress));
            }
        }
    }

    #[test]
    fn prop_reapplying_an_event_changes_nothing(
        prefix in proptest::collection::vec(event_strategy(), 0..20),
        event in event_strategy(),
    ) {
        let once = reduce(prefix.iter().fold(initial_state(), reduce), &event);
        let twice = reduce(once.clone(), &event);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn prop_lower_file_progress_never_applies(
        recorded in 0.0f64..=100.0,
        lower_by in 0.001f64..50.0,
    ) {
        let mut state = initial_state();
        apply(&mut state, &ProgressEvent::new(EventKind::FileProcessed, "b-1")
            .with_file("f-1")
            .with_progress(recorded));
        let stale = ProgressEvent::new(EventKind::FileProcessed, "b-1")
            .with_file("f-1")
            .with_progress(recorded - lower_by);
        let after = reduce(state.clone(), &stale);
        prop_assert_eq!(after.item("f-1").map(|i| i.progress), Some(recorded));
    }
}
