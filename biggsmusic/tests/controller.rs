mod common;

use std::sync::Arc;
use std::time::Duration;

use biggsmusic::{ChannelId, MusicError, MusicService, MusicSettings, RoomId};
use common::{Call, FakeBackend, RecordingNotifier, eventually, track};
use tokio_test::{assert_err, assert_ok};

const ROOM: RoomId = RoomId(1);
const TEXT: ChannelId = ChannelId(10);

fn setup() -> (Arc<FakeBackend>, Arc<RecordingNotifier>, MusicService) {
    let backend = Arc::new(FakeBackend::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let service =
        MusicService::with_backend(backend.clone(), notifier.clone(), MusicSettings::default());
    (backend, notifier, service)
}

#[tokio::test]
async fn test_plays_in_fifo_order_one_at_a_time() {
    let (backend, notifier, service) = setup();
    let controller = service.registry().get_or_create(ROOM);
    controller.bind_channel(TEXT);

    for title in ["A", "B", "C"] {
        controller.enqueue(track(title, Some(60)));
    }

    assert_eq!(backend.wait_for_plays(ROOM, 1).await, vec!["A"]);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(backend.plays(ROOM), vec!["A"], "B started before A completed");

    backend.finish(ROOM);
    assert_eq!(backend.wait_for_plays(ROOM, 2).await, vec!["A", "B"]);
    backend.finish(ROOM);
    assert_eq!(backend.wait_for_plays(ROOM, 3).await, vec!["A", "B", "C"]);
    backend.finish(ROOM);
    assert!(eventually(|| controller.is_idle()).await);

    assert_eq!(backend.calls()[0], Call::Volume(ROOM, 40));
    assert!(notifier.wait_for(":arrow_forward: `[01:00]` A").await);
    assert!(notifier.wait_for(":arrow_forward: `[01:00]` C").await);
}

#[tokio::test]
async fn test_skip_then_remove_leaves_room_idle() {
    let (backend, notifier, service) = setup();
    let controller = service.registry().get_or_create(ROOM);
    controller.bind_channel(TEXT);

    controller.enqueue(track("A", Some(180)));
    assert_eq!(backend.wait_for_plays(ROOM, 1).await, vec!["A"]);

    assert_eq!(controller.enqueue(track("B", None)), 1);
    assert_eq!(controller.enqueue(track("C", Some(90))), 2);

    let skipped = assert_ok!(controller.skip_current().await);
    assert_eq!(skipped.title, "A");
    assert_eq!(backend.wait_for_plays(ROOM, 2).await, vec!["A", "B"]);
    assert!(notifier.wait_for(":arrow_forward: `[STREAM]` B").await);

    let removed = assert_ok!(controller.remove_at(1));
    assert_eq!(removed.title, "C");
    assert_eq!(controller.queue_len(), 0);

    backend.finish(ROOM);
    assert!(eventually(|| controller.is_idle()).await);
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(backend.plays(ROOM), vec!["A", "B"]);
}

#[tokio::test]
async fn test_error_advances_like_a_normal_end() {
    let (backend, _notifier, service) = setup();
    let controller = service.registry().get_or_create(ROOM);

    controller.enqueue(track("A", Some(60)));
    controller.enqueue(track("B", Some(60)));
    backend.wait_for_plays(ROOM, 1).await;

    backend.error(ROOM);
    assert_eq!(backend.wait_for_plays(ROOM, 2).await, vec!["A", "B"]);
}

#[tokio::test]
async fn test_failed_play_moves_on() {
    let (backend, notifier, service) = setup();
    backend.fail_play("A");
    let controller = service.registry().get_or_create(ROOM);
    controller.bind_channel(TEXT);

    controller.enqueue(track("A", Some(60)));
    controller.enqueue(track("B", Some(60)));

    assert_eq!(backend.wait_for_plays(ROOM, 1).await, vec!["B"]);
    assert!(
        notifier
            .wait_for("Couldn't play A: Backend request failed: 400 Bad Request")
            .await
    );
}

#[tokio::test]
async fn test_stray_end_event_does_not_skip_next_track() {
    let (backend, _notifier, service) = setup();
    let controller = service.registry().get_or_create(ROOM);
    assert!(eventually(|| !backend.calls().is_empty()).await);

    // nothing is playing; this event belongs to nobody
    backend.finish(ROOM);
    tokio::time::sleep(Duration::from_millis(20)).await;

    controller.enqueue(track("A", Some(60)));
    controller.enqueue(track("B", Some(60)));
    backend.wait_for_plays(ROOM, 1).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(backend.plays(ROOM), vec!["A"]);
    assert_eq!(controller.current().unwrap().title, "A");
}

#[tokio::test]
async fn test_pause_and_resume_transitions() {
    let (backend, _notifier, service) = setup();
    let controller = service.registry().get_or_create(ROOM);

    assert!(matches!(controller.pause().await, Err(MusicError::NothingPlaying)));
    assert!(matches!(controller.resume().await, Err(MusicError::NotPaused)));
    assert!(matches!(
        controller.skip_current().await,
        Err(MusicError::NothingPlaying)
    ));

    controller.enqueue(track("A", Some(60)));
    backend.wait_for_plays(ROOM, 1).await;

    assert_err!(controller.resume().await);
    assert_ok!(controller.pause().await);
    assert!(matches!(controller.pause().await, Err(MusicError::NothingPlaying)));
    assert!(controller.snapshot().paused);
    assert_ok!(controller.resume().await);
    assert_err!(controller.resume().await);

    let calls = backend.calls();
    assert!(calls.contains(&Call::Paused(ROOM, true)));
    assert!(calls.contains(&Call::Paused(ROOM, false)));
}

#[tokio::test]
async fn test_volume_is_clamped_and_forwarded() {
    let (backend, _notifier, service) = setup();
    let controller = service.registry().get_or_create(ROOM);

    assert_eq!(assert_ok!(controller.set_volume(5000).await), 1000);
    assert_eq!(controller.snapshot().volume, 1000);
    assert_eq!(assert_ok!(controller.set_volume(-20).await), 0);
    assert_eq!(assert_ok!(controller.set_volume(250).await), 250);
    assert_eq!(controller.snapshot().volume, 250);

    let calls = backend.calls();
    assert!(calls.contains(&Call::Volume(ROOM, 1000)));
    assert!(calls.contains(&Call::Volume(ROOM, 0)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_volume_set_right_after_creation_wins_over_default() {
    let (backend, _notifier, service) = setup();
    backend.slow_volume(40, Duration::from_millis(100));

    let controller = service.registry().get_or_create(ROOM);
    tokio::time::sleep(Duration::from_millis(5)).await;
    assert_eq!(assert_ok!(controller.set_volume(65).await), 65);

    assert_eq!(controller.snapshot().volume, 65);
    assert_eq!(backend.last_volume(ROOM), Some(65));
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(backend.last_volume(ROOM), Some(65));
}

#[tokio::test]
async fn test_destroy_during_slow_play_disconnects_last() {
    let (backend, notifier, service) = setup();
    backend.slow_play(Duration::from_millis(100));
    let controller = service.registry().get_or_create(ROOM);
    controller.bind_channel(TEXT);

    controller.enqueue(track("A", Some(60)));
    tokio::time::sleep(Duration::from_millis(10)).await;
    let removed = service.registry().remove(ROOM).unwrap();
    assert_ok!(removed.destroy().await);
    tokio::time::timeout(Duration::from_secs(1), controller.join())
        .await
        .expect("loop still running after destroy");

    let calls = backend.calls();
    assert_eq!(calls.last(), Some(&Call::Disconnect(ROOM)));
    let played = calls.iter().position(|c| *c == Call::Play(ROOM, "A".to_string()));
    let stopped = calls.iter().position(|c| *c == Call::Stop(ROOM));
    assert!(played.is_some() && played < stopped);

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(notifier.texts().iter().all(|t| !t.starts_with(":arrow_forward:")));
}

#[tokio::test]
async fn test_volume_stored_even_when_node_is_gone() {
    let (backend, _notifier, service) = setup();
    let controller = service.registry().get_or_create(ROOM);
    assert!(eventually(|| !backend.calls().is_empty()).await);

    backend.set_unavailable(true);
    assert!(matches!(
        controller.set_volume(70).await,
        Err(MusicError::NodeUnavailable(_))
    ));
    assert_eq!(controller.snapshot().volume, 70);
}

#[tokio::test]
async fn test_shutdown_releases_both_parking_points() {
    let (backend, _notifier, service) = setup();
    let registry = service.registry();

    let idle = registry.get_or_create(RoomId(1));
    let playing = registry.get_or_create(RoomId(2));
    playing.enqueue(track("A", Some(60)));
    backend.wait_for_plays(RoomId(2), 1).await;

    registry.remove(RoomId(1)).unwrap();
    registry.remove(RoomId(2)).unwrap();
    assert!(idle.is_shut_down());

    tokio::time::timeout(Duration::from_secs(1), idle.join())
        .await
        .expect("idle loop still parked");
    tokio::time::timeout(Duration::from_secs(1), playing.join())
        .await
        .expect("playing loop still parked");
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_recreated_controller_starts_empty() {
    let (_backend, _notifier, service) = setup();
    let registry = service.registry();

    let first = registry.get_or_create(ROOM);
    first.enqueue(track("A", Some(60)));
    first.enqueue(track("B", Some(60)));
    registry.remove(ROOM);

    let second = registry.get_or_create(ROOM);
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(second.queue_len(), 0);
    assert!(second.current().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_get_or_create_builds_one_controller() {
    let (_backend, _notifier, service) = setup();
    let registry = service.registry();

    let mut handles = Vec::new();
    for _ in 0..32 {
        let registry = Arc::clone(&registry);
        handles.push(tokio::spawn(async move { registry.get_or_create(ROOM) }));
    }
    let mut controllers = Vec::new();
    for handle in handles {
        controllers.push(handle.await.unwrap());
    }

    assert_eq!(registry.len(), 1);
    assert!(controllers.iter().all(|c| Arc::ptr_eq(c, &controllers[0])));
}

#[tokio::test]
async fn test_rooms_play_independently() {
    let (backend, _notifier, service) = setup();
    let registry = service.registry();

    registry.get_or_create(RoomId(1)).enqueue(track("one", Some(60)));
    registry.get_or_create(RoomId(2)).enqueue(track("two", Some(60)));

    assert_eq!(backend.wait_for_plays(RoomId(1), 1).await, vec!["one"]);
    assert_eq!(backend.wait_for_plays(RoomId(2), 1).await, vec!["two"]);

    registry.get_or_create(RoomId(2)).enqueue(track("three", Some(60)));
    backend.finish(RoomId(2));
    assert_eq!(backend.wait_for_plays(RoomId(2), 2).await, vec!["two", "three"]);
    assert_eq!(backend.plays(RoomId(1)), vec!["one"]);
}

#[tokio::test]
async fn test_service_shutdown_disconnects_every_room() {
    let (backend, _notifier, service) = setup();
    let registry = service.registry();
    registry.get_or_create(RoomId(1));
    registry.get_or_create(RoomId(2));

    service.shutdown().await;

    assert!(registry.is_empty());
    let calls = backend.calls();
    assert!(calls.contains(&Call::Disconnect(RoomId(1))));
    assert!(calls.contains(&Call::Disconnect(RoomId(2))));
}
