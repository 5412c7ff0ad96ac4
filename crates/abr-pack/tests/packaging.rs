//! End-to-end orchestration tests against an encoder double.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use abr_core::{Config, ItemId, Ladder, LadderProfile, StreamInfo};
use abr_pack::{CatalogItem, PackError, Packager};
use common::{instant, Behavior, Harness};
use tokio_util::sync::CancellationToken;

fn token() -> CancellationToken {
    CancellationToken::new()
}

#[tokio::test]
async fn packages_and_reports_ready() {
    let h = Harness::new(instant());

    let out = h
        .packager
        .try_ensure_packed(h.item.id, "default", token())
        .await
        .unwrap();

    assert_eq!(out, h.out_dir("default"));
    assert!(out.join("master.m3u8").is_file());
    assert_eq!(h.encoder.encodes(), 1);
    assert_eq!(
        *h.encoder.last_renditions.lock(),
        vec!["source", "1080p", "720p", "480p"]
    );
}

#[tokio::test]
async fn second_call_is_idempotent() {
    let h = Harness::new(instant());

    assert!(h.packager.ensure_packed(h.item.id, "default", token()).await);
    assert!(h.packager.ensure_packed(h.item.id, "default", token()).await);
    assert_eq!(h.encoder.encodes(), 1);
}

#[tokio::test]
async fn existing_master_skips_everything() {
    let h = Harness::new(instant());
    let out = h.out_dir("default");
    std::fs::create_dir_all(&out).unwrap();
    std::fs::write(out.join("master.m3u8"), "#EXTM3U\n").unwrap();

    assert!(h.packager.ensure_packed(h.item.id, "default", token()).await);
    assert_eq!(h.encoder.encodes(), 0);
    assert_eq!(h.packager.in_flight(), 0);
}

#[tokio::test]
async fn encoder_failure_is_reported_and_retryable() {
    let h = Harness::new(Behavior::Fail);

    let err = h
        .packager
        .try_ensure_packed(h.item.id, "default", token())
        .await
        .unwrap_err();
    match &err {
        PackError::EncoderExit { status, stderr } => {
            assert_eq!(*status, Some(1));
            assert!(stderr.contains("Invalid data"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.is_encoder_failure());
    assert!(!h.out_dir("default").join("master.m3u8").exists());
    assert!(!h.packager.is_packaging(h.item.id, "default"));

    h.encoder.set_behavior(instant());
    assert!(h.packager.ensure_packed(h.item.id, "default", token()).await);
    assert_eq!(h.encoder.encodes(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn simultaneous_callers_share_one_encode() {
    let h = Harness::new(Behavior::Succeed {
        delay: Duration::from_millis(200),
    });

    let (a, b) = tokio::join!(
        h.packager.ensure_packed(h.item.id, "default", token()),
        h.packager.ensure_packed(h.item.id, "default", token()),
    );
    assert!(a && b);
    assert_eq!(h.encoder.encodes(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn many_spawned_callers_share_one_encode() {
    let h = Harness::new(Behavior::Succeed {
        delay: Duration::from_millis(200),
    });

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let packager = h.packager.clone();
            let id = h.item.id;
            tokio::spawn(async move { packager.ensure_packed(id, "default", token()).await })
        })
        .collect();

    for handle in handles {
        assert!(handle.await.unwrap());
    }
    assert_eq!(h.encoder.encodes(), 1);
}

#[tokio::test]
async fn profiles_are_packaged_independently() {
    let h = Harness::new(instant());

    assert!(h.packager.ensure_packed(h.item.id, "default", token()).await);
    assert!(h.packager.ensure_packed(h.item.id, "firetv_sdr", token()).await);
    assert_eq!(h.encoder.encodes(), 2);
    assert!(h.out_dir("firetv_sdr").join("master.m3u8").is_file());
}

#[tokio::test]
async fn low_source_skips_taller_profiles() {
    let h = Harness::with(
        Config::default(),
        instant(),
        vec![
            StreamInfo::video("h264", 1280, 720),
            StreamInfo::audio("aac", 2),
        ],
    );

    let job = h.packager.prepare(h.item.id, "default").await.unwrap();
    let names: Vec<&str> = job.spec.rendition_names().collect();
    assert_eq!(names, vec!["source", "720p", "480p"]);
}

#[tokio::test]
async fn eac3_source_audio_is_copied() {
    let h = Harness::with(
        Config::default(),
        instant(),
        vec![
            StreamInfo::video("hevc", 3840, 2160),
            StreamInfo::audio("eac3", 6).with_default(true),
        ],
    );

    let job = h.packager.prepare(h.item.id, "firetv_sdr").await.unwrap();
    for r in job
        .spec
        .renditions
        .iter()
        .filter(|r| r.kind == abr_pack::planner::RenditionKind::Video)
    {
        assert_eq!(r.audio, Some(abr_pack::spec::AudioEncoding::Copy), "{}", r.name);
    }
}

#[tokio::test]
async fn empty_plan_never_invokes_encoder() {
    let mut config = Config::default();
    config.ladders.insert(
        "uhd_only".into(),
        Ladder::new(vec![LadderProfile::new(
            "2160p", 3840, 2160, 0, 14_000_000, 28_000_000, "hevc", "aac", 128_000,
        )]),
    );
    let h = Harness::with(
        config,
        instant(),
        vec![
            StreamInfo::video("h264", 854, 480),
            StreamInfo::audio("aac", 2),
        ],
    );

    let err = h
        .packager
        .try_ensure_packed(h.item.id, "uhd_only", token())
        .await
        .unwrap_err();
    assert_eq!(err, PackError::EmptyPlan { source_height: 480 });
    assert_eq!(h.encoder.encodes(), 0);
}

#[tokio::test]
async fn unknown_item_is_source_unavailable() {
    let h = Harness::new(instant());
    let missing = ItemId::new();

    let err = h
        .packager
        .try_ensure_packed(missing, "default", token())
        .await
        .unwrap_err();
    assert!(matches!(err, PackError::SourceUnavailable { .. }));
    assert!(!h.packager.ensure_packed(missing, "default", token()).await);
    assert_eq!(h.encoder.encodes(), 0);
}

#[tokio::test]
async fn item_without_path_is_source_unavailable() {
    let h = Harness::new(instant());
    let pathless = CatalogItem {
        id: ItemId::new(),
        path: None,
        name: "Ghost".into(),
    };
    h.catalog.insert(pathless.clone(), vec![]);

    let err = h
        .packager
        .try_ensure_packed(pathless.id, "default", token())
        .await
        .unwrap_err();
    assert!(matches!(err, PackError::SourceUnavailable { .. }));
}

#[tokio::test]
async fn unknown_profile_is_rejected() {
    let h = Harness::new(instant());
    let err = h
        .packager
        .try_ensure_packed(h.item.id, "nope", token())
        .await
        .unwrap_err();
    assert_eq!(err, PackError::UnknownProfile("nope".into()));
}

#[tokio::test]
async fn thumbnail_failure_does_not_fail_packaging() {
    let h = Harness::new(instant());
    assert!(h.packager.ensure_packed(h.item.id, "default", token()).await);
    assert_eq!(
        h.encoder
            .thumbnail_runs
            .load(std::sync::atomic::Ordering::SeqCst),
        1
    );
}

#[tokio::test]
async fn thumbnails_skipped_when_disabled() {
    let mut config = Config::default();
    config.thumbnails.enabled = false;
    let h = Harness::with(config, instant(), vec![StreamInfo::video("h264", 1920, 1080)]);

    assert!(h.packager.ensure_packed(h.item.id, "default", token()).await);
    assert_eq!(
        h.encoder
            .thumbnail_runs
            .load(std::sync::atomic::Ordering::SeqCst),
        0
    );
}

#[tokio::test]
async fn cancelling_the_request_cancels_the_job() {
    let h = Harness::new(Behavior::Succeed {
        delay: Duration::from_secs(30),
    });
    let cancel = token();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = h
        .packager
        .try_ensure_packed(h.item.id, "default", cancel)
        .await
        .unwrap_err();
    assert_eq!(err, PackError::Cancelled);
}

#[tokio::test]
async fn levels_follow_materialized_renditions() {
    let h = Harness::new(instant());
    assert!(h.packager.levels(h.item.id, "default").await.unwrap().is_empty());

    assert!(h.packager.ensure_packed(h.item.id, "default", token()).await);
    let levels = h.packager.levels(h.item.id, "default").await.unwrap();
    let names: Vec<&str> = levels.iter().map(|l| l.name.as_str()).collect();
    assert_eq!(names, vec!["source", "1080p", "720p", "480p"]);
}

#[tokio::test]
async fn item_added_event_triggers_packaging() {
    let h = Harness::new(instant());
    let bus = abr_core::EventBus::new();
    let shutdown = token();
    let listener = abr_pack::spawn_listener(
        h.packager.clone(),
        bus.subscribe(),
        "default".into(),
        1,
        shutdown.clone(),
    );

    bus.publish(abr_core::LibraryEvent::ItemAdded {
        item_id: h.item.id,
        path: h.item.path.clone().unwrap(),
    });

    let master = h.out_dir("default").join("master.m3u8");
    for _ in 0..100 {
        if master.is_file() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(master.is_file());
    assert_eq!(h.encoder.encodes(), 1);

    shutdown.cancel();
    listener.await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn listener_bounds_concurrent_packages() {
    let h = Harness::new(Behavior::Succeed {
        delay: Duration::from_millis(150),
    });
    let items: Vec<_> = (0..5).map(|i| h.add_item(&format!("show{i}"))).collect();
    let bus = abr_core::EventBus::new();
    let shutdown = token();
    let listener = abr_pack::spawn_listener(
        h.packager.clone(),
        bus.subscribe(),
        "default".into(),
        2,
        shutdown.clone(),
    );

    for item in &items {
        bus.publish(abr_core::LibraryEvent::ItemAdded {
            item_id: item.id,
            path: item.path.clone().unwrap(),
        });
    }

    let all_ready = || {
        items.iter().all(|item| {
            item.path
                .as_ref()
                .unwrap()
                .parent()
                .unwrap()
                .join("abr_hls/default/master.m3u8")
                .is_file()
        })
    };
    for _ in 0..200 {
        if all_ready() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(all_ready());
    assert_eq!(h.encoder.encodes(), 5);
    assert!(h.encoder.peak.load(Ordering::SeqCst) <= 2);

    shutdown.cancel();
    listener.await.unwrap();
}

#[tokio::test]
async fn listener_shutdown_drops_queued_packages() {
    let h = Harness::new(Behavior::Succeed {
        delay: Duration::from_secs(30),
    });
    let items: Vec<_> = (0..3).map(|i| h.add_item(&format!("show{i}"))).collect();
    let bus = abr_core::EventBus::new();
    let shutdown = token();
    let listener = abr_pack::spawn_listener(
        h.packager.clone(),
        bus.subscribe(),
        "default".into(),
        1,
        shutdown.clone(),
    );

    for item in &items {
        bus.publish(abr_core::LibraryEvent::ItemAdded {
            item_id: item.id,
            path: item.path.clone().unwrap(),
        });
    }
    for _ in 0..100 {
        if h.encoder.encodes() > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(h.encoder.encodes(), 1);

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), listener)
        .await
        .expect("listener did not stop")
        .unwrap();
    assert_eq!(h.encoder.encodes(), 1);
    assert_eq!(h.encoder.active.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn shared_packager_is_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>(_: &T) {}
    let h = Harness::new(instant());
    let shared: Arc<Packager> = Arc::new(h.packager.clone());
    assert_send_sync(&shared);
}
