use pagebook_core::scene::path::compute_path;
use pagebook_core::{
    page_channel, ContainerPath, DiagnosticKind, Diagnostics, KeyValueStore, MemoryKvStore,
    ObjectId, ObjectKind, ObjectRecord, PagebookConfig, Payload, PersistenceStore, RecordFormat,
    SceneService, SceneTree, SharedPage, Target, Transform, Vec3,
};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

const STORE_KEY: &str = "pagebook.scene";

fn book_tree() -> SceneTree {
    let config = PagebookConfig::default();
    let layout = config.page_layout().unwrap();
    let mut tree = SceneTree::new();
    tree.ensure_container_path(&config.shared_container_path())
        .unwrap();
    for page in 0..4 {
        tree.ensure_container_path(&layout.container_path(page))
            .unwrap();
    }
    tree
}

fn open(store: &MemoryKvStore, page: u32) -> SceneService<MemoryKvStore, SharedPage> {
    SceneService::open(
        book_tree(),
        store.clone(),
        PagebookConfig::default(),
        SharedPage::new(page),
    )
    .unwrap()
}

fn seed(store: &MemoryKvStore, format: RecordFormat, records: &[ObjectRecord]) {
    let mut persist = PersistenceStore::new(store.clone(), STORE_KEY, format);
    let records: BTreeMap<_, _> = records
        .iter()
        .cloned()
        .map(|record| (record.id, record))
        .collect();
    assert!(persist.save(&records, &mut Diagnostics::new()));
}

#[test]
fn identity_seven_reloads_under_saved_path_and_hidden_when_page_inactive() {
    let store = MemoryKvStore::new();
    let path = ContainerPath::parse("Canvas/pages/page3/cards3");
    seed(
        &store,
        RecordFormat::Structured,
        &[ObjectRecord::new(ObjectId(7), ObjectKind::Image, path.clone(), Some(1))
            .with_transform(Transform::at(Vec3::new(10.0, 20.0, 0.0)))],
    );

    let service = open(&store, 0);
    let record = service.record(ObjectId(7)).unwrap();
    assert_eq!(record.transform.position, Vec3::new(10.0, 20.0, 0.0));
    assert_eq!(record.container_path, path);
    let node = service.node_of(ObjectId(7)).unwrap();
    assert_eq!(compute_path(service.tree(), node), path);
    assert_eq!(service.is_visible(ObjectId(7)), Some(false));
    assert!(service.diagnostics().is_empty());

    let on_page = open(&store, 1);
    assert_eq!(on_page.is_visible(ObjectId(7)), Some(true));
}

#[test]
fn malformed_legacy_record_is_skipped_with_warning() {
    let store = MemoryKvStore::new();
    let valid = [
        ObjectRecord::new(
            ObjectId(1),
            ObjectKind::Tab,
            ContainerPath::parse("Canvas/pages/page2/cards2"),
            Some(0),
        )
        .with_payload(Payload::Text("first".to_string())),
        ObjectRecord::new(
            ObjectId(2),
            ObjectKind::Image,
            ContainerPath::parse("Canvas/pages/page2/cards2"),
            Some(0),
        )
        .with_transform(Transform::at(Vec3::new(-4.5, 0.125, 0.0))),
    ];
    seed(&store, RecordFormat::Legacy, &valid);
    let mut text = store.get_string(STORE_KEY).unwrap().unwrap();
    text.push_str(";7,10,abc,text,Canvas/x");
    let mut writer = store.clone();
    writer.set_string(STORE_KEY, &text).unwrap();

    let service = open(&store, 0);
    let snapshot = service.snapshot();
    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot[&ObjectId(1)], valid[0]);
    assert_eq!(snapshot[&ObjectId(2)], valid[1]);
    assert!(service.record(ObjectId(7)).is_none());
    assert_eq!(
        service.diagnostics().count(DiagnosticKind::MalformedRecord),
        1
    );
}

#[test]
fn deleted_object_is_not_resurrected_and_identity_stays_retired() {
    let store = MemoryKvStore::new();
    let mut service = open(&store, 0);
    let ids: Vec<ObjectId> = (0..3)
        .map(|n| {
            service
                .create_object(
                    ObjectKind::Tab,
                    Target::ActivePage,
                    Transform::at(Vec3::new(n as f32, 0.0, 0.0)),
                    Payload::None,
                )
                .unwrap()
        })
        .collect();
    assert_eq!(ids, vec![ObjectId(1), ObjectId(2), ObjectId(3)]);
    service.flush();

    assert!(service.delete_object(ObjectId(3)).unwrap());
    assert!(!service.registry().objects_on_page(0).contains(&ObjectId(3)));
    let report = service.tick(Instant::now());
    assert!(report.changes.removed.contains(&ObjectId(3)));
    assert!(report.saved);

    let mut reopened = open(&store, 0);
    assert!(reopened.record(ObjectId(3)).is_none());
    assert!(!reopened.registry().objects_on_page(0).contains(&ObjectId(3)));
    let next = reopened
        .create_object(
            ObjectKind::Tab,
            Target::ActivePage,
            Transform::default(),
            Payload::None,
        )
        .unwrap();
    assert_eq!(next, ObjectId(4));
}

#[test]
fn stale_path_falls_back_and_is_reported() {
    let store = MemoryKvStore::new();
    seed(
        &store,
        RecordFormat::Structured,
        &[ObjectRecord::new(
            ObjectId(5),
            ObjectKind::Image,
            ContainerPath::parse("Canvas/pages/page40/cards40"),
            Some(38),
        )],
    );

    let service = open(&store, 2);
    let record = service.record(ObjectId(5)).unwrap();
    assert_eq!(record.container_path.as_str(), "Canvas/pages/page4/cards4");
    assert_eq!(record.page, Some(38));
    assert_eq!(service.load_report().fallbacks, 1);
    assert_eq!(
        service.diagnostics().count(DiagnosticKind::ResolutionFailure),
        1
    );
}

#[test]
fn root_level_object_round_trips_to_no_parent() {
    let store = MemoryKvStore::new();
    let mut service = open(&store, 0);
    let id = service
        .create_object(
            ObjectKind::Generic,
            Target::Container {
                path: ContainerPath::Detached,
                page: None,
            },
            Transform::at(Vec3::new(1.0, 1.0, 1.0)),
            Payload::None,
        )
        .unwrap();
    assert!(service.flush());

    let reopened = open(&store, 0);
    let node = reopened.node_of(id).unwrap();
    assert_eq!(reopened.tree().parent(node), None);
    assert!(reopened.record(id).unwrap().container_path.is_detached());
}

#[test]
fn consecutive_saves_load_identically() {
    let store = MemoryKvStore::new();
    let mut service = open(&store, 0);
    service
        .create_object(
            ObjectKind::Tab,
            Target::Page(1),
            Transform::at(Vec3::new(0.1, -0.2, 0.3)),
            Payload::Text("twice".to_string()),
        )
        .unwrap();
    assert!(service.flush());
    let once = open(&store, 0).snapshot();
    assert!(service.flush());
    let twice = open(&store, 0).snapshot();
    assert_eq!(once, twice);
    assert_eq!(once, service.snapshot());
}

#[test]
fn pages_are_isolated_and_delete_all_is_scoped() {
    let store = MemoryKvStore::new();
    let mut service = open(&store, 0);
    let mut create = |page: u32| {
        service
            .create_object(
                ObjectKind::Image,
                Target::Page(page),
                Transform::default(),
                Payload::Sprite("sprites/photo".to_string()),
            )
            .unwrap()
    };
    let a = create(0);
    let b = create(1);
    let c = create(1);

    assert_eq!(service.registry().objects_on_page(0).into_iter().collect::<Vec<_>>(), vec![a]);
    assert!(!service.registry().objects_on_page(0).contains(&b));

    let removed = service.delete_all_on_page(1).unwrap();
    assert_eq!(removed, vec![b, c]);
    assert!(service.registry().objects_on_page(1).is_empty());
    assert!(service.record(a).is_some());
}

#[test]
fn page_signal_drives_visibility_on_tick() {
    let store = MemoryKvStore::new();
    let (signal, subscription) = page_channel();
    let pages = SharedPage::new(0).with_signal(signal);
    let mut service = SceneService::open(
        book_tree(),
        store.clone(),
        PagebookConfig::default(),
        pages.clone(),
    )
    .unwrap()
    .with_page_subscription(subscription);

    let first = service
        .create_object(ObjectKind::Tab, Target::Page(0), Transform::default(), Payload::None)
        .unwrap();
    let second = service
        .create_object(ObjectKind::Tab, Target::Page(1), Transform::default(), Payload::None)
        .unwrap();
    assert_eq!(service.is_visible(first), Some(true));
    assert_eq!(service.is_visible(second), Some(false));

    pages.set(1);
    let report = service.tick(Instant::now());
    assert_eq!(report.page_changed, Some(1));
    assert_eq!(report.visibility_changes, 2);
    assert_eq!(service.is_visible(first), Some(false));
    assert_eq!(service.is_visible(second), Some(true));
}

#[test]
fn store_outage_degrades_to_session_state_and_recovers() {
    let store = MemoryKvStore::new();
    let mut service = open(&store, 0);
    store.set_available(false);
    let start = Instant::now();

    let id = service
        .create_object(ObjectKind::Tab, Target::ActivePage, Transform::default(), Payload::None)
        .unwrap();
    let report = service.tick(start);
    assert!(!report.saved);
    assert!(service.persistence().is_degraded());
    assert_eq!(service.diagnostics().count(DiagnosticKind::StoreUnavailable), 1);
    assert!(service.record(id).is_some());

    store.set_available(true);
    let report = service.tick(start + Duration::from_secs(1));
    assert!(report.changes.is_empty());
    assert!(report.saved);
    assert!(open(&store, 0).record(id).is_some());
}

#[test]
fn interval_policy_coalesces_saves() {
    let store = MemoryKvStore::new();
    let config = PagebookConfig::from_json_str(
        r#"{"save_mode":"interval","save_interval_ms":1000}"#,
    )
    .unwrap();
    let mut service =
        SceneService::open(book_tree(), store.clone(), config, SharedPage::new(0)).unwrap();
    let start = Instant::now();

    let id = service
        .create_object(ObjectKind::Tab, Target::ActivePage, Transform::default(), Payload::None)
        .unwrap();
    assert!(service.tick(start).saved);

    for step in 1..5u32 {
        service
            .set_transform(id, Transform::at(Vec3::new(step as f32, 0.0, 0.0)))
            .unwrap();
        assert!(!service.tick(start + Duration::from_millis(100 * u64::from(step))).saved);
    }
    assert!(service.tick(start + Duration::from_millis(1000)).saved);
    let reloaded = open(&store, 0);
    assert_eq!(
        reloaded.record(id).unwrap().transform.position,
        Vec3::new(4.0, 0.0, 0.0)
    );
}

#[test]
fn outage_at_open_keeps_durable_objects_and_fresh_identities() {
    let store = MemoryKvStore::new();
    {
        let mut service = open(&store, 0);
        let kept = service
            .create_object(
                ObjectKind::Tab,
                Target::Page(0),
                Transform::at(Vec3::new(1.0, 1.0, 0.0)),
                Payload::Text("keep me".to_string()),
            )
            .unwrap();
        assert_eq!(kept, ObjectId(1));
        assert!(service.flush());
    }

    store.set_available(false);
    let mut service = open(&store, 0);
    assert!(service.snapshot().is_empty());
    assert!(service.persistence().needs_recovery());
    let during = service
        .create_object(
            ObjectKind::Tab,
            Target::Page(0),
            Transform::default(),
            Payload::Text("written offline".to_string()),
        )
        .unwrap();
    let start = Instant::now();
    assert!(!service.tick(start).saved);

    store.set_available(true);
    assert!(service.tick(start + Duration::from_secs(1)).saved);
    assert_eq!(during, ObjectId(1));
    assert_eq!(service.record(during).unwrap().payload.text(), Some("keep me"));
    assert_eq!(service.snapshot().len(), 2);

    let reloaded = open(&store, 0);
    let snapshot = reloaded.snapshot();
    assert_eq!(snapshot.len(), 2);
    assert_eq!(
        snapshot[&ObjectId(1)].payload,
        Payload::Text("keep me".to_string())
    );
    let offline = snapshot
        .values()
        .find(|record| record.payload.text() == Some("written offline"))
        .unwrap();
    assert!(offline.id > ObjectId(1));
}

#[test]
fn degraded_ticks_report_the_outage_once_and_back_off() {
    let store = MemoryKvStore::new();
    let mut service = open(&store, 0);
    let id = service
        .create_object(ObjectKind::Tab, Target::ActivePage, Transform::default(), Payload::None)
        .unwrap();
    store.set_available(false);
    service
        .set_transform(id, Transform::at(Vec3::new(3.0, 0.0, 0.0)))
        .unwrap();

    let start = Instant::now();
    let attempts_before = store.flush_count();
    for frame in 0..600u64 {
        let report = service.tick(start + Duration::from_millis(frame * 16));
        assert!(!report.saved);
    }
    assert_eq!(service.diagnostics().count(DiagnosticKind::StoreUnavailable), 1);
    assert_eq!(store.flush_count(), attempts_before);

    store.set_available(true);
    assert!(service.tick(start + Duration::from_secs(30)).saved);
    assert!(!service.persistence().is_degraded());
    assert_eq!(
        open(&store, 0).record(id).unwrap().transform.position,
        Vec3::new(3.0, 0.0, 0.0)
    );
}

#[test]
fn failed_reassignment_leaves_object_in_place() {
    let store = MemoryKvStore::new();
    let mut service = open(&store, 0);
    let id = service
        .create_object(
            ObjectKind::Tab,
            Target::Page(0),
            Transform::default(),
            Payload::Text("stays".to_string()),
        )
        .unwrap();
    let node = service.node_of(id).unwrap();
    service
        .tree_mut()
        .set_transform(node, Transform::at(Vec3::new(f32::NAN, 0.0, 0.0)))
        .unwrap();

    assert!(service.reassign_page(id, 2).is_err());
    let record = service.record(id).unwrap();
    assert_eq!(record.page, Some(0));
    assert_eq!(record.payload.text(), Some("stays"));
    assert_eq!(service.registry().page_of(id), Some(0));
}
