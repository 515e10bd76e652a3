use pagebook_core::gesture::HoldMode;
use pagebook_core::persist::migrate::ShelfSeed;
use pagebook_core::service::drawing_service::DrawingController;
use pagebook_core::service::shelf_service::{ShelfController, ShelfLocation};
use pagebook_core::service::tab_service::{TabController, TabFace};
use pagebook_core::{
    ContainerPath, DiagnosticKind, KeyValueStore, MemoryKvStore, ObjectKind, PagebookConfig,
    Payload, Rect, SceneService, SceneTree, SharedPage, Vec3,
};
use std::time::Duration;

const FRAME: Duration = Duration::from_millis(100);
const SHELF: &str = "Canvas/Scroll View/Viewport/Content";

fn book_tree() -> SceneTree {
    let config = PagebookConfig::default();
    let layout = config.page_layout().unwrap();
    let mut tree = SceneTree::new();
    tree.ensure_container_path(&config.shared_container_path())
        .unwrap();
    for page in 0..3 {
        let node = tree
            .ensure_container_path(&layout.container_path(page))
            .unwrap()
            .unwrap();
        tree.set_rect(node, Rect::new(-50.0, -80.0, 50.0, 80.0))
            .unwrap();
    }
    tree.ensure_container_path(&config.drawing_canvas_path())
        .unwrap();
    tree
}

fn open(store: &MemoryKvStore, pages: SharedPage) -> SceneService<MemoryKvStore, SharedPage> {
    SceneService::open(book_tree(), store.clone(), PagebookConfig::default(), pages).unwrap()
}

#[test]
fn long_press_creates_back_facing_tab_and_long_press_on_tab_deletes_it() {
    let store = MemoryKvStore::new();
    let mut service = open(&store, SharedPage::new(0));
    let mut tabs = TabController::new(Duration::from_secs(1));

    tabs.book_pointer_down();
    let mut created = None;
    for _ in 0..10 {
        let events = tabs.update(&mut service, FRAME, 180.0, false).unwrap();
        if events.created.is_some() {
            created = events.created;
        }
    }
    let (id, face) = created.unwrap();
    assert_eq!(face, Some(TabFace::Back));
    let record = service.record(id).unwrap();
    assert_eq!(record.kind, ObjectKind::Tab);
    assert_eq!(record.container_path.as_str(), "Canvas/pages/page2/cards2");
    assert!((record.transform.rotation.yaw_degrees() - 180.0).abs() < 0.01);

    for _ in 0..10 {
        assert!(tabs.update(&mut service, FRAME, 180.0, false).unwrap().created.is_none());
    }
    tabs.book_pointer_up();

    tabs.set_text(&mut service, id, "hello").unwrap();
    tabs.begin_drag(id);
    tabs.drag(&mut service, id, Vec3::new(5.0, -2.0, 0.0)).unwrap();
    assert!(tabs.end_drag(&mut service, id));
    let reopened = open(&store, SharedPage::new(0));
    let saved = reopened.record(id).unwrap();
    assert_eq!(saved.payload.text(), Some("hello"));
    assert_eq!(saved.transform.position, Vec3::new(5.0, -2.0, 0.0));

    tabs.tab_pointer_down(id);
    let mut deleted = Vec::new();
    for _ in 0..10 {
        deleted.extend(tabs.update(&mut service, FRAME, 0.0, false).unwrap().deleted);
    }
    assert_eq!(deleted, vec![id]);
    assert!(open(&store, SharedPage::new(0)).record(id).is_none());
}

#[test]
fn drawing_mode_suppresses_tab_creation() {
    let mut service = open(&MemoryKvStore::new(), SharedPage::new(0));
    let mut tabs = TabController::new(Duration::from_secs(1));
    tabs.book_pointer_down();
    for _ in 0..20 {
        let events = tabs.update(&mut service, FRAME, 0.0, true).unwrap();
        assert!(events.created.is_none());
    }
    assert!(service.snapshot().is_empty());
}

#[test]
fn drawing_dedups_points_rejects_outside_and_erases() {
    let store = MemoryKvStore::new();
    let mut service = open(&store, SharedPage::new(0));
    let canvas = PagebookConfig::default().drawing_canvas_path();
    let mut drawing = DrawingController::new(
        canvas.clone(),
        Rect::new(0.0, 0.0, 100.0, 100.0),
        "brush/round",
        4.0,
    );

    drawing.start_drawing();
    assert_eq!(drawing.pointer_down(&mut service, 10.0, 10.0).unwrap().len(), 1);
    assert!(drawing.pointer_move(&mut service, 10.0, 10.0).unwrap().is_empty());
    assert_eq!(drawing.pointer_move(&mut service, 20.0, 10.0).unwrap().len(), 1);
    assert!(drawing.pointer_move(&mut service, 150.0, 10.0).unwrap().is_empty());
    assert_eq!(drawing.pointer_move(&mut service, 60.0, 60.0).unwrap().len(), 1);
    drawing.pointer_up();
    assert_eq!(drawing.strokes(&service).len(), 3);
    assert!(service.flush());

    let reopened = open(&store, SharedPage::new(0));
    let persisted = drawing.strokes(&reopened);
    assert_eq!(persisted.len(), 3);
    assert_eq!(
        reopened.record(persisted[0].0).unwrap().payload,
        Payload::Sprite("brush/round".to_string())
    );

    drawing.start_erasing();
    let erased = drawing.pointer_down(&mut service, 21.0, 11.0).unwrap();
    assert_eq!(erased.len(), 1);
    assert_eq!(drawing.strokes(&service).len(), 2);

    assert_eq!(drawing.clear_all(&mut service).unwrap(), 2);
    assert!(drawing.strokes(&service).is_empty());
    assert!(service.record(persisted[0].0).is_none());
}

#[test]
fn shelf_item_toggles_between_shelf_and_active_page() {
    let store = MemoryKvStore::new();
    let pages = SharedPage::new(0);
    let mut service = open(&store, pages.clone());
    let mut shelf = ShelfController::new(
        Duration::from_millis(500),
        HoldMode::Repeat {
            cooldown: Duration::from_secs(1),
        },
    );
    let seeds = ShelfController::seeds_for("ScrollImage", &["sprites/a", "sprites/b"]);
    let ids = shelf.seed(&mut service, &seeds).unwrap();
    assert_eq!(ids.len(), 2);
    assert_eq!(
        shelf.location(&service, "ScrollImage_0"),
        Some(ShelfLocation::Shelf)
    );

    shelf.pointer_down("ScrollImage_0");
    let mut toggles = Vec::new();
    for _ in 0..5 {
        toggles.extend(shelf.update(&mut service, FRAME).unwrap());
    }
    assert_eq!(
        toggles,
        vec![("ScrollImage_0".to_string(), ShelfLocation::Page(0))]
    );
    shelf.pointer_up(&mut service, "ScrollImage_0");
    assert_eq!(service.registry().page_of(ids[0]), Some(0));
    assert_eq!(service.is_visible(ids[0]), Some(true));

    assert!(shelf.drag(&mut service, "ScrollImage_0", 500.0, -500.0).unwrap());
    assert!(shelf.pointer_up(&mut service, "ScrollImage_0"));
    assert_eq!(
        service.record(ids[0]).unwrap().transform.position,
        Vec3::new(50.0, -80.0, 0.0)
    );

    pages.set(1);
    service.tick(std::time::Instant::now());
    assert_eq!(service.is_visible(ids[0]), Some(false));
    assert_eq!(service.is_visible(ids[1]), Some(true));

    let mut reopened_service = open(&store, SharedPage::new(1));
    let mut reopened_shelf = ShelfController::new(
        Duration::from_millis(500),
        HoldMode::Repeat {
            cooldown: Duration::from_secs(1),
        },
    );
    assert_eq!(reopened_shelf.seed(&mut reopened_service, &seeds).unwrap(), ids);
    assert_eq!(
        reopened_shelf.location(&reopened_service, "ScrollImage_0"),
        Some(ShelfLocation::Page(0))
    );
    assert_eq!(reopened_service.is_visible(ids[0]), Some(false));

    assert_eq!(
        reopened_shelf.toggle(&mut reopened_service, "ScrollImage_0").unwrap(),
        Some(ShelfLocation::Page(1))
    );
    assert_eq!(
        reopened_shelf.toggle(&mut reopened_service, "ScrollImage_0").unwrap(),
        Some(ShelfLocation::Shelf)
    );
    let record = reopened_service.record(ids[0]).unwrap();
    assert_eq!(record.container_path.as_str(), SHELF);
    assert_eq!(reopened_service.registry().page_of(ids[0]), None);
    assert_eq!(reopened_service.is_visible(ids[0]), Some(true));
}

#[test]
fn legacy_preferences_are_imported_once() {
    let mut store = MemoryKvStore::new();
    store.set_int("Object_Count", 2).unwrap();
    for (index, x) in [(0, 12.0), (1, -3.0)] {
        store.set_int(&format!("Object_{index}_Exists"), 1).unwrap();
        store.set_float(&format!("Object_{index}_PosX"), x).unwrap();
        for suffix in ["PosY", "PosZ", "RotX", "RotY", "RotZ"] {
            store
                .set_float(&format!("Object_{index}_{suffix}"), 0.0)
                .unwrap();
        }
    }
    store
        .set_string("ScrollImage_1_Position", "7,8,0,Canvas/pages/page3/cards3")
        .unwrap();

    let mut service = open(&store, SharedPage::new(0));
    let seeds = [
        ShelfSeed::new("ScrollImage_0", "sprites/a"),
        ShelfSeed::new("ScrollImage_1", "sprites/b"),
    ];
    let tab_container = ContainerPath::parse("Canvas/pages/page2/cards2");
    let report = service
        .import_legacy(&tab_container, Some(0), &seeds)
        .unwrap();

    assert_eq!(report.records.len(), 3);
    let shelf_id = report.id_map["ScrollImage_1"];
    let shelf_record = service.record(shelf_id).unwrap();
    assert_eq!(shelf_record.kind, ObjectKind::ShelfItem);
    assert_eq!(shelf_record.transform.position, Vec3::new(7.0, 8.0, 0.0));
    assert_eq!(service.registry().page_of(shelf_id), Some(1));
    assert_eq!(service.is_visible(shelf_id), Some(false));
    assert!(!store.has_key("Object_Count").unwrap());
    assert!(!store.has_key("ScrollImage_1_Position").unwrap());

    let again = service
        .import_legacy(&tab_container, Some(0), &seeds)
        .unwrap();
    assert!(again.records.is_empty());
    assert_eq!(open(&store, SharedPage::new(0)).snapshot().len(), 3);
}

#[test]
fn seeded_book_content_is_imported_under_named_containers() {
    let mut store = MemoryKvStore::new();
    store
        .set_string(
            "ObjeJson",
            r#"{"bookPages":[
                {"hierarchParentName":"Canvas/pages/page3/cards3",
                 "Images":[{"spriteName":"art/fox","posX":5.0,"posY":6.0}],"Texts":[]},
                {"hierarchParentName":"Canvas/cover","Images":[],
                 "Texts":[{"textContent":"Chapter one","posX":1.0,"posY":2.0}]}
            ]}"#,
        )
        .unwrap();

    let mut service = open(&store, SharedPage::new(0));
    let tab_container = ContainerPath::parse("Canvas/pages/page2/cards2");
    let report = service.import_legacy(&tab_container, Some(0), &[]).unwrap();
    assert_eq!(report.records.len(), 2);

    let image = report.id_map["bookPages[0].Images[0]"];
    assert_eq!(
        service.record(image).unwrap().payload,
        Payload::Sprite("art/fox".to_string())
    );
    assert_eq!(service.registry().page_of(image), Some(1));
    assert_eq!(service.is_visible(image), Some(false));

    let text = report.id_map["bookPages[1].Texts[0]"];
    let text_record = service.record(text).unwrap();
    assert_eq!(text_record.kind, ObjectKind::Tab);
    assert_eq!(text_record.container_path, tab_container);
    assert_eq!(text_record.payload.text(), Some("Chapter one"));
    assert_eq!(service.is_visible(text), Some(true));
    assert_eq!(
        service.diagnostics().count(DiagnosticKind::ResolutionFailure),
        1
    );
    assert!(!store.has_key("ObjeJson").unwrap());
}
