use super::*;

fn slots(n: usize) -> Vec<TraySlot> {
    (0..n)
        .map(|i| TraySlot {
            src: format!("stickers/s{i}.png"),
            left: 10.0 * i as f64,
            top: 5.0,
            size: if i == 0 { None } else { Some(80.0 + i as f64) },
        })
        .collect()
}

#[test]
fn from_tray_creates_one_template_per_slot() {
    let store = EntityStore::from_tray(&slots(3), 120.0);
    assert_eq!(store.len(), 3);
    for (i, s) in store.stickers().iter().enumerate() {
        assert_eq!(s.id, i as u64);
        assert!(s.is_template);
        assert!(!s.in_video);
        assert_eq!(s.scale, 1.0);
    }
    assert_eq!(store.stickers()[0].base_size, 120.0);
    assert_eq!(store.stickers()[2].base_size, 82.0);
    assert_eq!(store.stickers()[1].tray_home.left, 10.0);
    assert_eq!(store.next_id(), 3);
    assert_eq!(store.tray_templates().count(), 3);
}

#[test]
fn allocated_ids_are_not_reused_after_removal() {
    let mut store = EntityStore::from_tray(&slots(2), 100.0);
    let a = store.allocate_id();
    assert_eq!(a, 2);
    let mut e = store.get(0).unwrap().clone();
    e.id = a;
    e.is_template = false;
    store.push(e);
    assert!(store.remove(a).is_some());
    assert_eq!(store.allocate_id(), 3);
}

#[test]
fn placed_is_sorted_and_excludes_templates() {
    let mut store = EntityStore::from_tray(&slots(1), 100.0);
    for id in [7u64, 4, 5] {
        let mut e = store.get(0).unwrap().clone();
        e.id = id;
        e.is_template = false;
        e.in_video = id != 5;
        store.push(e);
    }
    let ids: Vec<u64> = store.placed().iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![4, 7]);
    assert_eq!(store.next_id(), 8);
}

#[test]
fn snapshot_json_uses_camel_case_keys() {
    let store = EntityStore::from_tray(&slots(1), 100.0);
    let json = store.snapshot().to_json().unwrap();
    for key in [
        "\"stickers\"",
        "\"isTemplate\"",
        "\"inVideo\"",
        "\"trayHome\"",
        "\"videoPos\"",
        "\"baseSize\"",
        "\"nextId\"",
    ] {
        assert!(json.contains(key), "missing {key} in {json}");
    }
}

#[test]
fn snapshot_without_next_id_derives_it() {
    let json = r#"{"stickers":[{"id":4,"src":"a.png","isTemplate":false,"inVideo":true,
        "trayHome":{"left":1,"top":2},"videoPos":{"x":3,"y":4},"baseSize":90}]}"#;
    let snap = StoreSnapshot::from_json(json).unwrap();
    assert_eq!(snap.next_id, None);
    let store = EntityStore::from_snapshot(snap).unwrap();
    assert_eq!(store.next_id(), 5);
    assert_eq!(store.get(4).unwrap().scale, 1.0);
}

#[test]
fn malformed_snapshot_is_a_serde_error() {
    let err = StoreSnapshot::from_json("{\"stickers\": 3}").unwrap_err();
    assert!(matches!(err, BoothError::Serde(_)));
}

fn entity(id: u64, placed: bool) -> StickerEntity {
    StickerEntity {
        id,
        src: "a.png".to_string(),
        is_template: false,
        in_video: placed,
        tray_home: TrayHome::default(),
        video_pos: VideoPos::new(5.0, 5.0),
        scale: 1.0,
        base_size: 100.0,
    }
}

fn snapshot_of(stickers: Vec<StickerEntity>) -> StoreSnapshot {
    StoreSnapshot {
        stickers,
        next_id: None,
    }
}

#[test]
fn snapshot_with_duplicate_ids_is_rejected() {
    let err = EntityStore::from_snapshot(snapshot_of(vec![entity(5, true), entity(5, true)]))
        .unwrap_err();
    assert!(matches!(err, BoothError::Validation(_)), "{err}");
}

#[test]
fn snapshot_with_bad_sizes_or_scales_is_rejected() {
    let cases = [
        (0.0, 1.0),
        (-3.0, 1.0),
        (f64::NAN, 1.0),
        (100.0, 0.0),
        (100.0, f64::INFINITY),
    ];
    for (base_size, scale) in cases {
        let mut e = entity(1, true);
        e.base_size = base_size;
        e.scale = scale;
        let res = EntityStore::from_snapshot(snapshot_of(vec![e]));
        assert!(matches!(res, Err(BoothError::Validation(_))), "{base_size} {scale}");
    }
}

#[test]
fn snapshot_with_non_finite_position_or_placed_template_is_rejected() {
    let mut e = entity(1, true);
    e.video_pos = VideoPos::new(f64::NAN, 0.0);
    assert!(EntityStore::from_snapshot(snapshot_of(vec![e])).is_err());

    let mut t = entity(0, true);
    t.is_template = true;
    assert!(EntityStore::from_snapshot(snapshot_of(vec![t])).is_err());
}

#[test]
fn unplaced_clones_are_dropped_without_freeing_their_ids() {
    let mut template = entity(0, false);
    template.is_template = true;
    let snap = snapshot_of(vec![template, entity(1, true), entity(7, false)]);
    let mut store = EntityStore::from_snapshot(snap).unwrap();
    assert_eq!(store.len(), 2);
    assert!(store.get(7).is_none());
    assert_eq!(store.allocate_id(), 8);
}
