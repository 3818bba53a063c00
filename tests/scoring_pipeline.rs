use island_levels::{
    Area, BlockState, CellPos, GridWorld, LevelNotifier, LevelStore, MemoryLevelStore, OwnerId,
    PermissionCheck, PlayerStats, Region, RegionDirectory, RegionId, RegionProvider, Results,
    ScanHandle, ScanState, ScoringConfig, ScoringEngine, WorldId,
};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

struct Harness {
    engine: ScoringEngine,
    regions: Arc<RegionDirectory>,
    store: Arc<MemoryLevelStore>,
    world: GridWorld,
    world_id: WorldId,
}

struct DeniedSet(Mutex<HashSet<OwnerId>>);

impl PermissionCheck for DeniedSet {
    fn has_ranking_permission(&self, _world: &WorldId, owner: &OwnerId) -> bool {
        !self.0.lock().contains(owner)
    }
}

struct NoDeaths;

impl PlayerStats for NoDeaths {
    fn deaths_of(&self, _world: &WorldId, _owner: &OwnerId) -> u32 {
        0
    }
}

fn harness(configure: impl FnOnce(&mut ScoringConfig)) -> (Harness, Arc<DeniedSet>) {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut config = ScoringConfig::default();
    config.blocks.insert("stone".to_string(), 1);
    config.blocks.insert("coral".to_string(), 2);
    config.pipeline.batch_size = 2;
    config.pipeline.worker_threads = 2;
    configure(&mut config);

    let regions = Arc::new(RegionDirectory::new());
    let store = Arc::new(MemoryLevelStore::new());
    let denied = Arc::new(DeniedSet(Mutex::new(HashSet::new())));

    let engine = ScoringEngine::new(
        config,
        regions.clone(),
        Arc::new(NoDeaths),
        store.clone(),
        denied.clone(),
    )
    .unwrap();

    (
        Harness {
            engine,
            regions,
            store,
            world: GridWorld::new(0, 63),
            world_id: WorldId::new("overworld"),
        },
        denied,
    )
}

impl Harness {
    fn region(&self, id: u64, owner: u64, area: Area) -> Region {
        let region = Region::new(RegionId(id), self.world_id.clone(), OwnerId(owner), area);
        self.regions.insert(region.clone());
        region
    }

    fn place(&self, name: &str, count: usize, y: i32, area: Area) {
        let id = self
            .engine
            .table()
            .registry()
            .get_id(name)
            .expect("block not in value table");
        let width = (area.max_x - area.min_x + 1) as usize;
        for i in 0..count {
            self.world.set_block(
                &self.world_id,
                CellPos::new(
                    area.min_x + (i % width) as i32,
                    y + (i / width) as i32,
                    area.min_z,
                ),
                BlockState::new(id),
            );
        }
    }

    fn drive(&self, handle: &ScanHandle) -> Option<Results> {
        for _ in 0..5000 {
            self.engine.tick(&self.world);
            if let Some(outcome) = handle.try_result() {
                return outcome;
            }
            thread::sleep(Duration::from_millis(1));
        }
        panic!("scan did not resolve");
    }

    fn calculate(&self, region: &Region) -> Option<Results> {
        let handle = self
            .engine
            .manager()
            .calculate_level(region.owner, region);
        self.drive(&handle)
    }
}

#[test]
fn end_to_end_underwater_multiplier() {
    // 100 stone worth 1 above sea level plus 10 coral worth 2 below it,
    // multiplier 2.0: raw = 100 + floor(10 * 2 * 2) = 140 -> level 1,
    // 60 points to the next level
    let (h, _) = harness(|c| {
        c.sea_height = 10;
        c.underwater_multiplier = 2.0;
        c.level_cost = 100;
        c.death_penalty = 0;
    });

    let area = Area::new(0, 0, 15, 15);
    let region = h.region(1, 1, area);
    h.place("stone", 100, 20, area);
    h.place("coral", 10, 0, area);

    let results = h.calculate(&region).expect("scan should complete");
    assert_eq!(results.state(), ScanState::Available);
    assert_eq!(results.raw_total(), 140);
    assert_eq!(results.level(), 1);
    assert_eq!(results.points_to_next_level(), 60);

    // The record was persisted and feeds cached reads
    assert_eq!(
        h.engine.manager().island_level(&h.world_id, &OwnerId(1)),
        1
    );
    assert_eq!(h.store.load(RegionId(1)).unwrap().unwrap().level, 1);
}

#[test]
fn single_flight_shares_one_scan() {
    let (h, _) = harness(|_| {});
    let area = Area::new(0, 0, 15, 15);
    let region = h.region(1, 1, area);
    h.place("stone", 50, 20, area);

    let manager = h.engine.manager();
    let first = manager.calculate_level(OwnerId(1), &region);
    let second = manager.calculate_level(OwnerId(1), &region);
    assert!(first.same_job(&second));

    h.drive(&first);
    assert_eq!(h.engine.pipeliner().stats().completed, 1);
    assert_eq!(h.engine.pipeliner().stats().submitted, 1);
    // Both handles observe the one outcome
    assert_eq!(second.wait().unwrap().raw_total(), 50);
}

#[test]
fn deletion_mid_scan_keeps_old_record() {
    let (h, _) = harness(|c| {
        c.pipeline.batch_size = 1;
    });
    let area = Area::new(0, 0, 47, 47);
    let region = h.region(1, 1, area);
    h.place("stone", 100, 20, area);

    // First scan persists a record
    let results = h.calculate(&region).expect("first scan completes");
    assert_eq!(results.raw_total(), 100);
    let persisted = h.store.load(RegionId(1)).unwrap().unwrap();

    // Second scan is cancelled by deleting the region mid-flight
    let handle = h
        .engine
        .manager()
        .calculate_level(OwnerId(1), &h.regions.lookup(RegionId(1)).unwrap());
    h.engine.tick(&h.world);
    h.regions.remove(RegionId(1));

    assert!(h.drive(&handle).is_none(), "cancellation resolves null");
    assert_eq!(
        h.store.load(RegionId(1)).unwrap().unwrap(),
        persisted,
        "cancelled scan must not touch the persisted record"
    );
}

#[test]
fn ranking_and_permission_pruning() {
    let (h, denied) = harness(|_| {});

    for owner in 1..=3u64 {
        let min_x = (owner as i32 - 1) * 64;
        let area = Area::new(min_x, 0, min_x + 15, 15);
        let region = h.region(owner, owner, area);
        h.place("stone", 100 * owner as usize, 20, area);
        h.calculate(&region).expect("scan completes");
    }

    let manager = h.engine.manager();
    let top = manager.top_ten(&h.world_id, 10);
    assert_eq!(
        top,
        vec![(OwnerId(3), 3), (OwnerId(2), 2), (OwnerId(1), 1)]
    );
    // Idempotent with no intervening mutation
    assert_eq!(manager.top_ten(&h.world_id, 10), top);
    assert_eq!(manager.rank(&h.world_id, &OwnerId(2)), 2);

    // An owner lacking the inclusion permission disappears regardless of
    // level
    denied.0.lock().insert(OwnerId(3));
    let top = manager.top_ten(&h.world_id, 10);
    assert_eq!(top, vec![(OwnerId(2), 2), (OwnerId(1), 1)]);
    assert_eq!(manager.rank(&h.world_id, &OwnerId(2)), 1);
    assert_eq!(manager.rank(&h.world_id, &OwnerId(3)), 3);

    // Deleting a region prunes its owner lazily too
    h.regions.remove(RegionId(2));
    assert_eq!(manager.top_ten(&h.world_id, 10), vec![(OwnerId(1), 1)]);
}

#[test]
fn veto_hook_short_circuits() {
    let (h, _) = harness(|_| {});
    let area = Area::new(0, 0, 15, 15);
    let region = h.region(1, 1, area);
    h.place("stone", 50, 20, area);

    let manager = h.engine.manager();
    manager.add_pre_calc(Box::new(|requester, _| requester != &OwnerId(1)));

    let handle = manager.calculate_level(OwnerId(1), &region);
    assert_eq!(handle.try_result(), Some(None), "veto resolves null");
    assert_eq!(h.engine.pipeliner().stats().submitted, 0);
    assert!(h.store.load(RegionId(1)).unwrap().is_none());
}

#[test]
fn override_hook_rewrites_persisted_level() {
    let (h, _) = harness(|_| {});
    let area = Area::new(0, 0, 15, 15);
    let region = h.region(1, 1, area);
    h.place("stone", 250, 20, area);

    h.engine
        .manager()
        .add_post_calc(Box::new(|_, results| results.override_level(99)));

    let results = h.calculate(&region).expect("scan completes");
    assert_eq!(results.level(), 99);
    assert_eq!(h.store.load(RegionId(1)).unwrap().unwrap().level, 99);
    assert_eq!(
        h.engine.manager().top_ten(&h.world_id, 10),
        vec![(OwnerId(1), 99)]
    );
}

#[test]
fn notifier_receives_level_changes() {
    struct Recorder(Mutex<Vec<(OwnerId, RegionId, i64)>>);

    impl LevelNotifier for Recorder {
        fn level_changed(&self, requester: &OwnerId, region: &Region, level: i64) {
            self.0.lock().push((*requester, region.id, level));
        }
    }

    let (h, _) = harness(|_| {});
    let area = Area::new(0, 0, 15, 15);
    let region = h.region(1, 7, area);
    h.place("stone", 300, 20, area);

    let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
    struct Forward(Arc<Recorder>);
    impl LevelNotifier for Forward {
        fn level_changed(&self, requester: &OwnerId, region: &Region, level: i64) {
            self.0.level_changed(requester, region, level);
        }
    }
    h.engine
        .manager()
        .set_notifier(Box::new(Forward(recorder.clone())));

    h.calculate(&region).expect("scan completes");
    assert_eq!(
        recorder.0.lock().as_slice(),
        &[(OwnerId(7), RegionId(1), 3)]
    );
}

#[test]
fn scan_height_range_bounds_capture() {
    // Only cells within the configured Y range are captured and scored
    let (h, _) = harness(|c| {
        c.pipeline.scan_max_y = 5;
    });
    let area = Area::new(0, 0, 15, 15);
    let region = h.region(1, 1, area);
    h.place("stone", 40, 3, area);
    h.place("stone", 100, 20, area);

    let results = h.calculate(&region).expect("scan completes");
    assert_eq!(results.raw_total(), 40);
}

#[test]
fn notifier_can_queue_follow_up_scan() {
    struct Requeue {
        engine: Arc<ScoringEngine>,
        follow_up: Mutex<Option<ScanHandle>>,
    }

    impl LevelNotifier for Requeue {
        fn level_changed(&self, requester: &OwnerId, region: &Region, _level: i64) {
            let mut follow_up = self.follow_up.lock();
            if follow_up.is_none() {
                *follow_up = Some(self.engine.manager().calculate_level(*requester, region));
            }
        }
    }

    struct Forward(Arc<Requeue>);
    impl LevelNotifier for Forward {
        fn level_changed(&self, requester: &OwnerId, region: &Region, level: i64) {
            self.0.level_changed(requester, region, level);
        }
    }

    let (h, _) = harness(|_| {});
    let area = Area::new(0, 0, 15, 15);
    let region = h.region(1, 1, area);
    h.place("stone", 100, 20, area);

    let engine = Arc::new(h.engine);
    let requeue = Arc::new(Requeue {
        engine: engine.clone(),
        follow_up: Mutex::new(None),
    });
    engine.manager().set_notifier(Box::new(Forward(requeue.clone())));

    let first = engine.manager().calculate_level(OwnerId(1), &region);
    let drive = |handle: &ScanHandle| {
        for _ in 0..5000 {
            engine.tick(&h.world);
            if let Some(outcome) = handle.try_result() {
                return outcome;
            }
            thread::sleep(Duration::from_millis(1));
        }
        panic!("scan did not resolve");
    };

    let results = drive(&first).expect("first scan completes");
    assert_eq!(results.level(), 1);

    let second = requeue
        .follow_up
        .lock()
        .take()
        .expect("notifier queued a follow-up");
    assert!(!first.same_job(&second));
    let results = drive(&second).expect("follow-up completes");
    assert_eq!(results.level(), 1);
    assert_eq!(engine.pipeliner().stats().completed, 2);
}

#[test]
fn island_level_never_scans() {
    let (h, _) = harness(|_| {});
    let area = Area::new(0, 0, 15, 15);
    h.region(1, 1, area);
    h.place("stone", 500, 20, area);

    assert_eq!(
        h.engine.manager().island_level(&h.world_id, &OwnerId(1)),
        0
    );
    assert_eq!(h.engine.pipeliner().stats().submitted, 0);
    assert_eq!(h.world.snapshots_taken(), 0);
}

#[test]
fn initial_level_is_subtracted() {
    let (h, _) = harness(|_| {});
    let area = Area::new(0, 0, 15, 15);
    let region = h.region(1, 1, area);
    h.place("stone", 500, 20, area);

    h.engine.manager().set_initial_level(&region, 2);
    let results = h.calculate(&region).expect("scan completes");
    assert_eq!(results.level(), 3);
    assert_eq!(results.initial_level(), 2);
}
