use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use service_registry::services::registry::{
    ManualClock, RegistryError, RegistrySettings, RegistryStore,
};

fn settings(timeout_secs: u64) -> RegistrySettings {
    RegistrySettings {
        heartbeat_timeout: Duration::from_secs(timeout_secs),
        cleanup_interval: Duration::from_secs(10),
    }
}

fn start_time() -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(1_700_000_000)
}

fn store_with_clock(timeout_secs: u64) -> (Arc<RegistryStore>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(start_time()));
    let store = Arc::new(RegistryStore::with_clock(settings(timeout_secs), clock.clone()));
    (store, clock)
}

#[test]
fn test_register_lookup_deregister_scenario() {
    let store = RegistryStore::default();

    let a = store.register("users", "http://h1").expect("register h1");
    let b = store.register("users", "http://h2").expect("register h2");
    assert_ne!(a.instance_id, b.instance_id);
    assert_eq!(a.registered_at, a.last_heartbeat);

    let listing = store.lookup("users").unwrap();
    assert_eq!(listing.count, 2);
    let ids: HashSet<_> = listing.instances.iter().map(|i| i.instance_id).collect();
    assert!(ids.contains(&a.instance_id));
    assert!(ids.contains(&b.instance_id));

    let removed = store.deregister(&a.instance_id.to_string()).unwrap();
    assert_eq!(removed.instance_id, a.instance_id);

    let listing = store.lookup("users").unwrap();
    assert_eq!(listing.count, 1);
    assert_eq!(listing.instances[0].instance_id, b.instance_id);
    assert_eq!(listing.instances[0].base_url, "http://h2");

    let err = store.heartbeat(&a.instance_id.to_string()).unwrap_err();
    assert!(matches!(err, RegistryError::InstanceNotFound { .. }));
}

#[test]
fn test_lookup_preserves_registration_order() {
    let store = RegistryStore::default();
    let first = store.register("timelines", "http://t1").unwrap();
    let second = store.register("timelines", "http://t2").unwrap();
    let third = store.register("timelines", "http://t3").unwrap();

    let listing = store.lookup("timelines").unwrap();
    let ids: Vec<_> = listing.instances.iter().map(|i| i.instance_id).collect();
    assert_eq!(ids, vec![first.instance_id, second.instance_id, third.instance_id]);
}

#[test]
fn test_register_rejects_invalid_input() {
    let store = RegistryStore::default();

    let err = store.register("", "http://h1").unwrap_err();
    assert!(matches!(err, RegistryError::InvalidInput { field: "service_name", .. }));

    let err = store.register("users", "").unwrap_err();
    assert!(matches!(err, RegistryError::InvalidInput { field: "base_url", .. }));

    let err = store.register("users", "not a url").unwrap_err();
    assert!(matches!(err, RegistryError::InvalidInput { field: "base_url", .. }));

    // 失败的注册不会改变存储
    let status = store.status().unwrap();
    assert_eq!(status.total_instances, 0);
    assert_eq!(status.total_services, 0);
}

#[test]
fn test_double_deregister_is_detectable() {
    let store = RegistryStore::default();
    let instance = store.register("likes", "http://l1").unwrap();
    let id = instance.instance_id.to_string();

    assert!(store.deregister(&id).is_ok());
    let err = store.deregister(&id).unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_unknown_names_and_empty_registry_are_not_errors() {
    let store = RegistryStore::default();

    let listing = store.lookup("ghost").unwrap();
    assert_eq!(listing.service_name, "ghost");
    assert!(listing.is_empty());
    assert!(store.list_all().unwrap().is_empty());

    let status = store.status().unwrap();
    assert_eq!(status.total_instances, 0);
    assert!(status.services.is_empty());
}

#[test]
fn test_emptied_service_behaves_like_unknown_service() {
    let store = RegistryStore::default();
    let instance = store.register("polls", "http://p1").unwrap();
    store.deregister(&instance.instance_id.to_string()).unwrap();

    assert!(store.lookup("polls").unwrap().is_empty());
    assert!(!store.list_all().unwrap().contains_key("polls"));
    assert!(!store.status().unwrap().services.contains_key("polls"));
}

#[test]
fn test_list_all_and_status_agree() {
    let store = RegistryStore::default();
    store.register("users", "http://u1").unwrap();
    store.register("users", "http://u2").unwrap();
    store.register("likes", "http://l1").unwrap();

    let all = store.list_all().unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all["users"].count, 2);
    assert_eq!(all["likes"].count, 1);

    let status = store.status().unwrap();
    assert_eq!(status.total_services, 2);
    assert_eq!(status.total_instances, 3);
    assert_eq!(status.services["users"], 2);
    assert_eq!(status.services["likes"], 1);
}

#[test]
fn test_heartbeat_is_monotonic() {
    let (store, clock) = store_with_clock(30);
    let instance = store.register("users", "http://h1").unwrap();
    let id = instance.instance_id.to_string();

    clock.advance(Duration::from_secs(5));
    let first = store.heartbeat(&id).unwrap();
    assert_eq!(first.last_heartbeat, start_time() + Duration::from_secs(5));
    assert_eq!(first.registered_at, instance.registered_at);

    clock.advance(Duration::from_secs(5));
    let second = store.heartbeat(&id).unwrap();
    assert!(second.last_heartbeat > first.last_heartbeat);

    // 时钟回拨时心跳时间不倒退
    clock.set(start_time());
    let third = store.heartbeat(&id).unwrap();
    assert_eq!(third.last_heartbeat, second.last_heartbeat);
    assert!(third.last_heartbeat >= third.registered_at);
}

#[test]
fn test_expiry_boundary() {
    let (store, clock) = store_with_clock(30);
    let instance = store.register("users", "http://h1").unwrap();

    clock.advance(Duration::from_secs(30));
    let report = store.sweep_expired().unwrap();
    assert!(report.evicted.is_empty());
    assert_eq!(report.remaining, 1);
    assert_eq!(store.lookup("users").unwrap().count, 1);

    clock.advance(Duration::from_micros(1));
    let report = store.sweep_expired().unwrap();
    assert_eq!(report.evicted.len(), 1);
    assert_eq!(report.evicted[0].instance_id, instance.instance_id);
    assert_eq!(report.remaining, 0);
    assert!(store.lookup("users").unwrap().is_empty());
}

#[test]
fn test_stale_instance_swept_after_31_seconds() {
    let (store, clock) = store_with_clock(30);
    store.register("users", "http://h1").unwrap();

    clock.advance(Duration::from_secs(31));
    store.sweep_expired().unwrap();

    let status = store.status().unwrap();
    assert_eq!(status.total_instances, 0);
    assert_eq!(status.total_services, 0);
    assert!(store.list_all().unwrap().is_empty());
}

#[test]
fn test_heartbeat_keeps_instance_alive() {
    let (store, clock) = store_with_clock(30);
    let alive = store.register("users", "http://h1").unwrap();
    let stale = store.register("users", "http://h2").unwrap();

    clock.advance(Duration::from_secs(20));
    store.heartbeat(&alive.instance_id.to_string()).unwrap();
    clock.advance(Duration::from_secs(20));

    let report = store.sweep_expired().unwrap();
    assert_eq!(report.evicted.len(), 1);
    assert_eq!(report.evicted[0].instance_id, stale.instance_id);

    let listing = store.lookup("users").unwrap();
    assert_eq!(listing.count, 1);
    assert_eq!(listing.instances[0].instance_id, alive.instance_id);

    // 被清理的实例心跳返回未找到，需重新注册
    let err = store.heartbeat(&stale.instance_id.to_string()).unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_deregister_after_sweep_reports_not_found() {
    let (store, clock) = store_with_clock(30);
    let instance = store.register("users", "http://h1").unwrap();

    clock.advance(Duration::from_secs(60));
    store.sweep_expired().unwrap();

    let err = store.deregister(&instance.instance_id.to_string()).unwrap_err();
    assert!(err.is_not_found());
    // 再次清理不会出错
    assert!(store.sweep_expired().unwrap().evicted.is_empty());
}

#[test]
fn test_ids_unique_under_concurrent_registration() {
    let store = Arc::new(RegistryStore::default());
    let threads: Vec<_> = (0..8)
        .map(|t| {
            let store = store.clone();
            std::thread::spawn(move || {
                (0..250)
                    .map(|i| {
                        store
                            .register(&format!("svc-{}", i % 5), &format!("http://h{t}-{i}"))
                            .unwrap()
                            .instance_id
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut ids = HashSet::new();
    for handle in threads {
        for id in handle.join().unwrap() {
            assert!(ids.insert(id), "duplicate instance id {id}");
        }
    }

    let status = store.status().unwrap();
    assert_eq!(ids.len(), 2_000);
    assert_eq!(status.total_instances, 2_000);
    assert_eq!(status.total_services, 5);
    assert_eq!(status.services.values().sum::<usize>(), 2_000);
}

#[test]
fn test_concurrent_deregister_and_sweep_remove_exactly_once() {
    for _ in 0..50 {
        let (store, clock) = store_with_clock(30);
        let instance = store.register("users", "http://h1").unwrap();
        let id = instance.instance_id.to_string();
        clock.advance(Duration::from_secs(31));

        let sweeper = {
            let store = store.clone();
            std::thread::spawn(move || store.sweep_expired().unwrap().evicted.len())
        };
        let deregistered = store.deregister(&id).is_ok();
        let evicted = sweeper.join().unwrap();

        assert_eq!(usize::from(deregistered) + evicted, 1);
        assert_eq!(store.status().unwrap().total_instances, 0);
    }
}

#[test]
fn test_reads_during_sweeps_see_consistent_snapshots() {
    let (store, clock) = store_with_clock(30);
    for i in 0..100 {
        store.register("users", &format!("http://h{i}")).unwrap();
    }
    clock.advance(Duration::from_secs(31));

    let reader = {
        let store = store.clone();
        std::thread::spawn(move || {
            for _ in 0..1_000 {
                let count = store.lookup("users").unwrap().count;
                // 清理要么完全没发生，要么全部完成
                assert!(count == 100 || count == 0, "observed partial sweep: {count}");
                let status = store.status().unwrap();
                assert_eq!(status.services.values().sum::<usize>(), status.total_instances);
            }
        })
    };

    store.sweep_expired().unwrap();
    reader.join().unwrap();
    assert!(store.lookup("users").unwrap().is_empty());
}

#[test]
fn test_lost_updates_impossible_under_concurrent_heartbeats() {
    let (store, clock) = store_with_clock(30);
    let ids: Vec<String> = (0..20)
        .map(|i| {
            store
                .register("users", &format!("http://h{i}"))
                .unwrap()
                .instance_id
                .to_string()
        })
        .collect();
    clock.advance(Duration::from_secs(25));

    let workers: Vec<_> = ids
        .chunks(5)
        .map(|chunk| {
            let store = store.clone();
            let chunk = chunk.to_vec();
            std::thread::spawn(move || {
                for id in &chunk {
                    store.heartbeat(id).unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    clock.advance(Duration::from_secs(25));
    assert!(store.sweep_expired().unwrap().evicted.is_empty());
    assert_eq!(store.lookup("users").unwrap().count, 20);
}
