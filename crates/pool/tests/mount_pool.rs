//! Reference counting and lifecycle of pooled mounts

mod common;

use std::io::Read;
use std::sync::{Arc, Barrier};
use std::thread;

use pool::{MountError, MountPool, PoolConfig, ProviderError};

use common::{init_tracing, MemProvider};

fn setup_pool() -> (MountPool, Arc<MemProvider>) {
    init_tracing();
    let pool = MountPool::new(PoolConfig::default());
    let provider = Arc::new(MemProvider::default());
    pool.register_provider(provider.clone()).unwrap();
    (pool, provider)
}

#[test]
fn test_concurrent_acquire_opens_once() {
    let (pool, provider) = setup_pool();
    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));

    let workers: Vec<_> = (0..threads)
        .map(|_| {
            let pool = pool.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                pool.acquire("mem:/bundle!/").unwrap()
            })
        })
        .collect();
    let handles: Vec<_> = workers.into_iter().map(|w| w.join().unwrap()).collect();

    assert_eq!(provider.opened(), 1);
    let mounts = pool.list_mounts();
    assert_eq!(mounts.len(), 1);
    assert_eq!(mounts[0].references, threads);
    assert_eq!(mounts[0].key.as_str(), "mem:/bundle!/");

    for handle in &handles[..threads - 1] {
        handle.close();
    }
    assert_eq!(provider.closed(), 0);
    assert_eq!(pool.list_mounts()[0].references, 1);

    handles[threads - 1].close();
    assert_eq!(provider.closed(), 1);
    assert!(pool.list_mounts().is_empty());

    drop(handles);
    assert_eq!(provider.closed(), 1);
}

#[test]
fn test_concurrent_close_closes_once() {
    let (pool, provider) = setup_pool();
    let threads = 8;
    let handles: Vec<_> = (0..threads)
        .map(|_| pool.acquire("mem:/bundle!/").unwrap())
        .collect();
    let barrier = Arc::new(Barrier::new(threads));

    let workers: Vec<_> = handles
        .into_iter()
        .map(|handle| {
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                handle.close();
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(provider.opened(), 1);
    assert_eq!(provider.closed(), 1);
    assert!(pool.list_mounts().is_empty());
}

#[test]
fn test_rejects_invalid_uris() {
    let (pool, _provider) = setup_pool();

    for input in [
        "bundle!/index.html",
        "/srv/app.zip",
        "file:///srv/app.zip",
        "jrt:/java.base",
        "tar:file:///srv/app.tar!/",
    ] {
        let err = pool.acquire(input).unwrap_err();
        assert!(
            matches!(err, MountError::InvalidArgument(_)),
            "{input}: {err:?}"
        );
    }
    assert!(pool.list_mounts().is_empty());
}

#[test]
fn test_acquire_close_acquire_reopens() {
    let (pool, provider) = setup_pool();

    for cycle in 1..=3 {
        let handle = pool.acquire("mem:/bundle!/").unwrap();
        assert_eq!(pool.list_mounts().len(), 1);
        handle.close();
        assert!(pool.list_mounts().is_empty());
        assert_eq!(provider.opened(), cycle);
        assert_eq!(provider.closed(), cycle);
    }
}

#[test]
fn test_entry_uris_share_one_mount() {
    let (pool, provider) = setup_pool();

    let a = pool.acquire("mem:/bundle!/a.txt").unwrap();
    let b = pool.acquire("mem:/bundle!/static/b.txt").unwrap();

    assert_eq!(provider.opened(), 1);
    assert_eq!(a.key(), b.key());
    let mounts = pool.list_mounts();
    assert_eq!(mounts.len(), 1);
    assert_eq!(mounts[0].references, 2);
    assert_eq!(mounts[0].backing_file, None);

    assert_eq!(a.root().unwrap().uri().as_str(), "mem:/bundle!/a.txt");
    assert_eq!(b.root().unwrap().uri().as_str(), "mem:/bundle!/static/b.txt");
}

#[test]
fn test_double_close_is_noop() {
    let (pool, provider) = setup_pool();
    let first = pool.acquire("mem:/bundle!/").unwrap();
    let second = pool.acquire("mem:/bundle!/").unwrap();

    first.close();
    first.close();
    drop(first);

    assert_eq!(pool.list_mounts()[0].references, 1);
    assert_eq!(provider.closed(), 0);
    assert!(!second.is_stale());

    let mut content = String::new();
    second
        .root()
        .unwrap()
        .open()
        .unwrap()
        .read_to_string(&mut content)
        .unwrap();
    assert_eq!(content, "hello");
}

#[test]
fn test_drop_releases_handle() {
    let (pool, provider) = setup_pool();
    {
        let _handle = pool.acquire("mem:/bundle!/").unwrap();
        assert_eq!(pool.list_mounts().len(), 1);
    }
    assert!(pool.list_mounts().is_empty());
    assert_eq!(provider.closed(), 1);
}

#[test]
fn test_closed_handle_is_stale() {
    let (pool, _provider) = setup_pool();
    let handle = pool.acquire("mem:/bundle!/a.txt").unwrap();
    let root = handle.root().unwrap();

    handle.close();

    assert!(handle.is_stale());
    assert!(matches!(handle.root(), Err(MountError::Stale(_))));
    assert!(matches!(handle.resource("b.txt"), Err(MountError::Stale(_))));
    assert!(root.exists().unwrap_err().is_stale());
}

#[test]
fn test_handle_resource_navigation() {
    let (pool, _provider) = setup_pool();
    let handle = pool.acquire("mem:/bundle!/").unwrap();

    let entry = handle.resource("static/a b.css").unwrap();
    assert_eq!(entry.uri().as_str(), "mem:/bundle!/static/a%20b.css");
    assert_eq!(entry.length().unwrap(), 5);
    assert_eq!(
        handle.to_string(),
        "MountHandle[key=mem:/bundle!/, root=mem:/bundle!/]"
    );
}

#[test]
fn test_provider_failure_creates_no_record() {
    let (pool, provider) = setup_pool();
    provider.fail_next_opens(true);

    let err = pool.acquire("mem:/broken!/").unwrap_err();
    assert!(matches!(
        err,
        MountError::Open {
            source: ProviderError::Unsupported { .. },
            ..
        }
    ));
    assert!(pool.list_mounts().is_empty());

    provider.fail_next_opens(false);
    let handle = pool.acquire("mem:/broken!/").unwrap();
    assert_eq!(pool.list_mounts().len(), 1);
    handle.close();
}

#[test]
fn test_sweep_skips_unbacked_mounts() {
    let (pool, provider) = setup_pool();
    let handle = pool.acquire("mem:/bundle!/").unwrap();

    let report = pool.sweep();

    assert_eq!(report.checked, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.evicted, 0);
    assert!(!handle.is_stale());
    assert_eq!(provider.closed(), 0);
}

#[test]
fn test_register_provider_conflicts() {
    let (pool, _provider) = setup_pool();

    let err = pool
        .register_provider(Arc::new(MemProvider::default()))
        .unwrap_err();
    assert!(matches!(err, MountError::DuplicateProvider(ref scheme) if scheme == "mem"));
    assert_eq!(pool.providers().schemes(), vec!["mem"]);
}

#[test]
fn test_default_providers() {
    let pool = MountPool::with_default_providers(PoolConfig::default()).unwrap();
    assert_eq!(pool.providers().schemes(), vec!["jar", "zip"]);
    assert!(pool.start_sweeper().unwrap().is_none());

    let global = MountPool::global();
    assert_eq!(global.providers().schemes(), vec!["jar", "zip"]);
    assert!(std::ptr::eq(global, MountPool::global()));
}
