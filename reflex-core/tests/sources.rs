//! Integration Tests for Sources, Overrides and Sharing
//!
//! These tests cover values that change outside the namespace, temporary
//! overrides, access from several threads and the verbose trace.

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use reflex_core::{
    Descriptor, Entry, FileSource, InputSource, Namespace, Options, SharedNamespace,
};
use tracing_subscriber::EnvFilter;

fn doubled(ns: &Namespace<i64>, input: &str, calls: &Arc<AtomicUsize>) -> Descriptor<i64> {
    let calls = calls.clone();
    ns.call(move |args| {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(args.at(0)? * 2)
    })
    .arg_name(input)
    .build()
}

/// Test that a source change invalidates names computed from it.
#[test]
fn input_change_invalidates_dependents() {
    let calls = Arc::new(AtomicUsize::new(0));
    let slider = InputSource::new(3);
    let mut ns = Namespace::new();
    ns.define("x", Descriptor::source(slider.clone())).unwrap();
    let y = doubled(&ns, "x", &calls);
    ns.define("y", y).unwrap();

    assert_eq!(ns.get("y").unwrap(), 6);
    assert_eq!(ns.get("y").unwrap(), 6);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    slider.set(7);
    assert_eq!(ns.get("y").unwrap(), 14);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

/// Test that an eager namespace recomputes when polled.
#[test]
fn eager_poll_recomputes_leaves() {
    let calls = Arc::new(AtomicUsize::new(0));
    let slider = InputSource::new(1);
    let mut ns = Namespace::with_options(Options::default().lazy_eval(false));
    ns.define("x", Descriptor::source(slider.clone())).unwrap();
    let y = doubled(&ns, "x", &calls);
    ns.define("y", y).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    slider.set(2);
    slider.set(3);
    assert_eq!(ns.poll_sources().unwrap(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(ns.is_cached("y"));
    assert_eq!(ns.get("y").unwrap(), 6);
    assert_eq!(ns.poll_sources().unwrap(), 0);
}

/// Test that a failing recompute after a source change does not undo an
/// unrelated write.
#[test]
fn source_failure_keeps_unrelated_writes() {
    let slider = InputSource::new(1);
    let mut ns: Namespace<i64> = Namespace::with_options(Options::default().lazy_eval(false));
    ns.define("x", Descriptor::source(slider.clone())).unwrap();
    let y = ns
        .call(|args| {
            let x = *args.at(0)?;
            if x == 0 {
                return Err("division by zero".into());
            }
            Ok(10 / x)
        })
        .arg_name("x")
        .build();
    ns.define("y", y).unwrap();
    assert_eq!(ns.get("y").unwrap(), 10);

    slider.set(0);
    assert!(ns.set("unrelated", 42).is_err());
    assert!(ns.contains("unrelated"));
    assert_eq!(ns.get("unrelated").unwrap(), 42);

    // The failure was reported once; the change is not queued again.
    assert_eq!(ns.poll_sources().unwrap(), 0);
    assert!(ns.get("y").is_err());

    slider.set(2);
    ns.delete("unrelated").unwrap();
    assert!(!ns.contains("unrelated"));
    assert_eq!(ns.get("y").unwrap(), 5);
}

/// Test that a read still returns its own value when a queued source change
/// fails to recompute.
#[test]
fn source_failure_reports_after_read() {
    let slider = InputSource::new(1);
    let mut ns: Namespace<i64> = Namespace::with_options(Options::default().lazy_eval(false));
    ns.define("x", Descriptor::source(slider.clone())).unwrap();
    let y = ns
        .call(|args| match *args.at(0)? {
            0 => Err("zero".into()),
            x => Ok(x),
        })
        .arg_name("x")
        .build();
    ns.define("y", y).unwrap();
    ns.set("z", 7).unwrap();

    slider.set(0);
    assert!(ns.get("z").is_err());
    assert!(!ns.is_cached("y"));
    assert_eq!(ns.get("z").unwrap(), 7);
}

/// Test that replacing, deleting or dropping withdraws the hook.
#[test]
fn hooks_follow_the_entry() {
    let slider = InputSource::new(0);
    let mut ns: Namespace<i64> = Namespace::new();

    ns.define("x", Descriptor::source(slider.clone())).unwrap();
    assert_eq!(slider.subscriber_count(), 1);
    ns.set("x", 5).unwrap();
    assert_eq!(slider.subscriber_count(), 0);

    slider.set(9);
    assert_eq!(ns.get("x").unwrap(), 5);

    ns.define("x", Descriptor::source(slider.clone())).unwrap();
    ns.delete("x").unwrap();
    assert_eq!(slider.subscriber_count(), 0);

    ns.define("x", Descriptor::source(slider.clone())).unwrap();
    let mut other: Namespace<i64> = Namespace::new();
    other.define("x", Descriptor::source(slider.clone())).unwrap();
    assert_eq!(slider.subscriber_count(), 2);
    drop(ns);
    assert_eq!(slider.subscriber_count(), 1);
    assert_eq!(other.get("x").unwrap(), 9);
}

/// Test notifications arriving from another thread.
#[test]
fn notifications_cross_threads() {
    let slider = InputSource::new(1);
    let mut ns = Namespace::new();
    ns.define("x", Descriptor::source(slider.clone())).unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let y = doubled(&ns, "x", &calls);
    ns.define("y", y).unwrap();
    assert_eq!(ns.get("y").unwrap(), 2);

    let remote = slider.clone();
    thread::spawn(move || remote.set(21)).join().unwrap();
    assert_eq!(ns.get("y").unwrap(), 42);
}

/// Test a watched file feeding a derived value.
#[test]
fn file_source_feeds_namespace() {
    let path = std::env::temp_dir().join(format!("reflex-sources-test-{}", std::process::id()));
    std::fs::write(&path, b"hello").unwrap();
    let file = FileSource::watch(&path, Duration::from_secs(3600)).unwrap();

    let mut ns: Namespace<Vec<u8>> = Namespace::new();
    ns.define("raw", Descriptor::source(file.clone())).unwrap();
    let len = ns
        .call(|args| Ok(args.at(0)?.len().to_string().into_bytes()))
        .arg_name("raw")
        .build();
    ns.define("len", len).unwrap();
    assert_eq!(ns.get("len").unwrap(), b"5");

    std::fs::write(&path, b"hello, world").unwrap();
    assert!(file.refresh().unwrap());
    assert_eq!(ns.get("raw").unwrap(), b"hello, world");
    assert_eq!(ns.get("len").unwrap(), b"12");

    std::fs::remove_file(&path).unwrap();
}

/// Test the scoped override of an existing and a new name.
#[test]
fn overrides_restore_on_exit() {
    let mut ns: Namespace<i64> = Namespace::new();
    ns.set("a", 1).unwrap();

    {
        let mut scoped = ns
            .overrides([("a", Entry::Value(99)), ("b", Entry::Value(7))])
            .unwrap();
        assert_eq!(scoped.get("a").unwrap(), 99);
        assert_eq!(scoped.get("b").unwrap(), 7);
    }

    assert_eq!(ns.get("a").unwrap(), 1);
    assert!(!ns.contains("b"));
}

/// Test that a failing scope still restores.
#[test]
fn overrides_restore_after_failure() {
    let mut ns: Namespace<i64> = Namespace::new();
    ns.set("a", 1).unwrap();

    let result = ns.with_overrides([("a", Entry::Value(99))], |ns| {
        assert_eq!(ns.get("a")?, 99);
        ns.get("undefined")
    });

    assert!(result.unwrap_err().is_not_found());
    assert_eq!(ns.get("a").unwrap(), 1);
}

/// Test a shared namespace written from several threads.
#[test]
fn shared_namespace_across_threads() {
    let shared: SharedNamespace<i64> = SharedNamespace::new();
    shared.set("total", 0).unwrap();
    {
        let mut ns = shared.lock();
        let doubled = ns.call(|args| Ok(args.at(0)? * 2)).arg_name("total").build();
        ns.define("doubled", doubled).unwrap();
    }

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let shared = shared.clone();
            thread::spawn(move || {
                for _ in 0..25 {
                    let mut ns = shared.lock();
                    let total = ns.get("total").unwrap();
                    ns.set("total", total + 1).unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(shared.get("total").unwrap(), 100);
    assert_eq!(shared.get("doubled").unwrap(), 200);
}

#[derive(Clone, Default)]
struct Capture(Arc<Mutex<Vec<u8>>>);

impl io::Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Test that verbose mode traces operations without changing results.
#[test]
fn verbose_traces_operations() {
    let capture = Capture::default();
    let writer = capture.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("reflex_core=debug"))
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();

    let value = tracing::subscriber::with_default(subscriber, || {
        let mut ns: Namespace<i64> = Namespace::with_options(Options::default().verbose(true));
        ns.set("a", 2).unwrap();
        let b = ns.call(|args| Ok(args.at(0)? + 1)).arg_name("a").build();
        ns.define("b", b).unwrap();
        ns.get("b").unwrap()
    });
    assert_eq!(value, 3);

    let output = String::from_utf8(capture.0.lock().unwrap().clone()).unwrap();
    assert!(output.contains("invalidate cache depends"), "{output}");
    assert!(output.contains("update cache"), "{output}");

    let quiet = Capture::default();
    let writer = quiet.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("reflex_core=debug"))
        .with_writer(move || writer.clone())
        .finish();
    tracing::subscriber::with_default(subscriber, || {
        let mut ns: Namespace<i64> = Namespace::new();
        ns.set("a", 2).unwrap();
        ns.get("a").unwrap();
    });
    assert!(quiet.0.lock().unwrap().is_empty());
}
