// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Library lifetime, enumeration, authorization and configuration.

mod common;

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use scanwerk_bridge::emulated::TEST_DEVICE;
use scanwerk_bridge::{AuthCallback, EmulatedBackend, EmulatedDevice};
use scanwerk_core::{Credentials, IoMode, ScanConfig, ScanwerkError, SessionState, Status};
use scanwerk_scan::Runtime;

use common::{HookedBackend, init_tracing, runtime_with, test_runtime};

#[test]
fn exit_waits_for_the_last_session() {
    let (backend, runtime) = test_runtime();
    let directory = runtime.directory();
    let mut first = runtime.open(TEST_DEVICE, ScanConfig::default()).unwrap();
    let second = runtime.open(TEST_DEVICE, ScanConfig::default()).unwrap();
    assert_eq!(runtime.ref_count(), 4);

    drop(runtime);
    drop(directory);
    first.close();
    assert_eq!(backend.stats().exit_calls, 0);
    assert!(backend.is_initialized());

    drop(second);
    assert_eq!(backend.stats().init_calls, 1);
    assert_eq!(backend.stats().exit_calls, 1);
    assert_eq!(backend.open_handles(), 0);
}

#[test]
fn directory_lists_and_filters_devices() {
    let (_backend, runtime) = runtime_with(vec![
        EmulatedDevice::new(TEST_DEVICE),
        EmulatedDevice::new("net:studio:0")
            .vendor("Acme", "NetScan 9", "sheetfed scanner")
            .remote(),
    ]);
    let directory = runtime.directory();
    assert_eq!(directory.enumerate(false).unwrap().len(), 2);
    let local = directory.enumerate(true).unwrap();
    assert_eq!(local.len(), 1);
    assert_eq!(local[0].name, TEST_DEVICE);
    assert_eq!(directory.find("net:studio:0").unwrap().model, "NetScan 9");
}

#[test]
fn empty_name_opens_the_default_device() {
    let (_backend, runtime) = test_runtime();
    let session = runtime.open("", ScanConfig::default()).unwrap();
    assert_eq!(session.state(), SessionState::Open);
}

#[test]
fn failed_open_leaves_nothing_behind() {
    let (backend, runtime) = runtime_with(vec![
        EmulatedDevice::new("busy:0").fail_open(Status::DeviceBusy),
    ]);
    assert!(matches!(
        runtime.open("busy:0", ScanConfig::default()),
        Err(ScanwerkError::DeviceBusy)
    ));
    assert!(matches!(
        runtime.open("missing:0", ScanConfig::default()),
        Err(ScanwerkError::InvalidDevice(_))
    ));
    assert_eq!(backend.open_handles(), 0);
    assert_eq!(runtime.ref_count(), 1);
}

#[test]
fn credentials_come_from_the_auth_callback() {
    init_tracing();
    let asked = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&asked);
    let auth: AuthCallback = Arc::new(move |resource: &str| {
        counter.fetch_add(1, Ordering::SeqCst);
        (resource == "locked:0").then(|| Credentials {
            username: "scan".into(),
            password: "s3cret".into(),
        })
    });

    let backend = Arc::new(EmulatedBackend::new(vec![
        EmulatedDevice::new("locked:0").require_credentials("scan", "s3cret"),
        EmulatedDevice::new("vault:0").require_credentials("admin", "hunter2"),
    ]));
    let runtime = Runtime::init(backend, Some(auth)).unwrap();

    assert!(runtime.open("locked:0", ScanConfig::default()).is_ok());
    assert!(matches!(
        runtime.open("vault:0", ScanConfig::default()),
        Err(ScanwerkError::AccessDenied)
    ));
    assert_eq!(asked.load(Ordering::SeqCst), 2);
}

#[test]
fn config_file_drives_the_session() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{ "io_mode": "NonBlocking", "prewarm_options": true, "read_chunk_size": 1000 }}"#)
        .unwrap();
    let config = ScanConfig::load(file.path()).unwrap();

    let (_backend, runtime) = test_runtime();
    let mut session = runtime.open(TEST_DEVICE, config).unwrap();
    assert_eq!(session.io_mode(), IoMode::NonBlocking);
    assert_eq!(session.config().read_chunk_size, 1000);
    assert_eq!(session.descriptors().unwrap().len(), 17);

    let frame = session.scan_frame().unwrap();
    assert_eq!(frame.data.len(), 100 * 100);
}

#[test]
fn session_moves_across_threads() {
    let (_backend, runtime) = test_runtime();
    let mut session = runtime.open(TEST_DEVICE, ScanConfig::default()).unwrap();
    let handle = std::thread::spawn(move || {
        let frame = session.scan_frame().unwrap();
        session.close();
        frame.data.len()
    });
    assert_eq!(handle.join().unwrap(), 100 * 100);
}

#[cfg(debug_assertions)]
#[test]
#[should_panic(expected = "Runtime::native")]
fn libsane_backends_are_not_initialised_directly() {
    let disguised = HookedBackend::new(Arc::new(EmulatedBackend::with_test_device()), "libsane");
    let _ = Runtime::init(Arc::new(disguised), None);
}
