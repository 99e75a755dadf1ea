//! E2E tests for device discovery.
//!
//! These tests verify that the pool can correctly:
//! - Register only devices that answer `AT`
//! - Rescan without reopening registered devices
//! - Serve lookups while a scan is busy with a slow device
//! - Serialize concurrent scans

use crate::common::{quectel_modem, MockRig};
use modem_bridge::modem::{LinkState, ModemError, SmsMode};
use modem_bridge::port::{GlobScanner, MockSerialPort, DeviceScanner};
use modem_bridge::PortListing;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn test_scan_registers_responsive_modems_only() {
    let rig = MockRig::new(
        vec![
            quectel_modem("/dev/ttyUSB0"),
            MockSerialPort::new("/dev/ttyUSB1"),
            quectel_modem("/dev/ttyACM0"),
        ],
        SmsMode::Pdu,
    );

    let mut added = rig.pool.scan().unwrap();
    added.sort();
    assert_eq!(added, vec!["/dev/ttyACM0", "/dev/ttyUSB0"]);

    let listing = rig.pool.list();
    assert_eq!(
        listing,
        vec![
            PortListing {
                identifier: "/dev/ttyACM0".to_string(),
                connected: true,
            },
            PortListing {
                identifier: "/dev/ttyUSB0".to_string(),
                connected: true,
            },
        ]
    );
    assert!(matches!(
        rig.pool.get("/dev/ttyUSB1"),
        Err(ModemError::NotConnected(_))
    ));
}

#[test]
fn test_rescan_never_reopens_registered_sessions() {
    let rig = MockRig::new(vec![quectel_modem("/dev/ttyUSB0")], SmsMode::Pdu);
    rig.pool.scan().unwrap();
    let first = rig.pool.get("/dev/ttyUSB0").unwrap();

    for _ in 0..3 {
        assert!(rig.pool.scan().unwrap().is_empty());
    }

    let again = rig.pool.get("/dev/ttyUSB0").unwrap();
    assert!(Arc::ptr_eq(&first, &again));
    assert_eq!(rig.opener.open_count("/dev/ttyUSB0"), 1);
}

#[test]
fn test_device_that_starts_answering_is_registered_later() {
    let silent = MockSerialPort::new("/dev/ttyUSB3");
    let rig = MockRig::new(vec![silent.clone()], SmsMode::Pdu);

    assert!(rig.pool.scan().unwrap().is_empty());
    silent.respond_to("AT", "\r\nOK\r\n");
    assert_eq!(rig.pool.scan().unwrap(), vec!["/dev/ttyUSB3".to_string()]);
    assert_eq!(rig.opener.open_count("/dev/ttyUSB3"), 2);
}

#[test]
fn test_lookups_do_not_wait_for_a_slow_scan() {
    let rig = MockRig::new(
        vec![quectel_modem("/dev/ttyUSB0"), MockSerialPort::new("/dev/ttyUSB1")],
        SmsMode::Pdu,
    );
    rig.scanner.set(&["/dev/ttyUSB0"]);
    rig.pool.scan().unwrap();

    // The silent device holds the scan for the whole verify timeout.
    rig.scanner.set(&["/dev/ttyUSB0", "/dev/ttyUSB1"]);
    let pool = Arc::clone(&rig.pool);
    let scan = thread::spawn(move || pool.scan());
    thread::sleep(Duration::from_millis(50));

    let started = Instant::now();
    let session = rig.pool.get("/dev/ttyUSB0").unwrap();
    let listing = rig.pool.list();
    assert!(started.elapsed() < Duration::from_millis(150));
    assert_eq!(listing.len(), 1);
    assert_eq!(session.state(), LinkState::Active);

    assert!(scan.join().unwrap().unwrap().is_empty());
}

#[test]
fn test_concurrent_scans_open_each_device_once() {
    let rig = MockRig::new(
        vec![quectel_modem("/dev/ttyUSB0"), quectel_modem("/dev/ttyUSB1")],
        SmsMode::Pdu,
    );

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let pool = Arc::clone(&rig.pool);
            thread::spawn(move || pool.scan().unwrap())
        })
        .collect();
    let total_added: usize = handles.into_iter().map(|h| h.join().unwrap().len()).sum();

    assert_eq!(total_added, 2);
    assert_eq!(rig.opener.open_count("/dev/ttyUSB0"), 1);
    assert_eq!(rig.opener.open_count("/dev/ttyUSB1"), 1);
}

#[test]
fn test_glob_scanner_lists_matching_nodes() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["ttyUSB0", "ttyUSB1", "ttyS0"] {
        std::fs::write(dir.path().join(name), b"").unwrap();
    }
    let pattern = format!("{}/ttyUSB*", dir.path().display());
    let scanner = GlobScanner::new([pattern]).unwrap();

    let mut found = scanner.candidates().unwrap();
    found.sort();
    let expected: Vec<String> = ["ttyUSB0", "ttyUSB1"]
        .iter()
        .map(|n| dir.path().join(n).display().to_string())
        .collect();
    assert_eq!(found, expected);
}
