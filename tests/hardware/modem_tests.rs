//! Tests against a real modem.
//!
//! # Running Hardware Tests
//!
//! ```bash
//! export MODEM_BRIDGE_TESTING_PORT=/dev/ttyUSB2
//! export MODEM_BRIDGE_TESTING_SMS_TARGET=+15550001   # optional, sends one SMS
//! cargo test --features hardware-tests -- --ignored
//! ```

use super::utils::{ModemFixture, TimingHelper};
use modem_bridge::modem::LinkState;
use std::time::Duration;

#[test]
#[ignore] // Run with --ignored flag
fn test_real_modem_identity() {
    let Some(fixture) = ModemFixture::setup() else { return };
    let session = fixture.pool.get(&fixture.config.port_name).unwrap();
    assert_eq!(session.state(), LinkState::Active);

    let timer = TimingHelper::new("identity");
    let identity = session.identity();
    timer.finish();

    println!("{identity:#?}");
    assert_eq!(identity.port, fixture.config.port_name);
    assert!(identity.manufacturer.is_some(), "AT+CGMI should answer");
}

#[test]
#[ignore]
fn test_real_modem_signal() {
    let Some(fixture) = ModemFixture::setup() else { return };
    let session = fixture.pool.get(&fixture.config.port_name).unwrap();

    let reading = session.signal().unwrap();
    println!("rssi={} dbm={} level={}", reading.rssi, reading.dbm, reading.level);
    assert!((0..=31).contains(&reading.rssi) || reading.rssi == 99);
}

#[test]
#[ignore]
fn test_real_modem_list_sms() {
    let Some(fixture) = ModemFixture::setup() else { return };
    let session = fixture.pool.get(&fixture.config.port_name).unwrap();

    let messages = session.list_sms().unwrap();
    println!("{} stored messages", messages.len());
    assert!(messages.windows(2).all(|w| w[0].index < w[1].index));
}

#[test]
#[ignore]
fn test_real_modem_send_sms() {
    let Some(fixture) = ModemFixture::setup() else { return };
    let Some(target) = fixture.config.sms_target.clone() else {
        println!("Skipping: MODEM_BRIDGE_TESTING_SMS_TARGET not set");
        return;
    };
    let session = fixture.pool.get(&fixture.config.port_name).unwrap();

    let timer = TimingHelper::new("send_sms");
    session.send_sms(&target, "modem-bridge hardware test").unwrap();
    assert!(timer.finish() < Duration::from_secs(60));
}

#[test]
#[ignore]
fn test_real_modem_close_releases_port() {
    let Some(fixture) = ModemFixture::setup() else { return };
    let session = fixture.pool.get(&fixture.config.port_name).unwrap();

    fixture.pool.close(&fixture.config.port_name).unwrap();
    assert_eq!(session.state(), LinkState::Closed);

    // The port can be opened again once released.
    assert_eq!(fixture.pool.scan().unwrap(), vec![fixture.config.port_name.clone()]);
}
