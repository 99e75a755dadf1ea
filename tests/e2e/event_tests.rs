//! E2E tests for raw chatter broadcast.
//!
//! These tests verify that:
//! - Unsolicited device output reaches subscribers tagged with its port
//! - Command replies are consumed by the exchange, not broadcast
//! - A stalled subscriber loses messages without slowing anyone else
//! - Cancellation is idempotent and survives the bus

use crate::common::{quectel_modem, MockRig};
use modem_bridge::events::EventBus;
use modem_bridge::modem::SmsMode;
use std::time::Duration;
use tokio::time::timeout;

async fn next_line(rx: &mut tokio::sync::mpsc::Receiver<String>) -> String {
    timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("no event within two seconds")
        .expect("bus closed")
}

#[tokio::test]
async fn test_unsolicited_lines_are_tagged_per_device() {
    let usb0 = quectel_modem("/dev/ttyUSB0");
    let usb1 = quectel_modem("/dev/ttyUSB1");
    let rig = MockRig::new(vec![usb0.clone(), usb1.clone()], SmsMode::Pdu);
    let (mut rx, unsubscribe) = rig.pool.events().subscribe(16);
    rig.pool.scan().unwrap();

    usb0.enqueue_read(b"\r\n+CMTI: \"SM\",4\r\n");
    let first = next_line(&mut rx).await;
    assert_eq!(first, "[/dev/ttyUSB0] \r\n+CMTI: \"SM\",4\r\n");

    usb1.enqueue_read(b"RING\r\n");
    let second = next_line(&mut rx).await;
    assert!(second.starts_with("[/dev/ttyUSB1] "));
    assert!(second.contains("RING"));

    unsubscribe.cancel();
}

#[tokio::test]
async fn test_command_replies_are_not_broadcast() {
    let port = quectel_modem("/dev/ttyUSB0");
    let rig = MockRig::new(vec![port.clone()], SmsMode::Pdu);
    rig.pool.scan().unwrap();
    let (mut rx, _unsubscribe) = rig.pool.events().subscribe(16);

    let session = rig.pool.get("/dev/ttyUSB0").unwrap();
    let reply = tokio::task::spawn_blocking(move || session.send_raw_command("AT+CSQ"))
        .await
        .unwrap()
        .unwrap();
    assert!(reply.contains("+CSQ: 18,99"));

    port.enqueue_read(b"+CREG: 1\r\n");
    let line = next_line(&mut rx).await;
    assert!(line.contains("+CREG: 1"));
    assert!(!line.contains("+CSQ"));
}

#[tokio::test]
async fn test_stalled_subscriber_does_not_block_others() {
    let bus = EventBus::new();
    let (_stalled, _stalled_handle) = bus.subscribe(1);
    let (mut live, _live_handle) = bus.subscribe(64);

    let delivered: Vec<usize> = (0..10)
        .map(|i| bus.broadcast(&format!("[MOCK0] line {i}")))
        .collect();

    // The stalled queue takes the first message, then drops the rest.
    assert_eq!(delivered[0], 2);
    assert!(delivered[1..].iter().all(|&n| n == 1));
    for i in 0..10 {
        assert_eq!(live.recv().await.unwrap(), format!("[MOCK0] line {i}"));
    }
}

#[test]
fn test_cancel_is_idempotent_and_survives_bus() {
    let bus = EventBus::new();
    let (mut rx, handle) = bus.subscribe(0);
    assert_eq!(bus.subscriber_count(), 1);

    handle.cancel();
    handle.cancel();
    assert!(handle.is_cancelled());
    assert_eq!(bus.subscriber_count(), 0);
    assert_eq!(tokio_test::block_on(rx.recv()), None);

    let (_rx, orphan) = bus.subscribe(4);
    drop(bus);
    orphan.cancel();
    assert!(orphan.is_cancelled());
}
