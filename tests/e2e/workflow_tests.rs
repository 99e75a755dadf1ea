//! Complete workflow E2E tests: discover -> query -> send -> list -> delete
//!
//! These tests verify full end-to-end workflows including:
//! - Identity and signal through the async service
//! - Multi-part SMS sent, listed back and merged
//! - Per-record and per-index failures that do not abort a batch
//! - Timeouts and transport failures on a live session

use crate::common::{
    accept_submissions, assert_json_contains, cmgl_pdu_listing, cmgl_text_listing, fast_config,
    quectel_modem, MockRig, DELIVER_PDU,
};
use modem_bridge::modem::{LinkState, ModemError, SmsMode};
use modem_bridge::pdu;
use modem_bridge::{AppError, SendSmsRequest};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::time::{Duration, Instant};

#[tokio::test]
async fn test_identity_and_signal_via_service() {
    let rig = MockRig::new(vec![quectel_modem("/dev/ttyUSB0")], SmsMode::Pdu);
    let mut config = fast_config(SmsMode::Pdu);
    config
        .serial
        .port_aliases
        .insert("lte".to_string(), "/dev/ttyUSB0".to_string());
    let service = rig.service(config);
    service.scan().await.unwrap();

    let identity = service.info("lte").await.unwrap();
    assert_json_contains(
        &serde_json::to_value(&identity).unwrap(),
        &json!({
            "port": "/dev/ttyUSB0",
            "manufacturer": "Quectel",
            "model": "EC25",
            "imei": "867123456789012",
            "imsi": "460001234567890",
            "operator": "CHINA MOBILE",
            "access_technology": "E-UTRAN",
            "phone_number": "+8613800138000"
        }),
    );

    let signal = service.signal("/dev/ttyUSB0").await.unwrap();
    assert_eq!(signal.rssi, 18);
    assert_eq!(signal.dbm, "-77 dBm");
    assert_eq!(signal.level, 4);
}

#[test]
fn test_long_message_sent_then_listed_back_merged() {
    let port = quectel_modem("/dev/ttyUSB0");
    accept_submissions(&port);
    let rig = MockRig::new(vec![port.clone()], SmsMode::Pdu);
    rig.pool.scan().unwrap();
    let session = rig.pool.get("/dev/ttyUSB0").unwrap();

    let text = "Meeting moved to 15:30, room 4B. ".repeat(8);
    session.send_sms("+15550001", &text).unwrap();

    // Every body the modem accepted, in the order it got them.
    let bodies: Vec<String> = port
        .commands()
        .into_iter()
        .filter(|c| !c.starts_with("AT"))
        .collect();
    assert_eq!(bodies.len(), 2);

    // Stored sent items come back out of order and get merged.
    let listing = cmgl_pdu_listing(&[(12, 3, &bodies[1]), (11, 3, &bodies[0])]);
    port.respond_to("AT+CMGL=4", &listing);

    let messages = session.list_sms().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].index, 11);
    assert_eq!(messages[0].status, "STO SENT");
    assert_eq!(messages[0].number, "+15550001");
    assert_eq!(messages[0].message, text);
}

#[test]
fn test_incomplete_set_passes_through_unmerged() {
    let parts = pdu::encode_submit_parts("+15550001", &"z".repeat(400), 9).unwrap();
    assert_eq!(parts.len(), 3);

    let port = quectel_modem("/dev/ttyUSB0");
    port.respond_to(
        "AT+CMGL=4",
        &cmgl_pdu_listing(&[(1, 3, &parts[0].hex), (3, 3, &parts[2].hex), (4, 1, DELIVER_PDU)]),
    );
    let rig = MockRig::new(vec![port], SmsMode::Pdu);
    rig.pool.scan().unwrap();

    let messages = rig.pool.get("/dev/ttyUSB0").unwrap().list_sms().unwrap();
    let indices: Vec<u32> = messages.iter().map(|m| m.index).collect();
    assert_eq!(indices, vec![1, 3, 4]);
    assert_eq!(messages[0].message, "z".repeat(153));
    assert_eq!(messages[2].message, "How are you?");
}

#[test]
fn test_corrupted_record_does_not_hide_the_rest() {
    let port = quectel_modem("/dev/ttyUSB0");
    port.respond_to(
        "AT+CMGL=4",
        &cmgl_pdu_listing(&[(1, 1, DELIVER_PDU), (2, 0, "07911326"), (3, 1, DELIVER_PDU)]),
    );
    let rig = MockRig::new(vec![port], SmsMode::Pdu);
    rig.pool.scan().unwrap();

    let messages = rig.pool.get("/dev/ttyUSB0").unwrap().list_sms().unwrap();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0].message, "How are you?");
    assert!(messages[1].message.starts_with("PDU decode error"));
    assert!(messages[1].message.contains("raw: 07911326"));
    assert_eq!(messages[2].message, "How are you?");
}

#[test]
fn test_text_mode_listing_and_send() {
    let port = quectel_modem("/dev/ttyUSB0");
    accept_submissions(&port);
    port.respond_to(
        "AT+CMGL=\"ALL\"",
        &cmgl_text_listing(&[
            (2, "REC UNREAD", "002B0038003600310030", "4F60597D"),
            (1, "REC READ", "00310030003000380036", "004F004B"),
        ]),
    );
    let rig = MockRig::new(vec![port.clone()], SmsMode::Text);
    rig.pool.scan().unwrap();
    let session = rig.pool.get("/dev/ttyUSB0").unwrap();

    // Text mode selects the UCS2 character set during setup.
    let setup = port.commands();
    assert!(setup.contains(&"AT+CMGF=1".to_string()));
    assert!(setup.contains(&"AT+CSCS=\"UCS2\"".to_string()));

    let messages = session.list_sms().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].number, "10086");
    assert_eq!(messages[0].message, "OK");
    assert_eq!(messages[1].number, "+8610");
    assert_eq!(messages[1].message, "你好");
    assert_eq!(messages[1].status, "REC UNREAD");

    session.send_sms("10086", "OK").unwrap();
    assert!(port.commands().contains(&"004F004B".to_string()));
}

#[tokio::test]
async fn test_batch_delete_continues_past_failures() {
    let port = quectel_modem("/dev/ttyUSB0");
    port.respond_to("AT+CMGD=2", "\r\n+CMS ERROR: 321\r\n");
    let rig = MockRig::new(vec![port.clone()], SmsMode::Pdu);
    let service = rig.service(fast_config(SmsMode::Pdu));
    service.scan().await.unwrap();

    let outcomes = service
        .delete_sms("/dev/ttyUSB0", vec![1, 2, 3])
        .await
        .unwrap();
    let deleted: Vec<bool> = outcomes.iter().map(|o| o.deleted).collect();
    assert_eq!(deleted, vec![true, false, true]);
    assert!(outcomes[1].error.as_deref().unwrap().contains("+CMS ERROR: 321"));
    assert!(port.commands().contains(&"AT+CMGD=3".to_string()));
}

#[tokio::test]
async fn test_timeout_is_bounded_and_session_survives() {
    let port = quectel_modem("/dev/ttyUSB0");
    port.respond_to("AT+QSLOW", "");
    let rig = MockRig::new(vec![port], SmsMode::Pdu);
    let service = rig.service(fast_config(SmsMode::Pdu));
    service.scan().await.unwrap();

    let started = Instant::now();
    let err = service
        .raw_command("/dev/ttyUSB0", "AT+QSLOW")
        .await
        .unwrap_err();
    assert!(started.elapsed() < Duration::from_millis(300 + 20 + 200));
    assert!(matches!(err, AppError::Modem(ModemError::Timeout { .. })));

    // The next exchange on the same session is unaffected.
    let signal = service.signal("/dev/ttyUSB0").await.unwrap();
    assert_eq!(signal.rssi, 18);
}

#[test]
fn test_transport_failure_marks_session_failed() {
    let port = quectel_modem("/dev/ttyUSB0");
    let rig = MockRig::new(vec![port.clone()], SmsMode::Pdu);
    rig.pool.scan().unwrap();
    let session = rig.pool.get("/dev/ttyUSB0").unwrap();

    port.set_fail_writes(true);
    let err = session.send_raw_command("AT+CSQ").unwrap_err();
    assert!(matches!(err, ModemError::Transport { .. }));
    assert_eq!(session.state(), LinkState::Failed);
    assert!(!rig.pool.list()[0].connected);

    // Failed sessions stay registered; the pool does not prune or reconnect.
    assert!(rig.pool.scan().unwrap().is_empty());
    assert_eq!(rig.opener.open_count("/dev/ttyUSB0"), 1);
}

#[tokio::test]
async fn test_send_sms_rejects_text_over_part_limit() {
    let port = quectel_modem("/dev/ttyUSB0");
    accept_submissions(&port);
    let rig = MockRig::new(vec![port.clone()], SmsMode::Pdu);
    let service = rig.service(fast_config(SmsMode::Pdu));
    service.scan().await.unwrap();

    let err = service
        .send_sms(
            "/dev/ttyUSB0",
            SendSmsRequest {
                number: "+15550001".to_string(),
                text: "x".repeat(153 * 256),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "codec");
    assert!(!port.commands().iter().any(|c| c.starts_with("AT+CMGS")));
}
