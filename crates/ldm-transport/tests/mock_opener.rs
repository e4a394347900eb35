//! Mock 传输工厂测试

use ldm_transport::mock::MockOpener;
use ldm_transport::{TransportError, TransportOpener, TransportOptions, TransportTarget};
use std::time::Duration;

#[test]
fn test_opener_yields_links_in_order() {
    let opener = MockOpener::new();
    opener.push_error(TransportError::Connection {
        target: "serial:/dev/ttyUSB0@115200".to_string(),
        message: "busy".to_string(),
    });
    let peer = opener.push_link();

    let target = TransportTarget::serial("/dev/ttyACM0", 9600);
    let options = TransportOptions {
        poll_interval: Duration::from_millis(2),
    };

    assert!(matches!(
        opener.open(&target, &options),
        Err(TransportError::Connection { .. })
    ));

    let mut transport = opener.open(&target, &options).unwrap();
    assert_eq!(transport.target(), &target);
    assert_eq!(transport.poll_interval(), Duration::from_millis(2));

    transport.write(&[0xAA, 0x80, 0x00, 0x00, 0x80]).unwrap();
    assert_eq!(
        peer.recv_written(Duration::from_millis(100)),
        Some(vec![0xAA, 0x80, 0x00, 0x00, 0x80])
    );

    // 队列耗尽后打开失败
    assert!(opener.open(&target, &options).is_err());
    assert_eq!(opener.opened_targets().len(), 3);
}

#[test]
fn test_write_failure_after_peer_breaks_pipe() {
    let opener = MockOpener::new();
    let peer = opener.push_link();
    let mut transport = opener
        .open(&TransportTarget::default(), &TransportOptions::default())
        .unwrap();

    peer.fail_writes(true);
    let err = transport.write(b"X").unwrap_err();
    assert!(err.is_fatal());

    transport.close();
    assert!(!transport.is_open());
    assert!(matches!(transport.write(b"X"), Err(TransportError::Closed)));
}

#[test]
fn test_invalid_target_is_rejected_before_open() {
    let opener = MockOpener::new();
    let _peer = opener.push_link();
    let err = opener
        .open(&TransportTarget::serial("/dev/ttyUSB0", 0), &TransportOptions::default())
        .err()
        .unwrap();
    assert!(matches!(err, TransportError::InvalidConfig(_)));
    assert!(opener.opened_targets().is_empty());
}
