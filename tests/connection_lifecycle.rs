mod common;

use std::sync::Arc;

use common::{settings, MockOpener, DEVICE};
use maestro_servo::device::{ConnectionState, DeviceError, DeviceManager};
use maestro_servo::serial::{SerialError, SerialInterface};

#[tokio::test]
async fn test_write_failure_closes_and_reopen_recovers() {
    let opener = MockOpener::new();
    let device = DeviceManager::new(Arc::new(opener.clone()), settings(), DEVICE);

    device.open().await.unwrap();
    assert!(device.is_connected().await);

    opener.state.lock().unwrap().fail_next_write = true;
    let result = device.set_target(0, 6000).await;
    assert!(matches!(
        result,
        Err(DeviceError::SerialError(SerialError::IoError(_)))
    ));
    assert!(!device.is_connected().await);
    assert_eq!(device.connection_state().await, ConnectionState::Closed);

    device.open().await.unwrap();
    assert!(device.is_connected().await);
    assert_eq!(device.get_position(0).await.unwrap(), 6000);
    assert_eq!(opener.state.lock().unwrap().successful_opens, 2);
}

#[tokio::test]
async fn test_short_read_closes_without_partial_value() {
    let opener = MockOpener::new();
    let device = DeviceManager::new(Arc::new(opener.clone()), settings(), DEVICE);
    device.open().await.unwrap();

    opener.state.lock().unwrap().truncate_responses = true;
    assert!(device.get_position(3).await.is_err());
    assert!(!device.is_connected().await);
}

#[tokio::test]
async fn test_failed_open_stays_closed() {
    let opener = MockOpener::failing(1);
    let device = DeviceManager::new(Arc::new(opener.clone()), settings(), DEVICE);

    assert!(matches!(device.open().await, Err(SerialError::PortNotFound(_))));
    assert!(!device.is_connected().await);

    device.open().await.unwrap();
    assert!(device.is_connected().await);
}

#[test]
fn test_open_discards_stale_input_and_close_is_idempotent() {
    let opener = MockOpener::new();
    opener.state.lock().unwrap().rx.extend([0x12, 0x34]);
    let mut interface = SerialInterface::new(Arc::new(opener.clone()), settings());

    assert!(!interface.health());
    interface.open().unwrap();
    assert!(interface.health());
    assert_eq!(opener.state.lock().unwrap().clears, 1);
    assert!(opener.state.lock().unwrap().rx.is_empty());

    // Opening an open interface does not reopen the port.
    interface.open().unwrap();
    assert_eq!(opener.state.lock().unwrap().successful_opens, 1);

    interface.close();
    interface.close();
    assert!(!interface.health());
    assert!(matches!(interface.send_data(&[0x84]), Err(SerialError::NotConnected)));
}
