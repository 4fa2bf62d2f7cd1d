mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{settings, Event, MockOpener, DEVICE};
use maestro_servo::device::DeviceManager;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_queries_never_interleave() {
    let opener = MockOpener::new();
    {
        let mut state = opener.state.lock().unwrap();
        state.read_delay = Some(Duration::from_millis(2));
        for channel in 0..8u8 {
            state.positions.insert(channel, 4000 + u16::from(channel) * 100);
        }
    }
    let device = Arc::new(DeviceManager::new(Arc::new(opener.clone()), settings(), DEVICE));
    device.open().await.unwrap();

    let mut tasks = Vec::new();
    for round in 0..5u8 {
        for channel in 0..8u8 {
            let device = device.clone();
            tasks.push(tokio::spawn(async move {
                if (round + channel) % 3 == 0 {
                    device.set_target(channel, 6000).await.unwrap();
                    None
                } else {
                    Some((channel, device.get_position(channel).await.unwrap()))
                }
            }));
        }
    }

    for task in tasks {
        if let Some((channel, position)) = task.await.unwrap() {
            assert_eq!(position, 4000 + u16::from(channel) * 100);
        }
    }

    // Every get_position write is immediately followed by its own response.
    let events = opener.state.lock().unwrap().events.clone();
    for (i, event) in events.iter().enumerate() {
        if let Event::Write(frame) = event {
            if frame[2] == 0x10 {
                let channel = frame[3];
                let expected = 4000 + u16::from(channel) * 100;
                assert_eq!(
                    events.get(i + 1),
                    Some(&Event::Read(vec![(expected & 0xFF) as u8, (expected >> 8) as u8])),
                    "response for channel {} not contiguous with its request",
                    channel
                );
            }
        }
    }
}
