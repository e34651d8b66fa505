//! Integration tests for the socket broker's command surface.
//!
//! Exercises validation, lifecycle transitions, owner isolation, and the
//! error taxonomy against a fake adapter with call counters.

use std::sync::Arc;

use bytes::Bytes;

use bsock_broker::{SocketService, StaticCapabilities};
use bsock_core::{ErrorKind, ServiceId, SocketEvent, SocketProperties};
use bsock_test_utils::{CaptureEvents, FakeAdapter};

fn service_with(adapter: Arc<FakeAdapter>) -> (SocketService, Arc<CaptureEvents>) {
    let events = CaptureEvents::new();
    let capabilities = Arc::new(StaticCapabilities::allow_all());
    let service = SocketService::new(adapter, capabilities, events.clone());
    (service, events)
}

fn props(name: Option<&str>, persistent: Option<bool>, buffer_size: Option<u32>) -> SocketProperties {
    SocketProperties {
        name: name.map(String::from),
        persistent,
        buffer_size,
    }
}

#[tokio::test]
async fn create_then_close_is_absent_from_get_all() {
    let (service, _events) = service_with(FakeAdapter::new());

    let id = service.create("alice", None).await;
    assert_eq!(service.get_all("alice").await.len(), 1);

    service.close("alice", id).await.unwrap();
    assert!(service.get_all("alice").await.is_empty());
}

#[tokio::test]
async fn create_roundtrip_defaults() {
    let (service, _events) = service_with(FakeAdapter::new());

    let id = service
        .create("alice", Some(&props(Some("n"), Some(true), None)))
        .await;
    let info = service.get_info("alice", id).await.unwrap();

    assert_eq!(info.id, id);
    assert_eq!(info.name.as_deref(), Some("n"));
    assert!(info.persistent);
    assert!(!info.paused);
    assert!(!info.connected);
    assert!(info.remote_address.is_none());
    assert!(info.service_id.is_none());
}

#[tokio::test]
async fn update_merges_only_present_fields() {
    let (service, _events) = service_with(FakeAdapter::new());
    let id = service.create("alice", None).await;

    service
        .update("alice", id, &props(Some("x"), None, None))
        .await
        .unwrap();
    service
        .update("alice", id, &props(None, Some(true), None))
        .await
        .unwrap();

    let info = service.get_info("alice", id).await.unwrap();
    assert_eq!(info.name.as_deref(), Some("x"));
    assert!(info.persistent);
    assert!(info.buffer_size.is_none());

    // A second unrelated update leaves both earlier fields stable.
    service
        .update("alice", id, &props(None, None, Some(512)))
        .await
        .unwrap();
    let info = service.get_info("alice", id).await.unwrap();
    assert_eq!(info.name.as_deref(), Some("x"));
    assert!(info.persistent);
    assert_eq!(info.buffer_size, Some(512));
}

#[tokio::test]
async fn connect_scenario_full_lifecycle() {
    let adapter = FakeAdapter::new();
    adapter.add_peer("AA:BB");
    let (service, events) = service_with(adapter);

    let id = service.create("alice", None).await;
    service.connect("alice", id, "AA:BB", "1234").await.unwrap();

    let info = service.get_info("alice", id).await.unwrap();
    assert!(info.connected);
    assert_eq!(info.remote_address.as_deref(), Some("AA:BB"));
    assert_eq!(
        info.service_id,
        Some(ServiceId::parse("1234").unwrap())
    );
    assert_eq!(events.of_kind(id, SocketEvent::Connected), 1);

    service.close("alice", id).await.unwrap();
    let err = service.get_info("alice", id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn send_on_unconnected_socket_never_reaches_adapter() {
    let adapter = FakeAdapter::new();
    let counters = adapter.counters();
    let (service, _events) = service_with(adapter);

    let id = service.create("alice", None).await;
    let err = service
        .send("alice", id, Bytes::from_static(b"hi"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert_eq!(counters.device_calls(), 0);
}

#[tokio::test]
async fn listen_with_malformed_service_id_never_reaches_adapter() {
    let adapter = FakeAdapter::new();
    let counters = adapter.counters();
    let (service, _events) = service_with(adapter);

    let id = service.create("alice", None).await;

    let err = service
        .listen_rfcomm("alice", id, "not-a-uuid", None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidIdentifier);

    let err = service
        .listen_l2cap("alice", id, "zz", None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidIdentifier);

    assert_eq!(counters.device_calls(), 0);
}

#[tokio::test]
async fn listen_registers_service_and_fires_event() {
    let adapter = FakeAdapter::new();
    let counters = adapter.counters();
    let (service, events) = service_with(adapter);

    let id = service.create("alice", None).await;
    service
        .listen_l2cap("alice", id, "1101", Some(25))
        .await
        .unwrap();

    let info = service.get_info("alice", id).await.unwrap();
    assert!(!info.connected);
    assert_eq!(info.service_id, Some(ServiceId::parse("1101").unwrap()));
    assert_eq!(events.of_kind(id, SocketEvent::Listening), 1);
    assert_eq!(counters.create_service.load(std::sync::atomic::Ordering::SeqCst), 1);
}

#[tokio::test]
async fn owners_are_isolated() {
    let (service, _events) = service_with(FakeAdapter::new());

    let alice_id = service.create("alice", None).await;
    let bob_id = service.create("bob", None).await;

    let alice_all = service.get_all("alice").await;
    assert_eq!(alice_all.len(), 1);
    assert_eq!(alice_all[0].id, alice_id);

    let bob_all = service.get_all("bob").await;
    assert_eq!(bob_all.len(), 1);
    assert_eq!(bob_all[0].id, bob_id);

    let err = service.get_info("bob", alice_id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    // A foreign close acks (idempotent) but removes nothing.
    service.close("bob", alice_id).await.unwrap();
    assert!(service.get_info("alice", alice_id).await.is_ok());
}

#[tokio::test]
async fn permission_denied_before_device_work() {
    let adapter = FakeAdapter::new();
    adapter.add_peer("AA:BB");
    let counters = adapter.counters();

    let events = CaptureEvents::new();
    let capabilities = Arc::new(
        StaticCapabilities::new().with_grant("alice", ServiceId::parse("1101").unwrap()),
    );
    let service = SocketService::new(adapter, capabilities, events);

    let id = service.create("alice", None).await;
    let err = service
        .listen_rfcomm("alice", id, "1234", None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);

    let bob_id = service.create("bob", None).await;
    let err = service
        .connect("bob", bob_id, "AA:BB", "1101")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);

    assert_eq!(counters.device_calls(), 0);

    // The granted id is allowed through.
    service
        .listen_rfcomm("alice", id, "1101", None)
        .await
        .unwrap();
}

#[tokio::test]
async fn close_is_idempotent() {
    let (service, _events) = service_with(FakeAdapter::new());

    let id = service.create("alice", None).await;
    service.close("alice", id).await.unwrap();
    service.close("alice", id).await.unwrap();
    service.close("alice", 9999).await.unwrap();
}

#[tokio::test]
async fn disconnect_always_lands_in_disconnected() {
    let adapter = FakeAdapter::new();
    adapter.add_peer("AA:BB");
    let counters = adapter.counters();
    let (service, _events) = service_with(adapter);

    let id = service.create("alice", None).await;
    service.connect("alice", id, "AA:BB", "1234").await.unwrap();
    service.disconnect("alice", id).await.unwrap();

    let info = service.get_info("alice", id).await.unwrap();
    assert!(!info.connected);
    assert!(info.remote_address.is_none());
    assert_eq!(counters.disconnect.load(std::sync::atomic::Ordering::SeqCst), 1);

    // Sending after disconnect is a state error, not a device call.
    let sends_before = counters.send.load(std::sync::atomic::Ordering::SeqCst);
    let err = service
        .send("alice", id, Bytes::from_static(b"hi"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert_eq!(counters.send.load(std::sync::atomic::Ordering::SeqCst), sends_before);

    // Disconnecting a socket that never connected still succeeds.
    let other = service.create("alice", None).await;
    service.disconnect("alice", other).await.unwrap();
    let info = service.get_info("alice", other).await.unwrap();
    assert!(!info.connected);
}

#[tokio::test]
async fn resumed_event_fires_only_on_transition() {
    let (service, events) = service_with(FakeAdapter::new());
    let id = service.create("alice", None).await;

    service.set_paused("alice", id, true).await.unwrap();
    service.set_paused("alice", id, true).await.unwrap();
    assert_eq!(events.of_kind(id, SocketEvent::Resumed), 0);

    service.set_paused("alice", id, false).await.unwrap();
    assert_eq!(events.of_kind(id, SocketEvent::Resumed), 1);

    // Already resumed; no further event.
    service.set_paused("alice", id, false).await.unwrap();
    assert_eq!(events.of_kind(id, SocketEvent::Resumed), 1);
}

#[tokio::test]
async fn send_forwards_payload_and_validates_buffer_size() {
    let adapter = FakeAdapter::new();
    adapter.add_peer("AA:BB");
    let (service, _events) = service_with(adapter.clone());

    let id = service.create("alice", None).await;
    service.connect("alice", id, "AA:BB", "1234").await.unwrap();

    let sent = service
        .send("alice", id, Bytes::from_static(b"hello"))
        .await
        .unwrap();
    assert_eq!(sent, 5);
    assert_eq!(adapter.sent(), vec![b"hello".to_vec()]);

    service
        .update("alice", id, &props(None, None, Some(4)))
        .await
        .unwrap();
    let err = service
        .send("alice", id, Bytes::from_static(b"hello"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);

    // Within the buffer it still goes through.
    let sent = service
        .send("alice", id, Bytes::from_static(b"hey"))
        .await
        .unwrap();
    assert_eq!(sent, 3);
}

#[tokio::test]
async fn device_errors_pass_the_message_through() {
    let adapter = FakeAdapter::new();
    adapter.add_peer("AA:BB");
    adapter.fail_next_connect("radio unavailable");
    let (service, events) = service_with(adapter.clone());

    let id = service.create("alice", None).await;
    let err = service
        .connect("alice", id, "AA:BB", "1234")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Device);
    assert_eq!(err.to_string(), "device error: radio unavailable");

    // The failed operation left the socket in its prior state.
    let info = service.get_info("alice", id).await.unwrap();
    assert!(!info.connected);
    assert_eq!(events.of_kind(id, SocketEvent::Connected), 0);

    // Retrying is the caller's choice, and it works.
    service.connect("alice", id, "AA:BB", "1234").await.unwrap();
}

#[tokio::test]
async fn connect_to_unknown_peer_is_not_found() {
    let adapter = FakeAdapter::new();
    let counters = adapter.counters();
    let (service, _events) = service_with(adapter);

    let id = service.create("alice", None).await;
    let err = service
        .connect("alice", id, "00:00", "1234")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(counters.connect.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[tokio::test]
async fn reconnect_releases_the_displaced_device_handle() {
    let adapter = FakeAdapter::new();
    adapter.add_peer("AA:BB");
    adapter.add_peer("CC:DD");
    let counters = adapter.counters();
    let (service, _events) = service_with(adapter);

    let id = service.create("alice", None).await;
    service.connect("alice", id, "AA:BB", "1234").await.unwrap();
    service.connect("alice", id, "CC:DD", "1234").await.unwrap();

    // The handle from the first connect is owned exclusively by the socket;
    // adopting its replacement must close it, not drop it on the floor.
    assert_eq!(counters.disconnect.load(std::sync::atomic::Ordering::SeqCst), 1);
    let info = service.get_info("alice", id).await.unwrap();
    assert_eq!(info.remote_address.as_deref(), Some("CC:DD"));

    // Closing releases the second handle too.
    service.close("alice", id).await.unwrap();
    for _ in 0..100 {
        if counters.disconnect.load(std::sync::atomic::Ordering::SeqCst) == 2 {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(1)).await;
    }
    panic!("displaced or closed handle was not released");
}

#[tokio::test]
async fn close_owner_removes_all_sockets_and_releases_handles() {
    let adapter = FakeAdapter::new();
    adapter.add_peer("AA:BB");
    let counters = adapter.counters();
    let (service, _events) = service_with(adapter);

    let a = service.create("alice", None).await;
    let _b = service.create("alice", None).await;
    service.connect("alice", a, "AA:BB", "1234").await.unwrap();
    service.create("bob", None).await;

    let closed = service.close_owner("alice").await;
    assert_eq!(closed, 2);
    assert!(service.get_all("alice").await.is_empty());
    assert_eq!(service.get_all("bob").await.len(), 1);

    // The connected socket's handle is released through the device worker.
    for _ in 0..100 {
        if counters.disconnect.load(std::sync::atomic::Ordering::SeqCst) == 1 {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(1)).await;
    }
    panic!("handle was not released");
}
