//! End-to-end engine tests driven over in-memory duplex streams: the
//! scenarios in `src/parser.rs` at the unit level, exercised here through
//! the full open/dispatch/send/reopen path.

use serialio::testing::ScriptedFactory;
use serialio::{Error, Message, MessageType, SerialIoBuilder};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

fn read_header(bytes: &[u8]) -> (u32, u16, u8) {
    let length = u32::from_be_bytes(bytes[4..8].try_into().unwrap());
    let id = u16::from_be_bytes([bytes[8], bytes[9]]);
    (length, id, bytes[10])
}

#[tokio::test]
async fn open_fails_when_port_missing() {
    let port = SerialIoBuilder::with_factory(ScriptedFactory::always_missing()).build();
    let err = port.open().await.unwrap_err();
    assert!(matches!(err, Error::Io(_)));
    assert!(!port.is_open());
}

#[tokio::test]
async fn request_reply_round_trip() {
    let (factory, mut peer) = ScriptedFactory::single_connection(4096);
    let port = SerialIoBuilder::with_factory(factory).build();
    port.open().await.unwrap();
    assert!(port.is_open());

    let requester = tokio::spawn({
        let port = port.clone();
        async move { port.send_request(b"ping".to_vec()).await }
    });

    let mut header = [0u8; 11];
    peer.read_exact(&mut header).await.unwrap();
    let (length, id, ty) = read_header(&header);
    assert_eq!(ty, MessageType::Request.as_u8());
    let mut payload = vec![0u8; length as usize];
    peer.read_exact(&mut payload).await.unwrap();
    assert_eq!(payload, b"ping");

    let reply = Message::create(b"pong", MessageType::Reply, id);
    peer.write_all(reply.as_bytes()).await.unwrap();

    let got = requester.await.unwrap().unwrap();
    assert_eq!(got.payload(), b"pong");

    port.close().await.unwrap();
    assert!(!port.is_open());
}

#[tokio::test]
async fn error_reply_becomes_remote_error() {
    let (factory, mut peer) = ScriptedFactory::single_connection(4096);
    let port = SerialIoBuilder::with_factory(factory).build();
    port.open().await.unwrap();

    let requester = tokio::spawn({
        let port = port.clone();
        async move { port.send_request(b"boom".to_vec()).await }
    });

    let mut header = [0u8; 11];
    peer.read_exact(&mut header).await.unwrap();
    let (length, id, _ty) = read_header(&header);
    let mut payload = vec![0u8; length as usize];
    peer.read_exact(&mut payload).await.unwrap();

    let err_msg = Message::create(b"bad request", MessageType::Error, id);
    peer.write_all(err_msg.as_bytes()).await.unwrap();

    let err = requester.await.unwrap().unwrap_err();
    assert_eq!(err.to_string(), "bad request");
}

#[tokio::test(start_paused = true)]
async fn timeout_when_no_reply_arrives() {
    let (factory, _peer) = ScriptedFactory::single_connection(4096);
    let port = SerialIoBuilder::with_factory(factory)
        .default_timeout(Duration::from_millis(50))
        .build();
    port.open().await.unwrap();

    let requester = tokio::spawn({
        let port = port.clone();
        async move { port.send_request(b"hello".to_vec()).await }
    });

    tokio::time::advance(Duration::from_millis(100)).await;
    let err = requester.await.unwrap().unwrap_err();
    assert!(matches!(err, Error::Timeout));
}

#[tokio::test]
async fn ping_gets_an_empty_reply() {
    let (factory, mut peer) = ScriptedFactory::single_connection(4096);
    let port = SerialIoBuilder::with_factory(factory).build();
    port.open().await.unwrap();

    let pinger = tokio::spawn({
        let port = port.clone();
        async move { port.ping().await }
    });

    let mut header = [0u8; 11];
    peer.read_exact(&mut header).await.unwrap();
    let (_length, id, ty) = read_header(&header);
    assert_eq!(ty, MessageType::Ping.as_u8());

    let reply = Message::create(b"", MessageType::Reply, id);
    peer.write_all(reply.as_bytes()).await.unwrap();

    let got = pinger.await.unwrap().unwrap();
    assert!(got.payload().is_empty());
}

#[tokio::test]
async fn handler_error_is_delivered_as_a_remote_error_between_two_engines() {
    let (requester_factory, replier_port) = ScriptedFactory::single_connection(4096);
    let requester = SerialIoBuilder::with_factory(requester_factory).build();
    requester.open().await.unwrap();

    let replier = SerialIoBuilder::with_factory(ScriptedFactory::new(vec![Ok(replier_port)])).build();
    replier.on_message(|_msg| async move { Err("handler exploded".to_string()) });
    replier.open().await.unwrap();

    // A handler-thrown error must resolve as soon as the ERROR reply is
    // written, not stall for the full request timeout.
    let outcome = tokio::time::timeout(
        Duration::from_millis(500),
        requester.send_request(b"do-it".to_vec()),
    )
    .await
    .expect("handler error must not stall the read loop waiting on its own timeout");

    let err = outcome.unwrap_err();
    assert_eq!(err.to_string(), "handler exploded");
}

#[tokio::test]
async fn inbound_request_is_dispatched_to_the_message_handler() {
    let (factory, mut peer) = ScriptedFactory::single_connection(4096);
    let port = SerialIoBuilder::with_factory(factory).build();
    port.on_message(|msg| async move {
        Ok(format!("got:{}", String::from_utf8_lossy(msg.payload())).into_bytes())
    });
    port.open().await.unwrap();

    let request = Message::create(b"hi", MessageType::Request, 7);
    peer.write_all(request.as_bytes()).await.unwrap();

    let mut header = [0u8; 11];
    peer.read_exact(&mut header).await.unwrap();
    let (length, id, ty) = read_header(&header);
    assert_eq!(ty, MessageType::Reply.as_u8());
    assert_eq!(id, 7);
    let mut payload = vec![0u8; length as usize];
    peer.read_exact(&mut payload).await.unwrap();
    assert_eq!(payload, b"got:hi");
}

#[tokio::test]
async fn unexpected_close_triggers_a_reopen() {
    let (a_client, a_server) = tokio::io::duplex(4096);
    let (b_client, _b_server) = tokio::io::duplex(4096);
    let factory = ScriptedFactory::new(vec![Ok(a_client), Ok(b_client)]);
    let port = SerialIoBuilder::with_factory(factory)
        .reopen_backoff(Duration::from_millis(10))
        .build();

    port.open().await.unwrap();
    assert!(port.is_open());

    drop(a_server); // peer hangs up: the reader sees EOF

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(port.is_open());
}

#[tokio::test]
async fn explicit_close_does_not_reopen() {
    let (factory, _peer) = ScriptedFactory::single_connection(4096);
    let port = SerialIoBuilder::with_factory(factory)
        .reopen_backoff(Duration::from_millis(10))
        .build();
    port.open().await.unwrap();

    port.close().await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!port.is_open());
}
