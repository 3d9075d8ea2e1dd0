//! End-to-end client-facing scenarios driven over a real TCP socket.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::atomic::Ordering;
use std::time::Duration;

use node::{NodeConfig, StorageNode};
use wire::message::DecodeOutcome;
use wire::{Message, MessageType};

fn test_config(dir: &std::path::Path) -> NodeConfig {
    NodeConfig {
        node_id: "node-e2e".to_owned(),
        data_dir: dir.to_path_buf(),
        listen: "127.0.0.1:0".parse().unwrap(),
        block_size: 4096,
        total_blocks: 64,
        ..NodeConfig::default()
    }
}

fn send_and_recv(stream: &mut TcpStream, request: &Message) -> Message {
    stream.write_all(&request.encode()).unwrap();
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        match Message::decode(&buf).unwrap() {
            DecodeOutcome::Complete { message, .. } => return message,
            DecodeOutcome::Incomplete => {
                let n = stream.read(&mut chunk).unwrap();
                assert!(n > 0, "peer closed before a complete reply arrived");
                buf.extend_from_slice(&chunk[..n]);
            }
        }
    }
}

/// E2: a client writes a block and reads the identical bytes back.
#[tokio::test]
async fn write_then_read_round_trips_over_the_wire() {
    let dir = tempfile::tempdir().unwrap();
    let node = StorageNode::start(test_config(dir.path())).await.unwrap();
    let addr = node.local_addr().unwrap();
    let shutdown = node.shutdown_handle();
    let serve = tokio::spawn(node.serve());

    let mut client = TcpStream::connect(addr).unwrap();
    client.set_read_timeout(Some(Duration::from_secs(5))).unwrap();

    let mut write_payload = 3u64.to_le_bytes().to_vec();
    write_payload.extend_from_slice(&11u64.to_le_bytes());
    write_payload.extend_from_slice(b"hello world");
    let write_req = Message::new(MessageType::WRITE_BLOCK, 0, 1, write_payload);
    let reply = send_and_recv(&mut client, &write_req);
    assert_eq!(reply.header.message_type, MessageType::SUCCESS);

    let read_req = Message::new(MessageType::READ_BLOCK, 0, 2, 3u64.to_le_bytes().to_vec());
    let reply = send_and_recv(&mut client, &read_req);
    assert_eq!(reply.header.message_type, MessageType::DATA);
    assert_eq!(reply.payload, b"hello world");

    drop(client);
    shutdown.store(false, Ordering::Release);
    serve.await.unwrap().unwrap();
}

/// E3: a block whose on-disk bytes are corrupted after writing fails
/// checksum verification on read, reported as `ConsistencyViolation`.
#[tokio::test]
async fn corrupted_block_fails_checksum_on_read() {
    let dir = tempfile::tempdir().unwrap();
    let node = StorageNode::start(test_config(dir.path())).await.unwrap();
    let addr = node.local_addr().unwrap();
    let shutdown = node.shutdown_handle();
    let serve = tokio::spawn(node.serve());

    let mut client = TcpStream::connect(addr).unwrap();
    client.set_read_timeout(Some(Duration::from_secs(5))).unwrap();

    let mut write_payload = 9u64.to_le_bytes().to_vec();
    write_payload.extend_from_slice(&5u64.to_le_bytes());
    write_payload.extend_from_slice(b"abcde");
    let write_req = Message::new(MessageType::WRITE_BLOCK, 0, 1, write_payload);
    let reply = send_and_recv(&mut client, &write_req);
    assert_eq!(reply.header.message_type, MessageType::SUCCESS);

    let block_path = blockstore::block_path(dir.path(), 9);
    let mut bytes = std::fs::read(&block_path).unwrap();
    bytes[0] ^= 0xFF;
    std::fs::write(&block_path, bytes).unwrap();

    let read_req = Message::new(MessageType::READ_BLOCK, 0, 2, 9u64.to_le_bytes().to_vec());
    let reply = send_and_recv(&mut client, &read_req);
    assert_eq!(reply.header.message_type, MessageType::ERROR);
    let code = u32::from_le_bytes(reply.payload.try_into().unwrap());
    assert_eq!(code, wire::DistfsError::ConsistencyViolation(String::new()).code());

    drop(client);
    shutdown.store(false, Ordering::Release);
    serve.await.unwrap().unwrap();
}

/// E6: a large write is immediately followed by a ping on the same
/// connection; both replies must arrive in order.
#[tokio::test]
async fn large_write_followed_by_ping_replies_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let node = StorageNode::start(test_config(dir.path())).await.unwrap();
    let addr = node.local_addr().unwrap();
    let shutdown = node.shutdown_handle();
    let serve = tokio::spawn(node.serve());

    let mut client = TcpStream::connect(addr).unwrap();
    client.set_read_timeout(Some(Duration::from_secs(5))).unwrap();

    let big = vec![0xABu8; 8 * 1024 * 1024];
    let mut write_payload = 1u64.to_le_bytes().to_vec();
    write_payload.extend_from_slice(&(big.len() as u64).to_le_bytes());
    write_payload.extend_from_slice(&big);
    let write_req = Message::new(MessageType::WRITE_BLOCK, 0, 1, write_payload);

    client.write_all(&write_req.encode()).unwrap();
    let ping_req = Message::new(MessageType::PING, 0, 2, Vec::new());
    client.write_all(&ping_req.encode()).unwrap();

    let mut buf = Vec::new();
    let mut chunk = [0u8; 64 * 1024];
    let mut replies = Vec::new();
    while replies.len() < 2 {
        match Message::decode(&buf).unwrap() {
            DecodeOutcome::Complete { message, consumed } => {
                buf.drain(..consumed);
                replies.push(message);
            }
            DecodeOutcome::Incomplete => {
                let n = client.read(&mut chunk).unwrap();
                assert!(n > 0);
                buf.extend_from_slice(&chunk[..n]);
            }
        }
    }

    assert_eq!(replies[0].header.message_type, MessageType::SUCCESS);
    assert_eq!(replies[0].header.sequence, 1);
    assert_eq!(replies[1].header.message_type, MessageType::PONG);
    assert_eq!(replies[1].header.sequence, 2);

    drop(client);
    shutdown.store(false, Ordering::Release);
    serve.await.unwrap().unwrap();
}
