use respkv::storage::Store;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::time::Duration;

/// Bind an ephemeral port, spawn the real event loop against it on a
/// background thread, and return the address a client can connect to,
/// so the suite is self-contained and needs no externally running server.
fn spawn_server() -> SocketAddr {
    let std_listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    std_listener.set_nonblocking(true).expect("set_nonblocking");
    let addr = std_listener.local_addr().expect("local_addr");
    let store = Arc::new(Store::new());
    std::thread::spawn(move || {
        let _ = respkv::net::serve(std_listener, store);
    });
    addr
}

fn get_client(addr: SocketAddr) -> TcpStream {
    let stream = TcpStream::connect(addr).expect("failed to connect");
    stream.set_read_timeout(Some(Duration::from_secs(30))).expect("set read timeout");
    stream.set_write_timeout(Some(Duration::from_secs(30))).expect("set write timeout");
    stream
}

fn read_bulk_string(stream: &mut TcpStream) -> Vec<u8> {
    let mut reader = std::io::BufReader::new(stream);
    let mut line = String::new();
    std::io::BufRead::read_line(&mut reader, &mut line).expect("failed to read header");

    if !line.starts_with('$') {
        panic!("expected bulk string, got: {line}");
    }

    let len: usize = line[1..].trim().parse().expect("invalid length");
    let mut data = vec![0u8; len];
    std::io::Read::read_exact(&mut reader, &mut data).expect("failed to read body");

    let mut crlf = [0u8; 2];
    std::io::Read::read_exact(&mut reader, &mut crlf).expect("failed to read trailing CRLF");

    data
}

fn round_trip(size: usize, fill: u8) {
    let addr = spawn_server();
    let mut stream = get_client(addr);
    let key = format!("large_{size}");
    let data = vec![fill; size];

    let header = format!("*3\r\n$3\r\nSET\r\n${}\r\n{}\r\n${}\r\n", key.len(), key, size);
    stream.write_all(header.as_bytes()).expect("write SET header");
    stream.write_all(&data).expect("write SET payload");
    stream.write_all(b"\r\n").expect("write trailing CRLF");

    let mut buf = [0u8; 64];
    let n = stream.read(&mut buf).expect("read SET response");
    assert_eq!(&buf[..n], b"+OK\r\n");

    let get_cmd = format!("*2\r\n$3\r\nGET\r\n${}\r\n{}\r\n", key.len(), key);
    stream.write_all(get_cmd.as_bytes()).expect("write GET");

    let received = read_bulk_string(&mut stream);
    assert_eq!(received.len(), size);
    assert_eq!(received[0], fill);
    assert_eq!(received[size - 1], fill);
}

#[test]
fn round_trips_100kb_payload() {
    round_trip(100 * 1024, b'x');
}

#[test]
fn round_trips_1mb_payload() {
    round_trip(1024 * 1024, b'a');
}

#[test]
fn round_trips_10mb_payload() {
    round_trip(10 * 1024 * 1024, b'z');
}

#[test]
fn pipelined_requests_on_one_read_are_all_answered() {
    let addr = spawn_server();
    let mut stream = get_client(addr);

    let mut batch = Vec::new();
    for i in 0..50 {
        let k = format!("k{i}");
        let v = format!("v{i}");
        batch.extend_from_slice(
            format!("*3\r\n$3\r\nSET\r\n${}\r\n{}\r\n${}\r\n{}\r\n", k.len(), k, v.len(), v)
                .as_bytes(),
        );
    }
    stream.write_all(&batch).expect("write pipelined SETs");

    let mut received = Vec::new();
    let mut buf = [0u8; 4096];
    while received.len() < b"+OK\r\n".len() * 50 {
        let n = stream.read(&mut buf).expect("read pipelined responses");
        assert!(n > 0);
        received.extend_from_slice(&buf[..n]);
    }
    assert_eq!(received, b"+OK\r\n".repeat(50));
}
