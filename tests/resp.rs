use bytes::BytesMut;
use respkv::parse_many;

#[test]
fn parse_ping_and_set_get() {
    let mut buf = BytesMut::new();
    buf.extend_from_slice(b"*1\r\n$4\r\nPING\r\n");
    buf.extend_from_slice(b"*3\r\n$3\r\nSET\r\n$1\r\na\r\n$1\r\n1\r\n");
    buf.extend_from_slice(b"*2\r\n$3\r\nGET\r\n$1\r\na\r\n");

    let mut reqs = Vec::new();
    parse_many(&mut buf, &mut reqs).unwrap();

    assert_eq!(reqs[0], vec![b"PING".to_vec()]);
    assert_eq!(reqs[1], vec![b"SET".to_vec(), b"a".to_vec(), b"1".to_vec()]);
    assert_eq!(reqs[2], vec![b"GET".to_vec(), b"a".to_vec()]);
    assert!(buf.is_empty());
}
