use respkv::{dispatch, Reply, Store};

fn d(store: &Store, args: &[&[u8]]) -> Reply {
    dispatch(store, &args.iter().map(|a| a.to_vec()).collect::<Vec<_>>())
}

#[test]
fn set_get_del_cycle() {
    let store = Store::new();
    assert_eq!(d(&store, &[b"SET", b"a", b"1"]), Reply::SimpleString("OK".into()));
    assert_eq!(d(&store, &[b"GET", b"a"]), Reply::bulk(b"1".to_vec()));
    assert_eq!(d(&store, &[b"DEL", b"a"]), Reply::Integer(1));
    assert_eq!(d(&store, &[b"GET", b"a"]), Reply::Null);
}

#[test]
fn exists_incr() {
    let store = Store::new();
    d(&store, &[b"SET", b"x", b"41"]);
    assert_eq!(d(&store, &[b"EXISTS", b"x"]), Reply::Integer(1));
    assert_eq!(d(&store, &[b"INCR", b"x"]), Reply::Integer(42));
}

#[test]
fn lists_push_and_range() {
    let store = Store::new();
    assert_eq!(
        d(&store, &[b"RPUSH", b"l", b"a", b"b"]),
        Reply::Integer(2)
    );
    assert_eq!(
        d(&store, &[b"LRANGE", b"l", b"0", b"-1"]),
        Reply::bulk_array(vec![b"a".to_vec(), b"b".to_vec()])
    );
}
