//! chainio Echo Server
//!
//! Single-threaded TCP echo server on an edge-triggered epoll loop.
//! Every connection owns a two-buffer chain carved from one region, so a
//! read fills both buffers with a single `readv(2)` entry until the first
//! one is consumed.
//!
//! Proves: the dispatcher's readiness bookkeeping drains an edge-triggered
//! socket without extra wakeups and sees EOF through `EPOLLRDHUP`.
//!
//! Usage:
//!     cargo build --release -p chainio-echo
//!     ./target/release/chainio-echo [port] [buf_size]
//!
//! Environment:
//!     CHAINIO_LOG_LEVEL=4        debug logging of every batch
//!     CHAINIO_QUERY_PENDING=0    disable the FIONREAD refresh
//!     CHAINIO_IOVS=2             cap the scatter list
//!
//! Test with:
//!     echo "hello" | nc -q1 localhost 9998

#[cfg(target_os = "linux")]
mod server {
    use chainio_core::{
        kerror, kinfo, kwarn, klog, Buffer, Connection, Mechanism, ReadOutcome, Region,
        AVAILABLE_UNKNOWN,
    };
    use chainio_module::{platform_reader, ChainReader, PlatformSocket, ReaderConfig};

    use std::collections::HashMap;
    use std::io::{self, ErrorKind, Write};
    use std::net::{TcpListener, TcpStream};
    use std::os::unix::io::{AsRawFd, RawFd};
    use std::sync::atomic::{AtomicBool, Ordering};

    const MAX_EVENTS: usize = 256;

    static RUNNING: AtomicBool = AtomicBool::new(true);

    extern "C" fn handle_sigint(_: libc::c_int) {
        RUNNING.store(false, Ordering::Relaxed);
    }

    // ── Connection state ──

    struct Client {
        stream: TcpStream,
        conn: Connection,
        chain: Vec<Buffer>,
    }

    impl Client {
        fn new(stream: TcpStream, buf_size: usize) -> Option<Self> {
            let region = Region::new(buf_size * 2);
            let chain = vec![region.carve(buf_size)?, region.carve(buf_size)?];
            let conn = Connection::new(stream.as_raw_fd());
            Some(Self { stream, conn, chain })
        }

        /// Write back everything buffered, then rewind the chain.
        fn flush(&mut self) -> io::Result<usize> {
            let mut sent = 0;
            for buf in self.chain.iter_mut() {
                let mut data = buf.filled();
                while !data.is_empty() {
                    match self.stream.write(data) {
                        Ok(0) => return Err(ErrorKind::WriteZero.into()),
                        Ok(k) => {
                            data = &data[k..];
                            sent += k;
                        }
                        Err(e) if e.kind() == ErrorKind::WouldBlock => std::thread::yield_now(),
                        Err(e) if e.kind() == ErrorKind::Interrupted => {}
                        Err(e) => return Err(e),
                    }
                }
                buf.reset();
            }
            Ok(sent)
        }
    }

    // ── Stats ──

    #[derive(Default)]
    struct Stats {
        accepts: u64,
        reads: u64,
        would_block: u64,
        closes: u64,
        bytes_in: u64,
        bytes_out: u64,
        errors: u64,
    }

    impl Stats {
        fn print(&self, active: usize, elapsed_secs: f64) {
            eprintln!(
                "[{:.1}s] conns={} accepts={} reads={} eagain={} close={} bytes_in={} bytes_out={} err={}",
                elapsed_secs,
                active,
                self.accepts, self.reads, self.would_block, self.closes,
                self.bytes_in, self.bytes_out, self.errors,
            );
        }
    }

    // ── epoll helpers ──

    fn epoll_add(epfd: RawFd, fd: RawFd, events: u32) -> io::Result<()> {
        let mut ev = libc::epoll_event { events, u64: fd as u64 };
        let ret = unsafe { libc::epoll_ctl(epfd, libc::EPOLL_CTL_ADD, fd, &mut ev) };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn accept_all(
        listener: &TcpListener,
        epfd: RawFd,
        clients: &mut HashMap<RawFd, Client>,
        buf_size: usize,
        stats: &mut Stats,
    ) {
        loop {
            match listener.accept() {
                Ok((stream, peer)) => {
                    if let Err(e) = stream.set_nonblocking(true) {
                        kwarn!("accept {}: set_nonblocking: {}", peer, e);
                        stats.errors += 1;
                        continue;
                    }
                    let fd = stream.as_raw_fd();
                    let events = (libc::EPOLLIN | libc::EPOLLRDHUP | libc::EPOLLET) as u32;
                    if let Err(e) = epoll_add(epfd, fd, events) {
                        kerror!("epoll_ctl(ADD) fd:{}: {}", fd, e);
                        stats.errors += 1;
                        continue;
                    }
                    match Client::new(stream, buf_size) {
                        Some(client) => {
                            clients.insert(fd, client);
                            stats.accepts += 1;
                        }
                        None => stats.errors += 1,
                    }
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => return,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    kwarn!("accept: {}", e);
                    stats.errors += 1;
                    return;
                }
            }
        }
    }

    /// Drain one connection. Returns false when it should be closed.
    fn service(reader: &mut ChainReader<PlatformSocket>, client: &mut Client, stats: &mut Stats) -> bool {
        while client.conn.read.ready {
            match reader.read_chain(&mut client.conn, &mut client.chain, 0) {
                Ok(ReadOutcome::Bytes(0)) => return false,
                Ok(ReadOutcome::Bytes(n)) => {
                    stats.reads += 1;
                    stats.bytes_in += n as u64;
                    match client.flush() {
                        Ok(sent) => stats.bytes_out += sent as u64,
                        Err(e) => {
                            kwarn!("fd:{} write: {}", client.conn.fd, e);
                            stats.errors += 1;
                            return false;
                        }
                    }
                }
                Ok(ReadOutcome::WouldBlock) => {
                    stats.would_block += 1;
                    break;
                }
                Err(e) => {
                    kwarn!("fd:{} {}", client.conn.fd, e);
                    stats.errors += 1;
                    return false;
                }
            }
        }
        true
    }

    // ── Main event loop ──

    pub fn run() {
        klog::init();

        let args: Vec<String> = std::env::args().collect();
        let port: u16 = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(9998);
        let buf_size: usize = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(4096).max(1);

        unsafe {
            libc::signal(libc::SIGINT, handle_sigint as usize);
            libc::signal(libc::SIGTERM, handle_sigint as usize);
        }

        let mut config = ReaderConfig::from_env();
        if config.mechanism == Mechanism::Counted {
            kwarn!("counted readiness needs kqueue; using edge on epoll");
            config = config.mechanism(Mechanism::EdgeHangup);
        }
        config.log_summary();
        let mut reader = match platform_reader(config) {
            Ok(r) => r,
            Err(e) => {
                eprintln!("chainio-echo: {}", e);
                std::process::exit(2);
            }
        };

        let listener = match TcpListener::bind(("0.0.0.0", port)) {
            Ok(l) => l,
            Err(e) => {
                eprintln!("chainio-echo: bind port {}: {}", port, e);
                std::process::exit(1);
            }
        };
        if let Err(e) = listener.set_nonblocking(true) {
            eprintln!("chainio-echo: set_nonblocking: {}", e);
            std::process::exit(1);
        }

        let epfd = unsafe { libc::epoll_create1(libc::EPOLL_CLOEXEC) };
        if epfd < 0 {
            eprintln!("chainio-echo: epoll_create1: {}", io::Error::last_os_error());
            std::process::exit(1);
        }
        let lfd = listener.as_raw_fd();
        if let Err(e) = epoll_add(epfd, lfd, (libc::EPOLLIN | libc::EPOLLET) as u32) {
            eprintln!("chainio-echo: epoll_ctl(listener): {}", e);
            std::process::exit(1);
        }

        let mut clients: HashMap<RawFd, Client> = HashMap::new();
        let mut stats = Stats::default();
        let mut events = vec![libc::epoll_event { events: 0, u64: 0 }; MAX_EVENTS];

        let start = std::time::Instant::now();
        let mut last_stats = start;

        eprintln!(
            "chainio-echo: listening on 0.0.0.0:{} (epoll ET, {} mechanism, 2x{} byte chain)",
            port, reader.config().mechanism, buf_size
        );

        while RUNNING.load(Ordering::Relaxed) {
            let n = unsafe { libc::epoll_wait(epfd, events.as_mut_ptr(), MAX_EVENTS as i32, 1000) };
            if n < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == ErrorKind::Interrupted {
                    continue;
                }
                kerror!("epoll_wait: {}", err);
                break;
            }

            for ev in &events[..n as usize] {
                let fd = ev.u64 as RawFd;
                let flags = ev.events;

                if fd == lfd {
                    accept_all(&listener, epfd, &mut clients, buf_size, &mut stats);
                    continue;
                }

                let Some(client) = clients.get_mut(&fd) else {
                    continue;
                };

                if flags & libc::EPOLLIN as u32 != 0 {
                    client.conn.read.notify_readable(AVAILABLE_UNKNOWN);
                }
                if flags & (libc::EPOLLRDHUP | libc::EPOLLHUP | libc::EPOLLERR) as u32 != 0 {
                    client.conn.read.ready = true;
                    client.conn.read.notify_hangup(None);
                }

                if !service(&mut reader, client, &mut stats) {
                    // Dropping the stream closes the fd and leaves the epoll set.
                    clients.remove(&fd);
                    stats.closes += 1;
                }
            }

            let now = std::time::Instant::now();
            if now.duration_since(last_stats).as_secs() >= 5 {
                stats.print(clients.len(), now.duration_since(start).as_secs_f64());
                last_stats = now;
            }
        }

        eprintln!("\nchainio-echo: shutting down...");
        stats.print(clients.len(), start.elapsed().as_secs_f64());
        clients.clear();
        unsafe {
            libc::close(epfd);
        }
        kinfo!("shutdown complete");
        eprintln!("chainio-echo: done.");
    }
}

#[cfg(target_os = "linux")]
fn main() {
    server::run();
}

#[cfg(not(target_os = "linux"))]
fn main() {
    eprintln!("chainio-echo: requires Linux (epoll)");
    std::process::exit(1);
}
