//! # chainio-module: Default implementations
//!
//! The read dispatcher plus the platform primitives it runs on.
//!
//! ## Default stack
//!
//! | Piece        | Default Impl  | Alternative                       |
//! |--------------|---------------|-----------------------------------|
//! | Dispatcher   | ChainReader   | -                                 |
//! | SocketIo     | LibcSocket    | CopyReadv (feature `copy-readv`)  |
//! | Config       | ReaderConfig  | -                                 |

pub mod chain_reader;
pub mod config;
pub mod copy_readv;
pub mod libc_socket;

pub use chain_reader::ChainReader;
pub use config::{ConfigError, ReaderConfig};
pub use copy_readv::CopyReadv;
pub use libc_socket::LibcSocket;

cfg_if::cfg_if! {
    if #[cfg(feature = "copy-readv")] {
        /// The `SocketIo` selected at build time.
        pub type PlatformSocket = CopyReadv;
    } else {
        /// The `SocketIo` selected at build time.
        pub type PlatformSocket = LibcSocket;
    }
}

/// A `ChainReader` over the build-time socket primitive.
pub fn platform_reader(config: ReaderConfig) -> Result<ChainReader<PlatformSocket>, ConfigError> {
    ChainReader::new(PlatformSocket::default(), config)
}

#[cfg(test)]
mod tests {
    use super::*;

    use chainio_core::{Buffer, Connection, Mechanism, ReadOutcome, Region};

    use std::io::Write;
    use std::os::unix::io::AsRawFd;
    use std::os::unix::net::UnixStream;

    fn edge_reader() -> ChainReader<PlatformSocket> {
        platform_reader(ReaderConfig::new().mechanism(Mechanism::EdgeHangup)).unwrap()
    }

    #[test]
    fn reads_a_real_socket_until_eof() {
        let (mut tx, rx) = UnixStream::pair().unwrap();
        rx.set_nonblocking(true).unwrap();

        let mut reader = edge_reader();
        let mut conn = Connection::new(rx.as_raw_fd());
        let region = Region::new(8);
        let mut chain = vec![region.carve(4).unwrap(), region.carve(4).unwrap()];

        tx.write_all(b"abcdef").unwrap();
        conn.read.notify_readable(chainio_core::AVAILABLE_UNKNOWN);

        assert_eq!(reader.read_chain(&mut conn, &mut chain, 0), Ok(ReadOutcome::Bytes(6)));
        assert_eq!(chain[0].filled(), b"abcd");
        assert_eq!(chain[1].filled(), b"ef");
        assert!(!conn.read.ready);

        drop(tx);
        conn.read.notify_readable(chainio_core::AVAILABLE_UNKNOWN);
        conn.read.notify_hangup(None);
        assert_eq!(reader.read_chain(&mut conn, &mut chain, 0), Ok(ReadOutcome::Bytes(0)));
        assert!(conn.read.eof);
    }

    #[test]
    fn full_chain_refreshes_hint_from_fionread() {
        let (mut tx, rx) = UnixStream::pair().unwrap();
        rx.set_nonblocking(true).unwrap();
        tx.write_all(&[9u8; 24]).unwrap();

        let mut reader = edge_reader();
        let mut conn = Connection::new(rx.as_raw_fd());
        conn.read.notify_readable(chainio_core::AVAILABLE_UNKNOWN);
        let mut chain = vec![Buffer::with_capacity(16)];

        assert_eq!(reader.read_chain(&mut conn, &mut chain, 0), Ok(ReadOutcome::Bytes(16)));
        assert_eq!(conn.read.available, 8);
        assert!(conn.read.ready);

        let mut more = vec![Buffer::with_capacity(16)];
        assert_eq!(reader.read_chain(&mut conn, &mut more, 0), Ok(ReadOutcome::Bytes(8)));
        assert_eq!(conn.read.available, 0);
        assert!(!conn.read.ready);
    }

    #[test]
    fn empty_nonblocking_socket_would_block() {
        let (_tx, rx) = UnixStream::pair().unwrap();
        rx.set_nonblocking(true).unwrap();

        let mut reader = platform_reader(ReaderConfig::new().mechanism(Mechanism::Level)).unwrap();
        let mut conn = Connection::new(rx.as_raw_fd());
        conn.read.notify_readable(chainio_core::AVAILABLE_UNKNOWN);
        let mut chain = vec![Buffer::with_capacity(16)];

        assert_eq!(reader.read_chain(&mut conn, &mut chain, 0), Ok(ReadOutcome::WouldBlock));
        assert!(!conn.read.ready);
    }

    #[test]
    fn platform_reader_refuses_invalid_config() {
        assert!(platform_reader(ReaderConfig::new().iovs(0)).is_err());
        assert!(platform_reader(ReaderConfig::new().iovs(2000)).is_err());
    }
}
