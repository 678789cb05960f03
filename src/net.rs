//! Listening-socket construction: `SO_REUSEPORT` so every worker can bind
//! the same address independently, and `IPV6_V6ONLY=0` on `::` binds so one
//! listener accepts both v4 and v6 clients.

use std::io;
use std::net::SocketAddr;

use mio::net::TcpListener as MioTcpListener;
use socket2::{Domain, Socket, Type};

/// Builds a non-blocking, `SO_REUSEPORT` listening socket bound to `addr`,
/// ready to hand to `mio::Poll`.
pub fn bind_reuseport(addr: SocketAddr) -> io::Result<MioTcpListener> {
    let domain = if addr.is_ipv6() { Domain::IPV6 } else { Domain::IPV4 };
    let socket = Socket::new(domain, Type::STREAM, None)?;

    if addr.is_ipv6() {
        socket.set_only_v6(false)?;
    }
    socket.set_reuse_address(true)?;
    socket.set_reuseport(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(1024)?;

    MioTcpListener::from_std(socket.into())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn binds_an_ephemeral_ipv4_port() {
        let listener = bind_reuseport("127.0.0.1:0".parse().unwrap()).unwrap();
        assert!(listener.local_addr().unwrap().port() > 0);
    }

    #[test]
    fn two_sockets_can_share_the_same_port() {
        let first = bind_reuseport("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = first.local_addr().unwrap();
        let second = bind_reuseport(addr);
        assert!(second.is_ok(), "SO_REUSEPORT should allow a second bind to the same addr");
    }
}
