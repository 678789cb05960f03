//! Pre-allocated connection-slot table: a `slab::Slab` plus a persistent
//! side-bit per slot index, so a freed slot's next occupant gets a token
//! that differs from the previous occupant's (see `crate::token`).

use slab::Slab;

use crate::conn::ConnState;
use crate::token::{slot_token, Token};

/// Connection table. `slab`'s own key-reuse already gives LIFO recycling of
/// slot indices; `sides` is the bit of memory the slab itself doesn't keep
/// once a slot is freed.
#[derive(Default)]
pub struct ConnTable {
    slab: Slab<ConnState>,
    sides: Vec<bool>,
}

impl ConnTable {
    /// Builds a table with slab storage pre-reserved for `capacity` connections.
    pub fn with_capacity(capacity: usize) -> ConnTable {
        ConnTable {
            slab: Slab::with_capacity(capacity),
            sides: Vec::with_capacity(capacity),
        }
    }

    /// Number of live connections.
    pub fn len(&self) -> usize {
        self.slab.len()
    }

    /// True if there are no live connections.
    pub fn is_empty(&self) -> bool {
        self.slab.is_empty()
    }

    /// Reserves a slot and builds its occupant. `build` receives the
    /// slot's `Token` (already tagged with the slot's current side bit) so
    /// it can be stored on the connection for later self-comparison against
    /// reactor events.
    pub fn alloc<F>(&mut self, build: F) -> (usize, &mut ConnState)
    where
        F: FnOnce(Token) -> ConnState,
    {
        let entry = self.slab.vacant_entry();
        let key = entry.key();
        if self.sides.len() <= key {
            self.sides.resize(key + 1, false);
        }
        let token = slot_token(key, self.sides[key]);
        let conn = entry.insert(build(token));
        (key, conn)
    }

    /// Frees `slot`, flipping its side bit so a stale readiness event tagged
    /// with the old side is recognizable as such by whoever dispatches it
    /// (`event.token() != conn.token`, checked before this call removes the
    /// connection). Returns the removed connection for final cleanup
    /// (closing the socket, etc).
    pub fn free(&mut self, slot: usize) -> Option<ConnState> {
        if !self.slab.contains(slot) {
            return None;
        }
        let conn = self.slab.remove(slot);
        self.sides[slot] = !self.sides[slot];
        Some(conn)
    }

    /// Borrows a live connection by slot index.
    pub fn get_mut(&mut self, slot: usize) -> Option<&mut ConnState> {
        self.slab.get_mut(slot)
    }

    /// Iterates over all live connections (used for shutdown teardown).
    pub fn iter_mut(&mut self) -> slab::IterMut<'_, ConnState> {
        self.slab.iter_mut()
    }

    /// Slot indices of every live connection, snapshotted (shutdown drains
    /// by slot index since `iter_mut` can't be held across a `free` call).
    pub fn slots(&self) -> Vec<usize> {
        self.slab.iter().map(|(k, _)| k).collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::token::split_token;

    fn dummy_stream() -> mio::net::TcpStream {
        let listener = mio::net::TcpListener::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();
        let client = std::net::TcpStream::connect(addr).unwrap();
        client.set_nonblocking(true).unwrap();
        mio::net::TcpStream::from_std(client)
    }

    #[test]
    fn alloc_then_free_then_realloc_flips_the_side_bit() {
        let mut table = ConnTable::with_capacity(4);
        let (slot1, conn1) = table.alloc(|token| {
            ConnState::new(dummy_stream(), "127.0.0.1:1".parse().unwrap(), token, 1, 64, 64)
        });
        let token1 = conn1.token;
        assert_eq!(slot1, split_token(token1).0);

        table.free(slot1);

        let (slot2, conn2) = table.alloc(|token| {
            ConnState::new(dummy_stream(), "127.0.0.1:1".parse().unwrap(), token, 2, 64, 64)
        });
        let token2 = conn2.token;

        assert_eq!(slot1, slot2, "slab should recycle the freed slot");
        assert_ne!(token1, token2, "side bit must differ after recycling");
    }

    #[test]
    fn len_tracks_live_connections() {
        let mut table = ConnTable::with_capacity(4);
        assert_eq!(0, table.len());
        let (slot, _) = table.alloc(|token| {
            ConnState::new(dummy_stream(), "127.0.0.1:1".parse().unwrap(), token, 1, 64, 64)
        });
        assert_eq!(1, table.len());
        table.free(slot);
        assert_eq!(0, table.len());
    }
}
