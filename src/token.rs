//! Packs a connection-slot index and a generation ("side") bit into a
//! single `mio::Token`.
//!
//! A `slab::Slab`'s own key reuse isn't enough on its own: a freed slot's
//! key can be handed to a brand-new connection before a stale readiness
//! event referencing the old occupant has been dispatched, and the reactor
//! would then apply that event to the wrong connection. Packing a bit that
//! flips every time a slot is freed, and comparing it against the slot's
//! current value on dispatch, lets the reactor recognize and drop such
//! stale events — the Rust equivalent of tagging the low bit of a kevent's
//! `udata` pointer.

use mio::Token;

/// Builds a `Token` for `slot` at its current `side` generation.
#[inline]
pub fn slot_token(slot: usize, side: bool) -> Token {
    Token((slot << 1) | (side as usize))
}

/// Splits a `Token` back into `(slot, side)`.
#[inline]
pub fn split_token(token: Token) -> (usize, bool) {
    (token.0 >> 1, token.0 & 1 != 0)
}

/// The wake-up token, chosen outside the range any packed slot token can
/// reach on a 64-bit target (`usize::MAX` is always odd... well, it's
/// `0xFFFF...FF`, and no `slot << 1 | side` can ever equal it since that
/// would require `slot == usize::MAX >> 1` with both bits set, which is one
/// specific slot; reserving the very top token value instead keeps this
/// exact regardless of `max_connections`).
pub const WAKE_TOKEN: Token = Token(usize::MAX);

/// Token for the `i`th listening socket. Carved out of the same
/// never-reached-by-`slot_token` high end of the token space as
/// `WAKE_TOKEN`, just one step further down for each listener.
#[inline]
pub fn listener_token(i: usize) -> Token {
    Token(usize::MAX - 1 - i)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trips_slot_and_side() {
        for slot in [0usize, 1, 2, 1000, 1 << 20] {
            for side in [false, true] {
                let t = slot_token(slot, side);
                assert_eq!((slot, side), split_token(t));
            }
        }
    }

    #[test]
    fn flipping_side_changes_the_token() {
        let a = slot_token(5, false);
        let b = slot_token(5, true);
        assert_ne!(a, b);
    }

    #[test]
    fn wake_token_is_never_produced_by_slot_token_in_practice() {
        // max_connections is always far smaller than usize::MAX >> 1
        assert_ne!(WAKE_TOKEN, slot_token(1_000_000, true));
    }
}
