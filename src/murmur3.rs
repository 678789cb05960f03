//! MurmurHash3 (x86, 32-bit), used to key the virtspace handler map.
//!
//! This is the well-known public-domain algorithm (Austin Appleby, 2011);
//! there's no crate in use elsewhere in the dependency tree for it, and
//! pulling one in for ~20 lines of well-understood arithmetic would be
//! more weight than the algorithm itself.

const C1: u32 = 0xcc9e2d51;
const C2: u32 = 0x1b873593;

/// Hashes `data` with the given seed.
pub fn hash32(data: &[u8], seed: u32) -> u32 {
    let mut h = seed;
    let chunks = data.chunks_exact(4);
    let remainder = chunks.remainder();

    for chunk in chunks {
        let mut k = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        k = k.wrapping_mul(C1);
        k = k.rotate_left(15);
        k = k.wrapping_mul(C2);

        h ^= k;
        h = h.rotate_left(13);
        h = h.wrapping_mul(5).wrapping_add(0xe6546b64);
    }

    let mut k = 0u32;
    for (i, &b) in remainder.iter().enumerate() {
        k |= (b as u32) << (8 * i);
    }
    if !remainder.is_empty() {
        k = k.wrapping_mul(C1);
        k = k.rotate_left(15);
        k = k.wrapping_mul(C2);
        h ^= k;
    }

    h ^= data.len() as u32;
    h ^= h >> 16;
    h = h.wrapping_mul(0x85ebca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2ae35);
    h ^= h >> 16;
    h
}

/// Virtspace key: the path's hash seeds the method's hash (chained, not
/// XOR'd), matching the reference lookup exactly.
pub fn virtspace_key(path: &[u8], method: &[u8]) -> u32 {
    let path_hash = hash32(path, 0x1234_5678);
    hash32(method, path_hash)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn hash32_is_deterministic() {
        assert_eq!(hash32(b"hello", 0), hash32(b"hello", 0));
    }

    #[test]
    fn hash32_differs_by_seed() {
        assert_ne!(hash32(b"hello", 0), hash32(b"hello", 1));
    }

    #[test]
    fn hash32_differs_by_content() {
        assert_ne!(hash32(b"hello", 0), hash32(b"world", 0));
    }

    #[test]
    fn virtspace_key_chains_through_the_path_hash() {
        let k1 = virtspace_key(b"/status", b"GET");
        let k2 = virtspace_key(b"/status", b"POST");
        let k3 = virtspace_key(b"/other", b"GET");
        assert_ne!(k1, k2);
        assert_ne!(k1, k3);
    }

    #[test]
    fn handles_empty_input() {
        let _ = hash32(b"", 0);
        let _ = virtspace_key(b"", b"");
    }
}
