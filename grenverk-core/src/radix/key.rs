use std::fmt::Debug;
use std::net::{Ipv4Addr, Ipv6Addr};

/// Fixed-width key walked most significant bit first.
pub trait RadixKey: Copy + Eq + Debug {
    /// Number of bits, and so the maximum trie depth.
    const BITS: u32;

    /// Bit at `depth`, counted from the most significant bit.
    fn bit(self, depth: u32) -> bool;

    /// Mask with the `prefix_len` most significant bits set.
    ///
    /// # Panics
    ///
    /// Panics if `prefix_len` exceeds [`Self::BITS`].
    fn prefix_mask(prefix_len: u32) -> Self;
}

macro_rules! impl_radix_key {
    ($($ty:ty),*) => {$(
        impl RadixKey for $ty {
            const BITS: u32 = <$ty>::BITS;

            #[inline]
            fn bit(self, depth: u32) -> bool {
                debug_assert!(depth < Self::BITS);
                self & (1 << (Self::BITS - 1 - depth)) != 0
            }

            fn prefix_mask(prefix_len: u32) -> Self {
                assert!(
                    prefix_len <= Self::BITS,
                    "prefix length {prefix_len} exceeds {} bits",
                    Self::BITS
                );
                match prefix_len {
                    0 => 0,
                    len => <$ty>::MAX << (Self::BITS - len),
                }
            }
        }
    )*};
}

impl_radix_key!(u32, u128);

/// Converts an IPv4 address into the key stored in a `u32` trie.
pub fn ipv4_key(addr: Ipv4Addr) -> u32 {
    u32::from(addr)
}

/// Converts an IPv6 address into the key stored in a `u128` trie.
pub fn ipv6_key(addr: Ipv6Addr) -> u128 {
    u128::from(addr)
}
