//! Small byte-buffer helpers shared by the decoding and verification layers.
//!
//! Everything here operates on fixed-capacity arrays; none of these helpers
//! allocate.

/// Copies an `N`-byte window out of `src` starting at `offset`.
///
/// # Panics
/// If `offset + N > src.len()`. Callers are expected to size their
/// arguments so this cannot happen.
pub fn subarray<const N: usize>(src: &[u8], offset: usize) -> [u8; N] {
    let mut out = [0; N];
    out.copy_from_slice(&src[offset..offset + N]);

    out
}

/// Returns `true` iff `sub[i] == arr[offset + i]` for all `i < len`.
///
/// Returns `false` (rather than panicking) when the compared window falls
/// outside either buffer, since a proof claiming an impossible window is
/// simply a mismatch.
pub fn eq_at(sub: &[u8], arr: &[u8], len: usize, offset: usize) -> bool {
    if len > sub.len() || offset + len > arr.len() {
        return false;
    }

    sub[..len] == arr[offset..offset + len]
}

/// Splits a byte into its `(high, low)` nibbles.
pub const fn byte_to_nibbles(b: u8) -> (u8, u8) {
    (b >> 4, b & 0x0f)
}

/// Shifts the buffer left by `n` bytes, filling the tail with zeros.
pub fn left_byte_shift<const N: usize>(input: &[u8; N], n: usize) -> [u8; N] {
    let mut out = [0; N];
    let kept = N.saturating_sub(n);
    out[..kept].copy_from_slice(&input[n..]);

    out
}

/// Normalises a left-padded big-endian byte buffer.
///
/// Treats `input` as a big-endian integer that may carry leading zero bytes
/// and returns the buffer shifted so its first significant byte lands at
/// index 0, together with the number of significant bytes (`0` if every
/// byte is zero).
pub fn byte_value<const N: usize>(input: &[u8; N]) -> ([u8; N], usize) {
    let leading_zeros = input.iter().take_while(|b| **b == 0).count();
    let len = N - leading_zeros;

    (left_byte_shift(input, leading_zeros), len)
}
