//! Linear-congruential generator used for every random draw in map generation
//!
//! The constants are the Numerical Recipes LCG. The game server runs the
//! same generator, so the permutation table and obstacle rolls must not
//! depend on anything but the seed.

/// Stream id for the obstacle-or-not roll of each cell.
pub const STREAM_OBSTACLE_PLACEMENT: u32 = 1;
/// Stream id for the tree-vs-rock roll of each placed obstacle.
pub const STREAM_OBSTACLE_KIND: u32 = 2;
/// Stream id for the server's per-cell resource roll.
pub const STREAM_RESOURCES: u32 = 3;

const MULTIPLIER: u32 = 1_664_525;
const INCREMENT: u32 = 1_013_904_223;
const TWO_POW_32: f64 = 4_294_967_296.0;

/// 32-bit LCG: `state = state * 1664525 + 1013904223 (mod 2^32)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lcg {
    state: u32,
}

impl Lcg {
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Generator for an independent stream derived from a master seed.
    pub fn for_stream(seed: u32, stream: u32) -> Self {
        Self::new(derive_stream(seed, stream))
    }

    pub fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_mul(MULTIPLIER).wrapping_add(INCREMENT);
        self.state
    }

    /// Uniform draw in [0, 1).
    pub fn next_f64(&mut self) -> f64 {
        self.next_u32() as f64 / TWO_POW_32
    }

    /// Uniform index in [0, bound), `floor(next_f64() * bound)`.
    pub fn below(&mut self, bound: usize) -> usize {
        (self.next_f64() * bound as f64).floor() as usize
    }

    /// `true` with probability `p`. `p <= 0` never fires, `p >= 1` always does.
    pub fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }
}

/// Mix a master seed with a stream id (murmur3 finalizer).
///
/// Streams 0.. are independent: adding draws to one never shifts another.
pub fn derive_stream(seed: u32, stream: u32) -> u32 {
    let mut z = seed ^ stream.wrapping_mul(0x9E37_79B9);
    z = (z ^ (z >> 16)).wrapping_mul(0x85EB_CA6B);
    z = (z ^ (z >> 13)).wrapping_mul(0xC2B2_AE35);
    z ^ (z >> 16)
}
