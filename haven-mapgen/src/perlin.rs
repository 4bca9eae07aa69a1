//! Classic 2D Perlin noise with an LCG-shuffled permutation table
//!
//! Must stay bit-compatible with the server's generator: same shuffle, same
//! gradient selection, same interpolation order.

use crate::rng::Lcg;

const TABLE_SIZE: usize = 256;

pub struct PerlinNoise {
    /// 256-entry permutation, repeated once so `perm[i + 1]` never wraps.
    perm: [u8; TABLE_SIZE * 2],
}

impl PerlinNoise {
    pub fn new(seed: u32) -> Self {
        let mut p = [0u8; TABLE_SIZE];
        for (i, slot) in p.iter_mut().enumerate() {
            *slot = i as u8;
        }

        // Fisher-Yates, high index down, driven by the LCG seeded directly
        // with the world seed.
        let mut rng = Lcg::new(seed);
        for i in (1..TABLE_SIZE).rev() {
            let j = rng.below(i + 1);
            p.swap(i, j);
        }

        let mut perm = [0u8; TABLE_SIZE * 2];
        for (i, slot) in perm.iter_mut().enumerate() {
            *slot = p[i & 255];
        }

        Self { perm }
    }

    /// Raw noise value, roughly in [-1, 1].
    pub fn noise(&self, x: f64, y: f64) -> f64 {
        let xf = x.floor();
        let yf = y.floor();
        let xi = (xf as i64 & 255) as usize;
        let yi = (yf as i64 & 255) as usize;

        let x = x - xf;
        let y = y - yf;

        let u = fade(x);
        let v = fade(y);

        // perm values are <= 255 and yi <= 255, so a + 1 <= 511.
        let a = self.perm[xi] as usize + yi;
        let b = self.perm[xi + 1] as usize + yi;

        lerp(
            v,
            lerp(u, grad(self.perm[a], x, y), grad(self.perm[b], x - 1.0, y)),
            lerp(
                u,
                grad(self.perm[a + 1], x, y - 1.0),
                grad(self.perm[b + 1], x - 1.0, y - 1.0),
            ),
        )
    }

    /// Noise mapped with `(n + 1) / 2` and clamped to [0, 1].
    pub fn normalized(&self, x: f64, y: f64) -> f64 {
        ((self.noise(x, y) + 1.0) / 2.0).clamp(0.0, 1.0)
    }

    #[cfg(test)]
    fn table(&self) -> &[u8] {
        &self.perm
    }
}

#[inline]
fn fade(t: f64) -> f64 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

#[inline]
fn lerp(t: f64, a: f64, b: f64) -> f64 {
    a + t * (b - a)
}

#[inline]
fn grad(hash: u8, x: f64, y: f64) -> f64 {
    let h = hash & 15;
    let u = if h < 8 { x } else { y };
    let v = if h < 4 {
        y
    } else if h == 12 || h == 14 {
        x
    } else {
        0.0
    };
    (if h & 1 == 0 { u } else { -u }) + (if h & 2 == 0 { v } else { -v })
}
