//! Philox2x32-10 counter-based random numbers.
//!
//! A draw is a pure function of a 64-bit counter, a function index and a
//! key, so host and device produce the same stream without shared state.
//! Integer results are bit-identical across the two; the float helpers
//! match to the precision of the platform `ln`/`cos`.

use super::sltype::{uint32_mul64, uint64_add32, Uint32Vec2};

pub const WGSL: &str = include_str!("wgsl/slrand.wgsl");

const PHILOX_M: u32 = 0xD256_D193;
const PHILOX_W: u32 = 0x9E37_79B9;
const ROUNDS: usize = 10;

fn philox_round(ctr: Uint32Vec2, key: u32) -> Uint32Vec2 {
    let mul = uint32_mul64(PHILOX_M, ctr.x);
    Uint32Vec2::new(mul.y ^ key ^ ctr.y, mul.x)
}

pub fn philox2x32(counter: Uint32Vec2, key: u32) -> Uint32Vec2 {
    let mut ctr = philox_round(counter, key);
    let mut k = key;
    for _ in 1..ROUNDS {
        k = k.wrapping_add(PHILOX_W);
        ctr = philox_round(ctr, k);
    }
    ctr
}

pub fn counter_add(counter: Uint32Vec2, inc: u32) -> Uint32Vec2 {
    uint64_add32(counter, inc)
}

pub fn rand_uint32_vec2(counter: Uint32Vec2, fun_idx: u32, key: u32) -> Uint32Vec2 {
    philox2x32(uint64_add32(counter, fun_idx), key)
}

pub fn rand_uint32(counter: Uint32Vec2, fun_idx: u32, key: u32) -> u32 {
    rand_uint32_vec2(counter, fun_idx, key).x
}

/// Uniform in the open interval (0, 1).
pub fn uint32_to_float32(val: u32) -> f32 {
    let f = val as f32 * 2.328_306_4e-10_f32 + 1.164_153_2e-10_f32;
    if f >= 1.0 {
        f32::from_bits(0x3F7F_FFFF)
    } else {
        f
    }
}

/// Uniform in the open interval (-1, 1).
pub fn uint32_to_float32_range11(val: u32) -> f32 {
    let f = (val as i32) as f32 * 4.656_612_9e-10_f32 + 2.328_306_4e-10_f32;
    if f >= 1.0 {
        f32::from_bits(0x3F7F_FFFF)
    } else {
        f
    }
}

pub fn rand_float32(counter: Uint32Vec2, fun_idx: u32, key: u32) -> f32 {
    uint32_to_float32(rand_uint32(counter, fun_idx, key))
}

pub fn rand_float32_range11(counter: Uint32Vec2, fun_idx: u32, key: u32) -> f32 {
    uint32_to_float32_range11(rand_uint32(counter, fun_idx, key))
}

/// Standard normal draw (Box-Muller).
pub fn rand_float32_norm(counter: Uint32Vec2, fun_idx: u32, key: u32) -> f32 {
    let u = rand_uint32_vec2(counter, fun_idx, key);
    let r = (-2.0 * uint32_to_float32(u.x).ln()).sqrt();
    r * (std::f32::consts::TAU * uint32_to_float32(u.y)).cos()
}

/// Uniform integer in `0..n`; `n` must be positive.
pub fn rand_uint32_n(counter: Uint32Vec2, fun_idx: u32, key: u32, n: u32) -> u32 {
    let v = rand_float32(counter, fun_idx, key);
    ((v * n as f32) as u32).min(n - 1)
}

pub fn rand_bool_p(counter: Uint32Vec2, fun_idx: u32, key: u32, p: f32) -> bool {
    rand_float32(counter, fun_idx, key) < p
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_philox_known_answer() {
        let out = philox2x32(Uint32Vec2::new(0, 0), 0);
        assert_eq!(out, Uint32Vec2::new(0xff1d_ae59, 0x6cd1_0df2));
    }

    #[test]
    fn test_counter_and_function_index_select_streams() {
        let c = Uint32Vec2::new(7, 0);
        assert_eq!(rand_uint32(c, 1, 3), rand_uint32(counter_add(c, 1), 0, 3));
        assert_ne!(rand_uint32(c, 0, 3), rand_uint32(c, 0, 4));
    }

    #[test]
    fn test_float_ranges() {
        assert!(uint32_to_float32(0) > 0.0);
        assert!(uint32_to_float32(u32::MAX) < 1.0);
        assert!(uint32_to_float32_range11(i32::MAX as u32) < 1.0);
        for i in 0..256 {
            let c = Uint32Vec2::new(i, 0);
            let f = rand_float32(c, 0, 9);
            assert!(f > 0.0 && f < 1.0);
            assert!(rand_uint32_n(c, 0, 9, 5) < 5);
            assert!(rand_float32_norm(c, 0, 9).is_finite());
        }
    }
}
