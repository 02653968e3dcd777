//! 64-bit unsigned integers emulated as two 32-bit halves, since WGSL
//! has no 64-bit integer type.

pub const WGSL: &str = include_str!("wgsl/sltype.wgsl");

/// `x` holds the low 32 bits, `y` the high 32 bits. Maps to `vec2<u32>`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Uint32Vec2 {
    pub x: u32,
    pub y: u32,
}

impl Uint32Vec2 {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

pub fn uint64_from_u64(v: u64) -> Uint32Vec2 {
    Uint32Vec2::new(v as u32, (v >> 32) as u32)
}

pub fn uint64_to_u64(a: Uint32Vec2) -> u64 {
    (a.y as u64) << 32 | a.x as u64
}

/// Full 64-bit product of two `u32`s.
pub fn uint32_mul64(a: u32, b: u32) -> Uint32Vec2 {
    uint64_from_u64(a as u64 * b as u64)
}

pub fn uint64_add32(a: Uint32Vec2, b: u32) -> Uint32Vec2 {
    uint64_from_u64(uint64_to_u64(a).wrapping_add(b as u64))
}

pub fn uint64_incr(a: Uint32Vec2) -> Uint32Vec2 {
    uint64_add32(a, 1)
}
