//! 32-bit booleans, for flags stored in GPU buffers.

pub const WGSL: &str = include_str!("wgsl/slbool.wgsl");

/// A boolean as stored in a buffer: zero is false.
pub type Bool = i32;

pub fn is_true(b: Bool) -> bool {
    b != 0
}

pub fn from_bool(b: bool) -> Bool {
    if b {
        1
    } else {
        0
    }
}
