// Conversions between concrete 256-bit words and z3 bit-vectors

use ethnum::U256;
use z3::ast::{Ast, BV};
use z3::Context;

use crate::error::{DetectorError, Result};

pub const WORD_BITS: u32 = 256;
pub const ADDRESS_BITS: u32 = 160;

/// Packs a 256-bit integer into a 256-bit BV from four big-endian 64-bit limbs.
pub fn bv_from_u256<'ctx>(ctx: &'ctx Context, value: U256) -> BV<'ctx> {
    let bytes = value.to_be_bytes();
    let limb = |i: usize| {
        let mut word = [0u8; 8];
        word.copy_from_slice(&bytes[i * 8..(i + 1) * 8]);
        BV::from_u64(ctx, u64::from_be_bytes(word), 64)
    };
    limb(0).concat(&limb(1)).concat(&limb(2)).concat(&limb(3))
}

pub fn word<'ctx>(ctx: &'ctx Context, value: u64) -> BV<'ctx> {
    BV::from_u64(ctx, value, WORD_BITS)
}

/// The low 160 bits of a word, i.e. the segment holding an address.
pub fn address_segment<'ctx>(value: &BV<'ctx>) -> BV<'ctx> {
    value.extract(ADDRESS_BITS - 1, 0)
}

/// Reads a concrete numeral back out of a (simplified) bit-vector.
pub fn u256_from_bv(name: &str, bv: &BV) -> Result<U256> {
    let simplified = bv.simplify();
    if let Some(value) = simplified.as_u64() {
        return Ok(U256::from(value));
    }
    let text = simplified.to_string();
    let parsed = if let Some(hex) = text.strip_prefix("#x") {
        U256::from_str_radix(hex, 16).ok()
    } else if let Some(bin) = text.strip_prefix("#b") {
        U256::from_str_radix(bin, 2).ok()
    } else {
        None
    };
    parsed.ok_or_else(|| DetectorError::malformed(name, format!("`{}` is not a numeral", text)))
}

pub fn format_address(value: U256) -> String {
    format!("0x{:040x}", value & address_mask())
}

pub fn address_mask() -> U256 {
    (U256::ONE << ADDRESS_BITS) - U256::ONE
}
