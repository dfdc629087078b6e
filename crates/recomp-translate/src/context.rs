//! The CPU-context field catalogue: the names the emitted source expects a
//! host-provided `ctx` value to carry, per the runtime contract.
//!
//! None of this crate allocates or models the context's runtime storage —
//! the context itself lives on the host side (an external collaborator).
//! This module exists so every emission function builds field references
//! through one place instead of hand-formatting `ctx.r{n}` strings inline.

/// A general-purpose register reference, e.g. `ctx.r3`.
#[must_use]
pub fn gpr(n: u8) -> String {
    format!("ctx.r{n}")
}

/// A floating-point register reference, e.g. `ctx.f1`.
#[must_use]
pub fn fpr(n: u8) -> String {
    format!("ctx.f{n}")
}

/// A vector (Altivec/VMX128) register reference, e.g. `ctx.v0`.
#[must_use]
pub fn vr(n: u8) -> String {
    format!("ctx.v{n}")
}

/// One lane of a vector register under a given element view, e.g.
/// `ctx.v0.f32[0]`. Per spec's Altivec endian-reversal convention, loads
/// and stores shuffle elements into reversed order within the register, so
/// every caller that indexes a lane by its natural (non-reversed) position
/// must invert it first — see [`reversed_lane`].
#[must_use]
pub fn vr_lane(n: u8, view: &str, lane: u8) -> String {
    format!("ctx.v{n}.{view}[{lane}]")
}

/// Inverts a lane index for the Altivec endian-reversal convention: element
/// `i` of `total` lands at `total - 1 - i` once loaded through
/// `VectorMaskL`/`VectorMaskR`.
#[must_use]
pub fn reversed_lane(i: u8, total: u8) -> u8 {
    total - 1 - i
}

/// One of the eight 4-bit condition-register fields, e.g. `ctx.cr0`.
#[must_use]
pub fn cr(field: u8) -> String {
    format!("ctx.cr{field}")
}

pub const XER: &str = "ctx.xer";
pub const LR: &str = "ctx.lr";
pub const CTR: &str = "ctx.ctr";
pub const MSR: &str = "ctx.msr";
pub const FPSCR: &str = "ctx.fpscr";
pub const RESERVED: &str = "ctx.reserved";
pub const TEMP: &str = "ctx.temp";

/// The indirect-call function-pointer table, indexed by `address / 4`.
#[must_use]
pub fn fn_table_entry(address_expr: &str) -> String {
    format!("ctx.fn[{address_expr} / 4]")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_names_match_runtime_contract() {
        assert_eq!(gpr(3), "ctx.r3");
        assert_eq!(cr(0), "ctx.cr0");
        assert_eq!(fn_table_entry("0x1000"), "ctx.fn[0x1000 / 4]");
    }
}
