//! Per-function emission: prologue, `loc_<HEX>` labels, branch resolution,
//! and the opcode-category translations (ALU, carry arithmetic,
//! rotate/mask, compare, memory, reservation, floating point, vector,
//! cache/sync/trap, special-register moves).

use recomp_symbols::prelude::{Function, Image, SymbolKind};

use crate::context;
use crate::opcode::{
    decode, AluBinOp, AluUnaryOp, Condition, FmaOp, FpBinOp, FpUnaryOp, ImmOp, LoadKind, MemAddr, MemOffset, Opcode,
    RotateKind, ShiftOp, StoreKind, VecBinOp, VecCmpOp,
};
use crate::switch_table::SwitchTable;

/// Emits one host function's source for `function`, reading its guest
/// words out of `image`. `switches` resolves `bctr` sites; `name` is the
/// function's registered symbol name, or a synthesized `sub_<HEX>` if none
/// was found.
#[must_use]
pub fn emit_function(image: &Image, function: &Function, name: &str, switches: &SwitchTable) -> String {
    let mut out = String::new();
    out.push_str(&format!("PPC_FUNC void {name}(PPCContext& ctx, uint8_t* base)\n{{\n"));
    out.push_str("    uint32_t ea;\n    uint64_t temp;\n\n");

    let mut address = function.base;
    while address < function.end() {
        out.push_str(&format!("loc_{address:08X}:\n"));

        let line = match image.read_u32(address) {
            Ok(word) => emit_instruction(image, function, address, word, switches),
            Err(_) => "    // <unreadable>\n".to_string(),
        };
        out.push_str(&line);

        address += 4;
    }

    out.push_str("}\n");
    out
}

fn emit_instruction(
    image: &Image,
    function: &Function,
    address: u32,
    word: u32,
    switches: &SwitchTable,
) -> String {
    let Some(opcode) = decode(word) else {
        return format!("    // {word:08X} <unknown>\n");
    };

    match opcode {
        Opcode::B { target, link, absolute } => {
            let target_addr = if absolute { target as u32 } else { address.wrapping_add(target as u32) };
            emit_unconditional_branch(image, function, address, target_addr, link)
        }
        Opcode::Bc { target, cr_field, cond, link, decrement_ctr, test_ctr_only } => {
            let target_addr = address.wrapping_add(target as u32);
            emit_conditional_branch(
                image,
                function,
                address,
                target_addr,
                cr_field,
                cond,
                link,
                decrement_ctr,
                test_ctr_only,
            )
        }
        Opcode::Bclr { link } => {
            if link {
                format!(
                    "    temp = {lr};\n    {lr} = {ret:#010X};\n    {call}\n",
                    lr = context::LR,
                    ret = address + 4,
                    call = format!("{}(ctx, base);", context::fn_table_entry("temp"))
                )
            } else {
                "    return;\n".to_string()
            }
        }
        Opcode::Bcctr { link } => emit_bctr(address, switches, link),

        Opcode::IntBin { op, rd, ra, rb, rc } => emit_int_bin(op, rd, ra, rb, rc),
        Opcode::IntUnary { op, rd, ra, rc } => emit_int_unary(op, rd, ra, rc),
        Opcode::IntImm { op, rd, ra, imm, rc } => emit_int_imm(op, rd, ra, imm, rc),
        Opcode::Addic { rd, ra, imm, record } => emit_addic(rd, ra, imm, record),
        Opcode::Subfic { rd, ra, imm } => emit_subfic(rd, ra, imm),

        Opcode::Cmp { cr_field, ra, rb, signed, is64 } => {
            emit_cmp(cr_field, &context::gpr(ra), &context::gpr(rb), signed, is64)
        }
        Opcode::Cmpi { cr_field, ra, imm, signed, is64 } => {
            emit_cmp(cr_field, &context::gpr(ra), &format!("{imm}"), signed, is64)
        }

        Opcode::Rotate { kind, rd, rs, sh, mb, me, rc } => emit_rotate(kind, rd, rs, sh, mb, me, rc),
        Opcode::Shift { op, rd, rs, rb, rc } => emit_shift(op, rd, rs, &context::gpr(rb), rc),
        Opcode::ShiftImm { op, rd, rs, sh, rc } => emit_shift(op, rd, rs, &format!("{sh}"), rc),

        Opcode::Load { kind, rd, ra, mem } => emit_load(kind, rd, ra, mem),
        Opcode::Store { kind, rs, ra, mem } => emit_store(kind, rs, ra, mem),

        Opcode::Lwarx { rd, ra, rb } => emit_reservation_load(rd, ra, rb, "PPC_LOAD_U32"),
        Opcode::Ldarx { rd, ra, rb } => emit_reservation_load(rd, ra, rb, "PPC_LOAD_U64"),
        Opcode::Stwcx { rs, ra, rb } => emit_reservation_store(rs, ra, rb, "uint32_t"),
        Opcode::Stdcx { rs, ra, rb } => emit_reservation_store(rs, ra, rb, "uint64_t"),

        Opcode::FpBin { op, frd, fra, frb, rc, single } => emit_fp_bin(op, frd, fra, frb, rc, single),
        Opcode::FpUnary { op, frd, frb, rc, single } => emit_fp_unary(op, frd, frb, rc, single),
        Opcode::Fmadd { op, frd, fra, frc, frb, rc, single } => emit_fmadd(op, frd, fra, frc, frb, rc, single),
        Opcode::Fsel { frd, fra, frc, frb, rc } => emit_fsel(frd, fra, frc, frb, rc),
        Opcode::Fcmpu { cr_field, fra, frb } => format!(
            "    {cr}.lt = {a} < {b};\n    {cr}.gt = {a} > {b};\n    {cr}.eq = {a} == {b};\n    {cr}.so = 0;\n",
            cr = context::cr(cr_field),
            a = context::fpr(fra),
            b = context::fpr(frb)
        ),
        Opcode::Mffs { frd } => format!("    {} = {};\n", context::fpr(frd), context::FPSCR),
        Opcode::Mtfsf { frb } => format!("    {} = (uint32_t){};\n", context::FPSCR, context::fpr(frb)),

        Opcode::Mfcr { rd } => format!("    {} = ctx.cr.pack();\n", context::gpr(rd)),
        Opcode::Mtcrf { mask, rs } => {
            format!("    ctx.cr.unpack({}.u32, {mask:#04X});\n", context::gpr(rs))
        }
        Opcode::Mfspr { rd, spr } => emit_mfspr(rd, spr),
        Opcode::Mtspr { rs, spr } => emit_mtspr(rs, spr),
        Opcode::Mftb { rd } => format!("    {} = __rdtsc();\n", context::gpr(rd)),

        Opcode::CacheNoOp(mnemonic) => format!("    // {mnemonic}\n"),
        Opcode::Dcbz { ra, rb, line128 } => {
            let size = if line128 { 128 } else { 32 };
            format!(
                "    ea = ({} + {}) & ~{}u;\n    memset(base + ea, 0, {});\n",
                ra_or_zero(ra),
                context::gpr(rb),
                size - 1,
                size
            )
        }

        Opcode::Lvx { vd, ra, rb } => format!(
            "    ea = ({} + {}) & ~15u;\n    {} = __loadvec128(base + ea, VectorMaskL, VectorMaskR);\n",
            ra_or_zero(ra),
            context::gpr(rb),
            context::vr(vd)
        ),
        Opcode::Stvx { vs, ra, rb } => format!(
            "    ea = ({} + {}) & ~15u;\n    __storevec128(base + ea, {}, VectorMaskL, VectorMaskR);\n",
            ra_or_zero(ra),
            context::gpr(rb),
            context::vr(vs)
        ),
        Opcode::VecBin { op, vd, va, vb } => emit_vec_bin(op, vd, va, vb),
        Opcode::VecCmp { op, vd, va, vb, rc } => emit_vec_cmp(op, vd, va, vb, rc),
        Opcode::Vspltisw { vd, imm } => {
            format!("    for (int i = 0; i < 4; i++) {}.s32[i] = {};\n", context::vr(vd), imm)
        }
        Opcode::Vspltw { vd, vb, uimm } => {
            let lane = context::reversed_lane(uimm, 4);
            format!(
                "    for (int i = 0; i < 4; i++) {}.u32[i] = {};\n",
                context::vr(vd),
                context::vr_lane(vb, "u32", lane)
            )
        }
        Opcode::Vperm { vd, va, vb, vc } => format!(
            "    {} = __vpermute({}, {}, {});\n",
            context::vr(vd),
            context::vr(va),
            context::vr(vb),
            context::vr(vc)
        ),
        Opcode::Vsldoi { vd, va, vb, shb } => format!(
            "    {} = __vsldoi({}, {}, {});\n",
            context::vr(vd),
            context::vr(va),
            context::vr(vb),
            shb
        ),
        Opcode::Vmsumfp { vd, va, vb, lanes } => emit_vmsum(vd, va, vb, lanes),
        Opcode::Vctsxs { vd, vb, uimm } => format!(
            "    // vctsxs: saturation to INT32 range not modeled (spec open question)\n    for (int i = 0; i < 4; i++) {}.s32[i] = (int32_t)({}.f32[i] * (float)(1u << {}));\n",
            context::vr(vd),
            context::vr(vb),
            uimm
        ),
        Opcode::Vcfpsx { vd, vb, uimm, signed } => {
            let view = if signed { "s32" } else { "u32" };
            format!(
                "    for (int i = 0; i < 4; i++) {}.f32[i] = (float){}.{view}[i] / (float)(1u << {});\n",
                context::vr(vd),
                context::vr(vb),
                uimm
            )
        }

        Opcode::Nop => "    // nop\n".to_string(),
    }
}

fn ra_or_zero(ra: u8) -> String {
    if ra == 0 { "0".to_string() } else { context::gpr(ra) }
}

fn emit_unconditional_branch(
    image: &Image,
    function: &Function,
    address: u32,
    target: u32,
    link: bool,
) -> String {
    let mut out = String::new();
    if link {
        out.push_str(&format!("    {} = {:#010X};\n", context::LR, address + 4));
    }

    if function.contains(target) {
        out.push_str(&format!("    goto loc_{target:08X};\n"));
    } else {
        out.push_str(&emit_call(image, target));
        if !link {
            out.push_str("    return;\n");
        }
    }
    out
}

#[allow(clippy::too_many_arguments)]
fn emit_conditional_branch(
    image: &Image,
    function: &Function,
    address: u32,
    target: u32,
    cr_field: u8,
    cond: Condition,
    link: bool,
    decrement_ctr: bool,
    test_ctr_only: bool,
) -> String {
    let mut out = String::new();
    if decrement_ctr && test_ctr_only {
        // Plain bdnz/bdz: BO bit 4 is set, so CTR is the only condition.
        out.push_str(&format!("    if (--{} != 0) {{\n", context::CTR));
    } else if decrement_ctr {
        // bdnzt/bdnzf: decode derives the tested bit from the real BI
        // operand rather than hardcoding `eq`, unlike the shortcut spec §9
        // documents for one specific call site in the source this was
        // distilled from.
        let test = cond_expr(cr_field, cond);
        out.push_str(&format!("    if (--{} != 0 && {test}) {{\n", context::CTR));
    } else {
        let test = cond_expr(cr_field, cond);
        out.push_str(&format!("    if ({test}) {{\n"));
    }

    if link {
        out.push_str(&format!("        {} = {:#010X};\n", context::LR, address + 4));
    }

    if function.contains(target) {
        out.push_str(&format!("        goto loc_{target:08X};\n"));
    } else {
        out.push_str(&format!("    {}", emit_call(image, target)));
        out.push_str("        return;\n");
    }
    out.push_str("    }\n");
    out
}

fn cond_expr(cr_field: u8, cond: Condition) -> String {
    let cr = context::cr(cr_field);
    match cond {
        Condition::Eq => format!("{cr}.eq"),
        Condition::Ne => format!("!{cr}.eq"),
        Condition::Gt => format!("{cr}.gt"),
        Condition::Ge => format!("!{cr}.lt"),
        Condition::Lt => format!("{cr}.lt"),
        Condition::Le => format!("!{cr}.gt"),
    }
}

fn emit_call(image: &Image, target: u32) -> String {
    if let Some(symbol) = image.symbols.find_exact(target) {
        if symbol.kind == SymbolKind::Function {
            return format!("    {}(ctx, base);\n", symbol.name);
        }
    }
    format!("    {}(ctx, base);\n", context::fn_table_entry(&format!("{target:#010X}")))
}

fn emit_bctr(address: u32, switches: &SwitchTable, link: bool) -> String {
    if let Some(entry) = switches.get(address) {
        let mut out = format!("    switch ({}.u64) {{\n", context::gpr(entry.r));
        for (i, label) in entry.labels.iter().enumerate() {
            out.push_str(&format!("        case {i}: goto loc_{label:08X};\n"));
        }
        out.push_str("        default: __unreachable();\n    }\n");
        return out;
    }

    if link {
        format!("    {} = {:#010X};\n    {}(ctx, base);\n", context::LR, address + 4, context::fn_table_entry(context::CTR))
    } else {
        format!("    {}(ctx, base);\n    return;\n", context::fn_table_entry(context::CTR))
    }
}

fn emit_cmp(cr_field: u8, lhs: &str, rhs: &str, signed: bool, is64: bool) -> String {
    let cr = context::cr(cr_field);
    let cast = match (signed, is64) {
        (true, true) => "(int64_t)",
        (true, false) => "(int32_t)",
        (false, true) => "(uint64_t)",
        (false, false) => "(uint32_t)",
    };
    format!(
        "    {cr}.lt = {cast}{lhs} < {cast}{rhs};\n    {cr}.gt = {cast}{lhs} > {cast}{rhs};\n    {cr}.eq = {cast}{lhs} == {cast}{rhs};\n    {cr}.so = {}.so;\n",
        context::XER
    )
}

fn emit_int_bin(op: AluBinOp, rd: u8, ra: u8, rb: u8, rc: bool) -> String {
    let d = context::gpr(rd);
    let a = context::gpr(ra);
    let b = context::gpr(rb);
    let xer = context::XER;

    let mut out = match op {
        AluBinOp::Add => format!("    {d} = {a} + {b};\n"),
        AluBinOp::Addc => format!("    {xer}.ca = __add_carry({a}.u32, {b}.u32, 0);\n    {d} = {a} + {b};\n"),
        AluBinOp::Adde => format!(
            "    temp = {xer}.ca;\n    {xer}.ca = __add_carry({a}.u32, {b}.u32, (uint8_t)temp);\n    {d} = {a} + {b} + temp;\n"
        ),
        AluBinOp::Subf => format!("    {d} = {b} - {a};\n"),
        AluBinOp::Subfc => format!("    {xer}.ca = __subtract_carry({b}.u32, {a}.u32, 1);\n    {d} = {b} - {a};\n"),
        AluBinOp::Subfe => format!(
            "    temp = {xer}.ca;\n    {xer}.ca = __subtract_carry({b}.u32, {a}.u32, (uint8_t)temp);\n    {d} = {b} - {a} + temp - 1;\n"
        ),
        AluBinOp::And => format!("    {d} = {a} & {b};\n"),
        AluBinOp::Or => format!("    {d} = {a} | {b};\n"),
        AluBinOp::Xor => format!("    {d} = {a} ^ {b};\n"),
        AluBinOp::Nand => format!("    {d} = ~({a} & {b});\n"),
        AluBinOp::Nor => format!("    {d} = ~({a} | {b});\n"),
        AluBinOp::Andc => format!("    {d} = {a} & ~{b};\n"),
        AluBinOp::Orc => format!("    {d} = {a} | ~{b};\n"),
        AluBinOp::Eqv => format!("    {d} = ~({a} ^ {b});\n"),
        AluBinOp::Mullw => format!("    {d}.s64 = (int64_t)(int32_t)({a}.s32 * {b}.s32);\n"),
        AluBinOp::Mulhw => format!("    {d}.s64 = ((int64_t){a}.s32 * (int64_t){b}.s32) >> 32;\n"),
        AluBinOp::Mulhwu => format!("    {d}.u64 = ((uint64_t){a}.u32 * (uint64_t){b}.u32) >> 32;\n"),
        AluBinOp::Mulld => format!("    {d}.s64 = {a}.s64 * {b}.s64;\n"),
        AluBinOp::Mulhd => format!("    {d}.s64 = __mulhi64({a}.s64, {b}.s64);\n"),
        AluBinOp::Mulhdu => format!("    {d}.u64 = __umulhi64({a}.u64, {b}.u64);\n"),
        AluBinOp::Divw => format!("    {d}.s32 = {b}.s32 != 0 ? {a}.s32 / {b}.s32 : 0;\n"),
        AluBinOp::Divwu => format!("    {d}.u32 = {b}.u32 != 0 ? {a}.u32 / {b}.u32 : 0;\n"),
        AluBinOp::Divd => format!("    {d}.s64 = {b}.s64 != 0 ? {a}.s64 / {b}.s64 : 0;\n"),
        AluBinOp::Divdu => format!("    {d}.u64 = {b}.u64 != 0 ? {a}.u64 / {b}.u64 : 0;\n"),
    };

    if rc {
        out.push_str(&emit_cmp(0, &d, "0", true, false));
    }
    out
}

fn emit_int_unary(op: AluUnaryOp, rd: u8, ra: u8, rc: bool) -> String {
    let d = context::gpr(rd);
    let a = context::gpr(ra);
    let xer = context::XER;

    let mut out = match op {
        AluUnaryOp::Neg => format!("    {d} = -{a};\n"),
        AluUnaryOp::Addme => format!(
            "    {xer}.ca = __add_carry({a}.u32, 0xFFFFFFFFu, {xer}.ca);\n    {d} = {a} - 1 + {xer}.ca;\n"
        ),
        AluUnaryOp::Addze => format!("    {xer}.ca = __add_carry({a}.u32, 0, {xer}.ca);\n    {d} = {a} + {xer}.ca;\n"),
        AluUnaryOp::Subfme => format!("    {d} = ~{a} + {xer}.ca - 1;\n"),
        AluUnaryOp::Subfze => format!("    {d} = ~{a} + {xer}.ca;\n"),
        AluUnaryOp::Extsb => format!("    {d}.s64 = (int64_t){a}.s8;\n"),
        AluUnaryOp::Extsh => format!("    {d}.s64 = (int64_t){a}.s16;\n"),
        AluUnaryOp::Extsw => format!("    {d}.s64 = (int64_t){a}.s32;\n"),
        AluUnaryOp::Cntlzw => format!("    {d}.u64 = __countlzw({a}.u32);\n"),
        AluUnaryOp::Cntlzd => format!("    {d}.u64 = __countlzd({a}.u64);\n"),
    };

    if rc {
        out.push_str(&emit_cmp(0, &d, "0", true, false));
    }
    out
}

fn emit_int_imm(op: ImmOp, rd: u8, ra: u8, imm: i32, rc: bool) -> String {
    let d = context::gpr(rd);
    let a = ra_or_zero(ra);

    let mut out = match op {
        ImmOp::Addi => format!("    {d} = {a} + {imm};\n"),
        ImmOp::Addis => format!("    {d} = {a} + {};\n", imm << 16),
        ImmOp::Mulli => format!("    {d}.s64 = (int64_t)(int32_t)({a}.s32 * {imm});\n"),
        ImmOp::Ori => format!("    {d} = {a} | {imm}u;\n"),
        ImmOp::Oris => format!("    {d} = {a} | {}u;\n", (imm as u32) << 16),
        ImmOp::Xori => format!("    {d} = {a} ^ {imm}u;\n"),
        ImmOp::Xoris => format!("    {d} = {a} ^ {}u;\n", (imm as u32) << 16),
        ImmOp::Andi => format!("    {d} = {a} & {imm}u;\n"),
        ImmOp::Andis => format!("    {d} = {a} & {}u;\n", (imm as u32) << 16),
    };

    if rc {
        out.push_str(&emit_cmp(0, &d, "0", true, false));
    }
    out
}

fn emit_addic(rd: u8, ra: u8, imm: i16, record: bool) -> String {
    let mut out = format!(
        "    {}.ca = __add_carry({}.u32, {}, 0);\n    {} = {} + {};\n",
        context::XER,
        context::gpr(ra),
        imm,
        context::gpr(rd),
        context::gpr(ra),
        imm
    );
    if record {
        out.push_str(&emit_cmp(0, &context::gpr(rd), "0", true, false));
    }
    out
}

fn emit_subfic(rd: u8, ra: u8, imm: i16) -> String {
    format!(
        "    {}.ca = __subtract_carry({}, {}.u32, 1);\n    {} = {} - {};\n",
        context::XER,
        imm,
        context::gpr(ra),
        context::gpr(rd),
        imm,
        context::gpr(ra)
    )
}

fn emit_rotate(kind: RotateKind, rd: u8, rs: u8, sh: u8, mb: u8, me: u8, rc: bool) -> String {
    let d = context::gpr(rd);
    let s = context::gpr(rs);

    let mut out = match kind {
        RotateKind::Rlwinm => {
            let mask = ppc_mask(mb, me);
            format!("    {d}.u64 = _rotl({s}.u32, {sh}) & {mask:#010X};\n")
        }
        RotateKind::Rlwimi => {
            let mask = ppc_mask(mb, me);
            format!("    {d}.u64 = (_rotl({s}.u32, {sh}) & {mask:#010X}) | ({d}.u32 & ~{mask:#010X}u);\n")
        }
        RotateKind::Rlwnm => {
            let mask = ppc_mask(mb, me);
            format!("    {d}.u64 = _rotl({s}.u32, {} & 0x1F) & {mask:#010X};\n", context::gpr(sh))
        }
        RotateKind::Rldicl => {
            let mask = ppc_mask64(mb, 63);
            format!("    {d}.u64 = _rotl64({s}.u64, {sh}) & {mask:#018X};\n")
        }
        RotateKind::Rldicr => {
            let mask = ppc_mask64(0, me);
            format!("    {d}.u64 = _rotl64({s}.u64, {sh}) & {mask:#018X};\n")
        }
        RotateKind::Rldimi => {
            let mask = ppc_mask64(mb, 63);
            format!("    {d}.u64 = (_rotl64({s}.u64, {sh}) & {mask:#018X}) | ({d}.u64 & ~{mask:#018X}ull);\n")
        }
    };

    if rc {
        out.push_str(&emit_cmp(0, &d, "0", true, matches!(kind, RotateKind::Rldicl | RotateKind::Rldicr | RotateKind::Rldimi)));
    }
    out
}

fn emit_shift(op: ShiftOp, rd: u8, rs: u8, amount: &str, rc: bool) -> String {
    let d = context::gpr(rd);
    let s = context::gpr(rs);
    let xer = context::XER;

    let mut out = match op {
        ShiftOp::Slw => format!("    {d}.u64 = ({amount} & 0x20) ? 0 : ({s}.u32 << ({amount} & 0x1F));\n"),
        ShiftOp::Srw => format!("    {d}.u64 = ({amount} & 0x20) ? 0 : ({s}.u32 >> ({amount} & 0x1F));\n"),
        ShiftOp::Sraw => format!(
            "    {xer}.ca = (({s}.s32 < 0) && (({s}.u32 & ((1u << ({amount} & 0x1F)) - 1)) != 0)) ? 1 : 0;\n    {d}.s64 = {s}.s32 >> ({amount} & 0x1F);\n"
        ),
        ShiftOp::Srawi => format!(
            "    {xer}.ca = (({s}.s32 < 0) && (({s}.u32 & ((1u << {amount}) - 1)) != 0)) ? 1 : 0;\n    {d}.s64 = {s}.s32 >> {amount};\n"
        ),
        ShiftOp::Sld => format!("    {d}.u64 = ({amount} & 0x40) ? 0 : ({s}.u64 << ({amount} & 0x3F));\n"),
        ShiftOp::Srd => format!("    {d}.u64 = ({amount} & 0x40) ? 0 : ({s}.u64 >> ({amount} & 0x3F));\n"),
        ShiftOp::Srad => format!(
            "    {xer}.ca = (({s}.s64 < 0) && (({s}.u64 & ((1ull << ({amount} & 0x3F)) - 1)) != 0)) ? 1 : 0;\n    {d}.s64 = {s}.s64 >> ({amount} & 0x3F);\n"
        ),
        ShiftOp::Sradi => format!(
            "    {xer}.ca = (({s}.s64 < 0) && (({s}.u64 & ((1ull << {amount}) - 1)) != 0)) ? 1 : 0;\n    {d}.s64 = {s}.s64 >> {amount};\n"
        ),
    };

    if rc {
        out.push_str(&emit_cmp(0, &d, "0", true, matches!(op, ShiftOp::Sld | ShiftOp::Srd | ShiftOp::Srad | ShiftOp::Sradi)));
    }
    out
}

/// PowerPC mask rule: `mask(a, b) = a <= b ? ones(a..=b) : !ones(b+1..=a-1)`,
/// 32-bit, bit 0 is the MSB.
#[must_use]
pub fn ppc_mask(mb: u8, me: u8) -> u32 {
    let ones = |from: u8, to: u8| -> u32 {
        if from > to {
            return 0;
        }
        let width = to - from + 1;
        let shifted = if width == 32 { u32::MAX } else { (1u32 << width) - 1 };
        shifted << (31 - to)
    };

    if mb <= me {
        ones(mb, me)
    } else {
        !ones(me + 1, mb - 1)
    }
}

/// 64-bit widening of [`ppc_mask`], used by the `rld*` family.
#[must_use]
pub fn ppc_mask64(mb: u8, me: u8) -> u64 {
    let ones = |from: u8, to: u8| -> u64 {
        if from > to {
            return 0;
        }
        let width = to - from + 1;
        let shifted = if width == 64 { u64::MAX } else { (1u64 << width) - 1 };
        shifted << (63 - to)
    };

    if mb <= me {
        ones(mb, me)
    } else {
        !ones(me + 1, mb - 1)
    }
}

fn mem_ea(ra: u8, mem: &MemAddr) -> String {
    match mem.offset {
        MemOffset::Disp(disp) => format!("{} + {}", ra_or_zero(ra), disp),
        MemOffset::Reg(rb) => format!("{} + {}", ra_or_zero(ra), context::gpr(rb)),
    }
}

fn emit_load(kind: LoadKind, rd: u8, ra: u8, mem: MemAddr) -> String {
    let (primitive, sign_extend_to) = match kind {
        LoadKind::Lbz => ("PPC_LOAD_U8", None),
        LoadKind::Lhz => ("PPC_LOAD_U16", None),
        LoadKind::Lwz => ("PPC_LOAD_U32", None),
        LoadKind::Ld => ("PPC_LOAD_U64", None),
        LoadKind::Lha => ("PPC_LOAD_U16", Some("int16_t")),
        LoadKind::Lwa => ("PPC_LOAD_U32", Some("int32_t")),
        LoadKind::Lfs => ("PPC_LOAD_U32", None),
        LoadKind::Lfd => ("PPC_LOAD_U64", None),
    };

    let mut out = format!("    ea = {};\n", mem_ea(ra, &mem));
    let dest = match kind {
        LoadKind::Lfs => {
            let f = context::fpr(rd);
            format!("    temp = {primitive}(base, ea);\n    {{ uint32_t bits = (uint32_t)temp; float tmp; memcpy(&tmp, &bits, 4); {f} = (double)tmp; }}\n")
        }
        LoadKind::Lfd => {
            let f = context::fpr(rd);
            format!("    temp = {primitive}(base, ea);\n    memcpy(&{f}, &temp, 8);\n")
        }
        _ => match sign_extend_to {
            Some(cast) => format!("    {} = ({cast}){primitive}(base, ea);\n", context::gpr(rd)),
            None => format!("    {} = {primitive}(base, ea);\n", context::gpr(rd)),
        },
    };
    out.push_str(&dest);

    if mem.update {
        out.push_str(&format!("    {} = ea;\n", context::gpr(ra)));
    }
    out
}

fn emit_store(kind: StoreKind, rs: u8, ra: u8, mem: MemAddr) -> String {
    let primitive = match kind {
        StoreKind::Stb => "PPC_STORE_U8",
        StoreKind::Sth => "PPC_STORE_U16",
        StoreKind::Stw => "PPC_STORE_U32",
        StoreKind::Std => "PPC_STORE_U64",
        StoreKind::Stfs => "PPC_STORE_U32",
        StoreKind::Stfd => "PPC_STORE_U64",
    };

    let mut out = format!("    ea = {};\n", mem_ea(ra, &mem));
    let value = match kind {
        StoreKind::Stfs => {
            let f = context::fpr(rs);
            format!("    {{ uint32_t bits; float tmp = (float){f}; memcpy(&bits, &tmp, 4); {primitive}(base, ea, bits); }}\n")
        }
        StoreKind::Stfd => {
            let f = context::fpr(rs);
            format!("    {{ uint64_t bits; memcpy(&bits, &{f}, 8); {primitive}(base, ea, bits); }}\n")
        }
        _ => format!("    {primitive}(base, ea, {});\n", context::gpr(rs)),
    };
    out.push_str(&value);

    if mem.byteswap {
        out = out.replace(primitive, &format!("{primitive}_BYTESWAPPED"));
    }
    if mem.update {
        out.push_str(&format!("    {} = ea;\n", context::gpr(ra)));
    }
    out
}

fn emit_reservation_load(rd: u8, ra: u8, rb: u8, primitive: &str) -> String {
    format!(
        "    ea = {} + {};\n    {} = {primitive}(base, ea);\n    {} = {};\n",
        ra_or_zero(ra),
        context::gpr(rb),
        context::gpr(rd),
        context::RESERVED,
        context::gpr(rd)
    )
}

fn emit_reservation_store(rs: u8, ra: u8, rb: u8, width: &str) -> String {
    format!(
        "    ea = {} + {};\n    {}.eq = __interlocked_compare_exchange<{width}>(base, ea, {}, {});\n    {}.lt = {}.gt = 0;\n    {}.so = {}.so;\n",
        ra_or_zero(ra),
        context::gpr(rb),
        context::cr(0),
        context::RESERVED,
        context::gpr(rs),
        context::cr(0),
        context::cr(0),
        context::cr(0),
        context::XER
    )
}

fn emit_fp_bin(op: FpBinOp, frd: u8, fra: u8, frb: u8, rc: bool, single: bool) -> String {
    let d = context::fpr(frd);
    let a = context::fpr(fra);
    let b = context::fpr(frb);
    let sym = match op {
        FpBinOp::Add => "+",
        FpBinOp::Sub => "-",
        FpBinOp::Mul => "*",
        FpBinOp::Div => "/",
    };
    let mut out = if single {
        format!("    {d} = (float)({a} {sym} {b});\n")
    } else {
        format!("    {d} = {a} {sym} {b};\n")
    };
    if rc {
        out.push_str("    // fp rc: cr1 FX/FEX/VX/OX summary not modeled\n");
    }
    out
}

fn emit_fp_unary(op: FpUnaryOp, frd: u8, frb: u8, rc: bool, single: bool) -> String {
    let d = context::fpr(frd);
    let b = context::fpr(frb);
    let mut out = match op {
        FpUnaryOp::Neg => format!("    {d} = -{b};\n"),
        FpUnaryOp::Abs => format!("    {d} = fabs({b});\n"),
        FpUnaryOp::Nabs => format!("    {d} = -fabs({b});\n"),
        FpUnaryOp::Mr => format!("    {d} = {b};\n"),
        FpUnaryOp::Sqrt => {
            if single {
                format!("    {d} = (float)sqrt({b});\n")
            } else {
                format!("    {d} = sqrt({b});\n")
            }
        }
        FpUnaryOp::Res => format!("    {d} = (float)(1.0 / {b});\n"),
        FpUnaryOp::Frsp => format!("    {d} = (double)(float){b};\n"),
        FpUnaryOp::Fcfid => format!("    {d} = (double){b}.s64;\n"),
        FpUnaryOp::Fctid => format!("    {d}.s64 = (int64_t){b};\n"),
        FpUnaryOp::Fctidz => format!("    {d}.s64 = (int64_t)trunc({b});\n"),
        FpUnaryOp::Fctiwz => format!("    {d}.s32 = (int32_t)trunc({b});\n"),
    };
    if rc {
        out.push_str("    // fp rc: cr1 summary not modeled\n");
    }
    out
}

#[allow(clippy::too_many_arguments)]
fn emit_fmadd(op: FmaOp, frd: u8, fra: u8, frc: u8, frb: u8, rc: bool, single: bool) -> String {
    let d = context::fpr(frd);
    let a = context::fpr(fra);
    let c = context::fpr(frc);
    let b = context::fpr(frb);
    // Argument order between the PowerPC A/C/B operands and this host
    // expression is carried over unaudited, per spec §9's fused-multiply-add
    // open question.
    let expr = match op {
        FmaOp::Madd => format!("{a} * {c} + {b}"),
        FmaOp::Msub => format!("{a} * {c} - {b}"),
        FmaOp::Nmsub => format!("-({a} * {c} - {b})"),
        FmaOp::Nmadd => format!("-({a} * {c} + {b})"),
    };
    let mut out = if single {
        format!("    {d} = (float)({expr});\n")
    } else {
        format!("    {d} = {expr};\n")
    };
    if rc {
        out.push_str("    // fp rc: cr1 summary not modeled\n");
    }
    out
}

fn emit_fsel(frd: u8, fra: u8, frc: u8, frb: u8, rc: bool) -> String {
    let mut out = format!(
        "    {} = ({} >= 0.0) ? {} : {};\n",
        context::fpr(frd),
        context::fpr(fra),
        context::fpr(frc),
        context::fpr(frb)
    );
    if rc {
        out.push_str("    // fp rc: cr1 summary not modeled\n");
    }
    out
}

fn emit_mfspr(rd: u8, spr: u16) -> String {
    match spr {
        0x008 => format!("    {} = {};\n", context::gpr(rd), context::LR),
        0x009 => format!("    {} = {};\n", context::gpr(rd), context::CTR),
        0x020 => format!("    {} = {}.value;\n", context::gpr(rd), context::XER),
        _ => format!("    // mfspr {}, {spr:#X}\n", context::gpr(rd)),
    }
}

fn emit_mtspr(rs: u8, spr: u16) -> String {
    match spr {
        0x008 => format!("    {} = {};\n", context::LR, context::gpr(rs)),
        0x009 => format!("    {} = {};\n", context::CTR, context::gpr(rs)),
        0x020 => format!("    {}.value = {}.u32;\n", context::XER, context::gpr(rs)),
        _ => format!("    // mtspr {spr:#X}, {}\n", context::gpr(rs)),
    }
}

/// Altivec's endian-reversal convention: loads/stores reverse all 16 bytes,
/// so every subsequent vector op is written against the reversed lane
/// order (spec §4.6/§9). Element-wise binary ops don't care about lane
/// order (each lane only ever combines with its own mirror), so these
/// translate directly; reductions and splats invert the index explicitly.
fn emit_vec_bin(op: VecBinOp, vd: u8, va: u8, vb: u8) -> String {
    let d = context::vr(vd);
    let a = context::vr(va);
    let b = context::vr(vb);
    match op {
        VecBinOp::Addfp => format!("    {d} = __vaddfp({a}, {b});\n"),
        VecBinOp::Subfp => format!("    {d} = __vsubfp({a}, {b});\n"),
        VecBinOp::And => format!("    {d} = __vand({a}, {b});\n"),
        VecBinOp::Andc => format!("    {d} = __vandc({a}, {b});\n"),
        VecBinOp::Or => format!("    {d} = __vor({a}, {b});\n"),
        VecBinOp::Xor => format!("    {d} = __vxor({a}, {b});\n"),
        VecBinOp::Nor => format!("    {d} = __vnor({a}, {b});\n"),
        VecBinOp::Maxfp => format!("    {d} = __vmaxfp({a}, {b});\n"),
        VecBinOp::Minfp => format!("    {d} = __vminfp({a}, {b});\n"),
    }
}

fn emit_vec_cmp(op: VecCmpOp, vd: u8, va: u8, vb: u8, rc: bool) -> String {
    let d = context::vr(vd);
    let a = context::vr(va);
    let b = context::vr(vb);
    let intrinsic = match op {
        VecCmpOp::Eqfp => "__vcmpeqfp",
        VecCmpOp::Gefp => "__vcmpgefp",
        VecCmpOp::Gtfp => "__vcmpgtfp",
    };
    let mut out = format!("    {d} = {intrinsic}({a}, {b});\n");
    if rc {
        out.push_str(&format!("    {}.setFromMask({d});\n", context::cr(6)));
    }
    out
}

/// Dot products sum the reversed lanes per the Altivec endian-reversal
/// convention: `vmsum3fp` sums `y,z,w` instead of `x,y,z` (spec §4.6/§9).
fn emit_vmsum(vd: u8, va: u8, vb: u8, lanes: u8) -> String {
    let d = context::vr(vd);
    let start = 4 - lanes;
    let terms: Vec<String> = (start..4)
        .map(|i| format!("{} * {}", context::vr_lane(va, "f32", i), context::vr_lane(vb, "f32", i)))
        .collect();
    format!("    for (int i = 0; i < 4; i++) {d}.f32[i] = {};\n", terms.join(" + "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_matches_idempotence_property() {
        for a in 0..32u8 {
            for b in 0..32u8 {
                if a == b {
                    continue;
                }
                let direct = ppc_mask(a, b);
                let complement = !ppc_mask((b + 1) % 32, a.wrapping_sub(1) % 32);
                if a <= b {
                    assert_eq!(direct, ppc_mask(a, b));
                } else {
                    assert_eq!(direct, complement);
                }
            }
        }
    }

    #[test]
    fn mask_covers_full_run() {
        assert_eq!(ppc_mask(0, 29), 0xFFFF_FFFCu32);
    }

    #[test]
    fn mask64_covers_full_run() {
        assert_eq!(ppc_mask64(0, 61), 0xFFFF_FFFF_FFFF_FFFCu64);
    }

    #[test]
    fn addc_emits_carry_then_sum() {
        let out = emit_int_bin(AluBinOp::Addc, 3, 4, 5, false);
        assert!(out.contains("__add_carry"));
        assert!(out.contains("ctx.r3 = ctx.r4 + ctx.r5;"));
    }

    #[test]
    fn mulhw_emits_high_word_of_signed_product() {
        let out = emit_int_bin(AluBinOp::Mulhw, 3, 4, 5, false);
        assert!(out.contains(">> 32"));
    }

    #[test]
    fn lbzx_indexed_load_computes_ea_from_two_registers() {
        let mem = MemAddr { offset: MemOffset::Reg(5), update: false, byteswap: false };
        let out = emit_load(LoadKind::Lbz, 3, 4, mem);
        assert!(out.contains("ea = ctx.r4 + ctx.r5;"));
        assert!(out.contains("PPC_LOAD_U8"));
    }

    #[test]
    fn lwzu_writes_back_effective_address() {
        let mem = MemAddr { offset: MemOffset::Disp(8), update: true, byteswap: false };
        let out = emit_load(LoadKind::Lwz, 3, 4, mem);
        assert!(out.contains("ctx.r4 = ea;"));
    }

    #[test]
    fn vmsum3fp_sums_reversed_lanes() {
        let out = emit_vmsum(1, 2, 3, 3);
        assert!(out.contains("ctx.v2.f32[1]"));
        assert!(out.contains("ctx.v2.f32[3]"));
        assert!(!out.contains("ctx.v2.f32[0]"));
    }
}
