//! PowerPC-to-host instruction translator. Generalizes
//! `orthrus-core`'s typed-accessor approach to a source-emission problem:
//! given an [`recomp_symbols::prelude::Image`] with its function table
//! already populated, produce one host function definition per guest
//! function.

pub mod context;
pub mod emit;
pub mod opcode;
pub mod switch_table;

use recomp_symbols::prelude::{Function, Image, SymbolKind};

pub use switch_table::{Error as SwitchTableError, SwitchTable};

/// Forward-declares every Function symbol, then emits each function's body
/// in address order. This is the whole of a translation unit's text.
#[must_use]
pub fn translate_image(image: &Image, functions: &[Function], switches: &SwitchTable) -> String {
    let mut out = String::new();
    out.push_str("#include \"ppc_context.h\"\n\n");

    for function in functions {
        let name = function_name(image, function);
        out.push_str(&format!("PPC_FUNC void {name}(PPCContext& ctx, uint8_t* base);\n"));
    }
    out.push('\n');

    for function in functions {
        let name = function_name(image, function);
        out.push_str(&emit::emit_function(image, function, &name, switches));
        out.push('\n');
    }

    out
}

fn function_name(image: &Image, function: &Function) -> String {
    image
        .symbols
        .find_exact(function.base)
        .filter(|s| s.kind == SymbolKind::Function)
        .map(|s| s.name.clone())
        .unwrap_or_else(|| format!("sub_{:08X}", function.base))
}

#[cfg(test)]
mod tests {
    use recomp_symbols::prelude::{Image, Section, SectionFlags, Symbol, SymbolKind};

    use super::*;

    fn b_instruction(address: u32, target: u32) -> u32 {
        let li = target.wrapping_sub(address) & 0x03FF_FFFC;
        (18u32 << 26) | li
    }

    #[test]
    fn trivial_unconditional_branch_emits_goto() {
        let base = 0x8200_0F00u32;
        let mut data = vec![0u8; 0x200];
        let target = 0x8200_1000u32;
        data[0..4].copy_from_slice(&b_instruction(base, target).to_be_bytes());

        let mut image = Image::new(data.into_boxed_slice(), base, base);
        image.sections.insert(Section {
            name: ".text".into(),
            base,
            size: 0x200,
            flags: SectionFlags::CODE,
        });

        let function = Function { base, size: 0x200 };
        image.symbols.insert(Symbol {
            name: "sub_82000F00".into(),
            address: base,
            size: 0x200,
            kind: SymbolKind::Function,
        });

        let switches = SwitchTable::default();
        let emitted = emit::emit_function(&image, &function, "sub_82000F00", &switches);
        assert!(emitted.contains("goto loc_82001000;"));
    }

    #[test]
    fn branch_out_of_function_emits_indirect_call() {
        let base = 0x8300_0000u32;
        let mut data = vec![0u8; 4];
        data[0..4].copy_from_slice(&b_instruction(base, 0x2000_0000).to_be_bytes());

        let image = Image::new(data.into_boxed_slice(), base, base);
        let function = Function { base, size: 4 };
        let switches = SwitchTable::default();

        let emitted = emit::emit_function(&image, &function, "sub_83000000", &switches);
        assert!(emitted.contains("ctx.fn["));
        assert!(emitted.contains("return;"));
    }
}
