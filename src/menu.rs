use argp::FromArgs;

/// Recompiles Xbox 360 executables into host source, or patches one XEX2
/// image against another.
#[derive(FromArgs, Debug)]
pub struct TopLevel {
    /// Be verbose. Repeat for more detail (-v, -vv, -vvv, ...).
    #[argp(switch, short = 'v', global)]
    pub verbose: usize,

    #[argp(subcommand)]
    pub nested: Command,
}

#[derive(FromArgs, Debug)]
#[argp(subcommand)]
pub enum Command {
    Recompile(RecompileArgs),
    Patch(PatchArgs),
}

/// Recompile a XEX2 or ELF image into translated source plus a
/// `switches.toml` side file.
#[derive(FromArgs, Debug)]
#[argp(subcommand, name = "recompile")]
pub struct RecompileArgs {
    /// input XEX2 or ELF file to recompile
    #[argp(option, short = 'i')]
    pub input: String,

    /// output directory (defaults to the input file's directory)
    #[argp(option, short = 'o')]
    pub output: Option<String>,

    /// switch-table manifest to consult for `bctr` sites (defaults to
    /// `switches.toml` alongside the input)
    #[argp(option, short = 's')]
    pub switches: Option<String>,
}

/// Apply a delta patch to a base XEX2 image and write the assembled image.
#[derive(FromArgs, Debug)]
#[argp(subcommand, name = "patch")]
pub struct PatchArgs {
    /// base XEX2 image
    #[argp(option, short = 'b')]
    pub base: String,

    /// delta patch to apply
    #[argp(option, short = 'p')]
    pub patch: String,

    /// output file to write the assembled image to
    #[argp(option, short = 'o')]
    pub output: String,
}
