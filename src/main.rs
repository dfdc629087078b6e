#[cfg(target_env = "musl")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::io::prelude::*;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use env_logger::Builder;
use log::{Level, LevelFilter};
use owo_colors::OwoColorize;
use recomp_symbols::prelude::Function;
use recomp_translate::SwitchTable;

mod menu;
use menu::{Command, TopLevel};

fn color_level(level: Level) -> String {
    match level {
        Level::Error => level.red().to_string(),
        Level::Warn => level.yellow().to_string(),
        Level::Info => level.green().to_string(),
        Level::Debug => level.blue().to_string(),
        Level::Trace => level.purple().to_string(),
    }
}

const fn level_filter(verbose: usize) -> LevelFilter {
    match verbose {
        1 => LevelFilter::Error,
        2 => LevelFilter::Warn,
        3 => LevelFilter::Info,
        4 => LevelFilter::Debug,
        5 => LevelFilter::Trace,
        _ => LevelFilter::Off,
    }
}

fn main() -> Result<()> {
    let args: TopLevel = argp::parse_args_or_exit(argp::DEFAULT);

    if args.verbose != 0 {
        Builder::new()
            .format(|buf, record| {
                writeln!(
                    buf,
                    "[{}] {} {}",
                    recomp_core::time::current_time(),
                    color_level(record.level()),
                    record.args()
                )
            })
            .filter(None, level_filter(args.verbose))
            .init();
    }

    match args.nested {
        Command::Recompile(params) => recompile(params)?,
        Command::Patch(params) => patch(params)?,
    }

    Ok(())
}

fn recompile(params: menu::RecompileArgs) -> Result<()> {
    log::info!("Loading {}", &params.input);
    let data = std::fs::read(&params.input).with_context(|| format!("failed to read {}", params.input))?;

    let mut image = recomp_container::load_image(&data)?;

    let switches_path = params
        .switches
        .map(PathBuf::from)
        .unwrap_or_else(|| sibling_path(&params.input, "switches.toml"));
    let switches = match std::fs::read_to_string(&switches_path) {
        Ok(text) => SwitchTable::parse(&text)?,
        Err(_) => {
            log::warn!(
                "No switch-table manifest at {}; bctr sites will emit indirect calls and no well-known symbols are pre-registered",
                switches_path.display()
            );
            SwitchTable::default()
        }
    };

    let mut functions: Vec<Function> = Vec::new();
    if let Some(pdata) = image.sections.iter().find(|s| s.name == ".pdata").cloned() {
        if let Some(offset) = image.offset_of(pdata.base) {
            let pdata_bytes = image.data()[offset..offset + pdata.size as usize].to_vec();
            recomp_symbols::function::discover_from_pdata(&mut image, &pdata_bytes, &mut functions);
        }
    }
    recomp_symbols::function::discover_linear_scan(&mut image, switches.well_known(), &mut functions);
    functions.sort_by_key(|f| f.base);

    log::info!("Discovered {} functions", functions.len());

    let emitted = recomp_translate::translate_image(&image, &functions, &switches);

    let output_dir = params.output.map(PathBuf::from).unwrap_or_else(|| {
        Path::new(&params.input).parent().map(Path::to_path_buf).unwrap_or_default()
    });
    std::fs::create_dir_all(&output_dir)?;

    let stem = Path::new(&params.input).file_stem().unwrap_or_default().to_string_lossy();
    let output_path = output_dir.join(format!("{stem}.cpp"));
    log::info!("Writing {}", output_path.display());
    std::fs::write(&output_path, emitted).with_context(|| format!("failed to write {}", output_path.display()))?;

    Ok(())
}

fn patch(params: menu::PatchArgs) -> Result<()> {
    log::info!("Reading base image {}", &params.base);
    let base = std::fs::read(&params.base).with_context(|| format!("failed to read {}", params.base))?;
    log::info!("Reading patch {}", &params.patch);
    let patch_data = std::fs::read(&params.patch).with_context(|| format!("failed to read {}", params.patch))?;

    let assembled = recomp_container::patch::apply_patch(&base, &patch_data)?;

    log::info!("Writing {}", &params.output);
    std::fs::write(&params.output, assembled)
        .with_context(|| format!("failed to write {}", params.output))?;

    Ok(())
}

fn sibling_path(input: &str, file_name: &str) -> PathBuf {
    Path::new(input).parent().map(|dir| dir.join(file_name)).unwrap_or_else(|| PathBuf::from(file_name))
}
