//! Switch-table manifest loader: a human-maintained side file that tells the
//! translator which register a `bctr` site switches on and where each case
//! lands, since recovering that from the code would need value-set
//! analysis this core doesn't attempt.

use std::collections::HashMap;

use recomp_symbols::prelude::WellKnown;
use serde::Deserialize;
use snafu::prelude::*;

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("failed to parse switch-table manifest: {source}"))]
    Parse { source: toml::de::Error },
}

type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default)]
    switch: Vec<SwitchEntry>,
    #[serde(default)]
    symbol: Vec<SymbolEntry>,
}

/// One `[[switch]]` entry: the `bctr` site's address, the register it
/// switches on, and the ordered jump-target labels.
#[derive(Debug, Clone, Deserialize)]
pub struct SwitchEntry {
    pub base: u32,
    pub r: u8,
    pub labels: Vec<u32>,
}

/// One `[[symbol]]` entry: a title-specific well-known runtime address
/// (a frame handler, `memcpy`, `memset`, ...) pre-registered before
/// discovery runs, since these addresses vary per game and can't be
/// hardcoded.
#[derive(Debug, Clone, Deserialize)]
pub struct SymbolEntry {
    pub name: String,
    pub address: u32,
    pub size: u32,
    #[serde(default)]
    pub is_frame_handler: bool,
}

/// Switch-table entries keyed by the `bctr` site's virtual address, plus
/// the well-known-symbol table consulted before function discovery.
#[derive(Debug, Default)]
pub struct SwitchTable {
    by_base: HashMap<u32, SwitchEntry>,
    well_known: Vec<WellKnown>,
}

impl SwitchTable {
    /// Parses a `switches.toml`-shaped document into a lookup table.
    pub fn parse(text: &str) -> Result<Self> {
        let manifest: Manifest = toml::from_str(text).context(ParseSnafu)?;
        let by_base = manifest.switch.into_iter().map(|entry| (entry.base, entry)).collect();
        let well_known = manifest
            .symbol
            .into_iter()
            .map(|entry| WellKnown {
                name: entry.name,
                address: entry.address,
                size: entry.size,
                is_frame_handler: entry.is_frame_handler,
            })
            .collect();
        Ok(Self { by_base, well_known })
    }

    #[must_use]
    pub fn get(&self, base: u32) -> Option<&SwitchEntry> {
        self.by_base.get(&base)
    }

    #[must_use]
    pub fn well_known(&self) -> &[WellKnown] {
        &self.well_known
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_switch_entries() {
        let text = r#"
            [[switch]]
            base = 0x82010000
            r = 5
            labels = [0x82010020, 0x82010030]
        "#;
        let table = SwitchTable::parse(text).unwrap();
        let entry = table.get(0x82010000).unwrap();
        assert_eq!(entry.r, 5);
        assert_eq!(entry.labels, vec![0x82010020, 0x82010030]);
    }

    #[test]
    fn miss_returns_none() {
        let table = SwitchTable::parse("").unwrap();
        assert!(table.get(0x1234).is_none());
    }

    #[test]
    fn parses_well_known_symbols() {
        let text = r#"
            [[symbol]]
            name = "__savegprlr_14"
            address = 0x82012000
            size = 0x40
            is_frame_handler = true

            [[symbol]]
            name = "memcpy"
            address = 0x82013000
            size = 0x200
        "#;
        let table = SwitchTable::parse(text).unwrap();
        assert_eq!(table.well_known().len(), 2);
        assert!(table.well_known()[0].is_frame_handler);
        assert!(!table.well_known()[1].is_frame_handler);
    }
}
