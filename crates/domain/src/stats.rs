//! Stat catalog and the active address table derived from a user selection.
//!
//! Every stat is a single byte at an absolute address in the 24-bit SNES
//! address space exposed by the device-control server. Addresses are defined
//! as an offset into one of two regions (SRAM or WRAM).

use std::collections::BTreeSet;

use serde::Serialize;

/// Base of the SRAM mirror as seen by the device-control server.
pub const SRAM_BASE: u32 = 0xF5_F000;
/// Base of WRAM as seen by the device-control server.
pub const WRAM_BASE: u32 = 0xF5_0000;

/// Keys that are polled regardless of the caller's selection.
pub const MANDATORY_KEYS: [&str; 3] = ["timer", "gamemode", "triforce"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryRegion {
    Sram,
    Wram,
}

impl MemoryRegion {
    pub const fn base(self) -> u32 {
        match self {
            MemoryRegion::Sram => SRAM_BASE,
            MemoryRegion::Wram => WRAM_BASE,
        }
    }
}

/// One entry of the stat catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatAddress {
    pub key: &'static str,
    pub region: MemoryRegion,
    pub offset: u32,
    /// Always active, independent of the selection.
    pub mandatory: bool,
}

impl StatAddress {
    const fn sram(key: &'static str, offset: u32) -> Self {
        Self {
            key,
            region: MemoryRegion::Sram,
            offset,
            mandatory: false,
        }
    }

    const fn wram(key: &'static str, offset: u32) -> Self {
        Self {
            key,
            region: MemoryRegion::Wram,
            offset,
            mandatory: true,
        }
    }

    /// Absolute address (region base + offset).
    pub const fn address(&self) -> u32 {
        self.region.base() + self.offset
    }
}

static BUILTIN_CATALOG: [StatAddress; 12] = [
    StatAddress::wram("timer", 0x00),
    StatAddress::wram("gamemode", 0x10),
    StatAddress::wram("triforce", 0x19),
    StatAddress::sram("bonks", 0x420),
    StatAddress::sram("checks", 0x423),
    StatAddress::sram("saveandquit", 0x42D),
    StatAddress::sram("heartpieces", 0x448),
    StatAddress::sram("deaths", 0x449),
    StatAddress::sram("flutes", 0x44B),
    StatAddress::sram("revivals", 0x453),
    StatAddress::sram("dungeonmirrors", 0x43B),
    StatAddress::sram("overworldmirrors", 0x43A),
];

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Active table
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The set of `(key, address)` pairs polled each cycle, in catalog order.
///
/// Built wholesale by [`AddressRegistry::active_table`]; there is no API to
/// mutate a table in place.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AddressTable {
    entries: Vec<(String, u32)>,
}

impl AddressTable {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> + '_ {
        self.entries.iter().map(|(k, a)| (k.as_str(), *a))
    }

    pub fn keys(&self) -> Vec<&str> {
        self.entries.iter().map(|(k, _)| k.as_str()).collect()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.address(key).is_some()
    }

    pub fn address(&self, key: &str) -> Option<u32> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, a)| *a)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Registry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Full catalog of known stat keys.
#[derive(Debug, Clone)]
pub struct AddressRegistry {
    catalog: &'static [StatAddress],
}

impl Default for AddressRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AddressRegistry {
    pub fn new() -> Self {
        Self {
            catalog: &BUILTIN_CATALOG,
        }
    }

    pub fn catalog(&self) -> &[StatAddress] {
        self.catalog
    }

    pub fn lookup(&self, key: &str) -> Option<&StatAddress> {
        self.catalog.iter().find(|s| s.key == key)
    }

    pub fn is_known(&self, key: &str) -> bool {
        self.lookup(key).is_some()
    }

    /// Keys in `selection` that are not in the catalog.
    pub fn unknown_keys<'a, S: AsRef<str>>(&self, selection: &'a [S]) -> Vec<&'a str> {
        selection
            .iter()
            .map(|s| s.as_ref())
            .filter(|k| !self.is_known(k))
            .collect()
    }

    /// Derive the active table: every mandatory key plus each selected key
    /// that exists in the catalog. Unknown and duplicate keys are dropped.
    pub fn active_table<S: AsRef<str>>(&self, selection: &[S]) -> AddressTable {
        let selected: BTreeSet<&str> = selection.iter().map(|s| s.as_ref()).collect();
        let entries = self
            .catalog
            .iter()
            .filter(|s| s.mandatory || selected.contains(s.key))
            .map(|s| (s.key.to_string(), s.address()))
            .collect();
        AddressTable { entries }
    }
}
