//! `at-tracker stats`: print the stat catalog.

use at_domain::stats::{AddressRegistry, MemoryRegion};

pub fn print(json: bool) -> anyhow::Result<()> {
    let registry = AddressRegistry::new();

    if json {
        let rows: Vec<_> = registry
            .catalog()
            .iter()
            .map(|s| {
                serde_json::json!({
                    "key": s.key,
                    "region": s.region,
                    "offset": s.offset,
                    "address": format!("{:X}", s.address()),
                    "mandatory": s.mandatory,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!("{:<18} {:<6} {:>8} {:>8}  polled", "KEY", "REGION", "OFFSET", "ADDRESS");
    for s in registry.catalog() {
        let region = match s.region {
            MemoryRegion::Sram => "sram",
            MemoryRegion::Wram => "wram",
        };
        println!(
            "{:<18} {:<6} {:>8} {:>8}  {}",
            s.key,
            region,
            format!("0x{:03X}", s.offset),
            format!("{:X}", s.address()),
            if s.mandatory { "always" } else { "on select" },
        );
    }
    Ok(())
}
