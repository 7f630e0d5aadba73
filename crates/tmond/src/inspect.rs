//! Inspect mode — decode a persisted snapshot and print what it holds.

use std::path::Path;

use anyhow::Context;

/// Print cache and delivery-service availability from a snapshot file.
pub fn inspect(path: &Path) -> anyhow::Result<()> {
    let states = tmon_state::load_snapshot_file(path)
        .with_context(|| format!("inspecting {}", path.display()))?;

    println!("{} caches found", states.cache_count());
    for (name, cache) in &states.caches {
        println!("  {name} -> {}", cache.is_available);
    }

    println!("{} delivery services found", states.delivery_service_count());
    for (name, ds) in &states.delivery_services {
        println!(
            "  {name} -> {} (disabled locations: {})",
            ds.is_available,
            ds.disabled_locations.len()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inspect_valid_and_invalid_files() {
        let dir = tempfile::tempdir().unwrap();

        let good = dir.path().join("good.json");
        std::fs::write(
            &good,
            r#"{ "caches": { "edge-01": { "isAvailable": true } },
                 "deliveryServices": { "ds": { "isAvailable": false, "disabledLocations": ["cg"] } } }"#,
        )
        .unwrap();
        assert!(inspect(&good).is_ok());

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, r#"{ "caches": {} }"#).unwrap();
        assert!(inspect(&bad).is_err());
    }
}
