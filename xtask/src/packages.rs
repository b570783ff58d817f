use std::process::Command;

use anyhow::{Context, Result};

/// Workspace packages in dependency order.
const PACKAGES: &[&str] = &["shopsync-domain", "shopsync-core", "shopsync-infra", "shopsync-app"];

/// Test every package on its own so a missing dependency declaration cannot
/// hide behind workspace feature unification.
pub fn test_each_package() -> Result<()> {
    println!("Testing {} packages in isolation...", PACKAGES.len());

    for (index, package) in PACKAGES.iter().enumerate() {
        println!("\n[{}/{}] cargo test -p {package}", index + 1, PACKAGES.len());

        let status = Command::new("cargo")
            .args(["test", "-p", package])
            .status()
            .with_context(|| format!("Failed to run cargo test for '{package}'"))?;

        if !status.success() {
            anyhow::bail!("Package '{package}' failed its tests");
        }

        println!("✅ {package} passed");
    }

    println!("\n✅ All {} packages pass in isolation!", PACKAGES.len());

    Ok(())
}
