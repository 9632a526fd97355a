// Build script to inject version information from git tags
//
// Falls back to CARGO_PKG_VERSION when git is unavailable.

use std::process::Command;

fn main() {
    let version = get_git_version().unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string());

    println!("cargo:rustc-env=NETRA_VERSION={}", version);
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/tags");
}

fn get_git_version() -> Option<String> {
    // e.g. "v0.1.0", "v0.1.0-5-gabc123" or "abc123-dirty"
    let output = Command::new("git")
        .args(["describe", "--tags", "--always", "--dirty"])
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let described = String::from_utf8(output.stdout).ok()?;
    let described = described.trim();

    if let Some(tagged) = described.strip_prefix('v') {
        // Keep only the tag's version part
        let version = tagged.split('-').next().unwrap_or(tagged);
        Some(version.to_string())
    } else {
        Some(format!("{}-{}", env!("CARGO_PKG_VERSION"), described))
    }
}
