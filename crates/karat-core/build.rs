use std::env;
use std::fs;
use std::path::{Path, PathBuf};

include!("../build_common.rs");

fn main() {
    let manifest_dir = env::var("CARGO_MANIFEST_DIR").unwrap();

    // Process README for rustdoc (uses shared build_common.rs)
    process_readme_for_rustdoc(&manifest_dir);

    // Navigate to workspace root (two directories up from crates/karat-core)
    let crate_path = PathBuf::from(&manifest_dir);
    let repo_root = crate_path
        .parent() // crates/
        .and_then(|p| p.parent()) // workspace root
        .map_or_else(|| crate_path.clone(), Path::to_path_buf);

    // Emit this as a compile-time environment variable for dev-layout detection
    println!(
        "cargo:rustc-env=KARAT_REPO_ROOT={}",
        repo_root.to_string_lossy()
    );

    println!("cargo:rerun-if-changed=build.rs");
}
