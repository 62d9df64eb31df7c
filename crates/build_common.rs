// Shared build script utilities for README-to-rustdoc transformation.
// Include this in build.rs files with: include!("../build_common.rs");
//
// Required imports in the including file:
//   use std::env;
//   use std::fs;
//   use std::path::Path;

/// Copy a crate's README.md into `OUT_DIR` so `lib.rs` can use it as crate docs.
///
/// Transformations:
/// 1. Strip 'src/' prefix from links so rustdoc can resolve modules
/// 2. Strip '.rs' extension so links go to modules, not files
///
/// A crate without a README gets an empty doc page instead of a build failure.
fn process_readme_for_rustdoc(crate_dir: &str) {
    println!("cargo:rerun-if-changed=README.md");

    let readme_path = Path::new(crate_dir).join("README.md");
    let content = fs::read_to_string(&readme_path).unwrap_or_default();

    let rustdoc_content = content
        .replace("](src/", "](")
        .replace(".rs)", ")");

    let out_dir = env::var("OUT_DIR").expect("cargo sets OUT_DIR for build scripts");
    let dest_path = Path::new(&out_dir).join("README_GENERATED.md");
    fs::write(dest_path, rustdoc_content).expect("failed to write README_GENERATED.md");
}
