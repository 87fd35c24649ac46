// =============================================================================
// PiBring - ARM Build Script
// =============================================================================
// Assembles boot.S when building for ARM. Host builds (unit tests) skip it.
// =============================================================================

use std::env;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-changed=src/boot.S");

    if env::var("CARGO_CFG_TARGET_ARCH").as_deref() != Ok("arm") {
        return;
    }

    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR is set by cargo"));
    let arch_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR is set by cargo"));

    cc::Build::new()
        .file(arch_dir.join("src/boot.S"))
        .flag("-march=armv6zk")
        .compile("boot");

    // Link the compiled object file
    println!("cargo:rustc-link-search=native={}", out_dir.display());
    println!("cargo:rustc-link-lib=static=boot");
}
