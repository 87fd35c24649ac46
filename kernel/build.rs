// =============================================================================
// PiBring - Kernel Build Script
// =============================================================================
// Hands the linker script to the bare-metal image link.
// =============================================================================

use std::env;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-changed=linker.ld");

    if env::var("CARGO_CFG_TARGET_OS").as_deref() != Ok("none") {
        return;
    }

    let dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR is set by cargo"));
    println!("cargo:rustc-link-arg-bins=-T{}", dir.join("linker.ld").display());
}
