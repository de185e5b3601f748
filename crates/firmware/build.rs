//! Lays out RAM for riscv-rt.
//!
//! The image is loaded at address 0 and owns `MEMSIZE` bytes of RAM; the
//! transmit device window starts right above it. `MEMSIZE` comes from the
//! same `RVTX_MEMSIZE` setting rvtx-core reads, so the linker and the driver
//! agree on where RAM ends.

use std::env;
use std::fs;
use std::path::PathBuf;

use rvtx_core::layout;

fn main() {
    println!("cargo:rerun-if-env-changed=RVTX_MEMSIZE");
    println!("cargo:rerun-if-changed=build.rs");

    let memsize = match env::var("RVTX_MEMSIZE") {
        Ok(raw) => layout::parse_memsize(&raw)
            .unwrap_or_else(|| panic!("RVTX_MEMSIZE={raw:?} is not a decimal or 0x hex u32")),
        Err(_) => layout::DEFAULT_MEMSIZE,
    };
    let layout = layout::MemoryLayout::new(memsize)
        .unwrap_or_else(|e| panic!("RVTX_MEMSIZE={memsize:#x}: {e}"));

    let memory_x = format!(
        "MEMORY
{{
  RAM : ORIGIN = 0x00000000, LENGTH = {len:#x}
}}

REGION_ALIAS(\"REGION_TEXT\", RAM);
REGION_ALIAS(\"REGION_RODATA\", RAM);
REGION_ALIAS(\"REGION_DATA\", RAM);
REGION_ALIAS(\"REGION_BSS\", RAM);
REGION_ALIAS(\"REGION_HEAP\", RAM);
REGION_ALIAS(\"REGION_STACK\", RAM);

/* Transmit register: {reg:#x} */
",
        len = layout.memsize(),
        reg = layout.tx_register(),
    );

    // Put the linker script somewhere the linker can find it.
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    fs::write(out_dir.join("memory.x"), memory_x).unwrap();
    println!("cargo:rustc-link-search={}", out_dir.display());
}
