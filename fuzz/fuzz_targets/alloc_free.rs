#![no_main]

#[macro_use]
extern crate arbitrary;

use libfuzzer_sys::fuzz_target;
use libfuzzer_sys::arbitrary::Arbitrary;

use rect_atlas::{AtlasManager, Region};

#[derive(Copy, Clone, Arbitrary, Debug)]
enum Evt {
    Alloc(u32, u32),
    Free(usize),
}

fuzz_target!(|events: Vec<Evt>| {
    let mut atlas = AtlasManager::new(1000, 1000);
    let mut allocations: Vec<Region> = Vec::new();

    for evt in &events {
        match *evt {
            Evt::Alloc(w, h) => {
                let r = atlas.allocate(w, h);
                if !r.is_empty() {
                    allocations.push(r);
                }
            }
            Evt::Free(idx) => {
                if idx < allocations.len() {
                    let r = allocations.swap_remove(idx);
                    atlas.free(r);
                }
            }
        }
    }

    for r in allocations {
        atlas.free(r);
    }
});
