use rect_atlas::AtlasManager;

/// A small linear-congruential generator, kept local and seeded so this
/// test is deterministic across runs, matching the soak tests the
/// reference allocator crate ships with.
struct Lcg {
    state: u64,
}

impl Lcg {
    fn new(seed: u64) -> Self {
        Lcg { state: seed }
    }

    fn next(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.state
    }

    fn next_range(&mut self, bound: u32) -> u32 {
        (self.next() % bound as u64) as u32
    }
}

#[test]
fn random_allocate_and_free_cycles_never_overlap_or_escape_the_atlas() {
    const WIDTH: u32 = 500;
    const HEIGHT: u32 = 500;

    let mut atlas = AtlasManager::new(WIDTH, HEIGHT);
    let mut rng = Lcg::new(0x5eed);
    let mut allocated = Vec::new();
    let mut allocations = 0;
    let mut misses = 0;

    for _ in 0..20_000 {
        if rng.next_range(5) > 2 && !allocated.is_empty() {
            let i = rng.next_range(allocated.len() as u32) as usize;
            let r = allocated.remove(i);
            atlas.free(r);
        } else {
            let w = rng.next_range(80) + 1;
            let h = rng.next_range(80) + 1;
            let r = atlas.allocate(w, h);
            if !r.is_empty() {
                allocated.push(r);
                allocations += 1;
            } else {
                misses += 1;
            }
        }

        let mut seen = Vec::new();
        atlas.for_each_allocated_region(|r| seen.push(r));
        for i in 0..seen.len() {
            assert!(
                seen[i].x + seen[i].width <= WIDTH && seen[i].y + seen[i].height <= HEIGHT,
                "allocated region {:?} escapes the {}x{} atlas",
                seen[i],
                WIDTH,
                HEIGHT,
            );
            for j in (i + 1)..seen.len() {
                let a = seen[i];
                let b = seen[j];
                let overlap = a.x < b.x + b.width
                    && b.x < a.x + a.width
                    && a.y < b.y + b.height
                    && b.y < a.y + a.height;
                assert!(!overlap, "allocated regions {a:?} and {b:?} overlap");
            }
        }
    }

    assert!(allocations > 0);
    let _ = misses;

    while let Some(r) = allocated.pop() {
        atlas.free(r);
    }

    let mut free_regions = Vec::new();
    atlas.for_each_free_region(|r| free_regions.push(r));
    assert_eq!(free_regions, vec![rect_atlas::Region { x: 0, y: 0, width: WIDTH, height: HEIGHT }]);

    let full = atlas.allocate(WIDTH, HEIGHT);
    assert!(!full.is_empty());
    atlas.free(full);
}
