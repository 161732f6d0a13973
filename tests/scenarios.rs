use rect_atlas::{AtlasManager, Region, INVALID_REGION};

fn region(x: u32, y: u32, width: u32, height: u32) -> Region {
    Region { x, y, width, height }
}

#[test]
fn single_allocation_and_free() {
    let mut atlas = AtlasManager::new(100, 100);

    let r = atlas.allocate(10, 20);
    assert_eq!(r, region(0, 0, 10, 20));

    atlas.free(r);

    let full = atlas.allocate(100, 100);
    assert_eq!(full, region(0, 0, 100, 100));

    atlas.free(full);
}

#[test]
fn three_way_split_wide() {
    let mut atlas = AtlasManager::new(100, 50);

    let r = atlas.allocate(30, 20);
    assert_eq!(r, region(0, 0, 30, 20));

    assert_eq!(atlas.allocate(70, 50), region(30, 0, 70, 50));
    assert_eq!(atlas.allocate(30, 30), region(0, 20, 30, 30));
}

#[test]
fn three_way_split_tall() {
    let mut atlas = AtlasManager::new(50, 100);

    let r = atlas.allocate(20, 30);
    assert_eq!(r, region(0, 0, 20, 30));

    assert_eq!(atlas.allocate(50, 70), region(0, 30, 50, 70));
    assert_eq!(atlas.allocate(30, 30), region(20, 0, 30, 30));
}

#[test]
fn best_fit_selection_and_split() {
    let mut atlas = AtlasManager::new(100, 100);

    assert_eq!(atlas.allocate(100, 60), region(0, 0, 100, 60));

    let r = atlas.allocate(40, 30);
    assert_eq!(r, region(0, 60, 40, 30));

    let mut free_regions = Vec::new();
    atlas.for_each_free_region(|r| free_regions.push(r));
    free_regions.sort_by_key(|r| (r.x, r.y));

    assert_eq!(free_regions, vec![region(40, 60, 60, 40), region(0, 90, 40, 10)]);
}

#[test]
fn merge_on_free_restores_canonical_form() {
    let mut atlas = AtlasManager::new(100, 100);

    atlas.allocate(100, 60);
    let r = atlas.allocate(40, 30);
    atlas.free(r);

    let mut free_regions = Vec::new();
    atlas.for_each_free_region(|r| free_regions.push(r));
    assert_eq!(free_regions, vec![region(0, 60, 100, 40)]);

    assert_eq!(atlas.allocate(100, 40), region(0, 60, 100, 40));
}

#[test]
fn capacity_failure() {
    let mut atlas = AtlasManager::new(10, 10);

    assert_eq!(atlas.allocate(11, 1), INVALID_REGION);
    assert_eq!(atlas.allocate(1, 11), INVALID_REGION);

    let mut free_regions = Vec::new();
    atlas.for_each_free_region(|r| free_regions.push(r));
    assert_eq!(free_regions, vec![region(0, 0, 10, 10)]);

    let mut allocated_regions = Vec::new();
    atlas.for_each_allocated_region(|r| allocated_regions.push(r));
    assert!(allocated_regions.is_empty());
}
