use crate::allocator::AtlasManager;

/// Write an SVG rendering of the current partition: free leaves in one
/// color, allocated leaves in another. Debug/test convenience only; it
/// never reads anything `allocate`/`free` don't already expose through
/// [`AtlasManager::for_each_free_region`] and
/// [`AtlasManager::for_each_allocated_region`].
pub fn dump_svg(atlas: &AtlasManager, output: &mut dyn std::io::Write) -> std::io::Result<()> {
    writeln!(
        output,
        r#"<?xml version="1.0" encoding="UTF-8" standalone="no"?>
<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {width} {height}" width="{width}" height="{height}">
<g>"#,
        width = atlas.width(),
        height = atlas.height(),
    )?;

    let mut io_result = Ok(());

    atlas.for_each_free_region(|r| {
        if io_result.is_err() {
            return;
        }
        io_result = writeln!(
            output,
            r#"    <rect x="{}" y="{}" width="{}" height="{}" style="fill:rgb(200,255,200);stroke-width:1;stroke:rgb(0,0,0)" />"#,
            r.x, r.y, r.width, r.height,
        );
    });
    io_result?;

    atlas.for_each_allocated_region(|r| {
        if io_result.is_err() {
            return;
        }
        io_result = writeln!(
            output,
            r#"    <rect x="{}" y="{}" width="{}" height="{}" style="fill:rgb(150,150,255);stroke-width:2;stroke:rgb(0,0,0)" />"#,
            r.x, r.y, r.width, r.height,
        );
    });
    io_result?;

    writeln!(output, "</g></svg>")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::AtlasManager;

    #[test]
    fn dump_svg_is_well_formed_enough_to_contain_every_rectangle() {
        let mut atlas = AtlasManager::new(100, 100);
        let a = atlas.allocate(40, 40);
        let b = atlas.allocate(10, 10);

        let mut buffer = Vec::new();
        dump_svg(&atlas, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();

        assert!(text.starts_with("<?xml"));
        assert!(text.contains("<svg"));
        assert!(text.contains("</svg>"));

        // Splitting (0,0,100,100) for the first allocation leaves 2 free
        // siblings; splitting one of those for the second allocation leaves
        // 3 free leaves total, plus the 2 allocated leaves: 5 rects.
        assert_eq!(text.matches("<rect").count(), 5);

        atlas.free(b);
        atlas.free(a);
    }
}
