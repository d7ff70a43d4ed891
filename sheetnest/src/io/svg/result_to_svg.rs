use svg::Document;
use svg::node::element::{Group, Text, Title};

use crate::entities::{NestingResult, Placement, Sheet};
use crate::geometry::{AABB, effective_box, find_collisions};
use crate::io::svg::svg_util;
use crate::io::svg::svg_util::SvgDrawOptions;

/// Draws sheet `sheet_index` of `result`: the sheet outline, every placement on it and a summary label.
pub fn result_to_svg(
    result: &NestingResult,
    sheet: &Sheet,
    sheet_index: u32,
    options: SvgDrawOptions,
) -> Document {
    let theme = &options.theme;
    let sheet_box = AABB::new(0.0, 0.0, sheet.width, sheet.height);
    let min_dim = f64::min(sheet.width, sheet.height);

    //leave 5% of room around the sheet
    let margin = 0.05 * min_dim;
    let vbox = (
        -margin,
        -margin,
        sheet.width + 2.0 * margin,
        sheet.height + 2.0 * margin,
    );

    let stroke_width = min_dim * 0.001 * theme.stroke_width_multiplier;

    let placements: Vec<Placement> = result.placements_on(sheet_index).cloned().collect();
    let utilization = result
        .utilization
        .get(sheet_index as usize)
        .copied()
        .unwrap_or(0.0);

    let label = {
        //print some information above the left top of the sheet
        let label_content = format!(
            "sheet {}/{} | width: {:.3} | height: {:.3} | parts: {} | utilization: {:.3}%",
            sheet_index + 1,
            result.sheets_used,
            sheet.width,
            sheet.height,
            placements.len(),
            utilization * 100.0,
        );
        Text::new(label_content)
            .set("x", 0.0)
            .set("y", -0.5 * 0.025 * min_dim)
            .set("font-size", min_dim * 0.025)
            .set("font-family", "monospace")
            .set("font-weight", "500")
    };

    let sheet_group = Group::new()
        .set("id", format!("sheet_{sheet_index}"))
        .add(svg_util::data_to_path(
            svg_util::aabb_data(&sheet_box),
            &[
                ("fill", &*format!("{}", theme.sheet_fill)),
                ("stroke", "black"),
                ("stroke-width", &*format!("{}", 2.0 * stroke_width)),
            ],
        ))
        .add(Title::new(format!(
            "sheet, index: {}, width: {:.3}, height: {:.3}",
            sheet_index, sheet.width, sheet.height
        )));

    let mut parts_group = Group::new().set("id", "parts");
    for (i, p) in placements.iter().enumerate() {
        let bx = effective_box(p);
        let fill = match p.rotation.swaps_axes() {
            true => theme.rotated_part_fill,
            false => theme.part_fill,
        };
        let mut part_group = Group::new()
            .set("id", format!("placement_{i}"))
            .add(svg_util::data_to_path(
                svg_util::aabb_data(&bx),
                &[
                    ("fill", &*format!("{}", fill)),
                    ("stroke-width", &*format!("{}", stroke_width)),
                    ("stroke", "black"),
                    ("fill-opacity", "0.8"),
                ],
            ))
            .add(Title::new(format!(
                "part, id: {}, x: {:.3}, y: {:.3}, w: {:.3}, h: {:.3}, rotation: {}",
                p.part_id, p.x, p.y, p.width, p.height, p.rotation
            )));

        if options.label_parts {
            let font_size = f64::min(bx.w, bx.h) * 0.2;
            part_group = part_group.add(
                Text::new(p.part_id.clone())
                    .set("x", bx.x + 0.5 * bx.w)
                    .set("y", bx.y + 0.5 * bx.h)
                    .set("font-size", font_size)
                    .set("font-family", "monospace")
                    .set("text-anchor", "middle")
                    .set("dominant-baseline", "middle"),
            );
        }
        parts_group = parts_group.add(part_group);
    }

    let mut collision_group = Group::new().set("id", "collision_lines");
    if options.highlight_collisions {
        for (i, j) in find_collisions(&placements) {
            let (a, b) = (effective_box(&placements[i]), effective_box(&placements[j]));
            let center = |bx: &AABB| (bx.x + 0.5 * bx.w, bx.y + 0.5 * bx.h);
            collision_group = collision_group.add(svg_util::data_to_path(
                svg_util::line_data(center(&a), center(&b)),
                &[
                    ("stroke", &*format!("{}", theme.collision_highlight_color)),
                    ("stroke-width", &*format!("{}", 2.0 * stroke_width)),
                    ("stroke-dasharray", &*format!("{} {}", 4.0 * stroke_width, 4.0 * stroke_width)),
                    ("stroke-linecap", "round"),
                ],
            ));
        }
    }

    Document::new()
        .set("viewBox", vbox)
        .add(sheet_group)
        .add(parts_group)
        .add(collision_group)
        .add(label)
}
