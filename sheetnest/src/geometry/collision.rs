use itertools::Itertools;

use crate::entities::{Placement, Sheet};
use crate::geometry::{AABB, effective_box};

/// Strict interior intersection test. Boxes sharing an edge or a corner do not overlap.
#[inline(always)]
pub fn overlaps(a: &AABB, b: &AABB) -> bool {
    a.x < b.x_max() && a.x_max() > b.x && a.y < b.y_max() && a.y_max() > b.y
}

/// Whether `bx` leaves the sheet rectangle `[0, sheet_width] × [0, sheet_height]`.
/// Touching the boundary is allowed.
#[inline(always)]
pub fn out_of_bounds(bx: &AABB, sheet_width: f64, sheet_height: f64) -> bool {
    bx.x < 0.0 || bx.y < 0.0 || bx.x_max() > sheet_width || bx.y_max() > sheet_height
}

/// Summed area of `boxes` divided by the sheet area.
/// Overlapping boxes are counted twice, so the ratio only stays within `[0, 1]` for a valid layout.
pub fn utilization(
    boxes: impl IntoIterator<Item = AABB>,
    sheet_width: f64,
    sheet_height: f64,
) -> f64 {
    let sheet_area = sheet_width * sheet_height;
    if sheet_area <= 0.0 {
        return 0.0;
    }
    let used: f64 = boxes.into_iter().map(|b| b.area()).sum();
    used / sheet_area
}

/// Index pairs `(i, j)`, `i < j`, of placements on the same sheet whose footprints overlap.
pub fn find_collisions(placements: &[Placement]) -> Vec<(usize, usize)> {
    let boxes = placements.iter().map(effective_box).collect_vec();
    (0..placements.len())
        .tuple_combinations()
        .filter(|&(i, j)| {
            placements[i].sheet_index == placements[j].sheet_index
                && overlaps(&boxes[i], &boxes[j])
        })
        .collect()
}

/// Indices of placements whose footprint leaves the sheet.
pub fn find_out_of_bounds(placements: &[Placement], sheet: &Sheet) -> Vec<usize> {
    placements
        .iter()
        .positions(|p| out_of_bounds(&effective_box(p), sheet.width, sheet.height))
        .collect()
}

#[cfg(test)]
mod tests {
    use float_cmp::approx_eq;
    use test_case::test_case;

    use super::*;

    #[test_case(AABB::new(0.0, 0.0, 10.0, 10.0), AABB::new(5.0, 5.0, 10.0, 10.0), true; "partial overlap")]
    #[test_case(AABB::new(0.0, 0.0, 10.0, 10.0), AABB::new(10.0, 0.0, 10.0, 10.0), false; "shared edge")]
    #[test_case(AABB::new(0.0, 0.0, 10.0, 10.0), AABB::new(10.0, 10.0, 5.0, 5.0), false; "shared corner")]
    #[test_case(AABB::new(0.0, 0.0, 10.0, 10.0), AABB::new(2.0, 2.0, 1.0, 1.0), true; "containment")]
    #[test_case(AABB::new(0.0, 0.0, 10.0, 10.0), AABB::new(20.0, 0.0, 1.0, 1.0), false; "disjoint")]
    fn overlap_cases(a: AABB, b: AABB, expected: bool) {
        assert_eq!(overlaps(&a, &b), expected);
        assert_eq!(overlaps(&b, &a), expected);
    }

    #[test_case(AABB::new(0.0, 0.0, 100.0, 50.0), false; "exactly filling")]
    #[test_case(AABB::new(-0.1, 0.0, 10.0, 10.0), true; "negative x")]
    #[test_case(AABB::new(95.0, 0.0, 10.0, 10.0), true; "past right edge")]
    #[test_case(AABB::new(0.0, 45.0, 10.0, 10.0), true; "past top edge")]
    fn bounds_cases(bx: AABB, expected: bool) {
        assert_eq!(out_of_bounds(&bx, 100.0, 50.0), expected);
    }

    #[test]
    fn degenerate_point_inside_a_box_collides() {
        let point = AABB::new(5.0, 5.0, 0.0, 0.0);
        let bx = AABB::new(0.0, 0.0, 10.0, 10.0);
        assert!(overlaps(&point, &bx));
        assert!(!overlaps(&AABB::new(10.0, 5.0, 0.0, 0.0), &bx));
    }

    #[test]
    fn utilization_ratio() {
        let full = utilization([AABB::new(0.0, 0.0, 10.0, 10.0)], 10.0, 10.0);
        assert!(approx_eq!(f64, full, 1.0));
        let doubled = utilization(
            [AABB::new(0.0, 0.0, 10.0, 10.0), AABB::new(0.0, 0.0, 10.0, 10.0)],
            10.0,
            10.0,
        );
        assert!(approx_eq!(f64, doubled, 2.0));
        assert_eq!(utilization(Vec::<AABB>::new(), 10.0, 10.0), 0.0);
        assert_eq!(utilization([AABB::new(0.0, 0.0, 1.0, 1.0)], 0.0, 10.0), 0.0);
    }
}
