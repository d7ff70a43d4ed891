use log::error;

use crate::entities::{NestingResult, Part, Placement, Sheet};
use crate::geometry::{find_collisions, find_out_of_bounds};

//Various checks to verify the correctness of a layout
//Used in debug_assert!() blocks

pub fn placements_in_bounds(placements: &[Placement], sheet: &Sheet) -> bool {
    let oob = find_out_of_bounds(placements, sheet);
    for &i in &oob {
        error!("placement out of bounds: {:?}", placements[i]);
    }
    oob.is_empty()
}

pub fn placements_disjoint(placements: &[Placement]) -> bool {
    let collisions = find_collisions(placements);
    for &(i, j) in &collisions {
        error!(
            "overlapping placements: {:?} and {:?}",
            placements[i], placements[j]
        );
    }
    collisions.is_empty()
}

pub fn sheet_indices_consistent(result: &NestingResult) -> bool {
    result.utilization.len() == result.sheets_used as usize
        && result
            .placements
            .iter()
            .all(|p| p.sheet_index < result.sheets_used)
}

/// Every used sheet carries at least one placement
pub fn no_empty_sheets(result: &NestingResult) -> bool {
    (0..result.sheets_used).all(|i| result.placements_on(i).next().is_some())
}

/// No part is placed more often than requested
pub fn quantities_respected(result: &NestingResult, parts: &[Part]) -> bool {
    parts.iter().all(|part| {
        let placed = result
            .placements
            .iter()
            .filter(|p| p.part_id == part.id)
            .count();
        placed <= part.quantity as usize
    })
}

pub fn layout_valid(result: &NestingResult, parts: &[Part], sheet: &Sheet) -> bool {
    sheet_indices_consistent(result)
        && placements_in_bounds(&result.placements, sheet)
        && placements_disjoint(&result.placements)
        && quantities_respected(result, parts)
}
