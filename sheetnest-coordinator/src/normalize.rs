use std::collections::HashMap;

use anyhow::{Context, Result, bail, ensure};
use itertools::Itertools;
use sheetnest::entities::{NestingResult, Part, Placement, Rotation, Sheet};
use sheetnest::geometry::{PartPose, effective_box, find_collisions, find_out_of_bounds};
use sheetnest::util::assertions;

use crate::protocol::NestResultPayload;

/// Relative slack on the sheet bounds for optimizer output, absorbs rounding in their arithmetic
const BOUNDS_TOLERANCE: f64 = 1e-9;

/// Raw output of whichever backend ran a job
#[derive(Clone, Debug)]
pub enum BackendOutput {
    Heuristic(NestingResult),
    Advanced(NestResultPayload),
}

/// Maps the output of either backend to a [`NestingResult`].
///
/// Heuristic results are passed through. Advanced results are validated against the request
/// and rebuilt: footprints come from the part dimensions and the rotation, utilization is recomputed.
pub fn normalize(output: BackendOutput, parts: &[Part], sheet: &Sheet) -> Result<NestingResult> {
    match output {
        BackendOutput::Heuristic(result) => Ok(result),
        BackendOutput::Advanced(payload) => normalize_advanced(payload, parts, sheet),
    }
}

fn normalize_advanced(payload: NestResultPayload, parts: &[Part], sheet: &Sheet) -> Result<NestingResult> {
    ensure!(
        payload.utilization.len() == payload.sheets_used as usize,
        "unexpected payload: {} utilization entries for {} sheets",
        payload.utilization.len(),
        payload.sheets_used
    );
    let parts_by_id: HashMap<&str, &Part> = parts.iter().map(|p| (p.id.as_str(), p)).collect();
    let mut placed_qty: HashMap<&str, u32> = HashMap::new();

    let mut placements = Vec::with_capacity(payload.placements.len());
    for p in &payload.placements {
        let part = parts_by_id
            .get(p.part_id.as_str())
            .with_context(|| format!("unexpected payload: unknown part id '{}'", p.part_id))?;
        let rotation = Rotation::from_degrees(p.rotation).with_context(|| {
            format!(
                "unexpected payload: rotation {} of part '{}' is not a quarter turn",
                p.rotation, p.part_id
            )
        })?;
        ensure!(
            p.sheet_index < payload.sheets_used,
            "unexpected payload: sheet index {} of part '{}' is not below sheetsUsed ({})",
            p.sheet_index,
            p.part_id,
            payload.sheets_used
        );
        ensure!(
            p.x.is_finite() && p.y.is_finite() && p.x >= 0.0 && p.y >= 0.0,
            "unexpected payload: invalid position ({}, {}) of part '{}'",
            p.x,
            p.y,
            p.part_id
        );

        let count = placed_qty.entry(part.id.as_str()).or_default();
        *count += 1;
        ensure!(
            *count <= part.quantity,
            "unexpected payload: part '{}' placed more than its quantity ({})",
            part.id,
            part.quantity
        );

        let bx = effective_box(&PartPose {
            part,
            x: p.x,
            y: p.y,
            rotation,
        });
        placements.push(Placement {
            part_id: part.id.clone(),
            sheet_index: p.sheet_index,
            x: bx.x,
            y: bx.y,
            rotation,
            width: bx.w,
            height: bx.h,
        });
    }

    //indices are below sheetsUsed, so this only matches when no sheet is left empty
    let sheets_in_use = placements.iter().map(|p| p.sheet_index).unique().count() as u32;
    ensure!(
        payload.sheets_used == sheets_in_use,
        "unexpected payload: sheetsUsed is {}, placements occupy {} sheets",
        payload.sheets_used,
        sheets_in_use
    );

    let tolerance = BOUNDS_TOLERANCE * sheet.width.max(sheet.height);
    let slack_sheet = Sheet::new(sheet.width + tolerance, sheet.height + tolerance);
    if let Some(&i) = find_out_of_bounds(&placements, &slack_sheet).first() {
        bail!(
            "unexpected payload: part '{}' exceeds the sheet",
            placements[i].part_id
        );
    }
    if let Some(&(i, j)) = find_collisions(&placements).first() {
        bail!(
            "unexpected payload: parts '{}' and '{}' overlap on sheet {}",
            placements[i].part_id,
            placements[j].part_id,
            placements[i].sheet_index
        );
    }

    let result = NestingResult::from_placements(placements, payload.sheets_used, sheet);
    debug_assert!(assertions::sheet_indices_consistent(&result));
    debug_assert!(assertions::no_empty_sheets(&result));
    debug_assert!(assertions::quantities_respected(&result, parts));
    Ok(result)
}
