use std::cmp::Reverse;
use std::time::Instant;

use anyhow::{Result, ensure};
use itertools::Itertools;
use log::{debug, info};
use ordered_float::OrderedFloat;

use crate::entities::{
    NestingResult, Part, Placement, Rotation, Sheet, UnitItem, expand_units, validate_parts,
};
use crate::util::assertions;

/// Deterministic First-Fit-Decreasing-Height shelf packer over an unbounded number of sheets.
///
/// Units are sorted by height (descending, stable) and each one goes to, in order of preference:
/// 1. the first existing shelf (any sheet, in creation order) with room for it,
/// 2. a new shelf stacked on top of the first sheet with vertical room left,
/// 3. a new sheet.
///
/// A unit which does not fit on an empty sheet in any orientation is left unplaced.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShelfPacker {
    /// Gap added after every unit on a shelf, and between stacked shelves
    pub kerf: f64,
    /// Retry every test with width and height swapped (90°) when the unrotated unit does not fit
    pub allow_rotation: bool,
}

impl ShelfPacker {
    pub fn new(kerf: f64) -> Result<Self> {
        ensure!(
            kerf.is_finite() && kerf >= 0.0,
            "kerf must be a finite, non-negative number, got {kerf}"
        );
        Ok(ShelfPacker {
            kerf,
            allow_rotation: true,
        })
    }

    pub fn with_rotation(mut self, allow_rotation: bool) -> Self {
        self.allow_rotation = allow_rotation;
        self
    }

    pub fn pack(&self, parts: &[Part], sheet: &Sheet) -> Result<NestingResult> {
        sheet.validate()?;
        validate_parts(parts)?;
        let start = Instant::now();

        let mut units = expand_units(parts);
        //stable sort, ties keep their input order
        units.sort_by_key(|u| Reverse(OrderedFloat(u.height)));

        let mut sheets: Vec<SheetState> = vec![];
        let mut placements = Vec::with_capacity(units.len());

        for unit in &units {
            match self.place_unit(unit, &mut sheets, sheet) {
                Some(p) => {
                    debug!(
                        "[SHELF] placed {} ({}x{}) at ({}, {}) on sheet {} [{}]",
                        p.part_id, p.width, p.height, p.x, p.y, p.sheet_index, p.rotation
                    );
                    placements.push(p);
                }
                None => debug!(
                    "[SHELF] {} ({}x{}) does not fit on an empty sheet, leaving it unplaced",
                    unit.part_id, unit.width, unit.height
                ),
            }
        }

        let result = NestingResult::from_placements(placements, sheets.len() as u32, sheet);

        debug_assert!(assertions::layout_valid(&result, parts, sheet));
        debug_assert!(assertions::no_empty_sheets(&result));

        info!(
            "[SHELF] placed {}/{} units on {} sheet(s) in {:.3}ms, utilization: [{}]",
            result.placements.len(),
            units.len(),
            result.sheets_used,
            start.elapsed().as_secs_f64() * 1000.0,
            result.utilization.iter().map(|u| format!("{:.3}", u)).join(", ")
        );

        Ok(result)
    }

    fn place_unit(
        &self,
        unit: &UnitItem,
        sheets: &mut Vec<SheetState>,
        sheet: &Sheet,
    ) -> Option<Placement> {
        let to_placement = |sheet_index: usize, (x, y, w, h, rotation): Slot| Placement {
            part_id: unit.part_id.to_string(),
            sheet_index: sheet_index as u32,
            x,
            y,
            rotation,
            width: w,
            height: h,
        };

        //a. existing shelves, across all sheets
        for (i, state) in sheets.iter_mut().enumerate() {
            if let Some(slot) = state.insert_on_shelf(unit, self, sheet) {
                return Some(to_placement(i, slot));
            }
        }

        //b. a new shelf on an existing sheet
        for (i, state) in sheets.iter_mut().enumerate() {
            if let Some(slot) = state.insert_on_new_shelf(unit, self, sheet) {
                return Some(to_placement(i, slot));
            }
        }

        //c. a new sheet
        let mut state = SheetState::default();
        let slot = state.insert_on_new_shelf(unit, self, sheet)?;
        sheets.push(state);
        Some(to_placement(sheets.len() - 1, slot))
    }

    /// The orientations to try, in order: unrotated, then (if allowed) rotated by 90°.
    fn orientations(&self, unit: &UnitItem) -> impl Iterator<Item = (f64, f64, Rotation)> {
        let rotated = (unit.height, unit.width, Rotation::Deg90);
        [(unit.width, unit.height, Rotation::Deg0)]
            .into_iter()
            .chain(self.allow_rotation.then_some(rotated))
    }
}

/// Position and effective dimensions of a unit that found a spot: `(x, y, w, h, rotation)`
type Slot = (f64, f64, f64, f64, Rotation);

#[derive(Clone, Debug)]
struct Shelf {
    y: f64,
    height: f64,
    x_cursor: f64,
}

#[derive(Clone, Debug, Default)]
struct SheetState {
    shelves: Vec<Shelf>,
}

impl SheetState {
    fn insert_on_shelf(&mut self, unit: &UnitItem, packer: &ShelfPacker, sheet: &Sheet) -> Option<Slot> {
        let kerf = packer.kerf;
        for shelf in self.shelves.iter_mut() {
            for (w, h, rotation) in packer.orientations(unit) {
                if h <= shelf.height && shelf.x_cursor + w + kerf <= sheet.width {
                    let x = shelf.x_cursor;
                    shelf.x_cursor += w + kerf;
                    return Some((x, shelf.y, w, h, rotation));
                }
            }
        }
        None
    }

    fn insert_on_new_shelf(&mut self, unit: &UnitItem, packer: &ShelfPacker, sheet: &Sheet) -> Option<Slot> {
        let kerf = packer.kerf;
        let y = match self.shelves.is_empty() {
            true => 0.0,
            false => self.stack_height() + kerf,
        };
        for (w, h, rotation) in packer.orientations(unit) {
            if y + h + kerf <= sheet.height && w + kerf <= sheet.width {
                self.shelves.push(Shelf {
                    y,
                    height: h,
                    x_cursor: w + kerf,
                });
                return Some((0.0, y, w, h, rotation));
            }
        }
        None
    }

    fn stack_height(&self) -> f64 {
        self.shelves
            .iter()
            .map(|s| s.y + s.height)
            .fold(0.0, f64::max)
    }
}

/// Packs `parts` onto as many copies of `sheet` as needed, keeping `kerf` between parts.
/// Units may be rotated by 90°.
pub fn shelf_pack(parts: &[Part], sheet: &Sheet, kerf: f64) -> Result<NestingResult> {
    ShelfPacker::new(kerf)?.pack(parts, sheet)
}
