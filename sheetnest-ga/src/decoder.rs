use ordered_float::OrderedFloat;
use sheetnest::entities::Rotation;

use crate::chromosome::Chromosome;

/// A unit as seen by the decoder: the bounding box of its part, unrotated.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DecodeUnit {
    /// Index of the part this unit belongs to
    pub part: usize,
    pub width: f64,
    pub height: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DecodedPlacement {
    pub unit: usize,
    pub sheet_index: u32,
    pub x: f64,
    pub y: f64,
    pub rotation: Rotation,
    /// Effective (rotated) footprint
    pub width: f64,
    pub height: f64,
}

/// Multi-sheet layout produced from one [`Chromosome`]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Decoded {
    pub placements: Vec<DecodedPlacement>,
    pub sheets_used: u32,
    /// Footprint area placed on each sheet divided by the sheet area
    pub utilization: Vec<f64>,
}

impl Decoded {
    pub fn n_placed(&self) -> usize {
        self.placements.len()
    }

    /// Mean of the squared sheet utilizations. Rewards full sheets and a nearly empty last sheet.
    pub fn packing_quality(&self) -> f64 {
        match self.utilization.is_empty() {
            true => 0.0,
            false => {
                self.utilization.iter().map(|u| u * u).sum::<f64>() / self.utilization.len() as f64
            }
        }
    }

    /// Total placed area divided by the total area of the used sheets
    pub fn overall_utilization(&self) -> f64 {
        match self.utilization.is_empty() {
            true => 0.0,
            false => self.utilization.iter().sum::<f64>() / self.utilization.len() as f64,
        }
    }
}

/// Bottom-left skyline placer over an unbounded number of identical sheets.
///
/// Every unit is packed as a box inflated by `spacing` into a sheet inflated by `spacing`,
/// so real footprints stay inside the sheet and at least `spacing` apart.
#[derive(Clone, Copy, Debug)]
pub struct SkylineDecoder {
    pub sheet_width: f64,
    pub sheet_height: f64,
    pub spacing: f64,
}

impl SkylineDecoder {
    pub fn new(sheet_width: f64, sheet_height: f64, spacing: f64) -> Self {
        SkylineDecoder {
            sheet_width,
            sheet_height,
            spacing,
        }
    }

    pub fn decode(&self, units: &[DecodeUnit], chromosome: &Chromosome, rotations: &[Rotation]) -> Decoded {
        let mut skylines: Vec<Skyline> = vec![];
        let mut placements = Vec::with_capacity(units.len());
        let mut placed_area: Vec<f64> = vec![];

        for &u in &chromosome.order {
            let unit = &units[u];
            let gene = chromosome.rotations.get(u).copied().unwrap_or(0) % rotations.len().max(1);
            //the gene's rotation first, the other allowed rotations as fallback
            let candidates = rotations[gene..].iter().chain(&rotations[..gene]).copied();
            let orientations: Vec<(f64, f64, Rotation)> = candidates
                .map(|r| match r.swaps_axes() {
                    true => (unit.height, unit.width, r),
                    false => (unit.width, unit.height, r),
                })
                .collect();

            let existing = skylines.iter_mut().enumerate().find_map(|(i, skyline)| {
                self.insert(skyline, &orientations).map(|slot| (i, slot))
            });

            let found = existing.or_else(|| {
                let mut skyline = self.empty_skyline();
                let slot = self.insert(&mut skyline, &orientations)?;
                skylines.push(skyline);
                placed_area.push(0.0);
                Some((skylines.len() - 1, slot))
            });

            if let Some((sheet_index, (x, y, w, h, rotation))) = found {
                placed_area[sheet_index] += w * h;
                placements.push(DecodedPlacement {
                    unit: u,
                    sheet_index: sheet_index as u32,
                    x,
                    y,
                    rotation,
                    width: w,
                    height: h,
                });
            }
        }

        let sheet_area = self.sheet_width * self.sheet_height;
        Decoded {
            placements,
            sheets_used: skylines.len() as u32,
            utilization: placed_area.iter().map(|a| a / sheet_area).collect(),
        }
    }

    fn empty_skyline(&self) -> Skyline {
        Skyline::new(self.sheet_width + self.spacing, self.sheet_height + self.spacing)
    }

    /// Inserts the first orientation that fits at all, at its bottom-left-most position.
    fn insert(&self, skyline: &mut Skyline, orientations: &[(f64, f64, Rotation)]) -> Option<(f64, f64, f64, f64, Rotation)> {
        orientations.iter().find_map(|&(w, h, rotation)| {
            let (bw, bh) = (w + self.spacing, h + self.spacing);
            let (i, x, y) = skyline.find_position(bw, bh)?;
            skyline.insert(i, x, y, bw, bh);
            Some((x, y, w, h, rotation))
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Segment {
    x: f64,
    y: f64,
    w: f64,
}

/// Upper contour of everything placed on one sheet, as horizontal segments sorted on x
#[derive(Clone, Debug)]
struct Skyline {
    segments: Vec<Segment>,
    width: f64,
    height: f64,
}

impl Skyline {
    fn new(width: f64, height: f64) -> Self {
        Skyline {
            segments: vec![Segment {
                x: 0.0,
                y: 0.0,
                w: width,
            }],
            width,
            height,
        }
    }

    /// Lowest y at which a `w × h` box with its left side at segment `i` rests, if it fits
    fn fit_at(&self, i: usize, w: f64, h: f64) -> Option<f64> {
        let x = self.segments[i].x;
        if x + w > self.width {
            return None;
        }
        let y = self.segments[i..]
            .iter()
            .take_while(|s| s.x < x + w)
            .map(|s| s.y)
            .fold(self.segments[i].y, f64::max);
        match y + h <= self.height {
            true => Some(y),
            false => None,
        }
    }

    /// Bottom-left position: lowest y, then lowest x
    fn find_position(&self, w: f64, h: f64) -> Option<(usize, f64, f64)> {
        (0..self.segments.len())
            .filter_map(|i| self.fit_at(i, w, h).map(|y| (i, self.segments[i].x, y)))
            .min_by_key(|&(_, x, y)| (OrderedFloat(y), OrderedFloat(x)))
    }

    fn insert(&mut self, i: usize, x: f64, y: f64, w: f64, h: f64) {
        let end = x + w;
        let mut segments = Vec::with_capacity(self.segments.len() + 2);
        segments.extend_from_slice(&self.segments[..i]);
        segments.push(Segment { x, y: y + h, w });
        for s in &self.segments[i..] {
            let s_end = s.x + s.w;
            if s_end <= end {
                //fully covered by the new box
                continue;
            }
            if s.x < end {
                segments.push(Segment {
                    x: end,
                    y: s.y,
                    w: s_end - end,
                });
            } else {
                segments.push(*s);
            }
        }

        //merge neighbours at equal height, drop empty segments
        let mut merged: Vec<Segment> = Vec::with_capacity(segments.len());
        for s in segments.into_iter().filter(|s| s.w > 0.0) {
            match merged.last_mut() {
                Some(last) if last.y == s.y => last.w = s.x + s.w - last.x,
                _ => merged.push(s),
            }
        }
        self.segments = merged;
    }
}
