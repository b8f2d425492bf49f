//! Cyclic color gradients for the palette texture.
//!
//! A palette is a list of weighted anchors. [`build_gradient`] closes the list
//! by repeating the first anchor at the end and linearly interpolates each
//! segment over a share of the target sample count proportional to its weight.
//! Segment lengths are truncated, so the result may be a few samples short of
//! the requested size.

use bytemuck::{Pod, Zeroable};

use crate::error::{NovaError, Result};
use crate::types::PaletteKind;

/// One RGBA8 texel.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct ColorEntry {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl ColorEntry {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WeightedAnchor {
    pub color: ColorEntry,
    pub weight: f32,
}

impl WeightedAnchor {
    pub const fn new(color: ColorEntry, weight: f32) -> Self {
        Self { color, weight }
    }
}

/// Samples the closed gradient through `anchors` into at most `target_size`
/// colors.
pub fn build_gradient(anchors: &[WeightedAnchor], target_size: u32) -> Result<Vec<ColorEntry>> {
    let total_weight: f32 = anchors.iter().map(|anchor| anchor.weight).sum();
    tracing::debug!(
        anchors = anchors.len(),
        target_size,
        total_weight,
        "building palette gradient"
    );

    if anchors.len() < 2 {
        return Err(NovaError::InvalidPalette(format!(
            "need at least 2 anchors, got {}",
            anchors.len()
        )));
    }
    if let Some(anchor) = anchors
        .iter()
        .find(|anchor| !anchor.weight.is_finite() || anchor.weight < 0.0)
    {
        return Err(NovaError::InvalidPalette(format!(
            "anchor weights must be finite and non-negative, got {}",
            anchor.weight
        )));
    }
    if !(total_weight > 0.0 && total_weight.is_finite()) {
        return Err(NovaError::InvalidPalette(format!(
            "total weight must be positive, got {total_weight}"
        )));
    }

    let mut colors = Vec::with_capacity(target_size as usize);
    let closing = anchors.first().copied();
    let cycle: Vec<WeightedAnchor> = anchors.iter().copied().chain(closing).collect();

    for pair in cycle.windows(2) {
        let (from, to) = (pair[0], pair[1]);
        let segment = from.weight / total_weight * target_size as f32;
        // Rounding may push the floors past the target by a sample.
        let remaining = target_size.saturating_sub(colors.len() as u32);
        let len = (segment as u32).min(remaining);
        if len == 0 {
            continue;
        }

        let step = |a: u8, b: u8| (f32::from(b) - f32::from(a)) / segment;
        let (dr, dg, db) = (
            step(from.color.r, to.color.r),
            step(from.color.g, to.color.g),
            step(from.color.b, to.color.b),
        );

        for j in 0..len {
            let j = j as f32;
            colors.push(ColorEntry::rgb(
                (f32::from(from.color.r) + j * dr) as u8,
                (f32::from(from.color.g) + j * dg) as u8,
                (f32::from(from.color.b) + j * db) as u8,
            ));
        }
    }

    if colors.is_empty() {
        return Err(NovaError::InvalidPalette(format!(
            "{target_size} samples are too few for {} anchors",
            anchors.len()
        )));
    }

    Ok(colors)
}

/// Builder over a list of weighted anchors.
#[derive(Clone, Debug)]
pub struct ColorPalette {
    anchors: Vec<WeightedAnchor>,
    size: u32,
}

impl ColorPalette {
    pub fn new(size: u32) -> Self {
        Self {
            anchors: Vec::new(),
            size,
        }
    }

    pub fn preset(kind: PaletteKind, size: u32) -> Self {
        let mut palette = Self::new(size);
        for color in preset_colors(kind) {
            palette.add(*color, 1.0);
        }
        palette
    }

    pub fn add(&mut self, color: ColorEntry, weight: f32) -> &mut Self {
        self.anchors.push(WeightedAnchor::new(color, weight));
        self
    }

    pub fn anchors(&self) -> &[WeightedAnchor] {
        &self.anchors
    }

    pub fn colors(&self) -> Result<Vec<ColorEntry>> {
        build_gradient(&self.anchors, self.size)
    }
}

const BLACK: ColorEntry = ColorEntry::rgb(0, 0, 0);
const WHITE: ColorEntry = ColorEntry::rgb(255, 255, 255);
const RED: ColorEntry = ColorEntry::rgb(255, 0, 0);
const ORANGE: ColorEntry = ColorEntry::rgb(255, 127, 0);
const YELLOW: ColorEntry = ColorEntry::rgb(255, 255, 0);
const GREEN: ColorEntry = ColorEntry::rgb(0, 255, 0);
const BLUE: ColorEntry = ColorEntry::rgb(0, 0, 255);
const INDIGO: ColorEntry = ColorEntry::rgb(75, 0, 130);
const VIOLET: ColorEntry = ColorEntry::rgb(148, 0, 211);

fn preset_colors(kind: PaletteKind) -> &'static [ColorEntry] {
    match kind {
        PaletteKind::Rainbow => &[BLACK, RED, ORANGE, YELLOW, GREEN, BLUE, INDIGO, VIOLET],
        PaletteKind::RainbowRev => &[BLACK, VIOLET, INDIGO, BLUE, GREEN, YELLOW, ORANGE, RED],
        PaletteKind::Red => &[BLACK, RED],
        PaletteKind::Green => &[BLACK, GREEN],
        PaletteKind::Blue => &[BLACK, BLUE],
        PaletteKind::BlackAndWhite => &[BLACK, WHITE],
        PaletteKind::BlackAndWhiteRev => &[WHITE, BLACK],
    }
}
