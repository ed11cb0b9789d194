//! Context window assembly for the line classifier

use crate::document::Line;
use rayon::prelude::*;
use std::ops::Range;

/// Feature value filling padded slots once a window is embedded
///
/// Out of range for real embeddings so a model can tell "no line" apart
/// from a line whose features are zero.
pub const PAD_FEATURE: f32 = -1.0;

/// The `2 * context + 1` lines centred on one stream position
///
/// Slots are ordered left to right. `None` marks a neighbour that does
/// not exist or is a structural pad line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextWindow<'a> {
    position: usize,
    slots: Vec<Option<&'a str>>,
}

impl<'a> ContextWindow<'a> {
    /// Flat stream index of the centre line
    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }

    #[must_use]
    pub fn slots(&self) -> &[Option<&'a str>] {
        &self.slots
    }

    /// Half-window size
    #[must_use]
    pub const fn context(&self) -> usize {
        self.slots.len() / 2
    }

    /// Text of the centre line, `None` for a pad line
    #[must_use]
    pub fn center(&self) -> Option<&'a str> {
        self.slots[self.context()]
    }

    /// Neighbour at signed distance `offset` from the centre
    #[must_use]
    pub fn neighbor(&self, offset: isize) -> Option<&'a str> {
        self.context()
            .checked_add_signed(offset)
            .and_then(|i| self.slots.get(i).copied().flatten())
    }

    #[must_use]
    pub fn is_pad(&self) -> bool {
        self.center().is_none()
    }

    /// Embed every slot, substituting [`PAD_FEATURE`] rows for padding
    pub fn embed_with<F>(&self, dim: usize, embed: F) -> Vec<Vec<f32>>
    where
        F: Fn(&str) -> Vec<f32>,
    {
        self.slots
            .iter()
            .map(|slot| slot.map_or_else(|| vec![PAD_FEATURE; dim], &embed))
            .collect()
    }
}

/// Build the context window of every position in `range`
///
/// Neighbours are taken from the whole stream, so how positions are
/// grouped into batches never changes a window.
#[must_use]
pub fn assemble(lines: &[Line], range: Range<usize>, context: usize) -> Vec<ContextWindow<'_>> {
    let range = range.start.min(lines.len())..range.end.min(lines.len());
    range
        .into_par_iter()
        .map(|position| window_at(lines, position, context))
        .collect()
}

fn window_at(lines: &[Line], position: usize, context: usize) -> ContextWindow<'_> {
    let slots = (0..=2 * context)
        .map(|k| {
            (position + k)
                .checked_sub(context)
                .and_then(|i| lines.get(i))
                .and_then(Line::text)
        })
        .collect();
    ContextWindow { position, slots }
}
