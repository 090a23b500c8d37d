//! Speed-invariant surface, after <https://arxiv.org/abs/1903.11332>.
//!
//! Instead of raw timestamps, cells hold a bounded freshness counter: every
//! accepted event resets its own cell to a fixed ceiling and decrements the
//! surrounding patch cells that were fresher than the cell used to be. The
//! neighborhood races to decay relative to newly-fired pixels, which makes
//! the response much less sensitive to motion speed than plain
//! last-timestamp accumulation.

use contracts::{Event, Frame, PipelineError, Timestamp};
use event_store::EventStore;
use nalgebra::DMatrix;

use crate::grid::{self, GrayScalar};
use crate::Surface;

#[derive(Debug, Clone)]
pub struct SpeedInvariantTimeSurface {
    data: DMatrix<i64>,
    /// Half of the configured patch diameter
    half_patch: usize,
    /// Patch diameter; even, in (0, 16)
    patch: usize,
    /// Value a freshly seen pixel is reset to: (d + 1)^2
    ceiling: i64,
}

impl SpeedInvariantTimeSurface {
    /// Create a surface with the given grid size and patch diameter.
    ///
    /// The patch diameter must be even and within `(0, 16)`; the paper's
    /// radius `r` maps to a diameter of `2 * r`.
    pub fn new(rows: u32, cols: u32, patch_diameter: u32) -> Result<Self, PipelineError> {
        if patch_diameter == 0 || patch_diameter >= 16 || patch_diameter % 2 != 0 {
            return Err(PipelineError::invalid_argument(
                "patch diameter must be even and within (0, 16)",
            ));
        }

        let patch = patch_diameter as usize;
        Ok(Self {
            data: DMatrix::zeros(rows as usize, cols as usize),
            half_patch: patch / 2,
            patch,
            ceiling: ((patch_diameter + 1) * (patch_diameter + 1)) as i64,
        })
    }

    /// Freshness value at the given coordinates, bounds-checked.
    pub fn at(&self, y: i16, x: i16) -> Result<Timestamp, PipelineError> {
        if y < 0 || y as usize >= self.data.nrows() || x < 0 || x as usize >= self.data.ncols() {
            return Err(PipelineError::out_of_range(
                "attempted to access out-of-range value in time surface",
            ));
        }
        Ok(self.data[(y as usize, x as usize)])
    }

    pub fn rows(&self) -> i16 {
        self.data.nrows() as i16
    }

    pub fn cols(&self) -> i16 {
        self.data.ncols() as i16
    }

    /// Apply the speed-invariant update for one event.
    pub fn accept_event(&mut self, event: &Event) -> Result<(), PipelineError> {
        if event.y < 0
            || event.y as usize >= self.data.nrows()
            || event.x < 0
            || event.x as usize >= self.data.ncols()
        {
            return Err(PipelineError::out_of_range(
                "event coordinates outside the time surface",
            ));
        }

        let (y, x) = (event.y as usize, event.x as usize);
        let half = self.half_patch;
        // cells compare against the value the fired pixel had before this event
        let previous = self.data[(y, x)];

        let interior = y > half
            && y + half < self.data.nrows()
            && x > half
            && x + half < self.data.ncols();

        if interior {
            // safe to apply the fixed-size bulk update
            let mut area = self.data.view_mut((y - half, x - half), (self.patch, self.patch));
            area.apply(|value| {
                if *value > previous {
                    *value -= 1;
                }
            });
        } else {
            // close to an edge, resort to a bounds-clamped loop
            let row_start = y.saturating_sub(half);
            let row_end = (y + half).min(self.data.nrows() - 1);
            let col_start = x.saturating_sub(half);
            let col_end = (x + half).min(self.data.ncols() - 1);

            for row in row_start..=row_end {
                for col in col_start..=col_end {
                    let value = &mut self.data[(row, col)];
                    if *value > previous {
                        *value -= 1;
                    }
                }
            }
        }

        self.data[(y, x)] = self.ceiling;
        Ok(())
    }

    /// Apply every event of the store in order.
    pub fn accept(&mut self, store: &EventStore) -> Result<(), PipelineError> {
        for event in store {
            self.accept_event(event)?;
        }
        Ok(())
    }

    /// Set all cells to zero.
    pub fn reset(&mut self) {
        self.data.fill(0);
    }

    /// Export with the observed window rescaled into `T`'s full range.
    pub fn scaled<T: GrayScalar>(&self, lookback: Option<i64>) -> DMatrix<T> {
        grid::scaled(&self.data, lookback)
    }

    /// Ready-to-display Gray8 frame normalized against the observed maximum.
    pub fn generate_frame(&self) -> Frame {
        grid::render_frame(&self.data)
    }
}

impl Surface for SpeedInvariantTimeSurface {
    fn rows(&self) -> i16 {
        SpeedInvariantTimeSurface::rows(self)
    }

    fn cols(&self) -> i16 {
        SpeedInvariantTimeSurface::cols(self)
    }

    fn accept_event(&mut self, event: &Event) -> Result<(), PipelineError> {
        SpeedInvariantTimeSurface::accept_event(self, event)
    }

    fn at(&self, y: i16, x: i16) -> Result<Timestamp, PipelineError> {
        SpeedInvariantTimeSurface::at(self, y, x)
    }

    fn reset(&mut self) {
        SpeedInvariantTimeSurface::reset(self)
    }

    fn generate_frame(&self) -> Frame {
        SpeedInvariantTimeSurface::generate_frame(self)
    }
}
