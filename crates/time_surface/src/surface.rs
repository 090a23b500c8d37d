//! Plain last-timestamp surface.

use contracts::{Event, Frame, PipelineError, Timestamp};
use event_store::EventStore;
use nalgebra::DMatrix;

use crate::grid::{self, GrayScalar};
use crate::Surface;

/// Surface of the occurrence times of the most recent events.
///
/// A dense rows x cols grid where every cell holds the timestamp of the last
/// event seen at that pixel, 0 when no event arrived yet. The grid is
/// independently owned and never aliases store data.
#[derive(Debug, Clone)]
pub struct TimeSurface {
    data: DMatrix<Timestamp>,
}

impl TimeSurface {
    /// Create a new zero-initialized surface of the given size.
    pub fn new(rows: u32, cols: u32) -> Self {
        Self {
            data: DMatrix::zeros(rows as usize, cols as usize),
        }
    }

    /// Timestamp value at the given coordinates, bounds-checked.
    pub fn at(&self, y: i16, x: i16) -> Result<Timestamp, PipelineError> {
        if y < 0 || y as usize >= self.data.nrows() || x < 0 || x as usize >= self.data.ncols() {
            return Err(PipelineError::out_of_range(
                "attempted to access out-of-range value in time surface",
            ));
        }
        Ok(self.data[(y as usize, x as usize)])
    }

    /// Number of rows of the surface.
    pub fn rows(&self) -> i16 {
        self.data.nrows() as i16
    }

    /// Number of columns of the surface.
    pub fn cols(&self) -> i16 {
        self.data.ncols() as i16
    }

    /// True if the surface was created without a size.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Write the record's timestamp at its coordinates.
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

        self.data[(event.y as usize, event.x as usize)] = event.timestamp;
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

    /// Set all cells to a constant.
    pub fn fill(&mut self, value: Timestamp) {
        self.data.fill(value);
    }

    /// Export with values shifted by an offset so they fit `T` exactly while
    /// keeping the original time units. Returns the offset to add back.
    pub fn shifted<T: GrayScalar>(&self) -> (DMatrix<T>, i64) {
        grid::shifted(&self.data)
    }

    /// Export with the observed (or overridden) time window linearly
    /// rescaled into `T`'s full range. Units are not preserved.
    pub fn scaled<T: GrayScalar>(&self, lookback: Option<i64>) -> DMatrix<T> {
        grid::scaled(&self.data, lookback)
    }

    /// Ready-to-display Gray8 frame normalized against the observed maximum.
    pub fn generate_frame(&self) -> Frame {
        grid::render_frame(&self.data)
    }
}

impl Surface for TimeSurface {
    fn rows(&self) -> i16 {
        TimeSurface::rows(self)
    }

    fn cols(&self) -> i16 {
        TimeSurface::cols(self)
    }

    fn accept_event(&mut self, event: &Event) -> Result<(), PipelineError> {
        TimeSurface::accept_event(self, event)
    }

    fn at(&self, y: i16, x: i16) -> Result<Timestamp, PipelineError> {
        TimeSurface::at(self, y, x)
    }

    fn reset(&mut self) {
        TimeSurface::reset(self)
    }

    fn generate_frame(&self) -> Frame {
        TimeSurface::generate_frame(self)
    }
}

impl std::ops::AddAssign<i64> for TimeSurface {
    /// Add a constant to every cell, clamped at 0.
    fn add_assign(&mut self, rhs: i64) {
        self.data.apply(|v| *v = (*v + rhs).max(0));
    }
}

impl std::ops::SubAssign<i64> for TimeSurface {
    /// Subtract a constant from every cell, clamped at 0.
    fn sub_assign(&mut self, rhs: i64) {
        *self += -rhs;
    }
}

impl std::ops::Add<i64> for &TimeSurface {
    type Output = TimeSurface;

    fn add(self, rhs: i64) -> TimeSurface {
        let mut out = self.clone();
        out += rhs;
        out
    }
}

impl std::ops::Sub<i64> for &TimeSurface {
    type Output = TimeSurface;

    fn sub(self, rhs: i64) -> TimeSurface {
        let mut out = self.clone();
        out -= rhs;
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accept_overwrites_cell() {
        let mut surface = TimeSurface::new(4, 4);
        surface.accept_event(&Event::new(5, 0, 0, true)).unwrap();
        surface.accept_event(&Event::new(9, 0, 0, true)).unwrap();
        assert_eq!(surface.at(0, 0).unwrap(), 9);
        assert_eq!(surface.at(1, 1).unwrap(), 0);
    }

    #[test]
    fn test_accept_store_in_order() {
        let store = EventStore::from_events(vec![
            Event::new(1, 1, 0, true),
            Event::new(2, 1, 0, false),
            Event::new(3, 2, 3, true),
        ])
        .unwrap();

        let mut surface = TimeSurface::new(4, 4);
        surface.accept(&store).unwrap();
        assert_eq!(surface.at(0, 1).unwrap(), 2);
        assert_eq!(surface.at(3, 2).unwrap(), 3);
    }

    #[test]
    fn test_out_of_range_access_fails() {
        let surface = TimeSurface::new(4, 4);
        assert!(surface.at(4, 0).is_err());
        assert!(surface.at(0, -1).is_err());

        let mut surface = surface;
        assert!(surface.accept_event(&Event::new(1, 4, 0, true)).is_err());
    }

    #[test]
    fn test_arithmetic_clamps_at_zero() {
        let mut surface = TimeSurface::new(2, 2);
        surface.accept_event(&Event::new(10, 0, 0, true)).unwrap();

        surface -= 25;
        assert_eq!(surface.at(0, 0).unwrap(), 0);

        surface += 7;
        assert_eq!(surface.at(1, 1).unwrap(), 7);

        let shifted = &surface - 100;
        assert_eq!(shifted.at(0, 0).unwrap(), 0);
        // original untouched
        assert_eq!(surface.at(1, 1).unwrap(), 7);
    }

    #[test]
    fn test_reset_and_fill() {
        let mut surface = TimeSurface::new(2, 2);
        surface.fill(42);
        assert_eq!(surface.at(1, 0).unwrap(), 42);
        surface.reset();
        assert_eq!(surface.at(1, 0).unwrap(), 0);
    }

    #[test]
    fn test_generate_frame() {
        let mut surface = TimeSurface::new(2, 2);
        surface.accept_event(&Event::new(100, 0, 1, true)).unwrap();

        let frame = surface.generate_frame();
        assert_eq!(frame.timestamp, 100);
        assert_eq!((frame.width, frame.height), (2, 2));
        // cell (0,1) row-major index 1 carries the hottest value
        assert_eq!(frame.data[1], 255);
    }
}
