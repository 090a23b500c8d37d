//! # Time Surface
//!
//! Per-pixel recency accumulators for event streams.
//!
//! Two variants share one capability surface, selected at construction time:
//! [`TimeSurface`] keeps the raw last-event timestamp per pixel,
//! [`SpeedInvariantTimeSurface`] keeps a bounded freshness counter whose
//! neighborhood decay makes it robust against motion speed.
//!
//! ## Example
//!
//! ```
//! use contracts::Event;
//! use time_surface::TimeSurface;
//!
//! let mut surface = TimeSurface::new(240, 320);
//! surface.accept_event(&Event::new(1_000, 10, 20, true)).unwrap();
//! assert_eq!(surface.at(20, 10).unwrap(), 1_000);
//! ```

mod grid;
mod speed_invariant;
mod surface;

pub use grid::GrayScalar;
pub use speed_invariant::SpeedInvariantTimeSurface;
pub use surface::TimeSurface;

use contracts::{Event, Frame, PipelineError, Timestamp};
use event_store::EventStore;

/// Capability set shared by the surface variants.
///
/// Lets callers hold either variant behind one interface; there is no shared
/// state besides each variant's own grid.
pub trait Surface {
    /// Number of rows of the grid.
    fn rows(&self) -> i16;

    /// Number of columns of the grid.
    fn cols(&self) -> i16;

    /// Apply a single event, bounds-checked.
    fn accept_event(&mut self, event: &Event) -> Result<(), PipelineError>;

    /// Apply every event of the store in order.
    fn accept(&mut self, store: &EventStore) -> Result<(), PipelineError> {
        for event in store {
            self.accept_event(event)?;
        }
        Ok(())
    }

    /// Cell value at the given coordinates, bounds-checked.
    fn at(&self, y: i16, x: i16) -> Result<Timestamp, PipelineError>;

    /// Set all cells to zero.
    fn reset(&mut self);

    /// Render a ready-to-display Gray8 frame.
    fn generate_frame(&self) -> Frame;
}
