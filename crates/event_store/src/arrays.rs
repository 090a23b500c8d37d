//! Dense-array exporters for mathematical post-processing.
//!
//! Each exporter performs one O(n) scanning copy out of the shards into a
//! contiguous nalgebra matrix; values keep the order of the store.

use contracts::Timestamp;
use nalgebra::{DVector, Dyn, OMatrix, U2};

use crate::EventStore;

/// Events represented as dense matrices.
#[derive(Debug, Clone)]
pub struct EventArrays {
    /// Nx1 timestamps, guaranteed non-decreasing
    pub timestamps: DVector<Timestamp>,
    /// Nx2 coordinates; first column x, second column y
    pub coordinates: OMatrix<i16, Dyn, U2>,
    /// Nx1 polarities; 0 negative, 1 positive
    pub polarities: DVector<u8>,
}

impl EventStore {
    /// Copy event timestamps into an Nx1 matrix.
    pub fn timestamps(&self) -> DVector<Timestamp> {
        DVector::from_iterator(self.len(), self.iter().map(|e| e.timestamp))
    }

    /// Copy event coordinates into an Nx2 matrix (x column, y column).
    pub fn coordinates(&self) -> OMatrix<i16, Dyn, U2> {
        let mut coordinates = OMatrix::<i16, Dyn, U2>::zeros(self.len());
        for (row, event) in self.iter().enumerate() {
            coordinates[(row, 0)] = event.x;
            coordinates[(row, 1)] = event.y;
        }
        coordinates
    }

    /// Copy event polarities into an Nx1 matrix of 0/1 values.
    pub fn polarities(&self) -> DVector<u8> {
        DVector::from_iterator(self.len(), self.iter().map(|e| u8::from(e.polarity)))
    }

    /// Deep copy of the whole store into dense matrices, in one pass.
    pub fn arrays(&self) -> EventArrays {
        let n = self.len();
        let mut timestamps = DVector::zeros(n);
        let mut coordinates = OMatrix::<i16, Dyn, U2>::zeros(n);
        let mut polarities = DVector::zeros(n);

        for (row, event) in self.iter().enumerate() {
            timestamps[row] = event.timestamp;
            coordinates[(row, 0)] = event.x;
            coordinates[(row, 1)] = event.y;
            polarities[row] = u8::from(event.polarity);
        }

        EventArrays {
            timestamps,
            coordinates,
            polarities,
        }
    }
}
