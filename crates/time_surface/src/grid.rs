//! Shared grid export math for the surface variants.

use bytes::Bytes;
use contracts::{Frame, FrameFormat, Timestamp};
use nalgebra::DMatrix;

mod sealed {
    pub trait Sealed {}
    impl Sealed for u8 {}
    impl Sealed for u16 {}
}

/// Integer pixel type a surface can be exported into.
pub trait GrayScalar: nalgebra::Scalar + Copy + sealed::Sealed {
    const MIN_VALUE: i64;
    const MAX_VALUE: i64;

    /// Convert a value already clamped into `[MIN_VALUE, MAX_VALUE]`.
    fn from_clamped(value: i64) -> Self;
}

impl GrayScalar for u8 {
    const MIN_VALUE: i64 = u8::MIN as i64;
    const MAX_VALUE: i64 = u8::MAX as i64;

    #[inline]
    fn from_clamped(value: i64) -> Self {
        value as u8
    }
}

impl GrayScalar for u16 {
    const MIN_VALUE: i64 = u16::MIN as i64;
    const MAX_VALUE: i64 = u16::MAX as i64;

    #[inline]
    fn from_clamped(value: i64) -> Self {
        value as u16
    }
}

/// Minimum and maximum over the non-zero cells. Zero cells were never
/// touched by an event and must not drag the range down.
pub(crate) fn nonzero_bounds(data: &DMatrix<i64>) -> (Timestamp, Timestamp) {
    let mut bounds = (i64::MAX, i64::MIN);
    for &value in data.iter() {
        if value != 0 {
            bounds.0 = bounds.0.min(value);
            bounds.1 = bounds.1.max(value);
        }
    }

    if bounds.1 < bounds.0 {
        (0, 0)
    } else {
        bounds
    }
}

/// Shift all values by one offset so the observed maximum fits `T` exactly,
/// preserving the original time units. Returns the matrix together with the
/// offset to add back to recover absolute values.
pub(crate) fn shifted<T: GrayScalar>(data: &DMatrix<i64>) -> (DMatrix<T>, i64) {
    let (_, max) = nonzero_bounds(data);
    let offset = max - T::MAX_VALUE;

    let out = data.map(|value| T::from_clamped((value - offset).clamp(T::MIN_VALUE, T::MAX_VALUE)));
    (out, offset)
}

/// Linearly rescale the observed (or overridden) time range into `T`'s full
/// value range. Units are not preserved, only relative recency.
pub(crate) fn scaled<T: GrayScalar>(data: &DMatrix<i64>, lookback: Option<i64>) -> DMatrix<T> {
    let (min, max) = nonzero_bounds(data);

    let mut span = lookback.unwrap_or(max - min);
    let mut floor = match lookback {
        Some(lb) => max - lb,
        None => min,
    };
    if span <= 0 {
        // degenerate window: map the freshest value to full scale
        span = 1;
        floor = max - 1;
    }

    let gain = (T::MAX_VALUE - T::MIN_VALUE) as f64 / span as f64;
    data.map(|value| {
        let rescaled = (value - floor) as f64 * gain + T::MIN_VALUE as f64;
        T::from_clamped((rescaled as i64).clamp(T::MIN_VALUE, T::MAX_VALUE))
    })
}

/// Render the grid into a ready-to-display Gray8 frame, normalized against
/// the observed maximum and stamped with it.
pub(crate) fn render_frame(data: &DMatrix<i64>) -> Frame {
    let pixels = scaled::<u8>(data, None);
    let (rows, cols) = (data.nrows(), data.ncols());

    // matrix storage is column-major, frames are row-major
    let mut bytes = Vec::with_capacity(rows * cols);
    for row in 0..rows {
        for col in 0..cols {
            bytes.push(pixels[(row, col)]);
        }
    }

    Frame {
        timestamp: if data.is_empty() { 0 } else { data.max() },
        width: cols as u32,
        height: rows as u32,
        format: FrameFormat::Gray8,
        data: Bytes::from(bytes),
    }
}
