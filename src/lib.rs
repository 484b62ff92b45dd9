// RustyBitmap - Compressed Bitmap Engine for 32-bit Integer Sets
// Core library module

pub mod bitmap;
pub mod error;

mod container;

pub use bitmap::iter::Iter;
pub use bitmap::serialization::{NO_OFFSET_THRESHOLD, SERIAL_COOKIE, SERIAL_COOKIE_NO_RUNCONTAINER};
pub use bitmap::statistics::Statistics;
pub use bitmap::RoaringBitmap;
pub use error::{BitmapError, Result};
