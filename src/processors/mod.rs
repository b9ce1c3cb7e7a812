pub mod buffer;
pub mod coordinate_validator;
pub mod spatial_filter;

pub use buffer::{circular_buffer, Buffer, BufferParams};
pub use coordinate_validator::{CoordinateValidator, SkipReport};
pub use spatial_filter::{FilterOutcome, SpatialFilter};
