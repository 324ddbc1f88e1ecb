//! Wire protocol shared by every socket endpoint in the pipeline

pub mod event;
pub mod frame;

pub use event::{Event, EventKind};
pub use frame::{DEFAULT_MAX_FRAME_BYTES, encode, read_frame, write_frame};
