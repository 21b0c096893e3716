//! Frame Input Layer
//!
//! Image acquisition itself (cameras, streams) belongs to the host application.
//! This layer only validates what the host hands over and converts it into the
//! RGB buffer the engine reads.

pub mod frame;

pub use frame::{ChannelOrder, Frame};
