//! Frame sources: a region in, the freshest available frame out.

mod frame;
mod grabber;
mod polling;
mod region;
mod slots;
mod source;
mod streaming;

pub use frame::Frame;
pub use grabber::{ScreenGrabber, XcapGrabber};
pub use polling::PollingSource;
pub use region::{Region, RegionProvider};
pub use slots::{SlotLease, SlotPool};
pub use source::FrameSource;
pub use streaming::StreamingSource;
