//! Display side: overlay geometry, position files and the status board
//! that owns all render state.

mod overlay;
mod render;

pub use overlay::{OverlayRegion, PositionStore};
pub use render::{render_channel, ChannelRenderSink, RenderSink, StatusBoard};
