pub mod grouping;
pub mod loader;
pub mod state_manager;

pub use grouping::group_channels;
pub use loader::GuideLoader;
pub use state_manager::{LoadProgress, LoadState, LoadStateManager};
