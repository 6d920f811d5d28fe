pub mod collector;
pub mod launch;
pub mod platform;
pub mod process;
pub mod snapshot;
pub mod tracker;
