// SkyPoint core: session model, consensus and store synchronisation.

pub mod app;
pub mod config;
pub mod consensus;
pub mod estimate;
pub mod protocol;
pub mod reconciler;
pub mod session;
pub mod sync;
