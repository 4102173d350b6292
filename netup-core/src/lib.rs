//! Run orchestration for netup.
//!
//! Channel resolution and SDK installation come in through the port traits
//! in `netup-releases`, the
//! steps come in as `UpgradeStep` trait objects, and everything the run
//! produced leaves as a [`netup_types::report::UpgradeReport`] plus a patch
//! preview. The CLI decides how to render and where to write.

mod installer;
mod pipeline;
mod settings;

pub use installer::CommandSdkInstaller;
pub use pipeline::{RunOutcome, UpgradePipeline};
pub use settings::RunSettings;
