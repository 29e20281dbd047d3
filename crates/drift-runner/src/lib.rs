//! Clone, detect, install, measure and persist, for every entry of a
//! repository list.

pub mod calculate;
pub mod config;
pub mod install;
pub mod pipeline;
pub mod process;
pub mod resolve;
pub mod source;
pub mod tools;
pub mod workspace;

pub use calculate::{calculate, parse_libyear_output};
pub use config::{RunConfig, Timeouts, CONFIG_FILE};
pub use install::install;
pub use pipeline::{EntryFailure, EntryOutcome, Pipeline, RunReport};
pub use resolve::{classify_yarn_version, detect_manager, resolve};
pub use source::{GitCli, MockSourceControl, SourceControl};
pub use tools::{MockTools, NodeTools, PackageTools};
pub use workspace::{provision, WorkspaceHandle, Workspaces};
