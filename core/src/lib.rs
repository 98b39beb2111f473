//! Shell completion and resource removal primitives for boxctl.
//!
//! This crate has no I/O of its own. It defines:
//!
//! - [`Registry`]: the validated description of global flags and
//!   subcommands ([`FlagSpec`], [`SubcommandSpec`]).
//! - [`resolve`]: the completion context resolver, producing a
//!   [`CompletionContext`] from the tokens typed so far.
//! - [`Dispatcher`]: turns a context into candidate lines, evaluating
//!   [`ProviderId`]s against compiled-in lists and a
//!   [`ResourceEnumerator`].
//! - [`extract_completion_args`]: the pre-pass that detects and strips the
//!   [`COMPLETION_TRIGGER`].
//! - [`ResourceStore`]: the best-effort removal contract, returning a
//!   [`RemovalResult`].
//!
//! # Example
//!
//! ```
//! use boxctl_core::*;
//!
//! struct Networks;
//!
//! impl ResourceEnumerator for Networks {
//!     fn enumerate(&self, _kind: ResourceKind) -> Result<Vec<ResourceEntry>, EnumerationError> {
//!         Ok(vec![ResourceEntry::protected("bridge"), ResourceEntry::new("backend")])
//!     }
//! }
//!
//! let registry = Registry::new(
//!     "boxctl",
//!     vec![FlagSpec::with_value("--namespace").with_alias("-n")],
//!     vec![
//!         SubcommandSpec::new("run").with_flag(
//!             FlagSpec::with_value("--network")
//!                 .with_provider(ProviderId::reference(ResourceKind::Network)),
//!         ),
//!         SubcommandSpec::new("network").with_subcommand(
//!             SubcommandSpec::new("rm").with_positional(ProviderId::removal(ResourceKind::Network)),
//!         ),
//!     ],
//! )
//! .unwrap();
//!
//! let dispatcher = Dispatcher::new(&registry, &Networks);
//! let argv = ["boxctl", "network", "rm", COMPLETION_TRIGGER];
//! let tokens = extract_completion_args(&argv).unwrap();
//! assert_eq!(dispatcher.render(&resolve(&registry, &tokens)), vec!["backend"]);
//!
//! let tokens = ["run", "--network"];
//! assert_eq!(dispatcher.render(&resolve(&registry, &tokens)), vec!["bridge", "backend"]);
//! ```

mod dispatch;
mod provider;
mod resolve;
mod resource;
mod trigger;
mod types;
mod validate;

pub use dispatch::{Completion, Dispatcher};
pub use provider::*;
pub use resolve::{CompletionContext, END_OF_FLAGS, Stage, resolve};
pub use resource::{
    EnumerationError, PartialRemoval, RemovalError, RemovalResult, RemoveOptions, ResourceEntry,
    ResourceEnumerator, ResourceKind, ResourceStore,
};
pub use trigger::{COMPLETION_TRIGGER, extract_completion_args};
pub use types::*;
pub use validate::{RegistryConflict, validate_registry};
