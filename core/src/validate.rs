//! Registry validation.
//!
//! Checks the structural invariants of a [`Registry`] at startup: every
//! flag name and alias is well formed and unique within its scope, no
//! subcommand redeclares a global spelling, and sibling subcommands have
//! distinct names and aliases. A conflict is a programming error in the
//! command declarations and is fatal; it can never arise while completing.
//!
//! # Examples
//!
//! ```
//! use boxctl_core::*;
//!
//! // A subcommand may not redeclare a global alias.
//! let conflict = Registry::new(
//!     "boxctl",
//!     vec![FlagSpec::with_value("--namespace").with_alias("-n")],
//!     vec![SubcommandSpec::new("run").with_flag(FlagSpec::with_value("--name").with_alias("-n"))],
//! )
//! .unwrap_err();
//! assert_eq!(
//!     conflict,
//!     RegistryConflict::ShadowsGlobalFlag { subcommand: "run".into(), name: "-n".into() },
//! );
//! ```

use std::collections::HashSet;

use thiserror::Error;

use crate::types::{FLAG_PREFIX, FlagSpec, Registry, SubcommandSpec};

/// Registry validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryConflict {
    /// Program name is empty or whitespace-only.
    #[error("registry command name cannot be empty")]
    EmptyCommandName,
    /// A flag name or alias is empty.
    #[error("flag name cannot be empty")]
    MissingFlagName,
    /// A flag name does not start with `-`, or is nothing but dashes.
    #[error("invalid flag name: {0}")]
    InvalidFlagName(String),
    /// Two flags in one scope share a name or alias.
    #[error("duplicate flag in {scope} scope: {name}")]
    DuplicateFlag { scope: String, name: String },
    /// A subcommand flag reuses a global name or alias.
    #[error("flag {name} of subcommand {subcommand} shadows a global flag")]
    ShadowsGlobalFlag { subcommand: String, name: String },
    /// A subcommand name is empty.
    #[error("subcommand name cannot be empty")]
    EmptySubcommandName,
    /// Two sibling subcommands share a name or alias.
    #[error("duplicate subcommand in scope: {0}")]
    DuplicateSubcommand(String),
}

/// Validates a registry, returning every conflict in declaration order.
pub fn validate_registry(registry: &Registry) -> Vec<RegistryConflict> {
    let mut errors = Vec::new();

    if registry.command().trim().is_empty() {
        errors.push(RegistryConflict::EmptyCommandName);
    }

    let mut global_names = HashSet::new();
    validate_flags(registry.global_flags(), "global", &mut global_names, &mut errors);

    let mut path = Vec::new();
    validate_subcommands(registry.subcommands(), &global_names, &mut path, &mut errors);

    errors
}

fn validate_subcommands(
    subcommands: &[SubcommandSpec],
    global_names: &HashSet<String>,
    path: &mut Vec<String>,
    errors: &mut Vec<RegistryConflict>,
) {
    let mut seen: HashSet<&str> = HashSet::new();

    for sub in subcommands {
        let name = sub.name.trim();
        if name.is_empty() {
            errors.push(RegistryConflict::EmptySubcommandName);
        }

        for spelling in std::iter::once(name).chain(sub.aliases.iter().map(String::as_str)) {
            if !spelling.is_empty() && !seen.insert(spelling) {
                errors.push(RegistryConflict::DuplicateSubcommand(spelling.to_string()));
            }
        }

        path.push(name.to_string());
        let scope = path.join(" ");

        for flag in &sub.flags {
            for shadowed in flag.names().filter(|n| global_names.contains(*n)) {
                errors.push(RegistryConflict::ShadowsGlobalFlag {
                    subcommand: scope.clone(),
                    name: shadowed.to_string(),
                });
            }
        }

        validate_flags(&sub.flags, &scope, &mut HashSet::new(), errors);
        validate_subcommands(&sub.subcommands, global_names, path, errors);
        path.pop();
    }
}

fn validate_flags(
    flags: &[FlagSpec],
    scope: &str,
    seen: &mut HashSet<String>,
    errors: &mut Vec<RegistryConflict>,
) {
    for flag in flags {
        for name in flag.names() {
            if name.is_empty() {
                errors.push(RegistryConflict::MissingFlagName);
            } else if !name.starts_with(FLAG_PREFIX) || name.trim_start_matches(FLAG_PREFIX).is_empty() {
                errors.push(RegistryConflict::InvalidFlagName(name.to_string()));
            } else if !seen.insert(name.to_string()) {
                errors.push(RegistryConflict::DuplicateFlag {
                    scope: scope.to_string(),
                    name: name.to_string(),
                });
            }
        }
    }
}
