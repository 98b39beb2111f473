//! Builds the completion [`Registry`] from the clap command tree.
//!
//! Flag names, aliases and arity come from clap, so the registry can never
//! drift from what the parser accepts. Only the value providers are
//! declared here, keyed by subcommand path and argument id.

use boxctl_core::{
    FlagSpec, ProviderId, Registry, RegistryConflict, ResourceKind, StaticList, SubcommandSpec,
    flag_name,
};
use clap::{Arg, Command};

/// Argument ids clap adds on its own.
const BUILTIN_IDS: &[&str] = &["help", "version"];

/// Provider for the value of flag `id` declared at `path`.
fn flag_provider(path: &[&str], id: &str) -> Option<ProviderId> {
    let provider = match (path, id) {
        ([], "namespace") => ProviderId::reference(ResourceKind::Namespace),
        ([], "snapshotter") => ProviderId::Static(StaticList::Snapshotters),
        ([], "cgroup_manager") => ProviderId::Static(StaticList::CgroupManagers),
        (["run"], "network") => ProviderId::reference(ResourceKind::Network),
        (["run"], "restart") => ProviderId::Static(StaticList::RestartPolicies),
        (["run"], "cap_add" | "cap_drop") => ProviderId::Static(StaticList::Capabilities),
        (["run"], "volume") => ProviderId::reference(ResourceKind::Volume),
        (["run"], "pull") => ProviderId::Static(StaticList::PullPolicies),
        (["run"], "cgroupns") => ProviderId::Static(StaticList::CgroupnsModes),
        (["network", "create"], "driver") => ProviderId::Static(StaticList::NetworkDrivers),
        _ => return None,
    };
    Some(provider)
}

/// Positional provider of the subcommand at `path`, and whether it drives
/// every slot.
fn positional_provider(path: &[&str]) -> Option<(ProviderId, bool)> {
    let slot = match path {
        ["run"] => (ProviderId::reference(ResourceKind::Image), false),
        ["rm"] => (ProviderId::removal(ResourceKind::Container), true),
        ["rmi"] => (ProviderId::removal(ResourceKind::Image), true),
        ["volume", "inspect"] => (ProviderId::reference(ResourceKind::Volume), true),
        ["volume", "rm"] => (ProviderId::removal(ResourceKind::Volume), true),
        ["network", "inspect"] => (ProviderId::reference(ResourceKind::Network), true),
        ["network", "rm"] => (ProviderId::removal(ResourceKind::Network), true),
        _ => return None,
    };
    Some(slot)
}

/// Builds and validates the registry for `command`.
///
/// # Errors
///
/// Returns the first [`RegistryConflict`] in the declarations.
pub fn build_registry(mut command: Command) -> Result<Registry, RegistryConflict> {
    command.build();

    let globals = command
        .get_arguments()
        .filter(|arg| is_flag(arg))
        .map(|arg| flag_spec(arg, &[]))
        .collect();

    let mut path = Vec::new();
    let subcommands = subcommand_specs(&command, &mut path);

    Registry::new(command.get_name(), globals, subcommands)
}

fn subcommand_specs<'c>(parent: &'c Command, path: &mut Vec<&'c str>) -> Vec<SubcommandSpec> {
    let mut specs = Vec::new();
    for sub in parent.get_subcommands().filter(|sub| sub.get_name() != "help") {
        path.push(sub.get_name());

        let mut spec = SubcommandSpec::new(sub.get_name());
        for alias in sub.get_all_aliases() {
            spec = spec.with_alias(alias);
        }
        for arg in sub
            .get_arguments()
            .filter(|arg| is_flag(arg) && !arg.is_global_set())
        {
            spec = spec.with_flag(flag_spec(arg, path));
        }
        spec = match positional_provider(path) {
            Some((provider, true)) => spec.with_positional(provider),
            Some((provider, false)) => spec.with_leading_positional(provider),
            None => spec,
        };
        for child in subcommand_specs(sub, path) {
            spec = spec.with_subcommand(child);
        }

        path.pop();
        specs.push(spec);
    }
    specs
}

fn is_flag(arg: &Arg) -> bool {
    !arg.is_positional() && !arg.is_hide_set() && !BUILTIN_IDS.contains(&arg.get_id().as_str())
}

fn flag_spec(arg: &Arg, path: &[&str]) -> FlagSpec {
    let long = arg.get_long().map(flag_name);
    let short = arg.get_short().map(|c| flag_name(&c.to_string()));

    let mut names = long.into_iter().chain(short);
    let canonical = names.next().unwrap_or_else(|| flag_name(arg.get_id().as_str()));

    let mut spec = if arg.get_action().takes_values() {
        FlagSpec::with_value(&canonical)
    } else {
        FlagSpec::boolean(&canonical)
    };
    for alias in names {
        spec = spec.with_alias(&alias);
    }
    for alias in arg.get_all_aliases().unwrap_or_default() {
        spec = spec.with_alias(&flag_name(alias));
    }
    for alias in arg.get_all_short_aliases().unwrap_or_default() {
        spec = spec.with_alias(&flag_name(&alias.to_string()));
    }
    if let Some(provider) = flag_provider(path, arg.get_id().as_str()) {
        spec = spec.with_provider(provider);
    }
    spec
}
