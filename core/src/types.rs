//! Flag registry type definitions.
//!
//! The registry is the static description of every global flag and every
//! subcommand's flags. It is built once at startup, validated, and only
//! read afterwards; the resolver and dispatcher take it by reference.
//!
//! Flag names are stored in their rendered form: `-x` for single-character
//! names and `--name` for longer ones. Use [`flag_name`] to render a bare
//! name.

use serde::{Deserialize, Serialize};

use crate::provider::ProviderId;
use crate::validate::{RegistryConflict, validate_registry};

/// Character that introduces a flag token.
pub const FLAG_PREFIX: char = '-';

/// Renders a bare flag name (`"n"`, `"network"`) as it is typed on the
/// command line. Names that already carry the prefix are returned as is.
///
/// # Examples
///
/// ```
/// use boxctl_core::flag_name;
///
/// assert_eq!(flag_name("n"), "-n");
/// assert_eq!(flag_name("network"), "--network");
/// assert_eq!(flag_name("--rm"), "--rm");
/// ```
pub fn flag_name(raw: &str) -> String {
    if raw.starts_with(FLAG_PREFIX) {
        raw.to_string()
    } else if raw.chars().count() == 1 {
        format!("{FLAG_PREFIX}{raw}")
    } else {
        format!("{FLAG_PREFIX}{FLAG_PREFIX}{raw}")
    }
}

/// Where a flag is declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Scope {
    /// Available before and after any subcommand.
    #[default]
    Global,
    /// Declared by one subcommand and visible only inside it.
    Subcommand,
}

/// Description of one flag.
///
/// # Examples
///
/// ```
/// use boxctl_core::{FlagSpec, ProviderId, ResourceKind};
///
/// let network = FlagSpec::with_value("--network")
///     .with_alias("--net")
///     .with_provider(ProviderId::reference(ResourceKind::Network));
/// assert!(network.matches("--net"));
/// assert!(network.takes_value);
///
/// let rm = FlagSpec::boolean("--rm");
/// assert!(!rm.takes_value);
/// assert!(rm.value_provider.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlagSpec {
    /// Canonical spelling, e.g. `--network`.
    pub name: String,
    /// Alternative spellings, e.g. `--net`, `-n`.
    pub aliases: Vec<String>,
    pub takes_value: bool,
    pub scope: Scope,
    /// Source of value candidates, if the flag is enumerable.
    pub value_provider: Option<ProviderId>,
}

impl FlagSpec {
    /// Creates a flag that takes no value.
    pub fn boolean(name: &str) -> Self {
        Self {
            name: name.to_string(),
            aliases: Vec::new(),
            takes_value: false,
            scope: Scope::Global,
            value_provider: None,
        }
    }

    /// Creates a flag that consumes a value.
    pub fn with_value(name: &str) -> Self {
        Self {
            takes_value: true,
            ..Self::boolean(name)
        }
    }

    /// Adds an alternative spelling.
    pub fn with_alias(mut self, alias: &str) -> Self {
        self.aliases.push(alias.to_string());
        self
    }

    /// Attaches a value provider.
    pub fn with_provider(mut self, provider: ProviderId) -> Self {
        self.value_provider = Some(provider);
        self
    }

    pub(crate) fn in_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// Canonical name followed by every alias.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }

    /// Checks whether `token` is exactly the canonical name or an alias.
    pub fn matches(&self, token: &str) -> bool {
        self.names().any(|name| name == token)
    }

    /// The canonical name without its leading prefix characters.
    pub fn stem(&self) -> &str {
        self.name.trim_start_matches(FLAG_PREFIX)
    }
}

/// Description of a subcommand.
///
/// # Examples
///
/// ```
/// use boxctl_core::{FlagSpec, ProviderId, ResourceKind, SubcommandSpec};
///
/// let rm = SubcommandSpec::new("rm")
///     .with_alias("remove")
///     .with_flag(FlagSpec::boolean("--force").with_alias("-f"))
///     .with_positional(ProviderId::removal(ResourceKind::Volume));
/// let volume = SubcommandSpec::new("volume").with_subcommand(rm);
///
/// assert!(volume.find_subcommand("remove").is_some());
/// let rm = volume.find_subcommand("rm").unwrap();
/// assert_eq!(rm.provider_for_slot(3), Some(ProviderId::removal(ResourceKind::Volume)));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubcommandSpec {
    pub name: String,
    pub aliases: Vec<String>,
    /// Flags declared by this subcommand, in declaration order.
    pub flags: Vec<FlagSpec>,
    /// Source of candidates for positional arguments.
    pub positional_provider: Option<ProviderId>,
    /// Whether the provider drives every positional slot or only the first.
    pub provider_repeats: bool,
    /// Nested subcommands (e.g. `volume rm`).
    pub subcommands: Vec<SubcommandSpec>,
}

impl SubcommandSpec {
    /// Creates a subcommand with the given name.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Adds an alternative name.
    pub fn with_alias(mut self, alias: &str) -> Self {
        self.aliases.push(alias.to_string());
        self
    }

    /// Adds a flag local to this subcommand.
    pub fn with_flag(mut self, flag: FlagSpec) -> Self {
        self.flags.push(flag.in_scope(Scope::Subcommand));
        self
    }

    /// Drives every positional slot from `provider` (`rm NAME...`).
    pub fn with_positional(mut self, provider: ProviderId) -> Self {
        self.positional_provider = Some(provider);
        self.provider_repeats = true;
        self
    }

    /// Drives only the first positional slot from `provider`
    /// (`run IMAGE [COMMAND...]`).
    pub fn with_leading_positional(mut self, provider: ProviderId) -> Self {
        self.positional_provider = Some(provider);
        self.provider_repeats = false;
        self
    }

    /// Adds a nested subcommand.
    pub fn with_subcommand(mut self, sub: SubcommandSpec) -> Self {
        self.subcommands.push(sub);
        self
    }

    /// Checks whether `token` is this subcommand's name or an alias.
    pub fn matches(&self, token: &str) -> bool {
        self.name == token || self.aliases.iter().any(|alias| alias == token)
    }

    /// Finds a nested subcommand by name or alias.
    pub fn find_subcommand(&self, token: &str) -> Option<&SubcommandSpec> {
        self.subcommands.iter().find(|sub| sub.matches(token))
    }

    /// Provider for the positional slot at `index` (zero based).
    pub fn provider_for_slot(&self, index: usize) -> Option<ProviderId> {
        if index == 0 || self.provider_repeats {
            self.positional_provider
        } else {
            None
        }
    }
}

/// Which flags a lookup searches.
#[derive(Debug, Clone, Copy)]
pub enum LookupScope<'a> {
    Global,
    /// The subcommand's own flags only. Global flags are not duplicated
    /// into a subcommand scope.
    Subcommand(&'a SubcommandSpec),
}

/// Result of [`Registry::lookup`].
#[derive(Debug, Clone, PartialEq)]
pub enum MatchResult<'a> {
    /// The token is a canonical name or an alias.
    Exact(&'a FlagSpec),
    /// The token is a strict prefix of one or more canonical names, in
    /// declaration order.
    Prefix(Vec<&'a FlagSpec>),
    NoMatch,
}

/// The validated, immutable flag registry.
///
/// # Examples
///
/// ```
/// use boxctl_core::*;
///
/// let registry = Registry::new(
///     "boxctl",
///     vec![FlagSpec::with_value("--namespace").with_alias("-n")],
///     vec![SubcommandSpec::new("run")
///         .with_flag(FlagSpec::with_value("--network"))
///         .with_flag(FlagSpec::with_value("--name"))],
/// )
/// .unwrap();
///
/// let run = registry.find_subcommand("run").unwrap();
/// assert!(matches!(
///     registry.lookup(LookupScope::Global, "-n"),
///     MatchResult::Exact(flag) if flag.name == "--namespace"
/// ));
/// assert!(matches!(
///     registry.lookup(LookupScope::Subcommand(run), "--n"),
///     MatchResult::Prefix(flags) if flags.len() == 2
/// ));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Registry {
    command: String,
    global_flags: Vec<FlagSpec>,
    subcommands: Vec<SubcommandSpec>,
}

impl Registry {
    /// Builds and validates a registry.
    ///
    /// # Errors
    ///
    /// Returns the first [`RegistryConflict`] found, such as a duplicated
    /// flag name within one scope or a subcommand flag reusing a global
    /// name.
    pub fn new(
        command: &str,
        global_flags: Vec<FlagSpec>,
        subcommands: Vec<SubcommandSpec>,
    ) -> Result<Self, RegistryConflict> {
        let registry = Self::unchecked(command, global_flags, subcommands);
        match validate_registry(&registry).into_iter().next() {
            Some(conflict) => Err(conflict),
            None => Ok(registry),
        }
    }

    /// Assembles a registry without validating it.
    pub(crate) fn unchecked(
        command: &str,
        global_flags: Vec<FlagSpec>,
        subcommands: Vec<SubcommandSpec>,
    ) -> Self {
        Self {
            command: command.to_string(),
            global_flags: global_flags
                .into_iter()
                .map(|flag| flag.in_scope(Scope::Global))
                .collect(),
            subcommands,
        }
    }

    /// The program name.
    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn global_flags(&self) -> &[FlagSpec] {
        &self.global_flags
    }

    /// Top-level subcommands in declaration order.
    pub fn subcommands(&self) -> &[SubcommandSpec] {
        &self.subcommands
    }

    /// Finds a top-level subcommand by name or alias.
    pub fn find_subcommand(&self, token: &str) -> Option<&SubcommandSpec> {
        self.subcommands.iter().find(|sub| sub.matches(token))
    }

    /// Matches a flag token against one scope.
    ///
    /// An exact name or alias always wins over prefix matches. Prefix
    /// matching compares the token and canonical names with their leading
    /// `-` removed, so `-n` is a prefix of `--network`. A token that is only
    /// prefix characters never matches.
    pub fn lookup<'a>(&'a self, scope: LookupScope<'a>, token: &str) -> MatchResult<'a> {
        let flags = match scope {
            LookupScope::Global => self.global_flags.as_slice(),
            LookupScope::Subcommand(sub) => sub.flags.as_slice(),
        };
        lookup_in(flags, token)
    }
}

fn lookup_in<'a>(flags: &'a [FlagSpec], token: &str) -> MatchResult<'a> {
    if !token.starts_with(FLAG_PREFIX) {
        return MatchResult::NoMatch;
    }
    if let Some(flag) = flags.iter().find(|flag| flag.matches(token)) {
        return MatchResult::Exact(flag);
    }

    let stem = token.trim_start_matches(FLAG_PREFIX);
    if stem.is_empty() {
        return MatchResult::NoMatch;
    }

    let matches: Vec<&FlagSpec> = flags
        .iter()
        .filter(|flag| flag.stem().len() > stem.len() && flag.stem().starts_with(stem))
        .collect();
    if matches.is_empty() {
        MatchResult::NoMatch
    } else {
        MatchResult::Prefix(matches)
    }
}
