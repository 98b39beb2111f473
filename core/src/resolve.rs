//! Completion context resolution.
//!
//! [`resolve`] walks the tokens already typed on the command line (the
//! completion trigger removed) and decides what the next word should be: a
//! subcommand, a flag or positional, or the value of a flag. It is a pure
//! function of the registry and the tokens; providers are only consulted
//! later by the [`Dispatcher`](crate::Dispatcher).
//!
//! Flag tokens inside a subcommand are looked up in the subcommand's own
//! scope first, with exact and prefix matching. The Global scope is only
//! consulted when that finds nothing, and then only for an exact name or
//! alias, so Global flags never leak into subcommand prefix listings.
//!
//! # Examples
//!
//! ```
//! use boxctl_core::*;
//!
//! let registry = Registry::new(
//!     "boxctl",
//!     vec![FlagSpec::with_value("--namespace").with_alias("-n")],
//!     vec![SubcommandSpec::new("run")
//!         .with_flag(FlagSpec::boolean("--interactive").with_alias("-i"))
//!         .with_flag(FlagSpec::with_value("--network").with_alias("--net"))],
//! )
//! .unwrap();
//!
//! let ctx = resolve(&registry, &["run", "-i", "--net"]);
//! assert_eq!(ctx.stage, Stage::ExpectingFlagValue);
//! assert_eq!(ctx.active_flag.unwrap().name, "--network");
//!
//! let ctx = resolve(&registry, &["-n", "prod", "run"]);
//! assert_eq!(ctx.value_of("--namespace"), Some("prod"));
//! assert_eq!(ctx.subcommand().unwrap().name, "run");
//! ```

use tracing::debug;

use crate::provider::ProviderId;
use crate::types::{FLAG_PREFIX, FlagSpec, LookupScope, MatchResult, Registry, SubcommandSpec};

/// Token that ends flag parsing.
pub const END_OF_FLAGS: &str = "--";

/// What kind of word is being completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ExpectingSubcommand,
    ExpectingFlagOrPositional,
    ExpectingFlagValue,
}

/// Output of [`resolve`].
///
/// `active_flag` is `Some` exactly when `stage` is
/// [`Stage::ExpectingFlagValue`].
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionContext<'a> {
    pub stage: Stage,
    /// Resolved subcommands, outermost first. Empty before any subcommand.
    pub path: Vec<&'a SubcommandSpec>,
    /// The value-taking flag whose value is being completed.
    pub active_flag: Option<&'a FlagSpec>,
    /// No curated candidates apply; the caller should fall back to its
    /// default completion.
    pub boring: bool,
    /// Canonical flags matched by an ambiguous trailing prefix.
    pub prefix_matches: Vec<&'a FlagSpec>,
    /// Boolean flags already given exactly.
    pub given: Vec<&'a FlagSpec>,
    /// Provider driving the next positional slot, if one is expected.
    pub next_positional: Option<ProviderId>,
    /// The last token as typed, if any.
    pub last_token: Option<String>,
    values: Vec<(&'a FlagSpec, String)>,
}

impl<'a> CompletionContext<'a> {
    /// The innermost resolved subcommand.
    pub fn subcommand(&self) -> Option<&'a SubcommandSpec> {
        self.path.last().copied()
    }

    /// Returns the last value typed for the flag with the given spelling.
    ///
    /// Any name or alias of the flag selects it, so `value_of("-n")` and
    /// `value_of("--namespace")` agree.
    pub fn value_of(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .rev()
            .find(|(flag, _)| flag.matches(name))
            .map(|(_, value)| value.as_str())
    }

    /// Whether `flag` was given exactly as a boolean flag.
    pub fn was_given(&self, flag: &FlagSpec) -> bool {
        self.given.iter().any(|given| std::ptr::eq(*given, flag))
    }
}

/// How the most recent token was interpreted.
#[derive(Debug)]
enum Last<'a> {
    Start,
    Subcommand,
    Flag,
    Awaiting(&'a FlagSpec),
    Value,
    Prefix(Vec<&'a FlagSpec>),
    NoMatch,
    Positional,
    Terminator,
    Leading,
}

/// Interpretation of a single flag token.
enum FlagToken<'a> {
    /// One or more complete flags; the last may still await its value.
    Flags(Vec<&'a FlagSpec>),
    Inline(&'a FlagSpec, String),
    Prefix(Vec<&'a FlagSpec>),
    Unknown,
}

struct Resolver<'a> {
    registry: &'a Registry,
    path: Vec<&'a SubcommandSpec>,
    given: Vec<&'a FlagSpec>,
    values: Vec<(&'a FlagSpec, String)>,
    positionals: usize,
    terminated: bool,
    last: Last<'a>,
}

impl<'a> Resolver<'a> {
    fn new(registry: &'a Registry) -> Self {
        Self {
            registry,
            path: Vec::new(),
            given: Vec::new(),
            values: Vec::new(),
            positionals: 0,
            terminated: false,
            last: Last::Start,
        }
    }

    fn leaf(&self) -> Option<&'a SubcommandSpec> {
        self.path.last().copied()
    }

    fn feed(&mut self, token: &str) {
        if let Last::Awaiting(flag) = self.last {
            self.values.push((flag, token.to_string()));
            self.last = Last::Value;
            return;
        }

        if !self.terminated && token == END_OF_FLAGS {
            self.terminated = true;
            self.last = Last::Terminator;
            return;
        }

        if !self.terminated && token.starts_with(FLAG_PREFIX) {
            self.last = match self.classify_flag(token) {
                FlagToken::Flags(flags) => self.commit(flags),
                FlagToken::Inline(flag, value) => {
                    if flag.takes_value {
                        self.values.push((flag, value));
                    } else {
                        self.mark_given(flag);
                    }
                    Last::Flag
                }
                FlagToken::Prefix(flags) => Last::Prefix(flags),
                FlagToken::Unknown => Last::NoMatch,
            };
            return;
        }

        self.last = self.bare(token);
    }

    fn commit(&mut self, flags: Vec<&'a FlagSpec>) -> Last<'a> {
        let mut last = Last::Flag;
        for flag in flags {
            if flag.takes_value {
                last = Last::Awaiting(flag);
            } else {
                self.mark_given(flag);
            }
        }
        last
    }

    fn mark_given(&mut self, flag: &'a FlagSpec) {
        if !self.given.iter().any(|given| std::ptr::eq(*given, flag)) {
            self.given.push(flag);
        }
    }

    fn bare(&mut self, token: &str) -> Last<'a> {
        let child = if self.terminated || self.positionals > 0 {
            None
        } else {
            match self.leaf() {
                None => self.registry.find_subcommand(token),
                Some(leaf) => leaf.find_subcommand(token),
            }
        };

        if let Some(child) = child {
            debug!(subcommand = %child.name, "resolved subcommand");
            self.path.push(child);
            self.positionals = 0;
            return Last::Subcommand;
        }

        if self.path.is_empty() {
            Last::Leading
        } else {
            self.positionals += 1;
            Last::Positional
        }
    }

    fn classify_flag(&self, token: &str) -> FlagToken<'a> {
        if let Some((name, value)) = token.split_once('=') {
            if name.starts_with("--") {
                return match self.exact(name) {
                    Some(flag) => FlagToken::Inline(flag, value.to_string()),
                    None => FlagToken::Unknown,
                };
            }
        }

        let scoped = match self.leaf() {
            Some(leaf) => self.registry.lookup(LookupScope::Subcommand(leaf), token),
            None => self.registry.lookup(LookupScope::Global, token),
        };

        match scoped {
            MatchResult::Exact(flag) => FlagToken::Flags(vec![flag]),
            MatchResult::Prefix(flags) => FlagToken::Prefix(flags),
            MatchResult::NoMatch => {
                if let Some(flag) = self.exact(token) {
                    FlagToken::Flags(vec![flag])
                } else if let Some(flags) = self.cluster(token) {
                    FlagToken::Flags(flags)
                } else {
                    FlagToken::Unknown
                }
            }
        }
    }

    /// Exact name or alias in the leaf scope, then in the Global scope.
    fn exact(&self, token: &str) -> Option<&'a FlagSpec> {
        let global = || match self.registry.lookup(LookupScope::Global, token) {
            MatchResult::Exact(flag) => Some(flag),
            _ => None,
        };
        match self.leaf() {
            Some(leaf) => match self.registry.lookup(LookupScope::Subcommand(leaf), token) {
                MatchResult::Exact(flag) => Some(flag),
                _ => global(),
            },
            None => global(),
        }
    }

    /// Splits `-abc` into `-a -b -c`. Every flag but the last must be boolean.
    fn cluster(&self, token: &str) -> Option<Vec<&'a FlagSpec>> {
        let shorts = token.strip_prefix(FLAG_PREFIX)?;
        if shorts.starts_with(FLAG_PREFIX) || shorts.chars().count() < 2 {
            return None;
        }

        let flags = shorts
            .chars()
            .map(|c| self.exact(&format!("{FLAG_PREFIX}{c}")))
            .collect::<Option<Vec<_>>>()?;
        let (_, init) = flags.split_last()?;
        if init.iter().any(|flag| flag.takes_value) {
            return None;
        }
        Some(flags)
    }

    fn finish(self, last_token: Option<String>) -> CompletionContext<'a> {
        let next_positional = self.leaf().and_then(|leaf| leaf.provider_for_slot(self.positionals));
        let expects_child = match self.leaf() {
            None => true,
            Some(leaf) => !leaf.subcommands.is_empty() && self.positionals == 0,
        };

        let mut ctx = CompletionContext {
            stage: Stage::ExpectingFlagOrPositional,
            path: self.path,
            active_flag: None,
            boring: false,
            prefix_matches: Vec::new(),
            given: self.given,
            next_positional,
            last_token,
            values: self.values,
        };

        match self.last {
            Last::Awaiting(flag) => {
                ctx.stage = Stage::ExpectingFlagValue;
                ctx.active_flag = Some(flag);
                ctx.boring = flag.value_provider.is_none();
            }
            Last::Prefix(flags) => ctx.prefix_matches = flags,
            Last::NoMatch | Last::Terminator => ctx.boring = true,
            Last::Positional if next_positional.is_none() => ctx.boring = true,
            _ if expects_child && !self.terminated => ctx.stage = Stage::ExpectingSubcommand,
            Last::Start | Last::Subcommand | Last::Flag | Last::Value | Last::Positional => {}
            Last::Leading => ctx.boring = true,
        }

        debug!(
            stage = ?ctx.stage,
            subcommand = ctx.subcommand().map(|s| s.name.as_str()),
            active_flag = ctx.active_flag.map(|f| f.name.as_str()),
            boring = ctx.boring,
            "resolved completion context"
        );
        ctx
    }
}

/// Resolves the completion context for `tokens`.
///
/// `tokens` are the words typed after the program name, with every
/// completion trigger removed.
pub fn resolve<'a, S: AsRef<str>>(registry: &'a Registry, tokens: &[S]) -> CompletionContext<'a> {
    let mut resolver = Resolver::new(registry);
    for token in tokens {
        resolver.feed(token.as_ref());
    }
    let last_token = tokens.last().map(|t| t.as_ref().to_string());
    resolver.finish(last_token)
}
