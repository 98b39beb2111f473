//! Candidate dispatch.
//!
//! Turns a [`CompletionContext`] into output lines. Every provider is
//! evaluated in [`Dispatcher::provide`]; enumeration failures are logged and
//! produce no candidates, since completion must never fail a user's shell.

use tracing::{debug, warn};

use crate::provider::{ProviderId, Purpose};
use crate::resolve::{CompletionContext, Stage};
use crate::resource::ResourceEnumerator;
use crate::types::{FLAG_PREFIX, FlagSpec, Registry};

/// What the completion driver should print.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// Curated candidates, one per output line.
    Candidates(Vec<String>),
    /// No curated list applies; use the default completion.
    Fallback,
}

/// Evaluates completion contexts against a registry and a resource
/// enumerator.
pub struct Dispatcher<'a> {
    registry: &'a Registry,
    resources: &'a dyn ResourceEnumerator,
}

impl<'a> Dispatcher<'a> {
    pub fn new(registry: &'a Registry, resources: &'a dyn ResourceEnumerator) -> Self {
        Self {
            registry,
            resources,
        }
    }

    /// Selects the candidate source for `ctx`.
    pub fn complete(&self, ctx: &CompletionContext<'_>) -> Completion {
        if ctx.boring {
            return Completion::Fallback;
        }

        let candidates = match ctx.stage {
            Stage::ExpectingSubcommand => {
                let subcommands = match ctx.subcommand() {
                    Some(sub) => sub.subcommands.as_slice(),
                    None => self.registry.subcommands(),
                };
                subcommands.iter().map(|sub| sub.name.clone()).collect()
            }
            Stage::ExpectingFlagValue => match ctx.active_flag.and_then(|f| f.value_provider) {
                Some(provider) => self.provide(provider),
                None => return Completion::Fallback,
            },
            Stage::ExpectingFlagOrPositional if !ctx.prefix_matches.is_empty() => {
                canonical_names(ctx.prefix_matches.iter().copied())
            }
            Stage::ExpectingFlagOrPositional => {
                // Global flags are only listed outside any subcommand.
                let scope = match ctx.subcommand() {
                    Some(sub) => sub.flags.as_slice(),
                    None => self.registry.global_flags(),
                };
                let remaining = scope
                    .iter()
                    .filter(|flag| flag.takes_value || !ctx.was_given(flag));
                let mut candidates = canonical_names(remaining);
                if let Some(provider) = ctx.next_positional {
                    candidates.extend(self.provide(provider));
                }
                candidates
            }
        };

        debug!(count = candidates.len(), "completion candidates");
        Completion::Candidates(candidates)
    }

    /// Evaluates a value provider.
    pub fn provide(&self, provider: ProviderId) -> Vec<String> {
        match provider {
            ProviderId::Static(list) => list.values().iter().map(|v| v.to_string()).collect(),
            ProviderId::Resource { kind, purpose } => match self.resources.enumerate(kind) {
                Ok(entries) => entries
                    .into_iter()
                    .filter(|entry| purpose == Purpose::Reference || !entry.protected)
                    .map(|entry| entry.name)
                    .collect(),
                Err(err) => {
                    warn!(%err, "no completion candidates");
                    Vec::new()
                }
            },
        }
    }

    /// Default completion used when the context is boring.
    ///
    /// A trailing flag-like token lists the leaf scope's own flags whose
    /// names start with it (Global flags only outside any subcommand).
    /// A pending flag value or any other token yields nothing, leaving the
    /// shell to complete file names.
    pub fn fallback(&self, ctx: &CompletionContext<'_>) -> Vec<String> {
        // A pending value is free-form; the shell completes file names.
        if ctx.active_flag.is_some() {
            return Vec::new();
        }
        let Some(token) = ctx.last_token.as_deref().filter(|t| t.starts_with(FLAG_PREFIX)) else {
            return Vec::new();
        };
        let stem = token.trim_start_matches(FLAG_PREFIX);
        let flags = match ctx.subcommand() {
            Some(sub) => sub.flags.as_slice(),
            None => self.registry.global_flags(),
        };
        canonical_names(flags.iter().filter(|flag| flag.stem().starts_with(stem)))
    }

    /// Curated candidates, or the default completion when there are none.
    pub fn render(&self, ctx: &CompletionContext<'_>) -> Vec<String> {
        match self.complete(ctx) {
            Completion::Candidates(candidates) => candidates,
            Completion::Fallback => self.fallback(ctx),
        }
    }
}

fn canonical_names<'f>(flags: impl Iterator<Item = &'f FlagSpec>) -> Vec<String> {
    flags.map(|flag| flag.name.clone()).collect()
}
