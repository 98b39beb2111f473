//! Completion mode.
//!
//! Entered when the completion trigger appears anywhere on the command
//! line. Candidates go to stdout one per line; nothing is written to stderr
//! and the exit code is always 0, so a broken config or store only costs
//! the user their suggestions.

use std::io::Write;
use std::path::PathBuf;

use boxctl_config::Config;
use boxctl_core::{Dispatcher, resolve};
use boxctl_store::StoreReader;
use clap::CommandFactory;

use crate::Cli;
use crate::registry::build_registry;

/// Bash script that feeds the words before the cursor back to `boxctl`.
///
/// The word under the cursor is only passed along when it starts with `-`,
/// so flag prefixes resolve while partial values are left to `compgen`.
pub const BASH_SCRIPT: &str = r##"# bash completion for boxctl
_boxctl_bash_autocomplete() {
    local cur opts
    COMPREPLY=()
    cur="${COMP_WORDS[COMP_CWORD]}"
    if [[ "$cur" == "-"* ]]; then
        opts=$("${COMP_WORDS[@]:0:$COMP_CWORD}" "${cur}" --generate-bash-completion 2>/dev/null)
    else
        opts=$("${COMP_WORDS[@]:0:$COMP_CWORD}" --generate-bash-completion 2>/dev/null)
    fi
    COMPREPLY=($(compgen -W "${opts}" -- "${cur}"))
    return 0
}
complete -o bashdefault -o default -F _boxctl_bash_autocomplete boxctl
"##;

/// Writes the candidates for `tokens` to stdout.
pub fn run(tokens: &[String]) {
    let mut out = std::io::stdout().lock();
    for candidate in candidates(tokens) {
        if writeln!(out, "{candidate}").is_err() {
            return;
        }
    }
}

fn candidates(tokens: &[String]) -> Vec<String> {
    let Ok(registry) = build_registry(Cli::command()) else {
        return Vec::new();
    };
    let ctx = resolve(&registry, tokens);

    // Values typed on the partial line win over the config file.
    let config = Config::load_or_default(Config::default_path()).unwrap_or_default();
    let namespace = ctx
        .value_of("--namespace")
        .map_or(config.namespace, str::to_string);
    let data_root = ctx
        .value_of("--data-root")
        .map_or(config.data_root, PathBuf::from);

    let reader = StoreReader::new(&data_root, &namespace);
    Dispatcher::new(&registry, &reader).render(&ctx)
}

#[cfg(test)]
mod tests {
    use boxctl_core::COMPLETION_TRIGGER;

    use super::*;

    fn complete(line: &[&str]) -> Vec<String> {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().display().to_string();
        let mut tokens = vec!["--data-root".to_string(), root];
        tokens.extend(line.iter().map(|t| t.to_string()));
        candidates(&tokens)
    }

    #[test]
    fn test_script_uses_trigger() {
        assert!(BASH_SCRIPT.contains(COMPLETION_TRIGGER));
        assert!(BASH_SCRIPT.contains("-F _boxctl_bash_autocomplete boxctl"));
    }

    #[test]
    fn test_static_values() {
        assert_eq!(complete(&["--cgroup-manager"]), vec!["cgroupfs", "systemd", "none"]);
        assert!(complete(&["run", "--restart"]).contains(&"unless-stopped".to_string()));
    }

    #[test]
    fn test_free_form_values_complete_nothing() {
        assert!(complete(&["run", "--name"]).is_empty());
        assert!(complete(&["--address"]).is_empty());
        assert!(complete(&["network", "create", "--subnet"]).is_empty());
    }

    #[test]
    fn test_subcommands_at_top_level() {
        let top = complete(&[]);
        assert!(top.contains(&"run".to_string()));
        assert!(top.contains(&"volume".to_string()));
        assert!(!top.contains(&"ns".to_string()));
    }

    #[test]
    fn test_empty_store_offers_builtin_networks() {
        assert_eq!(complete(&["network", "inspect"]), vec!["bridge", "host", "none"]);
        assert!(complete(&["network", "rm"]).is_empty());
        assert_eq!(complete(&["volume", "rm"]), vec!["--force"]);
    }
}
