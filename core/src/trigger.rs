//! Completion trigger detection.
//!
//! The shell asks for candidates by re-running the program with
//! [`COMPLETION_TRIGGER`] appended. The trigger may appear anywhere in argv
//! and switches the whole invocation into completion mode. This pre-pass
//! runs before any argument parsing and hands the resolver a plain token
//! list.

/// Flag that switches the process into completion mode.
pub const COMPLETION_TRIGGER: &str = "--generate-bash-completion";

/// Strips the completion trigger from a full argv.
///
/// Returns `None` when `args` contains no trigger. Otherwise returns the
/// tokens after the program name with every trigger occurrence removed.
///
/// # Examples
///
/// ```
/// use boxctl_core::{COMPLETION_TRIGGER, extract_completion_args};
///
/// let argv = ["boxctl", "run", "--net", COMPLETION_TRIGGER];
/// assert_eq!(extract_completion_args(&argv), Some(vec!["run".to_string(), "--net".to_string()]));
/// assert_eq!(extract_completion_args(&["boxctl", "ps"]), None);
/// ```
pub fn extract_completion_args<S: AsRef<str>>(args: &[S]) -> Option<Vec<String>> {
    let rest = args.get(1..).unwrap_or_default();
    if !rest.iter().any(|arg| arg.as_ref() == COMPLETION_TRIGGER) {
        return None;
    }

    Some(
        rest.iter()
            .map(AsRef::as_ref)
            .filter(|arg| *arg != COMPLETION_TRIGGER)
            .map(str::to_string)
            .collect(),
    )
}
