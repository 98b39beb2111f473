//! End-to-end tests running the `boxctl` binary against a temporary data
//! root.

use std::path::PathBuf;
use std::process::{Command, Output};

use tempfile::TempDir;

const TRIGGER: &str = "--generate-bash-completion";

/// A data root and config path private to one test.
struct Sandbox {
    dir: TempDir,
}

impl Sandbox {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    fn data_root(&self) -> String {
        self.dir.path().join("root").display().to_string()
    }

    fn config_path(&self) -> PathBuf {
        self.dir.path().join("boxctl.yaml")
    }

    fn command(&self) -> Command {
        let mut command = Command::new(env!("CARGO_BIN_EXE_boxctl"));
        command
            .env("BOXCTL_CONFIG", self.config_path())
            .env_remove("RUST_LOG");
        command
    }

    /// Runs `boxctl --data-root <root> <args>`.
    fn run(&self, args: &[&str]) -> Output {
        self.command()
            .arg("--data-root")
            .arg(self.data_root())
            .args(args)
            .output()
            .unwrap()
    }

    /// Runs `args`, asserting success, and returns stdout.
    fn ok(&self, args: &[&str]) -> String {
        let output = self.run(args);
        assert!(
            output.status.success(),
            "boxctl {args:?} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8(output.stdout).unwrap()
    }

    /// Completion candidates for the partial command line `line`.
    fn complete(&self, line: &[&str]) -> Vec<String> {
        let output = self
            .command()
            .arg("--data-root")
            .arg(self.data_root())
            .args(line)
            .arg(TRIGGER)
            .output()
            .unwrap();
        assert!(output.status.success());
        assert!(output.stderr.is_empty(), "{}", String::from_utf8_lossy(&output.stderr));
        String::from_utf8(output.stdout)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

fn has(candidates: &[String], name: &str) -> bool {
    candidates.iter().any(|c| c == name)
}

#[test]
fn test_completes_global_flag_values() {
    let sandbox = Sandbox::new();
    assert!(has(&sandbox.complete(&["--cgroup-manager"]), "cgroupfs"));
    assert!(has(&sandbox.complete(&["--snapshotter"]), "native"));
    assert!(has(&sandbox.complete(&["--storage-driver"]), "native"));
}

#[test]
fn test_completes_subcommands_on_empty_line() {
    let sandbox = Sandbox::new();
    let top = sandbox.complete(&[]);
    assert!(has(&top, "run"));
    assert!(has(&top, "network"));
    assert!(has(&sandbox.complete(&["volume"]), "inspect"));
}

#[test]
fn test_lone_dash_lists_subcommand_flags_only() {
    let sandbox = Sandbox::new();
    let flags = sandbox.complete(&["run", "-"]);
    assert!(has(&flags, "--network"));
    assert!(!has(&flags, "--namespace"));
    assert!(!has(&flags, "--cgroup-manager"));
}

#[test]
fn test_free_form_flag_values_defer_to_shell() {
    let sandbox = Sandbox::new();
    assert!(sandbox.complete(&["run", "--name"]).is_empty());
    assert!(sandbox.complete(&["run", "-e"]).is_empty());
    assert!(sandbox.complete(&["--data-root"]).is_empty());
    assert!(sandbox.complete(&["network", "create", "--subnet"]).is_empty());
}

#[test]
fn test_subcommand_boundary_lists_own_flags_then_names() {
    let sandbox = Sandbox::new();
    sandbox.ok(&["network", "create", "backend"]);
    assert_eq!(sandbox.complete(&["network", "rm"]), vec!["backend"]);

    sandbox.ok(&["volume", "create", "data"]);
    assert_eq!(sandbox.complete(&["volume", "rm"]), vec!["--force", "data"]);
    assert_eq!(sandbox.complete(&["volume", "rm", "-f"]), vec!["data"]);

    let run = sandbox.complete(&["run"]);
    assert!(has(&run, "--network"));
    assert!(!has(&run, "--namespace"));
    assert!(!has(&run, "--cgroup-manager"));
}

#[test]
fn test_short_prefix_prefers_subcommand_flags() {
    let sandbox = Sandbox::new();
    let flags = sandbox.complete(&["run", "-n"]);
    assert!(has(&flags, "--network"));
    assert!(has(&flags, "--name"));
    assert!(!has(&flags, "--namespace"));

    assert_eq!(sandbox.complete(&["run", "--ne"]), vec!["--network"]);
}

#[test]
fn test_completes_run_flag_values() {
    let sandbox = Sandbox::new();
    let networks = sandbox.complete(&["run", "--net"]);
    assert!(has(&networks, "bridge"));
    assert!(has(&networks, "host"));
    assert!(has(&sandbox.complete(&["run", "-it", "--rm", "--net"]), "bridge"));
    assert!(has(&sandbox.complete(&["run", "--restart"]), "always"));

    let caps = sandbox.complete(&["run", "--cap-add"]);
    assert!(has(&caps, "sys_admin"));
    assert!(!has(&caps, "CAP_SYS_ADMIN"));
}

#[test]
fn test_network_positionals() {
    let sandbox = Sandbox::new();
    assert!(has(&sandbox.complete(&["network", "inspect"]), "bridge"));
    let removable = sandbox.complete(&["network", "rm"]);
    assert!(!has(&removable, "bridge"));
    assert!(!has(&removable, "host"));

    sandbox.ok(&["network", "create", "backend"]);
    assert!(has(&sandbox.complete(&["network", "rm"]), "backend"));
    assert!(has(&sandbox.complete(&["run", "--net"]), "backend"));
}

#[test]
fn test_pulled_images_complete_after_flags() {
    let sandbox = Sandbox::new();
    assert_eq!(sandbox.ok(&["pull", "alpine"]).trim(), "alpine:latest");
    assert!(has(&sandbox.complete(&["run", "-i"]), "alpine:latest"));
    assert!(has(&sandbox.complete(&["run", "-it"]), "alpine:latest"));
}

#[test]
fn test_namespace_on_partial_line_is_honoured() {
    let sandbox = Sandbox::new();
    sandbox.ok(&["pull", "alpine"]);
    assert!(!has(&sandbox.complete(&["--namespace", "test", "run", "-i"]), "alpine:latest"));

    sandbox.ok(&["--namespace", "test", "pull", "busybox"]);
    let images = sandbox.complete(&["--namespace", "test", "run", "-i"]);
    assert!(has(&images, "busybox:latest"));
    assert!(!has(&images, "alpine:latest"));
    assert!(has(&sandbox.complete(&["--namespace"]), "test"));
}

#[test]
fn test_completion_survives_broken_config() {
    let sandbox = Sandbox::new();
    std::fs::write(sandbox.config_path(), "namespace: [unterminated").unwrap();
    assert!(has(&sandbox.complete(&["--cgroup-manager"]), "systemd"));

    let output = sandbox.run(&["ps"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).starts_with("error:"));
}

#[test]
fn test_config_file_supplies_defaults() {
    let sandbox = Sandbox::new();
    std::fs::write(sandbox.config_path(), "namespace: from-config\n").unwrap();
    sandbox.ok(&["volume", "create", "data"]);
    let namespaces = sandbox.ok(&["namespace", "ls"]);
    assert!(namespaces.lines().any(|l| l == "from-config"));
    // A flag overrides the file.
    assert!(sandbox.ok(&["-n", "default", "volume", "ls", "-q"]).is_empty());
}

#[test]
fn test_volume_rm_reports_partial_failure() {
    let sandbox = Sandbox::new();
    sandbox.ok(&["volume", "create", "a"]);
    sandbox.ok(&["volume", "create", "c"]);

    let output = sandbox.run(&["volume", "rm", "a", "b", "c"]);
    assert_eq!(output.status.code(), Some(1));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "a\nc\n");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.starts_with("error:"), "{stderr}");
    assert!(stderr.contains("\"b\""), "{stderr}");
    assert!(sandbox.ok(&["volume", "ls", "-q"]).is_empty());

    // Removing again only reports.
    let again = sandbox.run(&["volume", "remove", "a"]);
    assert_eq!(again.status.code(), Some(1));
    assert!(again.stdout.is_empty());
}

#[test]
fn test_network_create_checks_driver() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["network", "create", "--driver", "overlay", "backend"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("--driver"));
    assert!(!has(&sandbox.complete(&["network", "inspect"]), "backend"));

    sandbox.ok(&["network", "create", "-d", "macvlan", "backend"]);
    let json: serde_json::Value =
        serde_json::from_str(&sandbox.ok(&["network", "inspect", "backend"])).unwrap();
    assert_eq!(json[0]["Driver"], "macvlan");
}

#[test]
fn test_builtin_network_cannot_be_removed() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["network", "rm", "bridge"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("bridge"));
}

#[test]
fn test_inspect_prints_found_and_fails_on_missing() {
    let sandbox = Sandbox::new();
    sandbox.ok(&["volume", "create", "data"]);

    let output = sandbox.run(&["volume", "inspect", "data", "missing"]);
    assert_eq!(output.status.code(), Some(1));
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json.as_array().unwrap().len(), 1);
    assert_eq!(json[0]["Name"], "data");
    assert!(String::from_utf8_lossy(&output.stderr).contains("missing"));
}

#[test]
fn test_run_lifecycle() {
    let sandbox = Sandbox::new();
    let missing = sandbox.run(&["run", "alpine"]);
    assert_eq!(missing.status.code(), Some(1));

    // --rm without --detach removes the exited container.
    sandbox.ok(&["run", "--pull", "missing", "--rm", "alpine", "true"]);
    assert!(sandbox.ok(&["ps", "--all", "-q"]).is_empty());

    let id = sandbox.ok(&["run", "-d", "--name", "web", "-v", "data:/data", "alpine", "sleep", "60"]);
    assert_eq!(id.trim().len(), 64);
    assert!(sandbox.ok(&["ps"]).contains("web"));
    assert!(has(&sandbox.complete(&["rm"]), "web"));

    // The volume is in use and the container is running.
    assert_eq!(sandbox.run(&["volume", "rm", "data"]).status.code(), Some(1));
    assert_eq!(sandbox.run(&["rm", "web"]).status.code(), Some(1));
    assert_eq!(sandbox.ok(&["rm", "-f", "web"]), "web\n");
    assert_eq!(sandbox.ok(&["volume", "rm", "data"]), "data\n");
}

#[test]
fn test_rmi_accepts_listed_ids() {
    let sandbox = Sandbox::new();
    sandbox.ok(&["pull", "alpine"]);
    let ids = sandbox.ok(&["images", "-q"]);
    let id = ids.trim();
    assert_eq!(id.len(), 12);

    assert_eq!(sandbox.ok(&["rmi", id]), format!("{id}\n"));
    assert!(sandbox.ok(&["images", "-q"]).is_empty());
}

#[test]
fn test_run_rejects_bad_options() {
    let sandbox = Sandbox::new();
    sandbox.ok(&["pull", "alpine"]);
    assert_eq!(sandbox.run(&["run", "--restart", "sometimes", "alpine"]).status.code(), Some(1));
    assert_eq!(sandbox.run(&["run", "--cap-add", "bogus", "alpine"]).status.code(), Some(1));
    assert_eq!(sandbox.run(&["run", "--pull", "later", "alpine"]).status.code(), Some(1));
}

#[test]
fn test_completion_script() {
    let sandbox = Sandbox::new();
    let script = sandbox.ok(&["completion", "bash"]);
    assert!(script.contains(TRIGGER));
    assert!(script.contains("complete "));
}
