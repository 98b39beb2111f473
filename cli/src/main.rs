use std::path::PathBuf;

use boxctl_config::Config;
use boxctl_core::{
    CAPABILITIES, CGROUP_MANAGERS, CGROUPNS_MODES, NETWORK_DRIVERS, PULL_POLICIES,
    RESTART_POLICIES, RemoveOptions, ResourceEnumerator, ResourceKind, ResourceStore,
    extract_completion_args,
};
use boxctl_store::{ContainerConfig, ContainerStatus, NewContainer, StateStore};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

mod complete;
mod registry;

const DEBUG_FILTER: &str = "boxctl=debug,boxctl_core=debug,boxctl_config=debug,boxctl_store=debug";
const TRACE_FILTER: &str = "boxctl=trace,boxctl_core=trace,boxctl_config=trace,boxctl_store=trace";

#[derive(Debug, Parser)]
#[command(name = "boxctl", version)]
#[command(about = "Manage containers, images, volumes and networks")]
#[command(disable_help_subcommand = true)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

/// Flags accepted before or after any subcommand. Unset flags fall back to
/// the config file.
#[derive(Debug, Args)]
struct GlobalArgs {
    /// Enable debug logging.
    #[arg(long, global = true)]
    debug: bool,

    /// Enable trace logging.
    #[arg(long, global = true)]
    debug_full: bool,

    /// containerd address.
    #[arg(long, short = 'a', visible_alias = "host", visible_short_alias = 'H', global = true)]
    address: Option<String>,

    /// Namespace to operate in.
    #[arg(long, short = 'n', global = true)]
    namespace: Option<String>,

    /// Snapshotter for new containers.
    #[arg(long, visible_alias = "storage-driver", global = true)]
    snapshotter: Option<String>,

    /// Directory of CNI plugin binaries.
    #[arg(long, global = true)]
    cni_path: Option<PathBuf>,

    /// Directory of CNI network configurations.
    #[arg(long, global = true)]
    cni_netconfpath: Option<PathBuf>,

    /// Root directory of persistent state.
    #[arg(long, global = true)]
    data_root: Option<PathBuf>,

    /// Cgroup manager for new containers.
    #[arg(long, global = true)]
    cgroup_manager: Option<String>,

    /// Allow plain HTTP registries.
    #[arg(long, global = true)]
    insecure_registry: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a command in a new container.
    Run(RunArgs),
    /// List containers.
    Ps(PsArgs),
    /// Remove one or more containers.
    Rm(RmArgs),
    /// Pull an image.
    Pull(PullArgs),
    /// List images.
    Images(ListArgs),
    /// Remove one or more images.
    Rmi(RmArgs),
    /// Manage volumes.
    #[command(subcommand)]
    Volume(VolumeCommand),
    /// Manage networks.
    #[command(subcommand)]
    Network(NetworkCommand),
    /// Manage namespaces.
    #[command(subcommand)]
    #[command(visible_alias = "ns")]
    Namespace(NamespaceCommand),
    /// Generate shell completion scripts.
    #[command(subcommand)]
    Completion(CompletionCommand),
}

#[derive(Debug, Args)]
struct RunArgs {
    /// Keep STDIN open.
    #[arg(short = 'i', long)]
    interactive: bool,

    /// Allocate a pseudo-TTY.
    #[arg(short = 't', long)]
    tty: bool,

    /// Run the container in the background and print its ID.
    #[arg(short = 'd', long)]
    detach: bool,

    /// Remove the container when it exits.
    #[arg(long)]
    rm: bool,

    /// Container name.
    #[arg(long)]
    name: Option<String>,

    /// Connect the container to a network.
    #[arg(long, visible_alias = "net")]
    network: Option<String>,

    /// Restart policy (no, always, on-failure[:max-retries], unless-stopped).
    #[arg(long)]
    restart: Option<String>,

    /// Add a Linux capability.
    #[arg(long)]
    cap_add: Vec<String>,

    /// Drop a Linux capability.
    #[arg(long)]
    cap_drop: Vec<String>,

    /// Bind mount a volume (NAME:/target or /host:/target).
    #[arg(short = 'v', long)]
    volume: Vec<String>,

    /// Set an environment variable.
    #[arg(short = 'e', long)]
    env: Vec<String>,

    /// Pull the image before running (always, missing, never).
    #[arg(long)]
    pull: Option<String>,

    /// Cgroup namespace mode (host, private).
    #[arg(long)]
    cgroupns: Option<String>,

    /// Image to run.
    image: String,

    /// Command and arguments.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

#[derive(Debug, Args)]
struct PsArgs {
    /// Show all containers, not only running ones.
    #[arg(long)]
    all: bool,

    /// Only print container IDs.
    #[arg(short = 'q', long)]
    quiet: bool,
}

#[derive(Debug, Args)]
struct ListArgs {
    /// Only print IDs or names.
    #[arg(short = 'q', long)]
    quiet: bool,
}

#[derive(Debug, Args)]
struct RmArgs {
    /// Remove even if in use.
    #[arg(short = 'f', long)]
    force: bool,

    #[arg(required = true)]
    names: Vec<String>,
}

#[derive(Debug, Args)]
struct PullArgs {
    image: String,
}

#[derive(Debug, Args)]
struct NamesArgs {
    #[arg(required = true)]
    names: Vec<String>,
}

#[derive(Debug, Subcommand)]
enum VolumeCommand {
    /// Create a volume.
    Create(VolumeCreateArgs),
    /// List volumes.
    #[command(visible_alias = "list")]
    Ls(ListArgs),
    /// Display detailed information on one or more volumes.
    Inspect(NamesArgs),
    /// Remove one or more volumes.
    #[command(visible_alias = "remove")]
    Rm(RmArgs),
}

#[derive(Debug, Args)]
struct VolumeCreateArgs {
    /// Volume name; generated when omitted.
    name: Option<String>,
}

#[derive(Debug, Subcommand)]
enum NetworkCommand {
    /// Create a network.
    Create(NetworkCreateArgs),
    /// List networks.
    #[command(visible_alias = "list")]
    Ls(ListArgs),
    /// Display detailed information on one or more networks.
    Inspect(NamesArgs),
    /// Remove one or more networks.
    #[command(visible_alias = "remove")]
    Rm(NamesArgs),
}

#[derive(Debug, Args)]
struct NetworkCreateArgs {
    /// Network driver.
    #[arg(short = 'd', long, default_value = "bridge")]
    driver: String,

    /// Subnet in CIDR format.
    #[arg(long)]
    subnet: Option<String>,

    name: String,
}

#[derive(Debug, Subcommand)]
enum NamespaceCommand {
    /// List namespaces.
    #[command(visible_alias = "list")]
    Ls,
}

#[derive(Debug, Subcommand)]
enum CompletionCommand {
    /// Print the bash completion script.
    Bash,
}

/// Global settings after applying the config file.
#[derive(Debug)]
struct Settings {
    debug: bool,
    debug_full: bool,
    address: String,
    namespace: String,
    snapshotter: String,
    cgroup_manager: String,
    data_root: PathBuf,
    cni_path: PathBuf,
    cni_netconfpath: PathBuf,
    insecure_registry: bool,
}

impl Settings {
    fn resolve(global: GlobalArgs, config: Config) -> Result<Self, String> {
        let settings = Self {
            debug: global.debug || config.debug,
            debug_full: global.debug_full || config.debug_full,
            address: global.address.unwrap_or(config.address),
            namespace: global.namespace.unwrap_or(config.namespace),
            snapshotter: global.snapshotter.unwrap_or(config.snapshotter),
            cgroup_manager: global.cgroup_manager.unwrap_or(config.cgroup_manager),
            data_root: global.data_root.unwrap_or(config.data_root),
            cni_path: global.cni_path.unwrap_or(config.cni_path),
            cni_netconfpath: global.cni_netconfpath.unwrap_or(config.cni_netconfpath),
            insecure_registry: global.insecure_registry || config.insecure_registry,
        };
        check_choice("--cgroup-manager", &settings.cgroup_manager, CGROUP_MANAGERS)?;
        Ok(settings)
    }

    fn log_filter(&self) -> &'static str {
        if self.debug_full {
            TRACE_FILTER
        } else if self.debug {
            DEBUG_FILTER
        } else {
            "warn"
        }
    }

    fn open_store(&self) -> Result<StateStore, String> {
        StateStore::open(&self.data_root, &self.namespace).map_err(|e| e.to_string())
    }
}

fn main() {
    let argv: Vec<String> = std::env::args_os()
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect();
    if let Some(tokens) = extract_completion_args(&argv) {
        complete::run(&tokens);
        return;
    }

    let cli = Cli::parse();
    if let Err(err) = execute(cli) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn execute(cli: Cli) -> Result<(), String> {
    let config = Config::load_or_default(Config::default_path()).map_err(|e| e.to_string())?;
    let settings = Settings::resolve(cli.global, config)?;
    init_logging(&settings);
    debug!(
        address = %settings.address,
        cni_path = %settings.cni_path.display(),
        cni_netconfpath = %settings.cni_netconfpath.display(),
        data_root = %settings.data_root.display(),
        namespace = %settings.namespace,
        "resolved settings"
    );

    match cli.command {
        Command::Run(args) => run_container(&settings, args),
        Command::Ps(args) => run_ps(&settings, &args),
        Command::Rm(args) => run_remove(&settings, ResourceKind::Container, &args.names, args.force),
        Command::Pull(args) => run_pull(&settings, &args),
        Command::Images(args) => run_images(&settings, &args),
        Command::Rmi(args) => run_remove(&settings, ResourceKind::Image, &args.names, args.force),
        Command::Volume(command) => run_volume(&settings, command),
        Command::Network(command) => run_network(&settings, command),
        Command::Namespace(NamespaceCommand::Ls) => run_namespace_ls(&settings),
        Command::Completion(CompletionCommand::Bash) => {
            print!("{}", complete::BASH_SCRIPT);
            Ok(())
        }
    }
}

fn init_logging(settings: &Settings) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| settings.log_filter().into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn run_container(settings: &Settings, args: RunArgs) -> Result<(), String> {
    if let Some(restart) = &args.restart {
        check_restart(restart)?;
    }
    if let Some(mode) = &args.cgroupns {
        check_choice("--cgroupns", mode, CGROUPNS_MODES)?;
    }
    let cap_add = normalize_capabilities(&args.cap_add)?;
    let cap_drop = normalize_capabilities(&args.cap_drop)?;

    let store = settings.open_store()?;
    if let Some(policy) = args.pull.as_deref() {
        check_choice("--pull", policy, PULL_POLICIES)?;
        let known = store.image(&args.image).map_err(|e| e.to_string())?.is_some();
        if policy == "always" || (policy == "missing" && !known) {
            store.register_image(&args.image).map_err(|e| e.to_string())?;
        }
    }

    let auto_remove = args.rm;
    let record = store
        .create_container(NewContainer {
            name: args.name,
            image: args.image,
            command: args.command,
            network: args.network,
            restart: args.restart,
            detach: args.detach,
            volumes: args.volume,
            config: ContainerConfig {
                interactive: args.interactive,
                tty: args.tty,
                auto_remove,
                env: args.env,
                cap_add,
                cap_drop,
                binds: Vec::new(),
                cgroupns: args.cgroupns,
                snapshotter: settings.snapshotter.clone(),
                cgroup_manager: settings.cgroup_manager.clone(),
            },
        })
        .map_err(|e| e.to_string())?;
    println!("{}", record.id);

    // A foreground container has already exited.
    if auto_remove && record.status == ContainerStatus::Exited {
        store
            .remove_one(ResourceKind::Container, &record.id, RemoveOptions { force: true })
            .map_err(|e| format!("failed to remove container {}: {e}", record.name))?;
    }
    Ok(())
}

fn run_ps(settings: &Settings, args: &PsArgs) -> Result<(), String> {
    let store = settings.open_store()?;
    let containers: Vec<_> = store
        .containers()
        .map_err(|e| e.to_string())?
        .into_iter()
        .filter(|c| args.all || c.status == ContainerStatus::Running)
        .collect();

    if args.quiet {
        for container in &containers {
            println!("{}", short_id(&container.id));
        }
        return Ok(());
    }

    println!(
        "{:<14}{:<28}{:<24}{:<22}{:<10}NAMES",
        "CONTAINER ID", "IMAGE", "COMMAND", "CREATED", "STATUS"
    );
    for container in &containers {
        println!(
            "{:<14}{:<28}{:<24}{:<22}{:<10}{}",
            short_id(&container.id),
            container.image,
            format!("\"{}\"", truncate(&container.command.join(" "), 20)),
            container.created_at,
            container.status.as_str(),
            container.name
        );
    }
    Ok(())
}

fn run_pull(settings: &Settings, args: &PullArgs) -> Result<(), String> {
    debug!(insecure = settings.insecure_registry, image = %args.image, "pulling");
    let store = settings.open_store()?;
    let image = store.register_image(&args.image).map_err(|e| e.to_string())?;
    println!("{}", image.name);
    Ok(())
}

fn run_images(settings: &Settings, args: &ListArgs) -> Result<(), String> {
    let store = settings.open_store()?;
    let images = store.images().map_err(|e| e.to_string())?;

    if args.quiet {
        for image in &images {
            println!("{}", short_id(&image.id));
        }
        return Ok(());
    }

    println!("{:<40}{:<16}{:<14}CREATED", "REPOSITORY", "TAG", "IMAGE ID");
    for image in &images {
        let (repository, tag) = split_reference(&image.name);
        println!(
            "{:<40}{:<16}{:<14}{}",
            repository,
            tag,
            short_id(&image.id),
            image.created_at
        );
    }
    Ok(())
}

fn run_volume(settings: &Settings, command: VolumeCommand) -> Result<(), String> {
    let store = settings.open_store()?;
    match command {
        VolumeCommand::Create(args) => {
            let volume = store
                .create_volume(args.name.as_deref())
                .map_err(|e| e.to_string())?;
            println!("{}", volume.name);
            Ok(())
        }
        VolumeCommand::Ls(args) => {
            let volumes = store.volumes().map_err(|e| e.to_string())?;
            if !args.quiet {
                println!("{:<24}MOUNTPOINT", "VOLUME NAME");
            }
            for volume in &volumes {
                if args.quiet {
                    println!("{}", volume.name);
                } else {
                    println!("{:<24}{}", volume.name, volume.mountpoint);
                }
            }
            Ok(())
        }
        VolumeCommand::Inspect(args) => {
            inspect(ResourceKind::Volume, &args.names, |name| store.volume(name))
        }
        VolumeCommand::Rm(args) => {
            remove_all(&store, ResourceKind::Volume, &args.names, args.force)
        }
    }
}

fn run_network(settings: &Settings, command: NetworkCommand) -> Result<(), String> {
    let store = settings.open_store()?;
    match command {
        NetworkCommand::Create(args) => {
            check_choice("--driver", &args.driver, NETWORK_DRIVERS)?;
            let network = store
                .create_network(&args.name, &args.driver, args.subnet.as_deref())
                .map_err(|e| e.to_string())?;
            println!("{}", network.id);
            Ok(())
        }
        NetworkCommand::Ls(args) => {
            let networks = store.networks().map_err(|e| e.to_string())?;
            if !args.quiet {
                println!("{:<14}{:<24}DRIVER", "NETWORK ID", "NAME");
            }
            for network in &networks {
                if args.quiet {
                    println!("{}", short_id(&network.id));
                } else {
                    println!("{:<14}{:<24}{}", short_id(&network.id), network.name, network.driver);
                }
            }
            Ok(())
        }
        NetworkCommand::Inspect(args) => {
            inspect(ResourceKind::Network, &args.names, |name| store.network(name))
        }
        NetworkCommand::Rm(args) => remove_all(&store, ResourceKind::Network, &args.names, false),
    }
}

fn run_namespace_ls(settings: &Settings) -> Result<(), String> {
    let store = settings.open_store()?;
    let namespaces = store
        .enumerate(ResourceKind::Namespace)
        .map_err(|e| e.to_string())?;
    for namespace in namespaces {
        println!("{}", namespace.name);
    }
    Ok(())
}

fn run_remove(
    settings: &Settings,
    kind: ResourceKind,
    names: &[String],
    force: bool,
) -> Result<(), String> {
    let store = settings.open_store()?;
    remove_all(&store, kind, names, force)
}

/// Removes every name, printing each one removed. Failures are reported
/// together once all names were tried.
fn remove_all(
    store: &StateStore,
    kind: ResourceKind,
    names: &[String],
    force: bool,
) -> Result<(), String> {
    let result = store.remove(kind, names, RemoveOptions { force });
    for name in &result.removed {
        println!("{name}");
    }
    match result.into_error(kind) {
        Some(err) => Err(err.to_string()),
        None => Ok(()),
    }
}

/// Prints the records found for `names` as a JSON array. Missing names are
/// reported together after printing.
fn inspect<T, F>(kind: ResourceKind, names: &[String], lookup: F) -> Result<(), String>
where
    T: Serialize,
    F: Fn(&str) -> boxctl_store::Result<Option<T>>,
{
    let mut found = Vec::new();
    let mut missing = Vec::new();
    for name in names {
        match lookup(name).map_err(|e| e.to_string())? {
            Some(record) => found.push(record),
            None => missing.push(format!("\"{name}\"")),
        }
    }

    let json = serde_json::to_string_pretty(&found).map_err(|e| e.to_string())?;
    println!("{json}");

    if missing.is_empty() {
        Ok(())
    } else {
        Err(format!("no such {kind}(s): {}", missing.join(", ")))
    }
}

fn check_choice<'v>(flag: &str, value: &'v str, allowed: &[&str]) -> Result<&'v str, String> {
    if allowed.contains(&value) {
        Ok(value)
    } else {
        Err(format!(
            "invalid value {value:?} for {flag}, expected one of: {}",
            allowed.join(", ")
        ))
    }
}

/// Accepts a restart policy, with an optional retry count for `on-failure`.
fn check_restart(policy: &str) -> Result<(), String> {
    match policy.split_once(':') {
        Some(("on-failure", retries)) => retries
            .parse::<u32>()
            .map(|_| ())
            .map_err(|_| format!("invalid retry count {retries:?} in --restart")),
        Some(_) => Err(format!("invalid restart policy {policy:?}")),
        None => check_choice("--restart", policy, RESTART_POLICIES).map(|_| ()),
    }
}

/// Normalizes capability names to the lower case form without `CAP_`.
fn normalize_capabilities(raw: &[String]) -> Result<Vec<String>, String> {
    raw.iter()
        .map(|cap| {
            let lower = cap.to_ascii_lowercase();
            let name = lower.strip_prefix("cap_").unwrap_or(&lower);
            if name == "all" || CAPABILITIES.contains(&name) {
                Ok(name.to_string())
            } else {
                Err(format!("unknown capability {cap:?}"))
            }
        })
        .collect()
}

fn short_id(id: &str) -> &str {
    let hex = id.strip_prefix("sha256:").unwrap_or(id);
    hex.get(..12).unwrap_or(hex)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max - 1).collect();
        out.push('…');
        out
    }
}

/// Splits `repo:tag` at the tag separator, leaving registry ports alone.
fn split_reference(reference: &str) -> (&str, &str) {
    if let Some((repository, _digest)) = reference.split_once('@') {
        return (repository, "<none>");
    }
    match reference.rsplit_once(':') {
        Some((repository, tag)) if !tag.contains('/') => (repository, tag),
        _ => (reference, "<none>"),
    }
}
