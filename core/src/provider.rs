//! Value providers and the compiled-in enumerations behind them.
//!
//! A provider is identified by a [`ProviderId`], a plain `{kind, parameters}`
//! record attached to a [`FlagSpec`](crate::FlagSpec) or to a subcommand's
//! positional slot. Evaluation happens in exactly one place,
//! [`Dispatcher::provide`](crate::Dispatcher::provide).
//!
//! # Examples
//!
//! ```
//! use boxctl_core::{ProviderId, Purpose, ResourceKind, StaticList};
//!
//! let restart = ProviderId::Static(StaticList::RestartPolicies);
//! assert!(StaticList::RestartPolicies.values().contains(&"always"));
//!
//! let removable = ProviderId::removal(ResourceKind::Network);
//! assert_eq!(
//!     removable,
//!     ProviderId::Resource { kind: ResourceKind::Network, purpose: Purpose::Removal },
//! );
//! # let _ = restart;
//! ```

use serde::{Deserialize, Serialize};

use crate::resource::ResourceKind;

/// Cgroup managers accepted by `--cgroup-manager`.
pub const CGROUP_MANAGERS: &[&str] = &["cgroupfs", "systemd", "none"];

/// Snapshotters offered for `--snapshotter`.
pub const SNAPSHOTTERS: &[&str] = &["overlayfs", "native", "fuse-overlayfs", "stargz"];

/// Restart policies offered for `run --restart`.
///
/// `on-failure` additionally accepts a `:N` retry suffix, which is not
/// enumerated.
pub const RESTART_POLICIES: &[&str] = &["no", "always", "on-failure", "unless-stopped"];

/// Network drivers accepted by `network create --driver`.
pub const NETWORK_DRIVERS: &[&str] = &["bridge", "macvlan", "ipvlan"];

/// Pull policies accepted by `run --pull`.
pub const PULL_POLICIES: &[&str] = &["always", "missing", "never"];

/// Cgroup namespace modes accepted by `run --cgroupns`.
pub const CGROUPNS_MODES: &[&str] = &["host", "private"];

/// Linux capability names in their canonical spelling: lower case, without
/// the `CAP_` prefix. `all` stands for the full set.
pub const CAPABILITIES: &[&str] = &[
    "all",
    "audit_control",
    "audit_read",
    "audit_write",
    "block_suspend",
    "bpf",
    "checkpoint_restore",
    "chown",
    "dac_override",
    "dac_read_search",
    "fowner",
    "fsetid",
    "ipc_lock",
    "ipc_owner",
    "kill",
    "lease",
    "linux_immutable",
    "mac_admin",
    "mac_override",
    "mknod",
    "net_admin",
    "net_bind_service",
    "net_broadcast",
    "net_raw",
    "perfmon",
    "setfcap",
    "setgid",
    "setpcap",
    "setuid",
    "sys_admin",
    "sys_boot",
    "sys_chroot",
    "sys_module",
    "sys_nice",
    "sys_pacct",
    "sys_ptrace",
    "sys_rawio",
    "sys_resource",
    "sys_time",
    "sys_tty_config",
    "syslog",
    "wake_alarm",
];

/// A compiled-in enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StaticList {
    CgroupManagers,
    Snapshotters,
    RestartPolicies,
    Capabilities,
    NetworkDrivers,
    PullPolicies,
    CgroupnsModes,
}

impl StaticList {
    /// Returns the literal values of this enumeration, in declaration order.
    pub fn values(self) -> &'static [&'static str] {
        match self {
            Self::CgroupManagers => CGROUP_MANAGERS,
            Self::Snapshotters => SNAPSHOTTERS,
            Self::RestartPolicies => RESTART_POLICIES,
            Self::Capabilities => CAPABILITIES,
            Self::NetworkDrivers => NETWORK_DRIVERS,
            Self::PullPolicies => PULL_POLICIES,
            Self::CgroupnsModes => CGROUPNS_MODES,
        }
    }
}

/// Why a resource listing is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Purpose {
    /// Naming an existing resource (`run --network`, `network inspect`).
    /// Protected entries are included.
    Reference,
    /// Choosing something to delete (`network rm`). Protected entries are
    /// excluded.
    Removal,
}

/// Identifies the source of completion candidates for a flag value or a
/// positional slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderId {
    /// A fixed enumeration owned by this crate.
    Static(StaticList),
    /// A live listing from a resource store.
    Resource {
        kind: ResourceKind,
        purpose: Purpose,
    },
}

impl ProviderId {
    /// Live listing of every `kind` name, protected ones included.
    pub const fn reference(kind: ResourceKind) -> Self {
        Self::Resource {
            kind,
            purpose: Purpose::Reference,
        }
    }

    /// Live listing of the `kind` names that may be removed.
    pub const fn removal(kind: ResourceKind) -> Self {
        Self::Resource {
            kind,
            purpose: Purpose::Removal,
        }
    }
}
