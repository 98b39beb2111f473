//! Integration tests for the boxctl-store crate.

use boxctl_core::{
    Dispatcher, RemovalError, RemoveOptions, ResourceEnumerator, ResourceKind, ResourceStore,
    resolve,
};
use boxctl_core::{FlagSpec, ProviderId, Registry, SubcommandSpec};
use boxctl_store::{
    ContainerConfig, NewContainer, STATE_DB, StateStore, StoreError, StoreReader,
};
use tempfile::TempDir;

/// Opens a store in a fresh temporary data root.
fn store(namespace: &str) -> (TempDir, StateStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::open(dir.path(), namespace).unwrap();
    (dir, store)
}

fn names(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|n| n.to_string()).collect()
}

fn entry_names(store: &dyn ResourceEnumerator, kind: ResourceKind) -> Vec<String> {
    store
        .enumerate(kind)
        .unwrap()
        .into_iter()
        .map(|e| e.name)
        .collect()
}

/// A container that mounts `volume` and joins `network`.
fn container(image: &str, volume: &str, network: &str) -> NewContainer {
    NewContainer {
        name: Some("web".to_string()),
        image: image.to_string(),
        command: vec!["sh".to_string(), "-c".to_string(), "sleep 1".to_string()],
        network: Some(network.to_string()),
        restart: Some("always".to_string()),
        detach: true,
        volumes: vec![format!("{volume}:/data"), "/etc/hosts:/etc/hosts".to_string()],
        config: ContainerConfig {
            env: vec!["A=1".to_string()],
            ..ContainerConfig::default()
        },
    }
}

#[test]
fn test_volume_create_and_remove_manage_data_dir() {
    let (_dir, store) = store("default");
    let volume = store.create_volume(Some("data")).unwrap();
    let data_dir = store.volume_dir("data");
    assert!(data_dir.join("_data").is_dir());
    assert_eq!(volume.mountpoint, data_dir.join("_data").display().to_string());

    let result = store.remove(ResourceKind::Volume, &names(&["data"]), RemoveOptions::default());
    assert!(result.is_success());
    assert!(!data_dir.exists());
    assert!(store.volume("data").unwrap().is_none());
}

#[test]
fn test_generated_volume_name() {
    let (_dir, store) = store("default");
    let volume = store.create_volume(None).unwrap();
    assert_eq!(volume.name.len(), 64);
    assert!(volume.name.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn test_duplicate_and_invalid_volume_names() {
    let (_dir, store) = store("default");
    store.create_volume(Some("data")).unwrap();
    assert!(matches!(
        store.create_volume(Some("data")),
        Err(StoreError::AlreadyExists { .. })
    ));
    assert!(matches!(
        store.create_volume(Some("../etc")),
        Err(StoreError::InvalidName { .. })
    ));
}

#[test]
fn test_best_effort_removal_continues_past_missing() {
    let (_dir, store) = store("default");
    store.create_volume(Some("a")).unwrap();
    store.create_volume(Some("c")).unwrap();

    let result = store.remove(
        ResourceKind::Volume,
        &names(&["a", "b", "c"]),
        RemoveOptions::default(),
    );
    assert_eq!(result.removed, vec!["a", "c"]);
    assert_eq!(result.failures, vec![("b".to_string(), RemovalError::NotFound)]);
    assert!(entry_names(&store, ResourceKind::Volume).is_empty());

    let err = result.into_error(ResourceKind::Volume).unwrap();
    assert!(err.to_string().contains("\"b\": not found"));
}

#[test]
fn test_second_removal_reports_not_found() {
    let (_dir, store) = store("default");
    store.create_volume(Some("x")).unwrap();

    let first = store.remove(ResourceKind::Volume, &names(&["x"]), RemoveOptions::default());
    let second = store.remove(ResourceKind::Volume, &names(&["x"]), RemoveOptions::default());
    assert!(first.is_success());
    assert_eq!(second.failure("x"), Some(&RemovalError::NotFound));
}

#[test]
fn test_builtin_networks_are_protected() {
    let (_dir, store) = store("default");
    store.create_network("backend", "bridge", Some("10.5.0.0/24")).unwrap();

    let entries = store.enumerate(ResourceKind::Network).unwrap();
    let protected: Vec<_> = entries.iter().filter(|e| e.protected).map(|e| e.name.as_str()).collect();
    assert_eq!(protected, vec!["bridge", "host", "none"]);

    let result = store.remove(
        ResourceKind::Network,
        &names(&["bridge", "backend", "host"]),
        RemoveOptions { force: true },
    );
    assert_eq!(result.removed, vec!["backend"]);
    assert!(matches!(result.failure("bridge"), Some(RemovalError::PermissionDenied(_))));
    assert!(matches!(result.failure("host"), Some(RemovalError::PermissionDenied(_))));

    assert!(matches!(
        store.create_network("host", "bridge", None),
        Err(StoreError::Protected { .. })
    ));
}

#[test]
fn test_resources_in_use_are_busy() {
    let (_dir, store) = store("default");
    store.register_image("alpine").unwrap();
    store.create_network("backend", "bridge", None).unwrap();
    let web = store
        .create_container(container("alpine", "data", "backend"))
        .unwrap();
    assert_eq!(web.image, "alpine:latest");
    assert_eq!(web.mounts.len(), 1);
    assert_eq!(web.config.binds, vec!["/etc/hosts:/etc/hosts"]);
    // The named volume was created on first mount.
    assert!(store.volume("data").unwrap().is_some());

    let volume = store.remove(ResourceKind::Volume, &names(&["data"]), RemoveOptions::default());
    assert!(matches!(volume.failure("data"), Some(RemovalError::Busy(_))));
    let network = store.remove(ResourceKind::Network, &names(&["backend"]), RemoveOptions { force: true });
    assert!(matches!(network.failure("backend"), Some(RemovalError::Busy(_))));
    let image = store.remove(ResourceKind::Image, &names(&["alpine"]), RemoveOptions::default());
    assert!(matches!(image.failure("alpine"), Some(RemovalError::Busy(_))));

    // A running container needs force.
    let refused = store.remove(ResourceKind::Container, &names(&["web"]), RemoveOptions::default());
    assert!(matches!(refused.failure("web"), Some(RemovalError::Busy(_))));
    let forced = store.remove(ResourceKind::Container, &names(&["web"]), RemoveOptions { force: true });
    assert_eq!(forced.removed, vec!["web"]);

    let volume = store.remove(ResourceKind::Volume, &names(&["data"]), RemoveOptions::default());
    assert!(volume.is_success());
    let network = store.remove(ResourceKind::Network, &names(&["backend"]), RemoveOptions::default());
    assert!(network.is_success());
}

#[test]
fn test_container_requires_known_image_and_network() {
    let (_dir, store) = store("default");
    assert!(matches!(
        store.create_container(container("alpine", "data", "bridge")),
        Err(StoreError::NotFound { kind: ResourceKind::Image, .. })
    ));

    store.register_image("alpine:3.20").unwrap();
    assert!(matches!(
        store.create_container(container("alpine:3.20", "data", "missing")),
        Err(StoreError::NotFound { kind: ResourceKind::Network, .. })
    ));
}

#[test]
fn test_container_lookup_by_id_prefix_and_generated_name() {
    let (_dir, store) = store("default");
    store.register_image("docker.io/library/nginx:1.27").unwrap();
    let spec = NewContainer {
        image: "docker.io/library/nginx:1.27".to_string(),
        ..NewContainer::default()
    };
    let record = store.create_container(spec).unwrap();
    assert!(record.name.starts_with("nginx-"));
    assert_eq!(record.id.len(), 64);
    assert_eq!(record.network, "bridge");
    assert_eq!(record.restart, "no");

    let by_prefix = store.container(&record.id[..12]).unwrap().unwrap();
    assert_eq!(by_prefix.name, record.name);

    let result = store.remove(ResourceKind::Container, &names(&[&record.id[..12]]), RemoveOptions::default());
    assert!(result.is_success());
    assert!(store.containers().unwrap().is_empty());
}

#[test]
fn test_register_image_is_idempotent() {
    let (_dir, store) = store("default");
    let first = store.register_image("alpine").unwrap();
    let second = store.register_image("alpine:latest").unwrap();
    assert_eq!(first, second);
    assert!(first.id.starts_with("sha256:"));
    assert_eq!(store.images().unwrap().len(), 1);
    assert!(matches!(
        store.register_image("Not Valid"),
        Err(StoreError::InvalidReference(_))
    ));
}

#[test]
fn test_image_found_and_removed_by_id() {
    let (_dir, store) = store("default");
    let image = store.register_image("alpine").unwrap();
    let hex = image.id.strip_prefix("sha256:").unwrap();

    assert_eq!(store.image(&hex[..12]).unwrap(), Some(image.clone()));
    assert_eq!(store.image(hex).unwrap(), Some(image.clone()));
    assert_eq!(store.image(&image.id).unwrap(), Some(image.clone()));

    let result = store.remove(ResourceKind::Image, &names(&[&hex[..12]]), RemoveOptions::default());
    assert_eq!(result.removed, vec![hex[..12].to_string()]);
    assert!(store.images().unwrap().is_empty());
}

#[test]
fn test_namespaces_are_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let default = StateStore::open(dir.path(), "default").unwrap();
    let test = StateStore::open(dir.path(), "test").unwrap();
    default.create_volume(Some("shared")).unwrap();
    test.create_volume(Some("shared")).unwrap();

    let result = test.remove(ResourceKind::Volume, &names(&["shared"]), RemoveOptions::default());
    assert!(result.is_success());
    assert_eq!(entry_names(&default, ResourceKind::Volume), vec!["shared"]);
    assert_eq!(
        entry_names(&default, ResourceKind::Namespace),
        vec!["default".to_string()]
    );

    test.create_network("backend", "macvlan", None).unwrap();
    assert_eq!(
        entry_names(&default, ResourceKind::Namespace),
        vec!["default".to_string(), "test".to_string()]
    );
}

#[test]
fn test_reader_sees_writer_state() {
    let (dir, store) = store("default");
    store.create_network("backend", "bridge", None).unwrap();
    store.register_image("alpine").unwrap();

    let reader = StoreReader::new(dir.path(), "default");
    assert_eq!(
        entry_names(&reader, ResourceKind::Network),
        vec!["bridge", "host", "none", "backend"]
    );
    assert_eq!(entry_names(&reader, ResourceKind::Image), vec!["alpine:latest"]);

    let other = StoreReader::new(dir.path(), "other");
    assert!(entry_names(&other, ResourceKind::Image).is_empty());
}

#[test]
fn test_reader_on_corrupt_database_degrades() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(STATE_DB), b"not a database").unwrap();
    let reader = StoreReader::new(dir.path(), "default");
    assert!(reader.enumerate(ResourceKind::Volume).is_err());
}

#[test]
fn test_removal_completion_excludes_protected_networks() {
    let (_dir, store) = store("default");
    store.create_network("backend", "bridge", None).unwrap();

    let registry = Registry::new(
        "boxctl",
        vec![],
        vec![
            SubcommandSpec::new("network")
                .with_subcommand(
                    SubcommandSpec::new("rm").with_positional(ProviderId::removal(ResourceKind::Network)),
                )
                .with_subcommand(
                    SubcommandSpec::new("inspect")
                        .with_positional(ProviderId::reference(ResourceKind::Network)),
                ),
            SubcommandSpec::new("run").with_flag(
                FlagSpec::with_value("--network")
                    .with_provider(ProviderId::reference(ResourceKind::Network)),
            ),
        ],
    )
    .unwrap();
    let dispatcher = Dispatcher::new(&registry, &store);

    let rm = dispatcher.render(&resolve(&registry, &["network", "rm"]));
    assert_eq!(rm, vec!["backend"]);

    let inspect = dispatcher.render(&resolve(&registry, &["network", "inspect"]));
    assert!(inspect.contains(&"bridge".to_string()));
    assert!(inspect.contains(&"host".to_string()));
    assert!(inspect.contains(&"backend".to_string()));
}
