//! Integration tests for forked configurations and resource watching.

use conftree::config::{Config, WatcherConfig};
use conftree::provider::RESOURCE_DIR;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

fn write_resource(root: &Path, relative: &str, content: &str) {
    let path = root.join(RESOURCE_DIR).join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn load(root: &Path) -> Config {
    Config::builder()
        .root(root)
        .env(BTreeMap::new())
        .build()
        .expect("Failed to build configuration")
}

#[test]
fn fork_is_isolated_from_parent() {
    let temp = TempDir::new().unwrap();
    write_resource(temp.path(), "app.yaml", "name: file\nport: 80");
    let parent = load(temp.path());
    parent.set("name", "parent").unwrap();

    let fork = parent.fork().unwrap();
    assert_ne!(fork.id(), parent.id());
    assert_eq!(fork.get::<String>("name").unwrap(), "parent");

    fork.set("name", "fork").unwrap();
    fork.properties().set("conftree.config.port", "81");
    assert_eq!(fork.get::<String>("name").unwrap(), "fork");
    assert_eq!(fork.get::<u16>("port").unwrap(), 81);
    assert_eq!(parent.get::<String>("name").unwrap(), "parent");
    assert_eq!(parent.get::<u16>("port").unwrap(), 80);

    parent.unset("name").unwrap();
    assert_eq!(parent.get::<String>("name").unwrap(), "file");
    assert_eq!(fork.get::<String>("name").unwrap(), "fork");
}

#[test]
fn fork_shares_allocated_ports() {
    let temp = TempDir::new().unwrap();
    write_resource(temp.path(), "app.yaml", "port: ${availableTcpPort(http)}");
    let parent = load(temp.path());
    let port = parent.get::<u16>("port").unwrap();
    assert_ne!(port, 0);

    let fork = parent.fork().unwrap();
    assert_eq!(fork.get::<u16>("port").unwrap(), port);
    let names: Vec<_> = fork.providers().into_iter().map(|p| p.name).collect();
    assert_eq!(names.len(), parent.providers().len());
}

#[test]
fn resource_changes_are_seen_after_refresh() {
    let temp = TempDir::new().unwrap();
    write_resource(temp.path(), "app.yaml", "name: before");
    let config = load(temp.path());
    assert_eq!(config.get::<String>("name").unwrap(), "before");

    // Without a watcher, files are only re-read once something marks the
    // configuration dirty.
    write_resource(temp.path(), "app.yaml", "name: after");
    assert_eq!(config.get::<String>("name").unwrap(), "before");
    config.set("touch", "1").unwrap();
    assert_eq!(config.get::<String>("name").unwrap(), "after");
}

#[tokio::test]
async fn watcher_marks_resources_dirty() {
    let temp = TempDir::new().unwrap();
    write_resource(temp.path(), "app.yaml", "name: before");
    let config = load(temp.path());

    let mut handle = config
        .watch(WatcherConfig {
            debounce_duration: Duration::from_millis(100),
        })
        .unwrap();
    // Give the backend a moment to register the watch.
    tokio::time::sleep(Duration::from_millis(200)).await;

    write_resource(temp.path(), "app.yaml", "name: after");
    let event = tokio::time::timeout(Duration::from_secs(10), handle.wait_for_change())
        .await
        .expect("No change event within timeout")
        .expect("Watcher stopped");
    assert!(event.requires_reload());
    assert!(
        event
            .affected_paths()
            .iter()
            .any(|p| p.ends_with("app.yaml"))
    );
    assert_eq!(config.get::<String>("name").unwrap(), "after");
}
