//! Conversion between configuration trees and typed values.
//!
//! Any `T: DeserializeOwned` can be read from a node with [`from_node`], and
//! any `T: Serialize` turned back into a node with [`to_node`].

mod class_config;
mod de;
mod host_port;

pub use class_config::{CLASSES_ROOT, ClassConfiguration};
pub use de::{MappingError, NodeDeserializer, ScalarDeserializer};
pub use host_port::{HostAndPort, HostAndPortError};

use crate::error::{ConfigError, ConfigResult};
use crate::format::from_json;
use crate::tree::{MapNode, TreeNode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::any::type_name;

/// Map `node`, found at `path`, to `T`.
///
/// Errors name the full path of the failing node.
pub fn from_node<T: DeserializeOwned>(node: &TreeNode, path: &str) -> ConfigResult<T> {
    T::deserialize(NodeDeserializer::new(node)).map_err(|e| ConfigError::Mapping {
        path: e.path_from(path),
        target: type_name::<T>().to_string(),
        message: e.message().to_string(),
    })
}

/// Convert a value into a tree. `None`/unit values produce an empty map.
pub fn to_node<T: Serialize + ?Sized>(value: &T) -> ConfigResult<TreeNode> {
    let json = serde_json::to_value(value).map_err(|e| ConfigError::Mapping {
        path: String::new(),
        target: type_name::<T>().to_string(),
        message: e.to_string(),
    })?;
    Ok(from_json(json).unwrap_or_else(|| TreeNode::Map(MapNode::new())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::Format;
    use serde::Deserialize;
    use std::collections::BTreeMap;
    use std::time::Duration;

    #[derive(Debug, Deserialize, Serialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    struct Server {
        host: String,
        port: u16,
        #[serde(default)]
        secure: bool,
        ratio: f64,
        tags: Vec<String>,
        mode: Mode,
        #[serde(default)]
        backup: Option<HostAndPort>,
    }

    #[derive(Debug, Deserialize, Serialize, PartialEq)]
    #[serde(rename_all = "lowercase")]
    enum Mode {
        Active,
        Passive,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    enum Storage {
        Memory,
        Disk { path: String, size: u64 },
        Remote(HostAndPort),
    }

    fn tree(yaml: &str) -> TreeNode {
        Format::Yaml.parse(yaml, "test").unwrap()
    }

    #[test]
    fn test_struct_from_strings() {
        let node = tree(
            "host: example.org\nport: 8080\nsecure: 'TRUE'\nratio: 0.5\ntags: [a, b]\nmode: passive\nbackup: 'b.example.org:9090'",
        );
        let server: Server = from_node(&node, "server").unwrap();
        assert_eq!(server.port, 8080);
        assert!(server.secure);
        assert_eq!(server.tags, vec!["a", "b"]);
        assert_eq!(server.mode, Mode::Passive);
        assert_eq!(server.backup, Some(HostAndPort::new("b.example.org", 9090)));
    }

    #[test]
    fn test_comma_separated_sequence() {
        let node = tree("ports: '80, 443'");
        let ports: BTreeMap<String, Vec<u16>> = from_node(&node, "").unwrap();
        assert_eq!(ports["ports"], vec![80, 443]);
    }

    #[test]
    fn test_numeric_map_keys() {
        let node = tree("1: one\n2: two");
        let map: BTreeMap<u8, String> = from_node(&node, "").unwrap();
        assert_eq!(map[&2], "two");
    }

    #[test]
    fn test_enum_forms() {
        let memory: Storage = from_node(&TreeNode::value("Memory"), "kind").unwrap();
        assert_eq!(memory, Storage::Memory);

        let disk: Storage = from_node(&tree("Disk:\n  path: /tmp\n  size: 10"), "").unwrap();
        assert_eq!(disk, Storage::Disk { path: "/tmp".into(), size: 10 });

        let remote: Storage = from_node(&tree("Remote: 'h:1'"), "").unwrap();
        assert_eq!(remote, Storage::Remote(HostAndPort::new("h", 1)));
    }

    #[test]
    fn test_error_carries_full_path() {
        let node = tree("servers:\n  - port: 80\n  - port: eighty");
        let err = from_node::<BTreeMap<String, Vec<BTreeMap<String, u16>>>>(&node, "app")
            .unwrap_err();
        match err {
            ConfigError::Mapping { path, message, .. } => {
                assert_eq!(path, "app.servers.1.port");
                assert!(message.contains("eighty"), "{message}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_scalar_where_map_expected() {
        let err = from_node::<BTreeMap<String, String>>(&TreeNode::value("x"), "a").unwrap_err();
        assert!(err.to_string().contains("expected a map, found value"));
    }

    #[test]
    fn test_char_and_newtype() {
        #[derive(Deserialize)]
        struct Millis(u64);
        let c: char = from_node(&TreeNode::value("x"), "").unwrap();
        assert_eq!(c, 'x');
        let m: Millis = from_node(&TreeNode::value("250"), "").unwrap();
        assert_eq!(Duration::from_millis(m.0), Duration::from_millis(250));
        assert!(from_node::<char>(&TreeNode::value("xy"), "").is_err());
    }

    #[test]
    fn test_to_node_then_map_back() {
        let server = Server {
            host: "h".into(),
            port: 1,
            secure: false,
            ratio: 1.5,
            tags: vec!["t".into()],
            mode: Mode::Active,
            backup: None,
        };
        let node = to_node(&server).unwrap();
        assert_eq!(node.get("mode").unwrap().and_then(TreeNode::as_str), Some("active"));
        assert_eq!(node.get("backup").unwrap(), None);
        let back: Server = from_node(&node, "").unwrap();
        assert_eq!(back, server);
    }
}
