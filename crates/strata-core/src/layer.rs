//! Architectural layers and the emission order between them.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;

use crate::error::{StrataError, StrataResult};

/// One tier of the generated architecture, in emission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    Domain,
    Application,
    /// Mapping artifacts that reference both the domain entity and the
    /// application response shape. Emitted after both.
    CrossLayer,
    DataAccess,
    Transport,
    Presentation,
    Tests,
}

impl Layer {
    /// All layers in emission order.
    pub const ALL: [Layer; 7] = [
        Layer::Domain,
        Layer::Application,
        Layer::CrossLayer,
        Layer::DataAccess,
        Layer::Transport,
        Layer::Presentation,
        Layer::Tests,
    ];

    /// Position in the fixed total order.
    pub fn rank(&self) -> usize {
        *self as usize
    }

    /// Parse from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "domain" => Some(Self::Domain),
            "application" | "application_logic" => Some(Self::Application),
            "cross_layer" | "mapping" => Some(Self::CrossLayer),
            "data_access" | "infrastructure" => Some(Self::DataAccess),
            "transport" | "api" => Some(Self::Transport),
            "presentation" | "ui" => Some(Self::Presentation),
            "tests" | "test" => Some(Self::Tests),
            _ => None,
        }
    }

    /// Convert to string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Domain => "domain",
            Self::Application => "application",
            Self::CrossLayer => "cross_layer",
            Self::DataAccess => "data_access",
            Self::Transport => "transport",
            Self::Presentation => "presentation",
            Self::Tests => "tests",
        }
    }
}

impl std::fmt::Display for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit to be ordered: a template, or any keyed item living in a layer.
#[derive(Debug, Clone)]
pub struct DependencyNode<K> {
    pub key: K,
    pub layer: Layer,
    /// Keys that must be emitted before this one.
    pub depends_on: Vec<K>,
    /// Layers whose symbols this node references.
    pub requires_layers: Vec<Layer>,
}

/// Orders layers and layered items so nothing is emitted before what it
/// references.
#[derive(Debug, Clone, Copy, Default)]
pub struct DependencyOrderer;

impl DependencyOrderer {
    pub fn new() -> Self {
        Self
    }

    /// Sort and deduplicate a set of layers into emission order.
    pub fn order_layers(&self, layers: impl IntoIterator<Item = Layer>) -> Vec<Layer> {
        layers
            .into_iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Reject a node that references a layer later than its own.
    pub fn check_requirements(&self, key: &dyn Display, layer: Layer, requires: &[Layer]) -> StrataResult<()> {
        if let Some(later) = requires.iter().find(|r| r.rank() > layer.rank()) {
            return Err(StrataError::layering(format!(
                "'{key}' in layer '{layer}' requires later layer '{later}'"
            )));
        }
        Ok(())
    }

    /// Topologically order `nodes`.
    ///
    /// The result is grouped by layer in the fixed order, and within a layer
    /// every node follows its dependencies; ties keep input order. Forward
    /// references, unknown keys and cycles are layering violations.
    pub fn order<K>(&self, nodes: &[DependencyNode<K>]) -> StrataResult<Vec<K>>
    where
        K: Ord + Clone + Display,
    {
        let mut index: BTreeMap<&K, usize> = BTreeMap::new();
        for (i, node) in nodes.iter().enumerate() {
            if index.insert(&node.key, i).is_some() {
                return Err(StrataError::layering(format!("duplicate key '{}'", node.key)));
            }
        }

        let mut indegree = vec![0usize; nodes.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];

        for (i, node) in nodes.iter().enumerate() {
            self.check_requirements(&node.key, node.layer, &node.requires_layers)?;

            for dep in &node.depends_on {
                let &j = index.get(dep).ok_or_else(|| {
                    StrataError::layering(format!("'{}' depends on unknown '{}'", node.key, dep))
                })?;
                let dep_layer = nodes[j].layer;
                if dep_layer.rank() > node.layer.rank() {
                    return Err(StrataError::layering(format!(
                        "'{}' in layer '{}' depends on '{}' in later layer '{}'",
                        node.key, node.layer, dep, dep_layer
                    )));
                }
                indegree[i] += 1;
                dependents[j].push(i);
            }
        }

        // Kahn's algorithm; the ready set is keyed by (layer rank, input position).
        let mut ready: BTreeSet<(usize, usize)> = indegree
            .iter()
            .enumerate()
            .filter(|(_, d)| **d == 0)
            .map(|(i, _)| (nodes[i].layer.rank(), i))
            .collect();

        let mut ordered = Vec::with_capacity(nodes.len());
        while let Some(next) = ready.pop_first() {
            let i = next.1;
            ordered.push(nodes[i].key.clone());
            for &d in &dependents[i] {
                indegree[d] -= 1;
                if indegree[d] == 0 {
                    ready.insert((nodes[d].layer.rank(), d));
                }
            }
        }

        if ordered.len() != nodes.len() {
            let stuck: Vec<String> = indegree
                .iter()
                .enumerate()
                .filter(|(_, d)| **d > 0)
                .map(|(i, _)| nodes[i].key.to_string())
                .collect();
            return Err(StrataError::layering(format!(
                "dependency cycle among: {}",
                stuck.join(", ")
            )));
        }

        Ok(ordered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(key: &'static str, layer: Layer, deps: &[&'static str]) -> DependencyNode<&'static str> {
        DependencyNode {
            key,
            layer,
            depends_on: deps.to_vec(),
            requires_layers: Vec::new(),
        }
    }

    #[test]
    fn test_order_layers() {
        let orderer = DependencyOrderer::new();
        let ordered = orderer.order_layers([Layer::Tests, Layer::Domain, Layer::Transport, Layer::Domain]);
        assert_eq!(ordered, vec![Layer::Domain, Layer::Transport, Layer::Tests]);
    }

    #[test]
    fn test_cross_layer_sits_between_application_and_data_access() {
        assert!(Layer::Application < Layer::CrossLayer);
        assert!(Layer::CrossLayer < Layer::DataAccess);
    }

    #[test]
    fn test_order_groups_by_layer_then_dependencies() {
        let nodes = vec![
            node("controller", Layer::Transport, &["command"]),
            node("mapping", Layer::CrossLayer, &["entity", "response"]),
            node("response", Layer::Application, &[]),
            node("command", Layer::Application, &["response"]),
            node("entity", Layer::Domain, &[]),
        ];
        let ordered = DependencyOrderer::new().order(&nodes).unwrap();
        assert_eq!(ordered, vec!["entity", "response", "command", "mapping", "controller"]);
    }

    #[test]
    fn test_forward_dependency_rejected() {
        let nodes = vec![
            node("entity", Layer::Domain, &["controller"]),
            node("controller", Layer::Transport, &[]),
        ];
        let err = DependencyOrderer::new().order(&nodes).unwrap_err();
        assert!(matches!(err, StrataError::LayeringViolation(_)));
    }

    #[test]
    fn test_forward_layer_requirement_rejected() {
        let mut n = node("entity", Layer::Domain, &[]);
        n.requires_layers = vec![Layer::Application];
        let err = DependencyOrderer::new().order(&[n]).unwrap_err();
        assert!(err.to_string().contains("requires later layer"));
    }

    #[test]
    fn test_same_layer_cycle_rejected() {
        let nodes = vec![
            node("a", Layer::Application, &["b"]),
            node("b", Layer::Application, &["a"]),
        ];
        let err = DependencyOrderer::new().order(&nodes).unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn test_unknown_dependency_rejected() {
        let nodes = vec![node("a", Layer::Domain, &["ghost"])];
        assert!(DependencyOrderer::new().order(&nodes).is_err());
    }

    #[test]
    fn test_layer_parse() {
        assert_eq!(Layer::from_str("data-access"), Some(Layer::DataAccess));
        assert_eq!(Layer::from_str("Tests"), Some(Layer::Tests));
        assert_eq!(Layer::from_str("nope"), None);
    }
}
