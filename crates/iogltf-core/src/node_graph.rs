//! Scene hierarchy resolution.
//!
//! [`NodeGraphResolver`] wraps every document node in a [`GraphNode`], links
//! parents to children and guarantees a single root, synthesizing one when the
//! document has several top-level nodes. glTF node `i` always has
//! `NodeId(i)`; a synthesized root is appended after them.

use std::fmt;

use glam::{Mat4, Quat, Vec3};
use tracing::{debug, warn};

use crate::buffer_resolver::{BufferResolver, BufferSource};
use crate::import_options::ImportOptions;
use crate::math_utils::{decompose, AxisConversion};
use crate::schema::{Document, Node};
use crate::skeleton::{self, ResolvedSkin, Skeleton};
use crate::status::{GltfError, Result};

/// Identifier of a node within a [`NodeGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Opaque slot for the object a host application creates for a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostHandle(pub u64);

/// Local transform in translation / rotation / scale form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalTransform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl LocalTransform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    /// Transform of `node` in the target basis. A matrix takes precedence
    /// over TRS and is decomposed.
    pub fn from_node(node: &Node, axis: AxisConversion) -> Self {
        let (translation, rotation, scale) = match &node.matrix {
            Some(matrix) => decompose(matrix),
            None => (
                node.translation.map(Vec3::from_array).unwrap_or(Vec3::ZERO),
                node.rotation
                    .map(|q| Quat::from_array(q).normalize())
                    .unwrap_or(Quat::IDENTITY),
                node.scale.map(Vec3::from_array).unwrap_or(Vec3::ONE),
            ),
        };
        Self {
            translation: axis.vec3(translation),
            rotation: axis.rotation(rotation),
            scale: axis.scale(scale),
        }
    }

    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

impl Default for LocalTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// A node with its resolved relations.
#[derive(Debug, Clone)]
pub struct GraphNode {
    pub id: NodeId,
    /// Index in the document's `nodes`; `None` for a synthesized root.
    pub gltf_index: Option<usize>,
    pub name: Option<String>,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub transform: LocalTransform,
    pub mesh: Option<usize>,
    /// Skin deforming this node's mesh.
    pub skin: Option<usize>,
    pub camera: Option<usize>,
    /// Skin this node is a joint of.
    pub joint_of: Option<usize>,
    pub host_handle: Option<HostHandle>,
}

impl GraphNode {
    pub fn is_synthesized(&self) -> bool {
        self.gltf_index.is_none()
    }

    pub fn is_joint(&self) -> bool {
        self.joint_of.is_some()
    }

    /// Name for display; unnamed nodes are labelled by index.
    pub fn display_name(&self) -> String {
        match (&self.name, self.gltf_index) {
            (Some(name), _) => name.clone(),
            (None, Some(index)) => format!("node_{}", index),
            (None, None) => format!("node{}", self.id),
        }
    }
}

/// Resolved node hierarchy of one import.
#[derive(Debug, Clone)]
pub struct NodeGraph {
    nodes: Vec<GraphNode>,
    root: NodeId,
    gltf_count: usize,
    pub(crate) skins: Vec<ResolvedSkin>,
    pub(crate) skeletons: Vec<Skeleton>,
}

impl NodeGraph {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> Option<&GraphNode> {
        self.nodes.get(id.0)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut GraphNode> {
        self.nodes.get_mut(id.0)
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    /// Node wrapping document node `index`.
    pub fn get_by_gltf_index(&self, index: usize) -> Option<&GraphNode> {
        if index < self.gltf_count {
            self.nodes.get(index)
        } else {
            None
        }
    }

    pub fn skins(&self) -> &[ResolvedSkin] {
        &self.skins
    }

    pub fn skeletons(&self) -> &[Skeleton] {
        &self.skeletons
    }

    /// Records the host object created for `id`.
    pub fn set_host_handle(&mut self, id: NodeId, handle: HostHandle) {
        if let Some(node) = self.nodes.get_mut(id.0) {
            node.host_handle = Some(handle);
        }
    }

    /// Pre-order traversal from the root: every parent before its children,
    /// siblings in document order.
    pub fn traverse(&self) -> Traverse<'_> {
        self.traverse_from(self.root)
    }

    pub fn traverse_from(&self, start: NodeId) -> Traverse<'_> {
        Traverse {
            graph: self,
            stack: vec![start],
        }
    }

    /// Strict ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            graph: self,
            next: self.node(id).and_then(|n| n.parent),
        }
    }

    /// Whether `ancestor` lies strictly above `id`.
    pub fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        self.ancestors(id).any(|a| a == ancestor)
    }

    pub fn depth(&self, id: NodeId) -> usize {
        self.ancestors(id).count()
    }

    /// Deepest node that is `id` or an ancestor of every node in `ids`.
    pub fn common_ancestor(&self, ids: &[NodeId]) -> Option<NodeId> {
        let (&first, rest) = ids.split_first()?;
        let mut chain: Vec<NodeId> = std::iter::once(first).chain(self.ancestors(first)).collect();
        for &id in rest {
            let cut = chain
                .iter()
                .position(|&c| c == id || self.is_ancestor(c, id))?;
            chain.drain(..cut);
        }
        chain.first().copied()
    }

    pub fn local_matrix(&self, id: NodeId) -> Mat4 {
        self.node(id)
            .map(|n| n.transform.to_matrix())
            .unwrap_or(Mat4::IDENTITY)
    }

    /// Root-relative transform of `id`.
    pub fn world_matrix(&self, id: NodeId) -> Mat4 {
        std::iter::once(id)
            .chain(self.ancestors(id))
            .fold(Mat4::IDENTITY, |acc, node| self.local_matrix(node) * acc)
    }

    /// World transforms of all nodes, indexed by [`NodeId`].
    pub fn world_matrices(&self) -> Vec<Mat4> {
        let mut world = vec![Mat4::IDENTITY; self.nodes.len()];
        for node in self.traverse() {
            let parent = node.parent.map(|p| world[p.0]).unwrap_or(Mat4::IDENTITY);
            world[node.id.0] = parent * node.transform.to_matrix();
        }
        world
    }
}

/// Stack-based pre-order iterator over a [`NodeGraph`].
pub struct Traverse<'g> {
    graph: &'g NodeGraph,
    stack: Vec<NodeId>,
}

impl<'g> Iterator for Traverse<'g> {
    type Item = &'g GraphNode;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        let node = self.graph.node(id)?;
        self.stack.extend(node.children.iter().rev().copied());
        Some(node)
    }
}

pub struct Ancestors<'g> {
    graph: &'g NodeGraph,
    next: Option<NodeId>,
}

impl<'g> Iterator for Ancestors<'g> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.graph.node(current).and_then(|n| n.parent);
        Some(current)
    }
}

/// Builds the [`NodeGraph`] of a document.
#[derive(Debug, Clone)]
pub struct NodeGraphResolver {
    options: ImportOptions,
}

impl NodeGraphResolver {
    pub fn new(options: &ImportOptions) -> Self {
        Self {
            options: options.clone(),
        }
    }

    /// Resolves the hierarchy, skins and skeletons. Inverse bind matrices are
    /// decoded through `resolver`.
    pub fn resolve<S: BufferSource>(&self, resolver: &mut BufferResolver<'_, S>) -> Result<NodeGraph> {
        let document = resolver.document();
        let mut graph = self.resolve_nodes(document)?;
        graph.skins = skeleton::resolve_skins(&mut graph, resolver, &self.options)?;
        graph.skeletons = skeleton::build_skeletons(&graph, &self.options);
        debug!(
            nodes = graph.len(),
            skins = graph.skins.len(),
            skeletons = graph.skeletons.len(),
            "resolved node graph"
        );
        Ok(graph)
    }

    /// Resolves the hierarchy and local transforms only.
    pub fn resolve_nodes(&self, document: &Document) -> Result<NodeGraph> {
        let count = document.nodes.len();
        let axis = self.options.axis_conversion();

        let mut parents: Vec<Option<usize>> = vec![None; count];
        for (i, node) in document.nodes.iter().enumerate() {
            for &child in &node.children {
                let entity = format!("nodes[{}]", i);
                if child >= count {
                    return Err(GltfError::malformed(
                        entity,
                        format!("child {} is out of range ({} nodes)", child, count),
                    ));
                }
                if child == i {
                    return Err(GltfError::malformed(entity, "node lists itself as a child"));
                }
                if let Some(first) = parents[child] {
                    return Err(GltfError::malformed(
                        format!("nodes[{}]", child),
                        format!("node is a child of both nodes[{}] and nodes[{}]", first, i),
                    ));
                }
                parents[child] = Some(i);
            }
        }

        let mut nodes: Vec<GraphNode> = document
            .nodes
            .iter()
            .enumerate()
            .map(|(i, node)| GraphNode {
                id: NodeId(i),
                gltf_index: Some(i),
                name: node.name.clone(),
                parent: parents[i].map(NodeId),
                children: node.children.iter().copied().map(NodeId).collect(),
                transform: LocalTransform::from_node(node, axis),
                mesh: node.mesh,
                skin: node.skin,
                camera: node.camera,
                joint_of: None,
                host_handle: None,
            })
            .collect();

        let roots: Vec<NodeId> = (0..count)
            .filter(|&i| parents[i].is_none())
            .map(NodeId)
            .collect();
        check_acyclic(&nodes, &roots)?;

        let root = if roots.len() == 1 {
            roots[0]
        } else {
            let id = NodeId(count);
            if count > 0 {
                warn!(roots = roots.len(), name = %self.options.root_name, "synthesizing root node");
            }
            for &r in &roots {
                nodes[r.0].parent = Some(id);
            }
            nodes.push(GraphNode {
                id,
                gltf_index: None,
                name: Some(self.options.root_name.clone()),
                parent: None,
                children: roots,
                transform: LocalTransform::IDENTITY,
                mesh: None,
                skin: None,
                camera: None,
                joint_of: None,
                host_handle: None,
            });
            id
        };

        Ok(NodeGraph {
            nodes,
            root,
            gltf_count: count,
            skins: Vec::new(),
            skeletons: Vec::new(),
        })
    }
}

/// Every node must be reachable from a parentless node. With single parents
/// enforced, anything left over sits on a cycle.
fn check_acyclic(nodes: &[GraphNode], roots: &[NodeId]) -> Result<()> {
    let mut visited = vec![false; nodes.len()];
    let mut stack: Vec<NodeId> = roots.to_vec();
    while let Some(id) = stack.pop() {
        if std::mem::replace(&mut visited[id.0], true) {
            continue;
        }
        stack.extend(nodes[id.0].children.iter().copied());
    }
    match visited.iter().position(|&seen| !seen) {
        Some(index) => Err(GltfError::malformed(
            format!("nodes[{}]", index),
            "node hierarchy contains a cycle",
        )),
        None => Ok(()),
    }
}
