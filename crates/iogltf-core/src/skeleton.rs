//! Skins, skeleton roots and bone layout.
//!
//! Each skin's joints are resolved against the [`NodeGraph`] and given a
//! skeleton root. Skins whose roots coincide or nest share one [`Skeleton`],
//! which lays its bones out head-to-tail for display.

use std::collections::{BTreeSet, HashMap};

use glam::{Mat4, Vec3};
use tracing::{debug, warn};

use crate::accessor_decoder::AccessorDecoder;
use crate::buffer_resolver::{BufferResolver, BufferSource};
use crate::import_options::ImportOptions;
use crate::math_utils::AxisConversion;
use crate::node_graph::{NodeGraph, NodeId};
use crate::status::{GltfError, Result};

/// Length given to bones whose tail cannot be inferred from neighbours.
pub const DEFAULT_BONE_LENGTH: f32 = 0.1;

const MIN_BONE_LENGTH: f32 = 1e-5;

/// A skin bound to graph nodes.
#[derive(Debug, Clone)]
pub struct ResolvedSkin {
    /// Index in the document's `skins`.
    pub skin: usize,
    pub name: Option<String>,
    /// Joint nodes in skin order; vertex `JOINTS_0` values index this list.
    pub joints: Vec<NodeId>,
    pub skeleton_root: NodeId,
    /// One per joint, empty when the skin has no bind matrices.
    pub inverse_bind_matrices: Vec<Mat4>,
}

impl ResolvedSkin {
    /// Inverse bind matrix of the joint at position `joint` in
    /// [`ResolvedSkin::joints`]. Identity when the skin provides none.
    pub fn inverse_bind_matrix(&self, joint: usize) -> Mat4 {
        self.inverse_bind_matrices
            .get(joint)
            .copied()
            .unwrap_or(Mat4::IDENTITY)
    }

    /// Position of `node` in the joint list.
    pub fn joint_index(&self, node: NodeId) -> Option<usize> {
        self.joints.iter().position(|&j| j == node)
    }
}

/// One bone of a skeleton, positioned in world space.
#[derive(Debug, Clone, PartialEq)]
pub struct Bone {
    pub node: NodeId,
    /// Index of the parent bone in [`Skeleton::bones`].
    pub parent: Option<usize>,
    pub head: Vec3,
    pub tail: Vec3,
    /// Head coincides with the parent's tail.
    pub connected: bool,
}

impl Bone {
    pub fn length(&self) -> f32 {
        (self.tail - self.head).length()
    }
}

/// Bones shared by one or more skins under a common root.
#[derive(Debug, Clone)]
pub struct Skeleton {
    pub root: NodeId,
    /// Document skin indices, ascending.
    pub skins: Vec<usize>,
    /// Bones in pre-order; parents precede children.
    pub bones: Vec<Bone>,
}

impl Skeleton {
    pub fn bone(&self, node: NodeId) -> Option<&Bone> {
        self.bones.iter().find(|b| b.node == node)
    }
}

/// Resolves every skin of the graph's document, marking joint nodes.
pub(crate) fn resolve_skins<S: BufferSource>(
    graph: &mut NodeGraph,
    resolver: &mut BufferResolver<'_, S>,
    options: &ImportOptions,
) -> Result<Vec<ResolvedSkin>> {
    let document = resolver.document();
    let axis = options.axis_conversion();

    let mut owner: HashMap<usize, usize> = HashMap::new();
    for (s, skin) in document.skins.iter().enumerate() {
        if skin.joints.is_empty() {
            return Err(GltfError::malformed(format!("skins[{}]", s), "skin has no joints"));
        }
        for &joint in &skin.joints {
            match owner.get(&joint) {
                Some(&first) if first == s => {
                    return Err(GltfError::malformed(
                        format!("skins[{}]", s),
                        format!("joint nodes[{}] is listed twice", joint),
                    ));
                }
                Some(&first) => {
                    return Err(GltfError::MultipleSkinMembership {
                        node: joint,
                        first,
                        second: s,
                    });
                }
                None => {
                    owner.insert(joint, s);
                }
            }
        }
    }

    let mut decoder = AccessorDecoder::new(resolver);
    let mut skins = Vec::with_capacity(document.skins.len());
    for (s, skin) in document.skins.iter().enumerate() {
        let joints: Vec<NodeId> = skin.joints.iter().copied().map(NodeId).collect();
        let skeleton_root = match skin.skeleton {
            Some(explicit) => NodeId(explicit),
            None => infer_skeleton_root(graph, &joints),
        };

        let inverse_bind_matrices = match skin.inverse_bind_matrices {
            Some(accessor) => {
                let matrices = decoder.decode_mat4(accessor)?;
                if matrices.len() < joints.len() {
                    return Err(GltfError::malformed(
                        format!("skins[{}]", s),
                        format!(
                            "{} inverse bind matrices for {} joints",
                            matrices.len(),
                            joints.len()
                        ),
                    ));
                }
                matrices
                    .iter()
                    .take(joints.len())
                    .map(|m| convert_bind_matrix(m, axis))
                    .collect()
            }
            None => Vec::new(),
        };

        for &joint in &joints {
            if let Some(node) = graph.node_mut(joint) {
                node.joint_of = Some(s);
            }
        }

        debug!(skin = s, joints = joints.len(), root = %skeleton_root, "resolved skin");
        skins.push(ResolvedSkin {
            skin: s,
            name: skin.name.clone(),
            joints,
            skeleton_root,
            inverse_bind_matrices,
        });
    }
    Ok(skins)
}

/// Skeleton root of a joint set.
///
/// Walks the joints keeping a running candidate, replaced by any joint found
/// among the candidate's ancestors. If the survivor does not sit above every
/// joint (disjoint joint trees), the deepest common ancestor is used instead.
pub fn infer_skeleton_root(graph: &NodeGraph, joints: &[NodeId]) -> NodeId {
    let Some((&first, rest)) = joints.split_first() else {
        return graph.root();
    };

    let mut candidate = first;
    for &joint in rest {
        if graph.is_ancestor(joint, candidate) {
            candidate = joint;
        }
    }

    let dominates = joints
        .iter()
        .all(|&j| j == candidate || graph.is_ancestor(candidate, j));
    if dominates {
        candidate
    } else {
        graph.common_ancestor(joints).unwrap_or_else(|| graph.root())
    }
}

/// Groups skins into skeletons and lays out their bones.
pub(crate) fn build_skeletons(graph: &NodeGraph, options: &ImportOptions) -> Vec<Skeleton> {
    let mut groups: Vec<(NodeId, Vec<usize>)> = Vec::new();
    for skin in graph.skins() {
        let root = skin.skeleton_root;
        let related = |other: NodeId| {
            other == root || graph.is_ancestor(other, root) || graph.is_ancestor(root, other)
        };

        let (merged, kept): (Vec<_>, Vec<_>) =
            groups.drain(..).partition(|(other, _)| related(*other));
        groups = kept;

        let mut group_root = root;
        let mut members = vec![skin.skin];
        for (other, skins) in merged {
            if graph.is_ancestor(other, group_root) {
                group_root = other;
            }
            members.extend(skins);
        }
        members.sort_unstable();
        groups.push((group_root, members));
    }

    let world = graph.world_matrices();
    let up = options.axis_conversion().up();
    groups
        .into_iter()
        .map(|(root, skins)| {
            let bones = layout_bones(graph, &world, root, &skins, options.connect_threshold, up);
            Skeleton { root, skins, bones }
        })
        .collect()
}

/// Bones under `root`: every joint of `skins` plus the nodes linking the
/// joints to the root.
fn layout_bones(
    graph: &NodeGraph,
    world: &[Mat4],
    root: NodeId,
    skins: &[usize],
    threshold: f32,
    up: Vec3,
) -> Vec<Bone> {
    let mut members: BTreeSet<NodeId> = BTreeSet::new();
    members.insert(root);
    for skin in graph.skins().iter().filter(|s| skins.contains(&s.skin)) {
        for &joint in &skin.joints {
            members.insert(joint);
            for ancestor in graph.ancestors(joint).take_while(|&a| a != root) {
                if !members.insert(ancestor) {
                    break;
                }
            }
        }
    }

    let head_of = |id: NodeId| world[id.0].w_axis.truncate();
    let mut bones: Vec<Bone> = Vec::new();
    let mut slot: HashMap<NodeId, usize> = HashMap::new();
    for node in graph.traverse_from(root).filter(|n| members.contains(&n.id)) {
        let parent = graph.ancestors(node.id).find_map(|a| slot.get(&a).copied());
        slot.insert(node.id, bones.len());
        let head = head_of(node.id);
        bones.push(Bone {
            node: node.id,
            parent,
            head,
            tail: head,
            connected: false,
        });
    }

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); bones.len()];
    for (b, bone) in bones.iter().enumerate() {
        if let Some(parent) = bone.parent {
            children[parent].push(b);
        }
    }

    for b in 0..bones.len() {
        let head = bones[b].head;
        let parent_head = bones[b].parent.map(|p| bones[p].head);
        let connect = pick_connected_child(&bones, &children[b], head, parent_head, threshold);

        let tail = match (connect, parent_head) {
            (Some(child), _) => {
                bones[child].connected = true;
                bones[child].head
            }
            (None, Some(parent_head)) if (head - parent_head).length() > MIN_BONE_LENGTH => {
                head + (head - parent_head)
            }
            _ => head + up * DEFAULT_BONE_LENGTH,
        };
        bones[b].tail = tail;
    }

    if bones.iter().any(|b| b.length() <= MIN_BONE_LENGTH) {
        warn!(root = %root, "skeleton contains zero-length bones");
    }
    bones
}

/// The child whose head continues the bone: the only child, or the child best
/// aligned with the parent-to-bone direction above `threshold`.
fn pick_connected_child(
    bones: &[Bone],
    children: &[usize],
    head: Vec3,
    parent_head: Option<Vec3>,
    threshold: f32,
) -> Option<usize> {
    let far_enough = |c: &usize| (bones[*c].head - head).length() > MIN_BONE_LENGTH;

    if let [only] = children {
        return Some(*only).filter(far_enough);
    }

    let incoming = (head - parent_head?).normalize_or_zero();
    if incoming == Vec3::ZERO {
        return None;
    }
    children
        .iter()
        .filter(|&c| far_enough(c))
        .map(|&c| (c, incoming.dot((bones[c].head - head).normalize())))
        .filter(|&(_, dot)| dot > threshold)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(c, _)| c)
}

/// Converts a skin's raw bind matrix into the target basis.
pub fn convert_bind_matrix(matrix: &[f32; 16], axis: AxisConversion) -> Mat4 {
    axis.matrix(Mat4::from_cols_array(matrix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer_resolver::{BufferCache, MemorySource};
    use crate::document_parser::parse_value;
    use crate::node_graph::NodeGraphResolver;
    use crate::schema::Document;
    use crate::ErrorCode;
    use serde_json::{json, Value};

    fn document(nodes: Value, skins: Value) -> Document {
        parse_value(&json!({
            "asset": {"version": "2.0"},
            "nodes": nodes,
            "skins": skins
        }))
        .unwrap()
    }

    fn resolve(document: &Document, options: &ImportOptions) -> Result<NodeGraph> {
        let mut resolver = BufferResolver::new(document, MemorySource::new(), BufferCache::new());
        NodeGraphResolver::new(options).resolve(&mut resolver)
    }

    /// 0 -> 1 -> 2 -> {3, 4}; a straight chain along +Y that forks at 2.
    fn chain() -> Value {
        json!([
            {"name": "armature", "children": [1]},
            {"name": "hips", "translation": [0.0, 1.0, 0.0], "children": [2]},
            {"name": "spine", "translation": [0.0, 1.0, 0.0], "children": [3, 4]},
            {"name": "neck", "translation": [0.0, 1.0, 0.0]},
            {"name": "arm", "translation": [1.0, 0.0, 0.0]}
        ])
    }

    #[test]
    fn test_skeleton_root_is_dominating_joint() {
        let document = document(chain(), json!([{"joints": [3, 2, 4]}]));
        let graph = resolve(&document, &ImportOptions::default()).unwrap();
        let skin = &graph.skins()[0];
        assert_eq!(skin.skeleton_root, NodeId(2));
        assert_eq!(graph.node(NodeId(3)).unwrap().joint_of, Some(0));
        assert_eq!(graph.node(NodeId(0)).unwrap().joint_of, None);
    }

    #[test]
    fn test_skeleton_root_falls_back_to_common_ancestor() {
        let document = document(chain(), json!([{"joints": [3, 4]}]));
        let graph = resolve(&document, &ImportOptions::default()).unwrap();
        assert_eq!(graph.skins()[0].skeleton_root, NodeId(2));
    }

    #[test]
    fn test_explicit_skeleton_overrides() {
        let document = document(chain(), json!([{"joints": [2, 3], "skeleton": 0}]));
        let graph = resolve(&document, &ImportOptions::default()).unwrap();
        assert_eq!(graph.skins()[0].skeleton_root, NodeId(0));
    }

    #[test]
    fn test_multiple_skin_membership() {
        let document = document(chain(), json!([{"joints": [2, 3]}, {"joints": [3, 4]}]));
        match resolve(&document, &ImportOptions::default()) {
            Err(GltfError::MultipleSkinMembership { node, first, second }) => {
                assert_eq!((node, first, second), (3, 0, 1));
            }
            other => panic!("expected MultipleSkinMembership, got {:?}", other.map(|g| g.len())),
        }
    }

    #[test]
    fn test_duplicate_joint_is_malformed() {
        let document = document(chain(), json!([{"joints": [2, 2]}]));
        let err = resolve(&document, &ImportOptions::default()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::MalformedDocument);
    }

    #[test]
    fn test_nested_skins_share_skeleton() {
        let document = document(chain(), json!([{"joints": [3]}, {"joints": [1, 2]}]));
        let graph = resolve(&document, &ImportOptions::default()).unwrap();
        assert_eq!(graph.skeletons().len(), 1);
        let skeleton = &graph.skeletons()[0];
        assert_eq!(skeleton.root, NodeId(1));
        assert_eq!(skeleton.skins, vec![0, 1]);
    }

    #[test]
    fn test_bone_layout() {
        let document = document(chain(), json!([{"joints": [1, 2, 3, 4]}]));
        let graph = resolve(&document, &ImportOptions::default()).unwrap();
        let skeleton = &graph.skeletons()[0];
        let ids: Vec<usize> = skeleton.bones.iter().map(|b| b.node.0).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);

        // hips has a single child: tail at the spine head, spine is connected
        let hips = skeleton.bone(NodeId(1)).unwrap();
        assert_eq!(hips.tail, Vec3::new(0.0, 2.0, 0.0));
        assert!(skeleton.bone(NodeId(2)).unwrap().connected);

        // spine forks; the neck continues straight up (dot = 1), the arm does not (dot = 0)
        let spine = skeleton.bone(NodeId(2)).unwrap();
        assert_eq!(spine.tail, Vec3::new(0.0, 3.0, 0.0));
        assert!(skeleton.bone(NodeId(3)).unwrap().connected);
        assert!(!skeleton.bone(NodeId(4)).unwrap().connected);

        // leaves mirror the vector from their parent
        let arm = skeleton.bone(NodeId(4)).unwrap();
        assert_eq!(arm.head, Vec3::new(1.0, 2.0, 0.0));
        assert_eq!(arm.tail, Vec3::new(2.0, 2.0, 0.0));
        assert!(skeleton.bones.iter().all(|b| b.length() > 0.0));
    }

    #[test]
    fn test_connect_threshold_is_configurable() {
        let nodes = json!([
            {"children": [1]},
            {"translation": [0.0, 1.0, 0.0], "children": [2, 3]},
            {"translation": [0.6, 1.0, 0.0]},
            {"translation": [-1.0, 0.0, 0.0]}
        ]);
        // dot((0,1,0), normalize(0.6,1,0)) is about 0.857
        let document = document(nodes, json!([{"joints": [0, 1, 2, 3]}]));
        let graph = resolve(&document, &ImportOptions::default()).unwrap();
        assert!(graph.skeletons()[0].bone(NodeId(2)).unwrap().connected);

        let strict = ImportOptions::new().with_connect_threshold(0.9);
        let graph = resolve(&document, &strict).unwrap();
        assert!(!graph.skeletons()[0].bone(NodeId(2)).unwrap().connected);
    }

    #[test]
    fn test_isolated_bone_gets_default_length() {
        let document = document(json!([{"name": "lonely"}]), json!([{"joints": [0]}]));
        let graph = resolve(&document, &ImportOptions::new().with_yup_to_zup(true)).unwrap();
        let bone = &graph.skeletons()[0].bones[0];
        assert_eq!(bone.tail - bone.head, Vec3::Z * DEFAULT_BONE_LENGTH);
    }

    #[test]
    fn test_inverse_bind_matrix_identity_when_absent() {
        let document = document(chain(), json!([{"joints": [1, 2]}]));
        let graph = resolve(&document, &ImportOptions::default()).unwrap();
        assert_eq!(graph.skins()[0].inverse_bind_matrix(1), Mat4::IDENTITY);
        assert_eq!(graph.skins()[0].joint_index(NodeId(2)), Some(1));
    }

    #[test]
    fn test_convert_bind_matrix() {
        let m = Mat4::from_translation(Vec3::new(0.0, 1.0, 0.0)).to_cols_array();
        let converted = convert_bind_matrix(&m, AxisConversion::YUpToZUp);
        assert!(converted
            .transform_point3(Vec3::ZERO)
            .abs_diff_eq(Vec3::new(0.0, 0.0, 1.0), 1e-6));
    }
}
