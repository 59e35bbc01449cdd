//! Skeleton: bone arena, world matrix evaluation and skinning buffers
//!
//! Bones live in a [`SlotMap`] keyed by [`BoneId`]; `order` holds the bone
//! array order used for the skinning buffer. Parents always precede their
//! children in `order` once [`Skeleton::sort_bones`] has run, and bones added
//! through [`Skeleton::add_bone`] keep that property by construction.
//!
//! Caching uses generation counters: every mutation bumps `generation`, and a
//! skinning buffer is only recomputed when the generation it was built from
//! differs.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fmt;

use log::{debug, warn};
use slotmap::SlotMap;

use crate::animation::bone::{Bone, BoneId};
use crate::animation::track::{AnimationRange, MatrixKey};
use crate::animation::{SkeletonError, SkinnedMesh, TransformNodeLookup};
use crate::foundation::math::{invert_or_identity, Mat4, Mat4Ext, Vec3};

/// Floats per bone in the skinning buffer
pub const MATRIX_STRIDE: usize = 16;

#[derive(Debug, Clone)]
struct MeshSkinCache {
    matrices: Vec<f32>,
    generation: u64,
    pose: Mat4,
}

/// Bone hierarchy producing per-bone skinning matrices
#[derive(Debug, Clone)]
pub struct Skeleton {
    /// Skeleton name
    pub name: String,
    /// Skeleton identifier
    pub id: String,
    /// Root transform comes from the skinned mesh's pose matrix
    pub need_initial_skin_matrix: bool,
    /// Rest-pose dimensions used to rescale copied animations
    pub dimensions_at_rest: Option<Vec3>,
    bones: SlotMap<BoneId, Bone>,
    order: Vec<BoneId>,
    ranges: BTreeMap<String, AnimationRange>,
    root_override: Option<Mat4>,
    transform_matrices: Vec<f32>,
    generation: u64,
    transforms_generation: Option<u64>,
    last_absolute_transforms_render_id: Option<u64>,
    mesh_caches: HashMap<u64, MeshSkinCache>,
    synchronized_mesh: Option<u64>,
}

impl Skeleton {
    /// Create an empty skeleton
    pub fn new(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
            need_initial_skin_matrix: false,
            dimensions_at_rest: None,
            bones: SlotMap::with_key(),
            order: Vec::new(),
            ranges: BTreeMap::new(),
            root_override: None,
            transform_matrices: Vec::new(),
            generation: 0,
            transforms_generation: None,
            last_absolute_transforms_render_id: None,
            mesh_caches: HashMap::new(),
            synchronized_mesh: None,
        }
    }

    /// Add a bone under `parent` and compute its bind matrices
    pub fn add_bone(&mut self, bone: Bone, parent: Option<BoneId>) -> Result<BoneId, SkeletonError> {
        if let Some(parent_id) = parent {
            if !self.bones.contains_key(parent_id) {
                return Err(SkeletonError::UnknownParent(bone.name));
            }
        }
        let id = self.insert_bone(bone, parent);
        self.update_difference_matrix(id, None);
        Ok(id)
    }

    pub(crate) fn insert_bone(&mut self, mut bone: Bone, parent: Option<BoneId>) -> BoneId {
        bone.parent = parent;
        let id = self.bones.insert(bone);
        self.order.push(id);
        self.mark_as_dirty();
        id
    }

    pub(crate) fn set_parent_unchecked(&mut self, id: BoneId, parent: Option<BoneId>) {
        if let Some(bone) = self.bones.get_mut(id) {
            bone.parent = parent;
        }
    }

    /// Invalidate every cached skinning buffer
    pub fn mark_as_dirty(&mut self) {
        self.generation += 1;
    }

    /// Current mutation generation
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of bones
    pub fn bone_count(&self) -> usize {
        self.order.len()
    }

    /// Bone ids in bone array order
    pub fn bone_ids(&self) -> &[BoneId] {
        &self.order
    }

    /// Bones in bone array order
    pub fn bones(&self) -> impl Iterator<Item = (BoneId, &Bone)> {
        self.order.iter().filter_map(move |&id| self.bones.get(id).map(|b| (id, b)))
    }

    /// Look up a bone
    pub fn bone(&self, id: BoneId) -> Option<&Bone> {
        self.bones.get(id)
    }

    /// Mutable access to a bone; marks the skeleton dirty
    pub fn bone_mut(&mut self, id: BoneId) -> Option<&mut Bone> {
        self.generation += 1;
        self.bones.get_mut(id)
    }

    /// Bone at a position of the bone array
    pub fn bone_at(&self, index: usize) -> Option<(BoneId, &Bone)> {
        let id = *self.order.get(index)?;
        self.bones.get(id).map(|b| (id, b))
    }

    /// Position of the first bone called `name` in the bone array
    pub fn get_bone_index_by_name(&self, name: &str) -> Option<usize> {
        self.order
            .iter()
            .position(|&id| self.bones.get(id).is_some_and(|b| b.name == name))
    }

    /// Id of the first bone called `name`
    pub fn bone_id_by_name(&self, name: &str) -> Option<BoneId> {
        self.get_bone_index_by_name(name).map(|i| self.order[i])
    }

    /// Bones without a parent, in bone array order
    pub fn root_bones(&self) -> Vec<BoneId> {
        self.bones()
            .filter(|(_, bone)| bone.parent.is_none())
            .map(|(id, _)| id)
            .collect()
    }

    /// Direct children of a bone, in bone array order
    pub fn children_of(&self, id: BoneId) -> Vec<BoneId> {
        self.bones()
            .filter(|(_, bone)| bone.parent == Some(id))
            .map(|(child, _)| child)
            .collect()
    }

    /// Matrix premultiplied onto root bones by [`compute_absolute_transforms`](Self::compute_absolute_transforms)
    pub fn set_root_override(&mut self, matrix: Option<Mat4>) {
        self.root_override = matrix;
        self.last_absolute_transforms_render_id = None;
        self.mark_as_dirty();
    }

    /// Recompute the bind transform of `id` and its whole subtree.
    ///
    /// `root_matrix` replaces the parent-derived absolute transform of `id`
    /// when given; descendants always derive from their parent.
    pub fn update_difference_matrix(&mut self, id: BoneId, root_matrix: Option<Mat4>) {
        let mut queue = VecDeque::from([(id, root_matrix)]);
        while let Some((current, root)) = queue.pop_front() {
            let Some(bone) = self.bones.get(current) else {
                continue;
            };
            let absolute = match (root, bone.parent.and_then(|p| self.bones.get(p))) {
                (Some(root), _) => root,
                (None, Some(parent)) => parent.absolute_transform * bone.base_matrix,
                (None, None) => bone.base_matrix,
            };
            if let Some(bone) = self.bones.get_mut(current) {
                bone.absolute_transform = absolute;
                bone.inverted_absolute_transform = invert_or_identity(&absolute);
            }
            queue.extend(self.children_of(current).into_iter().map(|child| (child, None)));
        }
        self.mark_as_dirty();
    }

    /// Replace a bone's bind matrix, optionally its local matrix too, and
    /// optionally refresh the bind transforms below it
    pub fn update_bone_matrix(
        &mut self,
        id: BoneId,
        matrix: Mat4,
        update_difference: bool,
        update_local: bool,
    ) {
        let Some(bone) = self.bones.get_mut(id) else {
            return;
        };
        bone.base_matrix = matrix;
        if update_local {
            bone.set_local_matrix(matrix);
        }
        if update_difference {
            self.update_difference_matrix(id, None);
        } else {
            self.mark_as_dirty();
        }
    }

    /// Evaluate every bone's world matrix for a render pass.
    ///
    /// Skipped when `render_id` matches the last evaluation unless `force`
    /// is set. Returns whether the matrices were recomputed.
    pub fn compute_absolute_transforms(&mut self, render_id: u64, force: bool) -> bool {
        if !force && self.last_absolute_transforms_render_id == Some(render_id) {
            return false;
        }
        let root = self.root_override;
        Self::evaluate(&mut self.bones, &self.order, root.as_ref(), None);
        self.last_absolute_transforms_render_id = Some(render_id);
        true
    }

    /// Refresh the shared skinning buffer if the skeleton changed.
    ///
    /// Returns whether the buffer was recomputed.
    pub fn prepare(&mut self) -> bool {
        if self.transforms_generation == Some(self.generation) {
            return false;
        }
        let mut target = std::mem::take(&mut self.transform_matrices);
        let root = self.root_override;
        Self::evaluate(&mut self.bones, &self.order, root.as_ref(), Some(&mut target));
        self.transform_matrices = target;
        self.transforms_generation = Some(self.generation);
        self.last_absolute_transforms_render_id = None;
        true
    }

    /// Refresh the buffer consumed by `mesh`.
    ///
    /// Without `need_initial_skin_matrix` this is [`prepare`](Self::prepare).
    /// Otherwise each mesh owns a buffer evaluated with its pose matrix, and
    /// switching meshes re-binds the root bones against `pose * base`.
    pub fn prepare_for_mesh(&mut self, mesh: &dyn SkinnedMesh) -> bool {
        if !self.need_initial_skin_matrix {
            return self.prepare();
        }

        let mesh_id = mesh.unique_id();
        let pose = mesh.pose_matrix();

        if self.synchronized_mesh != Some(mesh_id) {
            self.synchronized_mesh = Some(mesh_id);
            for root in self.root_bones() {
                if let Some(base) = self.bones.get(root).map(|b| b.base_matrix) {
                    self.update_difference_matrix(root, Some(pose * base));
                }
            }
        }

        let generation = self.generation;
        let cache = self.mesh_caches.entry(mesh_id).or_insert_with(|| MeshSkinCache {
            matrices: Vec::new(),
            generation: u64::MAX,
            pose,
        });
        if cache.generation == generation && cache.pose == pose {
            return false;
        }

        Self::evaluate(&mut self.bones, &self.order, Some(&pose), Some(&mut cache.matrices));
        cache.generation = generation;
        cache.pose = pose;
        // World matrices now carry this mesh's pose
        self.last_absolute_transforms_render_id = None;
        true
    }

    /// Skinning buffer for `mesh`: one column-major 4x4 per bone, bone
    /// array order, `world * inverse_bind`.
    ///
    /// Recomputes only when the skeleton changed since the last call.
    pub fn get_transform_matrices(&mut self, mesh: Option<&dyn SkinnedMesh>) -> &[f32] {
        match mesh {
            Some(mesh) if self.need_initial_skin_matrix => {
                self.prepare_for_mesh(mesh);
                self.mesh_caches
                    .get(&mesh.unique_id())
                    .map(|cache| cache.matrices.as_slice())
                    .unwrap_or_default()
            }
            _ => {
                self.prepare();
                self.transform_matrices.as_slice()
            }
        }
    }

    /// Skinning buffer as raw bytes for GPU upload
    pub fn transform_matrices_bytes(&mut self, mesh: Option<&dyn SkinnedMesh>) -> &[u8] {
        bytemuck::cast_slice(self.get_transform_matrices(mesh))
    }

    fn evaluate(
        bones: &mut SlotMap<BoneId, Bone>,
        order: &[BoneId],
        root_matrix: Option<&Mat4>,
        mut target: Option<&mut Vec<f32>>,
    ) {
        let bone_count = order.len();
        if let Some(target) = target.as_deref_mut() {
            target.clear();
            target.resize(bone_count * MATRIX_STRIDE, 0.0);
        }

        for (position, &id) in order.iter().enumerate() {
            let parent_world = bones
                .get(id)
                .and_then(|b| b.parent)
                .and_then(|p| bones.get(p))
                .map(|p| p.world_matrix);
            let Some(bone) = bones.get_mut(id) else {
                continue;
            };

            bone.world_matrix = match (parent_world, root_matrix) {
                (Some(parent), _) => parent * bone.local_matrix,
                (None, Some(root)) => root * bone.local_matrix,
                (None, None) => bone.local_matrix,
            };

            if let Some(target) = target.as_deref_mut() {
                let slot = bone.index.filter(|&i| i < bone_count).unwrap_or(position);
                let skin = bone.world_matrix * bone.inverted_absolute_transform;
                let offset = slot * MATRIX_STRIDE;
                target[offset..offset + MATRIX_STRIDE].copy_from_slice(skin.as_slice());
            }
        }
    }

    /// Reorder bones so every parent precedes its children.
    ///
    /// Bones without a mapped index keep their previous position as their
    /// skinning slot, so the buffer layout is unchanged by sorting.
    pub fn sort_bones(&mut self) {
        let position: HashMap<BoneId, usize> =
            self.order.iter().enumerate().map(|(i, &id)| (id, i)).collect();
        let mut visited = HashSet::with_capacity(self.order.len());
        let mut sorted = Vec::with_capacity(self.order.len());

        for &start in &self.order {
            let mut chain = Vec::new();
            let mut cursor = Some(start);
            while let Some(id) = cursor {
                if !visited.insert(id) {
                    break;
                }
                chain.push(id);
                cursor = self.bones.get(id).and_then(|b| b.parent);
            }
            sorted.extend(chain.into_iter().rev());
        }

        for (&id, &index) in &position {
            if let Some(bone) = self.bones.get_mut(id) {
                bone.index.get_or_insert(index);
            }
        }
        self.order = sorted;
        self.mark_as_dirty();
    }

    /// Reset every bone's local matrix to its rest pose
    pub fn return_to_rest(&mut self) {
        for bone in self.bones.values_mut() {
            bone.return_to_rest();
        }
        self.mark_as_dirty();
    }

    /// Copy linked transform node matrices into the bones they drive.
    ///
    /// Returns whether any bone changed.
    pub fn sync_linked_transform_nodes(&mut self, lookup: &dyn TransformNodeLookup) -> bool {
        let mut changed = false;
        for bone in self.bones.values_mut() {
            let Some(node) = bone.linked_transform_node.as_deref() else {
                continue;
            };
            match lookup.local_matrix(node) {
                Some(matrix) => {
                    bone.set_local_matrix(matrix);
                    changed = true;
                }
                None => debug!("bone {} links to unknown transform node {node}", bone.name),
            }
        }
        if changed {
            self.mark_as_dirty();
        }
        changed
    }

    /// Sample every bone track at `frame` into the local matrices
    pub fn apply_frame(&mut self, frame: f32) {
        for bone in self.bones.values_mut() {
            if let Some(matrix) = bone.animation.as_ref().and_then(|t| t.sample(frame)) {
                bone.set_local_matrix(matrix);
            }
        }
        self.mark_as_dirty();
    }

    /// Register a named range on the skeleton and every bone track.
    ///
    /// Does nothing when the name is already taken.
    pub fn create_animation_range(&mut self, name: &str, from: f32, to: f32) {
        if self.ranges.contains_key(name) {
            return;
        }
        self.ranges.insert(name.to_string(), AnimationRange::new(name, from, to));
        for bone in self.bones.values_mut() {
            if let Some(track) = bone.animation.as_mut() {
                track.create_range(name, from, to);
            }
        }
    }

    /// Remove a named range from the skeleton and every bone track,
    /// optionally stripping the keys inside it
    pub fn delete_animation_range(&mut self, name: &str, delete_frames: bool) {
        for bone in self.bones.values_mut() {
            if let Some(track) = bone.animation.as_mut() {
                track.delete_range(name, delete_frames);
            }
        }
        self.ranges.remove(name);
    }

    /// Look up a named range
    pub fn get_animation_range(&self, name: &str) -> Option<&AnimationRange> {
        self.ranges.get(name)
    }

    /// All named ranges, ordered by name
    pub fn get_animation_ranges(&self) -> Vec<&AnimationRange> {
        self.ranges.values().collect()
    }

    /// Highest keyed frame across every bone track
    pub fn get_highest_animation_frame(&self) -> f32 {
        self.bones
            .values()
            .filter_map(|b| b.animation.as_ref())
            .fold(0.0_f32, |highest, track| highest.max(track.highest_frame()))
    }

    /// Append a range from another rig, matching bones by name.
    ///
    /// Keys land one frame past the highest existing frame. With
    /// `rescale_as_required`, translations are scaled by the parent bone
    /// length ratio, or for root bones by the `dimensions_at_rest` ratio.
    /// Returns `false` when the rigs differ or the range is unavailable.
    pub fn copy_animation_range(
        &mut self,
        source: &Skeleton,
        name: &str,
        rescale_as_required: bool,
    ) -> bool {
        if self.ranges.contains_key(name) {
            return false;
        }
        let Some(source_range) = source.get_animation_range(name).cloned() else {
            return false;
        };

        let mut copied_all = true;
        let frame_offset = self.get_highest_animation_frame() + 1.0;

        if self.bone_count() != source.bone_count() {
            warn!(
                "copy_animation_range: this rig has {} bones, while source has {}",
                self.bone_count(),
                source.bone_count()
            );
            copied_all = false;
        }

        let dimensions_ratio = match (rescale_as_required, self.dimensions_at_rest, source.dimensions_at_rest) {
            (true, Some(ours), Some(theirs)) => Some(ours.component_div(&theirs)),
            _ => None,
        };

        for id in self.order.clone() {
            let Some(name_of_bone) = self.bones.get(id).map(|b| b.name.clone()) else {
                continue;
            };
            let Some(source_id) = source.bone_id_by_name(&name_of_bone) else {
                warn!("copy_animation_range: not same rig, missing source bone {name_of_bone}");
                copied_all = false;
                continue;
            };
            let copied = self.copy_bone_range(
                id,
                source,
                source_id,
                name,
                frame_offset,
                rescale_as_required,
                dimensions_ratio,
            );
            copied_all &= copied;
        }

        self.ranges.insert(
            name.to_string(),
            AnimationRange::new(name, source_range.from + frame_offset, source_range.to + frame_offset),
        );
        debug!("copied animation range {name} into {} at offset {frame_offset}", self.name);
        copied_all
    }

    fn copy_bone_range(
        &mut self,
        id: BoneId,
        source: &Skeleton,
        source_id: BoneId,
        range_name: &str,
        frame_offset: f32,
        rescale_as_required: bool,
        dimensions_ratio: Option<Vec3>,
    ) -> bool {
        let Some(source_bone) = source.bone(source_id) else {
            return false;
        };
        let Some(source_track) = source_bone.animation.as_ref() else {
            return false;
        };
        let Some(range) = source_track.range(range_name).cloned() else {
            return false;
        };

        let parent_length = self
            .bones
            .get(id)
            .and_then(|b| b.parent)
            .and_then(|p| self.bones.get(p))
            .and_then(|p| p.length);
        let source_parent = source_bone.parent.and_then(|p| source.bone(p));
        let Some(bone) = self.bones.get_mut(id) else {
            return false;
        };

        let parent_scaling = rescale_as_required
            && source_parent.is_some()
            && matches!((source_bone.length, bone.length), (Some(a), Some(b)) if a != b);
        let parent_ratio = match (parent_scaling, parent_length, source_parent.and_then(|p| p.length)) {
            (true, Some(ours), Some(theirs)) if theirs != 0.0 => ours / theirs,
            _ => 1.0,
        };
        let dimensions_scaling = rescale_as_required
            && bone.parent.is_none()
            && dimensions_ratio.is_some_and(|r| r != Vec3::new(1.0, 1.0, 1.0));

        let Some(track) = bone.animation.as_mut() else {
            return false;
        };

        for key in source_track.keys().iter().filter(|k| range.contains(k.frame)) {
            let mut value = key.value;
            if parent_scaling {
                let translation = value.translation_part() * parent_ratio;
                value.set_translation_part(&translation);
            } else if dimensions_scaling {
                if let Some(ratio) = dimensions_ratio {
                    let translation = value.translation_part().component_mul(&ratio);
                    value.set_translation_part(&translation);
                }
            }
            track.push_key_unordered(MatrixKey {
                frame: key.frame + frame_offset,
                value,
            });
        }
        track.sort_keys();
        track.create_range(range_name, range.from + frame_offset, range.to + frame_offset);
        true
    }

    /// Deep copy under a new name and id.
    ///
    /// Bone ids stay valid in the clone; no buffer is shared with `self`.
    pub fn clone_skeleton(&self, name: impl Into<String>, id: impl Into<String>) -> Skeleton {
        let mut result = Skeleton::new(name, id);
        result.need_initial_skin_matrix = self.need_initial_skin_matrix;
        result.dimensions_at_rest = self.dimensions_at_rest;
        result.bones = self.bones.clone();
        result.order = self.order.clone();
        result.ranges = self.ranges.clone();
        result.root_override = self.root_override;
        result.mark_as_dirty();
        result
    }
}

impl fmt::Display for Skeleton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Name: {}, nBones: {}, nAnimationRanges: {}",
            self.name,
            self.bone_count(),
            self.ranges.len()
        )
    }
}
