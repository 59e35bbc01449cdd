//! Serde form of a skeleton
//!
//! Bones are stored in bone array order with their parent as an index into
//! that list. Matrices are column-major float arrays.

use serde::{Deserialize, Serialize};

use crate::animation::bone::{Bone, BoneId};
use crate::animation::skeleton::Skeleton;
use crate::animation::track::{AnimationRange, AnimationTrack, MatrixKey};
use crate::animation::SkeletonError;
use crate::foundation::math::{matrix_from_array, matrix_to_array, Vec3};

/// Serialized keyframe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedKey {
    /// Frame number
    pub frame: f32,
    /// Column-major matrix
    pub values: [f32; 16],
}

/// Serialized keyframe track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedAnimation {
    /// Track name
    pub name: String,
    /// Keys in frame order
    pub keys: Vec<SerializedKey>,
    /// Named ranges of the track
    #[serde(default)]
    pub ranges: Vec<AnimationRange>,
}

/// Serialized bone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedBone {
    /// Bone name
    pub name: String,
    /// External identifier
    #[serde(default)]
    pub id: Option<String>,
    /// Index of the parent in the bone list
    #[serde(default)]
    pub parent_bone_index: Option<usize>,
    /// Mapped skinning buffer slot
    #[serde(default)]
    pub index: Option<usize>,
    /// Bind matrix, also used as the initial local matrix
    pub matrix: [f32; 16],
    /// Rest pose, defaults to `matrix`
    #[serde(default)]
    pub rest: Option<[f32; 16]>,
    /// Bone length
    #[serde(default)]
    pub length: Option<f32>,
    /// Keyframe track
    #[serde(default)]
    pub animation: Option<SerializedAnimation>,
    /// Linked transform node id
    #[serde(default)]
    pub linked_transform_node_id: Option<String>,
}

/// Serialized skeleton
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedSkeleton {
    /// Skeleton name
    pub name: String,
    /// Skeleton identifier
    pub id: String,
    /// Rest-pose dimensions
    #[serde(default)]
    pub dimensions_at_rest: Option<[f32; 3]>,
    /// Root transform comes from the skinned mesh
    #[serde(default)]
    pub need_initial_skin_matrix: bool,
    /// Bones in bone array order
    pub bones: Vec<SerializedBone>,
    /// Named animation ranges
    #[serde(default)]
    pub ranges: Vec<AnimationRange>,
}

impl SerializedAnimation {
    fn from_track(track: &AnimationTrack) -> Self {
        Self {
            name: track.name.clone(),
            keys: track
                .keys()
                .iter()
                .map(|key| SerializedKey {
                    frame: key.frame,
                    values: matrix_to_array(&key.value),
                })
                .collect(),
            ranges: track.ranges().cloned().collect(),
        }
    }

    fn to_track(&self) -> AnimationTrack {
        let mut track = AnimationTrack::new(self.name.clone());
        for key in &self.keys {
            track.push_key_unordered(MatrixKey {
                frame: key.frame,
                value: matrix_from_array(&key.values),
            });
        }
        track.sort_keys();
        for range in &self.ranges {
            track.create_range(&range.name, range.from, range.to);
        }
        track
    }
}

impl Skeleton {
    /// Capture the hierarchy, bind poses, tracks and ranges
    pub fn serialize(&self) -> SerializedSkeleton {
        let ids = self.bone_ids();
        let position_of = |id: BoneId| ids.iter().position(|&other| other == id);

        let bones = self
            .bones()
            .map(|(_, bone)| SerializedBone {
                name: bone.name.clone(),
                id: bone.id.clone(),
                parent_bone_index: bone.parent().and_then(position_of),
                index: bone.index(),
                matrix: matrix_to_array(bone.base_matrix()),
                rest: Some(matrix_to_array(bone.rest_pose())),
                length: bone.length(),
                animation: bone.animation().map(SerializedAnimation::from_track),
                linked_transform_node_id: bone.linked_transform_node().map(str::to_string),
            })
            .collect();

        SerializedSkeleton {
            name: self.name.clone(),
            id: self.id.clone(),
            dimensions_at_rest: self.dimensions_at_rest.map(|d| [d.x, d.y, d.z]),
            need_initial_skin_matrix: self.need_initial_skin_matrix,
            bones,
            ranges: self.get_animation_ranges().into_iter().cloned().collect(),
        }
    }

    /// Rebuild a skeleton from its serialized form.
    ///
    /// Parents may appear after their children; the bone array is sorted
    /// afterwards and every bone keeps its serialized skinning slot.
    pub fn parse(data: &SerializedSkeleton) -> Result<Skeleton, SkeletonError> {
        let count = data.bones.len();
        for (bone, serialized) in data.bones.iter().enumerate() {
            if let Some(parent) = serialized.parent_bone_index {
                if parent >= count || parent == bone {
                    return Err(SkeletonError::InvalidParentIndex { bone, parent });
                }
            }
        }
        for serialized in &data.bones {
            let mut cursor = serialized.parent_bone_index;
            let mut steps = 0;
            while let Some(parent) = cursor {
                steps += 1;
                if steps > count {
                    return Err(SkeletonError::CyclicHierarchy(serialized.name.clone()));
                }
                cursor = data.bones[parent].parent_bone_index;
            }
        }

        let mut skeleton = Skeleton::new(data.name.clone(), data.id.clone());
        skeleton.need_initial_skin_matrix = data.need_initial_skin_matrix;
        skeleton.dimensions_at_rest = data.dimensions_at_rest.map(|d| Vec3::new(d[0], d[1], d[2]));

        let ids: Vec<BoneId> = data
            .bones
            .iter()
            .map(|serialized| {
                let matrix = matrix_from_array(&serialized.matrix);
                let mut bone = Bone::new(serialized.name.clone(), matrix)
                    .with_rest_pose(serialized.rest.as_ref().map_or(matrix, matrix_from_array));
                bone.id = serialized.id.clone();
                bone.index = serialized.index;
                bone.length = serialized.length;
                bone.linked_transform_node = serialized.linked_transform_node_id.clone();
                bone.animation = serialized.animation.as_ref().map(SerializedAnimation::to_track);
                skeleton.insert_bone(bone, None)
            })
            .collect();

        let mut unsorted = false;
        for (i, serialized) in data.bones.iter().enumerate() {
            if let Some(parent) = serialized.parent_bone_index {
                skeleton.set_parent_unchecked(ids[i], Some(ids[parent]));
                unsorted |= parent > i;
            }
        }
        if unsorted {
            skeleton.sort_bones();
        }
        for root in skeleton.root_bones() {
            skeleton.update_difference_matrix(root, None);
        }

        for range in &data.ranges {
            skeleton.create_animation_range(&range.name, range.from, range.to);
        }
        Ok(skeleton)
    }

    /// Serialize to pretty RON text
    pub fn to_ron(&self) -> Result<String, SkeletonError> {
        ron::ser::to_string_pretty(&self.serialize(), ron::ser::PrettyConfig::default())
            .map_err(|e| SkeletonError::Serialize(e.to_string()))
    }

    /// Parse RON text produced by [`to_ron`](Self::to_ron)
    pub fn from_ron(text: &str) -> Result<Skeleton, SkeletonError> {
        let data: SerializedSkeleton =
            ron::from_str(text).map_err(|e| SkeletonError::Parse(e.to_string()))?;
        Self::parse(&data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Mat4, Mat4Ext};
    use approx::assert_relative_eq;

    fn bone(name: &str, parent: Option<usize>, y: f32) -> SerializedBone {
        SerializedBone {
            name: name.to_string(),
            id: None,
            parent_bone_index: parent,
            index: None,
            matrix: matrix_to_array(&Mat4::new_translation(&Vec3::new(0.0, y, 0.0))),
            rest: None,
            length: None,
            animation: None,
            linked_transform_node_id: None,
        }
    }

    fn skeleton_data(bones: Vec<SerializedBone>) -> SerializedSkeleton {
        SerializedSkeleton {
            name: "rig".to_string(),
            id: "rig-1".to_string(),
            dimensions_at_rest: None,
            need_initial_skin_matrix: false,
            bones,
            ranges: Vec::new(),
        }
    }

    #[test]
    fn test_parse_rejects_bad_parent_index() {
        let data = skeleton_data(vec![bone("root", None, 0.0), bone("child", Some(5), 1.0)]);
        assert_eq!(
            Skeleton::parse(&data).unwrap_err(),
            SkeletonError::InvalidParentIndex { bone: 1, parent: 5 }
        );
    }

    #[test]
    fn test_parse_rejects_cycles() {
        let data = skeleton_data(vec![bone("a", Some(1), 0.0), bone("b", Some(0), 1.0)]);
        assert!(matches!(
            Skeleton::parse(&data),
            Err(SkeletonError::CyclicHierarchy(_))
        ));
    }

    #[test]
    fn test_parse_sorts_children_after_parents() {
        let data = skeleton_data(vec![
            bone("tip", Some(2), 1.0),
            bone("root", None, 0.0),
            bone("mid", Some(1), 1.0),
        ]);
        let mut skeleton = Skeleton::parse(&data).unwrap();

        let names: Vec<&str> = skeleton.bones().map(|(_, b)| b.name.as_str()).collect();
        assert_eq!(names, vec!["root", "mid", "tip"]);

        let tip = skeleton.bone_id_by_name("tip").unwrap();
        assert_eq!(skeleton.bone(tip).unwrap().index(), Some(0));
        assert_relative_eq!(
            skeleton.bone(tip).unwrap().absolute_transform().translation_part(),
            Vec3::new(0.0, 2.0, 0.0)
        );

        skeleton.compute_absolute_transforms(0, true);
        assert_relative_eq!(
            skeleton.bone(tip).unwrap().world_matrix().translation_part(),
            Vec3::new(0.0, 2.0, 0.0)
        );
    }

    #[test]
    fn test_ron_round_trip_keeps_tracks() {
        let mut data = skeleton_data(vec![bone("root", None, 0.0)]);
        data.bones[0].animation = Some(SerializedAnimation {
            name: "root".to_string(),
            keys: vec![
                SerializedKey { frame: 0.0, values: matrix_to_array(&Mat4::identity()) },
                SerializedKey { frame: 12.0, values: matrix_to_array(&Mat4::rotation_y(1.0)) },
            ],
            ranges: vec![AnimationRange::new("turn", 0.0, 12.0)],
        });
        data.dimensions_at_rest = Some([1.0, 2.0, 0.5]);

        let skeleton = Skeleton::parse(&data).unwrap();
        let text = skeleton.to_ron().unwrap();
        let reparsed = Skeleton::from_ron(&text).unwrap();

        assert_eq!(reparsed.serialize(), skeleton.serialize());
        assert!(Skeleton::from_ron("not ron").is_err());
    }
}
