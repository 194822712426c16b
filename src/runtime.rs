use crate::armature_data::bone::RawBone;
use crate::armature_data::object::RawObjectData;
use crate::armature_data::RawSceneData;
use crate::error::{Error, Result};
use crate::shared_types::{Axis, InheritScale, LAYER_COUNT};
use crate::template_data::{CreationRule, OrientationRule};
use indextree::{Arena, NodeError, NodeId};
use nalgebra::{Matrix3, Matrix4, Point3, Rotation3, Unit, Vector3};
use std::collections::{HashMap, HashSet};
use std::ops::{Index, IndexMut};
use tracing::{debug, trace, warn};

const THETA_SAFE: f32 = 1.0e-5;
const THETA_CRITICAL: f32 = 1.0e-9;

/// Orientation of a bone pointing along `direction` and rolled by `roll` radians.
///
/// Columns are the bone-local x, y and z axes. Local y always points from head
/// to tail; x and z come from the shortest rotation carrying world +Y onto that
/// direction, then get rolled around it.
pub fn vec_roll_to_mat3(direction: &Vector3<f32>, roll: f32) -> Matrix3<f32> {
    let nor = match direction.try_normalize(f32::EPSILON) {
        Some(nor) => nor,
        None => return Matrix3::identity(),
    };
    let (x, y, z) = (nor.x, nor.y, nor.z);
    let mut theta = 1.0 + y;
    let theta_alt = x * x + z * z;

    let b_matrix = if theta > THETA_SAFE || theta_alt > THETA_CRITICAL {
        // close to -Y the first form loses precision
        if theta <= THETA_SAFE {
            theta = theta_alt * 0.5 + theta_alt * theta_alt * 0.125;
        }
        Matrix3::new(
            1.0 - x * x / theta, x, -x * z / theta,
            -x, y, -z,
            -x * z / theta, z, 1.0 - z * z / theta,
        )
    } else {
        Matrix3::new(
            -1.0, 0.0, 0.0,
            0.0, -1.0, 0.0,
            0.0, 0.0, 1.0,
        )
    };

    let roll_matrix = Rotation3::from_axis_angle(&Unit::new_unchecked(nor), roll);
    roll_matrix.into_inner() * b_matrix
}

/// Inverse of [`vec_roll_to_mat3`]: the roll encoded by an orientation matrix.
pub fn mat3_to_roll(orientation: &Matrix3<f32>) -> f32 {
    let y_axis: Vector3<f32> = orientation.column(1).into_owned();
    let unrolled = vec_roll_to_mat3(&y_axis, 0.0);
    let roll_matrix = unrolled.transpose() * orientation;
    roll_matrix[(0, 2)].atan2(roll_matrix[(2, 2)])
}

/// An editable bone. Hierarchy lives in the owning [`EditArmature`].
#[derive(Clone, Debug, PartialEq)]
pub struct Bone {
    pub name: String,
    pub head: Point3<f32>,
    pub tail: Point3<f32>,
    pub roll: f32,
    pub use_connect: bool,
    pub use_deform: bool,
    pub layers: [bool; LAYER_COUNT],
    pub inherit_rotation: bool,
    pub use_local_location: bool,
    pub inherit_scale: InheritScale,
    pub bbone_segments: u32,
    pub bbone_ease_in: f32,
    pub bbone_ease_out: f32,
}

impl Bone {
    pub fn new(name: impl Into<String>) -> Self {
        let mut layers = [false; LAYER_COUNT];
        layers[0] = true;
        Self {
            name: name.into(),
            head: Point3::origin(),
            tail: Point3::new(0.0, 1.0, 0.0),
            roll: 0.0,
            use_connect: false,
            use_deform: true,
            layers,
            inherit_rotation: true,
            use_local_location: true,
            inherit_scale: InheritScale::Full,
            bbone_segments: 1,
            bbone_ease_in: 1.0,
            bbone_ease_out: 1.0,
        }
    }

    pub fn direction(&self) -> Vector3<f32> {
        self.tail - self.head
    }

    pub fn length(&self) -> f32 {
        self.direction().norm()
    }

    pub fn orientation(&self) -> Matrix3<f32> {
        vec_roll_to_mat3(&self.direction(), self.roll)
    }

    pub fn local_axis(&self, axis: Axis) -> Vector3<f32> {
        self.orientation().column(axis.column()).into_owned()
    }

    /// Columns are local x, y, z and the head position.
    pub fn matrix(&self) -> Matrix4<f32> {
        let mut matrix = self.orientation().to_homogeneous();
        matrix[(0, 3)] = self.head.x;
        matrix[(1, 3)] = self.head.y;
        matrix[(2, 3)] = self.head.z;
        matrix
    }

    /// Places the bone from a matrix, keeping its current length.
    pub fn set_matrix(&mut self, matrix: &Matrix4<f32>) {
        let length = self.length();
        let columns: Vec<Vector3<f32>> = (0..3)
            .map(|c| {
                let column = Vector3::new(matrix[(0, c)], matrix[(1, c)], matrix[(2, c)]);
                column.try_normalize(f32::EPSILON).unwrap_or(column)
            })
            .collect();
        let orientation = Matrix3::from_columns(&columns);
        let y_axis: Vector3<f32> = orientation.column(1).into_owned();
        self.head = Point3::new(matrix[(0, 3)], matrix[(1, 3)], matrix[(2, 3)]);
        self.tail = self.head + y_axis * length;
        self.roll = mat3_to_roll(&orientation);
    }

    /// Everything a duplicate inherits from its source, except name and parent.
    pub fn copy_attributes_from(&mut self, source: &Bone) {
        self.head = source.head;
        self.tail = source.tail;
        self.layers = source.layers;
        self.use_connect = source.use_connect;
        self.use_deform = source.use_deform;
        self.roll = source.roll;
        self.inherit_rotation = source.inherit_rotation;
        self.use_local_location = source.use_local_location;
        self.inherit_scale = source.inherit_scale;
        self.bbone_segments = source.bbone_segments;
        self.bbone_ease_in = source.bbone_ease_in;
        self.bbone_ease_out = source.bbone_ease_out;
    }

    fn rotate_tail(&mut self, axis: Axis, theta: f32) {
        let direction = self.direction();
        if direction.norm() <= f32::EPSILON {
            warn!(bone = %self.name, "zero length bone has no orientation, skipped");
            return;
        }
        let axis = Unit::new_normalize(self.local_axis(axis));
        let rotation = Rotation3::from_axis_angle(&axis, theta);
        self.tail = self.head + rotation * direction;
    }
}

impl From<&RawBone> for Bone {
    fn from(raw: &RawBone) -> Self {
        Self {
            name: raw.name.clone(),
            head: Point3::from(raw.head),
            tail: Point3::from(raw.tail),
            roll: raw.roll,
            use_connect: raw.use_connect,
            use_deform: raw.use_deform,
            layers: raw.layers,
            inherit_rotation: raw.inherit_rotation,
            use_local_location: raw.use_local_location,
            inherit_scale: raw.inherit_scale,
            bbone_segments: raw.bbone_segments,
            bbone_ease_in: raw.bbone_ease_in,
            bbone_ease_out: raw.bbone_ease_out,
        }
    }
}

/// A skeleton whose bones can be edited.
///
/// Bones sit in a flat vector; the hierarchy is an arena tree whose root node
/// stands for the armature object itself, so top level bones are its children.
#[derive(Clone, Debug)]
pub struct EditArmature {
    name: String,
    bones: Vec<Bone>,
    bone_lookup: HashMap<String, usize>,
    bone_tree: Arena<Option<usize>>,
    root_handle: NodeId,
    tree_handles: Vec<NodeId>,
}

impl EditArmature {
    pub fn new(name: impl Into<String>) -> Self {
        let mut bone_tree = Arena::new();
        let root_handle = bone_tree.new_node(None);
        Self {
            name: name.into(),
            bones: Vec::new(),
            bone_lookup: HashMap::new(),
            bone_tree,
            root_handle,
            tree_handles: Vec::new(),
        }
    }

    pub fn extract(name: &str, raw_bones: &[RawBone]) -> Result<Self> {
        let mut armature = Self::new(name);
        for raw in raw_bones.iter() {
            if armature.bone_lookup.contains_key(&raw.name) {
                return Err(Error::DuplicateName { skeleton: name.into(), bone: raw.name.clone() });
            }
            let bone_id = armature.bones.len();
            let handle = armature.bone_tree.new_node(Some(bone_id));
            armature.bones.push(Bone::from(raw));
            armature.bone_lookup.insert(raw.name.clone(), bone_id);
            armature.tree_handles.push(handle);
        }
        for (bone_id, raw) in raw_bones.iter().enumerate() {
            let parent_handle = match &raw.parent {
                None => armature.root_handle,
                Some(parent) => {
                    let parent_id = armature.require_bone(parent)?;
                    armature.tree_handles[parent_id]
                }
            };
            armature.attach(bone_id, parent_handle)?;
        }
        debug!(skeleton = name, bones = armature.bones.len(), "armature extracted");
        Ok(armature)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    pub fn get_bone_by_name(&self, bone_name: &str) -> Option<usize> {
        self.bone_lookup.get(bone_name).copied()
    }

    pub fn bone_named(&self, bone_name: &str) -> Option<&Bone> {
        self.get_bone_by_name(bone_name).map(|id| &self.bones[id])
    }

    pub fn require_bone(&self, bone_name: &str) -> Result<usize> {
        self.get_bone_by_name(bone_name).ok_or_else(|| Error::BoneNotFound {
            skeleton: self.name.clone(),
            bone: bone_name.into(),
        })
    }

    pub fn parent_of(&self, bone_id: usize) -> Option<usize> {
        let parent = self.bone_tree[self.tree_handles[bone_id]].parent()?;
        *self.bone_tree[parent].get()
    }

    pub fn parent_name(&self, bone_id: usize) -> Option<&str> {
        self.parent_of(bone_id).map(|id| self.bones[id].name.as_str())
    }

    pub fn children_of(&self, bone_id: usize) -> Vec<usize> {
        self.child_ids(self.tree_handles[bone_id])
    }

    pub fn top_level_bones(&self) -> Vec<usize> {
        self.child_ids(self.root_handle)
    }

    fn child_ids(&self, handle: NodeId) -> Vec<usize> {
        handle
            .children(&self.bone_tree)
            .filter_map(|child| *self.bone_tree[child].get())
            .collect()
    }

    /// Opens an edit scope; closes when the returned handle drops.
    pub fn edit_bones(&mut self) -> EditBonesMut<'_> {
        trace!(skeleton = %self.name, "enter edit scope");
        EditBonesMut { armature: self }
    }

    pub fn to_raw(&self) -> Vec<RawBone> {
        self.bones
            .iter()
            .enumerate()
            .map(|(bone_id, bone)| RawBone {
                name: bone.name.clone(),
                parent: self.parent_name(bone_id).map(String::from),
                head: [bone.head.x, bone.head.y, bone.head.z],
                tail: [bone.tail.x, bone.tail.y, bone.tail.z],
                roll: bone.roll,
                use_connect: bone.use_connect,
                use_deform: bone.use_deform,
                layers: bone.layers,
                inherit_rotation: bone.inherit_rotation,
                use_local_location: bone.use_local_location,
                inherit_scale: bone.inherit_scale,
                bbone_segments: bone.bbone_segments,
                bbone_ease_in: bone.bbone_ease_in,
                bbone_ease_out: bone.bbone_ease_out,
            })
            .collect()
    }

    /// Rotates every bone about the armature origin, rolls included.
    pub fn rotate(&mut self, rotation: &Rotation3<f32>) {
        for bone in self.bones.iter_mut() {
            let orientation = rotation.matrix() * bone.orientation();
            bone.head = rotation * bone.head;
            bone.tail = rotation * bone.tail;
            bone.roll = mat3_to_roll(&orientation);
        }
    }

    // Connected children keep their head on the parent's tail; their own tails stay put.
    fn snap_connected_children(&mut self, bone_id: usize) {
        let tail = self.bones[bone_id].tail;
        for child_id in self.children_of(bone_id) {
            if self.bones[child_id].use_connect {
                self.bones[child_id].head = tail;
            }
        }
    }

    fn attach(&mut self, bone_id: usize, parent_handle: NodeId) -> Result<()> {
        let handle = self.tree_handles[bone_id];
        handle.detach(&mut self.bone_tree);
        parent_handle
            .checked_append(handle, &mut self.bone_tree)
            .map_err(|err| {
                let reason = match err {
                    NodeError::AppendSelf => format!("bone `{}` is its own parent", self.bones[bone_id].name),
                    NodeError::AppendAncestor => format!("bone `{}` is its own ancestor", self.bones[bone_id].name),
                    other => format!("bone `{}`: {:?}", self.bones[bone_id].name, other),
                };
                Error::InvalidHierarchy { skeleton: self.name.clone(), reason }
            })
    }

    fn push_bone(&mut self, bone: Bone, parent: Option<usize>) -> Result<usize> {
        let bone_id = self.bones.len();
        let handle = self.bone_tree.new_node(Some(bone_id));
        self.bone_lookup.insert(bone.name.clone(), bone_id);
        self.bones.push(bone);
        self.tree_handles.push(handle);
        let parent_handle = match parent {
            Some(parent_id) => self.tree_handles[parent_id],
            None => self.root_handle,
        };
        self.attach(bone_id, parent_handle)?;
        Ok(bone_id)
    }
}

/// Edit scope over an armature's bones.
pub struct EditBonesMut<'a> {
    armature: &'a mut EditArmature,
}

impl<'a> EditBonesMut<'a> {
    pub fn armature(&self) -> &EditArmature {
        self.armature
    }

    /// Rotates the bone's tail around its head about one of its own local axes.
    ///
    /// Connected children always follow the new tail with their head. With
    /// `recursion_depth > 0` every child, down to that many levels, also gets the
    /// same rotation about its own local axis after its parent has moved.
    pub fn reorient(&mut self, bone_id: usize, axis: Axis, angle_degrees: f32, recursion_depth: usize) {
        let mut visited = HashSet::new();
        self.reorient_visit(bone_id, axis, angle_degrees.to_radians(), recursion_depth, &mut visited);
    }

    fn reorient_visit(
        &mut self,
        bone_id: usize,
        axis: Axis,
        theta: f32,
        recursion_depth: usize,
        visited: &mut HashSet<usize>,
    ) {
        if !visited.insert(bone_id) {
            warn!(bone = %self.armature.bones[bone_id].name, "bone reached twice while reorienting");
            return;
        }
        self.armature.bones[bone_id].rotate_tail(axis, theta);
        self.armature.snap_connected_children(bone_id);

        if recursion_depth > 0 {
            for child_id in self.armature.children_of(bone_id) {
                self.reorient_visit(child_id, axis, theta, recursion_depth - 1, visited);
            }
        }
    }

    pub fn add_roll(&mut self, bone_id: usize, degrees: f32) {
        self.armature.bones[bone_id].roll += degrees.to_radians();
    }

    /// Looks up the rule's bone, adds its roll, then reorients it.
    pub fn apply_orientation(&mut self, rule: &OrientationRule) -> Result<usize> {
        let bone_id = self.armature.require_bone(&rule.name)?;
        if let Some(roll_add) = rule.roll_add {
            self.add_roll(bone_id, roll_add);
        }
        self.reorient(bone_id, rule.axis, rule.angle, rule.recursive);
        debug!(
            bone = %rule.name,
            axis = ?rule.axis,
            angle = rule.angle,
            recursive = rule.recursive,
            "bone reoriented"
        );
        Ok(bone_id)
    }

    /// Adds the bone described by `rule`.
    ///
    /// Overrides apply in order: parent, head, tail, matrix. An explicit
    /// `parent_bone` wins over `parent_root`.
    pub fn create_bone(&mut self, rule: &CreationRule) -> Result<usize> {
        if self.armature.bone_lookup.contains_key(&rule.name) {
            return Err(Error::DuplicateName {
                skeleton: self.armature.name.clone(),
                bone: rule.name.clone(),
            });
        }
        let source_id = match &rule.source_bone {
            Some(source) => Some(self.armature.require_bone(source)?),
            None => None,
        };
        let parent_bone_id = match &rule.parent_bone {
            Some(parent) => Some(self.armature.require_bone(parent)?),
            None => None,
        };

        let mut bone = Bone::new(rule.name.clone());
        let mut parent = None;
        if let Some(source_id) = source_id {
            bone.copy_attributes_from(&self.armature.bones[source_id]);
            parent = self.armature.parent_of(source_id);
        }
        match parent_bone_id {
            Some(parent_id) => {
                if rule.parent_root {
                    warn!(bone = %rule.name, "both parent_bone and parent_root given, keeping parent_bone");
                }
                parent = Some(parent_id);
            }
            None if rule.parent_root => parent = None,
            None => {}
        }
        if let Some(head) = rule.head_point() {
            bone.head = head;
        }
        if let Some(tail) = rule.tail_point() {
            bone.tail = tail;
        }
        if let Some(matrix) = rule.bone_matrix() {
            bone.set_matrix(&matrix);
        }

        let bone_id = self.armature.push_bone(bone, parent)?;
        debug!(
            bone = %rule.name,
            source = ?rule.source_bone,
            parent = ?self.armature.parent_name(bone_id),
            "bone created"
        );
        Ok(bone_id)
    }
}

impl<'a> Drop for EditBonesMut<'a> {
    fn drop(&mut self) {
        trace!(skeleton = %self.armature.name, "exit edit scope");
    }
}

impl<'a> Index<usize> for EditBonesMut<'a> {
    type Output = Bone;
    fn index(&self, index: usize) -> &Self::Output {
        &self.armature.bones[index]
    }
}

impl<'a> IndexMut<usize> for EditBonesMut<'a> {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.armature.bones[index]
    }
}

#[derive(Clone, Debug)]
pub enum ObjectData {
    Armature(EditArmature),
    Mesh,
    Empty,
}

#[derive(Clone, Debug)]
pub struct SceneObject {
    pub name: String,
    /// XYZ euler, radians.
    pub rotation: Vector3<f32>,
    pub data: ObjectData,
}

impl SceneObject {
    pub fn is_armature(&self) -> bool {
        matches!(self.data, ObjectData::Armature(_))
    }

    pub fn has_unapplied_rotation(&self) -> bool {
        self.rotation != Vector3::zeros()
    }
}

/// Objects a conversion can pick its skeleton from, looked up by name.
#[derive(Clone, Debug, Default)]
pub struct Scene {
    objects: Vec<SceneObject>,
}

impl Scene {
    pub fn load(scene_bytes: &[u8]) -> Result<Self> {
        let raw: RawSceneData =
            serde_json::from_slice(scene_bytes).map_err(|source| Error::Parse { origin: "scene".into(), source })?;
        Self::extract(&raw)
    }

    pub fn extract(raw: &RawSceneData) -> Result<Self> {
        let mut objects = Vec::with_capacity(raw.objects.len());
        for object in raw.objects.iter() {
            if objects.iter().any(|it: &SceneObject| it.name == object.name()) {
                warn!(object = object.name(), "duplicate object name, lookups find the first one");
            }
            let scene_object = match object {
                RawObjectData::Armature { name, rotation, bones } => SceneObject {
                    name: name.clone(),
                    rotation: Vector3::from(*rotation),
                    data: ObjectData::Armature(EditArmature::extract(name, bones)?),
                },
                RawObjectData::Mesh { name, rotation } => SceneObject {
                    name: name.clone(),
                    rotation: Vector3::from(*rotation),
                    data: ObjectData::Mesh,
                },
                RawObjectData::Empty { name, rotation } => SceneObject {
                    name: name.clone(),
                    rotation: Vector3::from(*rotation),
                    data: ObjectData::Empty,
                },
            };
            objects.push(scene_object);
        }
        Ok(Self { objects })
    }

    pub fn to_raw(&self) -> RawSceneData {
        let objects = self
            .objects
            .iter()
            .map(|object| {
                let name = object.name.clone();
                let rotation = [object.rotation.x, object.rotation.y, object.rotation.z];
                match &object.data {
                    ObjectData::Armature(armature) => RawObjectData::Armature { name, rotation, bones: armature.to_raw() },
                    ObjectData::Mesh => RawObjectData::Mesh { name, rotation },
                    ObjectData::Empty => RawObjectData::Empty { name, rotation },
                }
            })
            .collect();
        RawSceneData { objects }
    }

    pub fn add_object(&mut self, object: SceneObject) {
        self.objects.push(object);
    }

    pub fn add_armature(&mut self, armature: EditArmature) {
        self.add_object(SceneObject {
            name: armature.name().to_string(),
            rotation: Vector3::zeros(),
            data: ObjectData::Armature(armature),
        });
    }

    /// Bakes the object's rotation into its bones and zeroes it.
    pub fn apply_rotation(&mut self, name: &str) -> Result<()> {
        let object = self
            .objects
            .iter_mut()
            .find(|it| it.name == name)
            .ok_or_else(|| Error::SkeletonNotFound(name.into()))?;
        let rotation = Rotation3::from_euler_angles(object.rotation.x, object.rotation.y, object.rotation.z);
        if let ObjectData::Armature(armature) = &mut object.data {
            armature.rotate(&rotation);
        }
        object.rotation = Vector3::zeros();
        debug!(object = name, "rotation applied");
        Ok(())
    }

    pub fn objects(&self) -> &[SceneObject] {
        &self.objects
    }

    pub fn object(&self, name: &str) -> Option<&SceneObject> {
        self.objects.iter().find(|it| it.name == name)
    }

    pub fn armature(&self, name: &str) -> Result<&EditArmature> {
        match self.object(name).map(|it| &it.data) {
            Some(ObjectData::Armature(armature)) => Ok(armature),
            _ => Err(Error::SkeletonNotFound(name.into())),
        }
    }

    pub fn armature_mut(&mut self, name: &str) -> Result<&mut EditArmature> {
        match self.objects.iter_mut().find(|it| it.name == name).map(|it| &mut it.data) {
            Some(ObjectData::Armature(armature)) => Ok(armature),
            _ => Err(Error::SkeletonNotFound(name.into())),
        }
    }
}
