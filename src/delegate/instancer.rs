use glam::Mat4;
use thiserror::Error;

use crate::path::ScenePath;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InstancerError {
    #[error("instancer {0} does not exist")]
    UnknownInstancer(ScenePath),
    #[error("{indices} prototype indices but {transforms} instance transforms")]
    LengthMismatch { indices: usize, transforms: usize },
    #[error("instance {instance} uses prototype {index} but only {prototypes} prototypes exist")]
    PrototypeOutOfRange {
        instance: usize,
        index: i32,
        prototypes: usize,
    },
}

/// Many transformed copies of a set of prototype prims.
///
/// Instance `i` draws `prototypes[prototype_indices[i]]` with
/// `transforms[i]`.
#[derive(Clone, Debug, PartialEq)]
pub struct InstancerRecord {
    pub id: ScenePath,
    pub root_transform: Mat4,
    prototypes: Vec<ScenePath>,
    prototype_indices: Vec<i32>,
    transforms: Vec<Mat4>,
}

impl InstancerRecord {
    pub fn new(id: ScenePath, root_transform: Mat4) -> Self {
        Self {
            id,
            root_transform,
            prototypes: Vec::new(),
            prototype_indices: Vec::new(),
            transforms: Vec::new(),
        }
    }

    pub fn add_prototype(&mut self, prototype: ScenePath) {
        if !self.prototypes.contains(&prototype) {
            self.prototypes.push(prototype);
        }
    }

    /// Replaces the per-instance data after checking it.
    ///
    /// On error the record is left unchanged.
    pub fn set_instances(
        &mut self,
        prototype_indices: Vec<i32>,
        transforms: Vec<Mat4>,
    ) -> Result<(), InstancerError> {
        check(&self.prototypes, &prototype_indices, &transforms)?;
        self.prototype_indices = prototype_indices;
        self.transforms = transforms;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), InstancerError> {
        check(&self.prototypes, &self.prototype_indices, &self.transforms)
    }

    pub fn prototypes(&self) -> &[ScenePath] {
        &self.prototypes
    }

    pub fn prototype_indices(&self) -> &[i32] {
        &self.prototype_indices
    }

    pub fn transforms(&self) -> &[Mat4] {
        &self.transforms
    }

    pub fn instance_count(&self) -> usize {
        self.prototype_indices.len()
    }

    /// Instance slots drawing `prototype`, ascending.
    pub fn instance_indices(&self, prototype: &ScenePath) -> Vec<i32> {
        let Some(wanted) = self.prototypes.iter().position(|p| p == prototype) else {
            return Vec::new();
        };
        self.prototype_indices
            .iter()
            .enumerate()
            .filter(|(_, index)| **index as usize == wanted)
            .map(|(slot, _)| slot as i32)
            .collect()
    }

    /// Maps a flat instance slot back to its prototype and instance transform.
    pub fn resolve(&self, instance: usize) -> Option<(&ScenePath, Mat4)> {
        let index = *self.prototype_indices.get(instance)?;
        let prototype = self.prototypes.get(usize::try_from(index).ok()?)?;
        Some((prototype, self.transforms[instance]))
    }
}

fn check(
    prototypes: &[ScenePath],
    indices: &[i32],
    transforms: &[Mat4],
) -> Result<(), InstancerError> {
    if indices.len() != transforms.len() {
        return Err(InstancerError::LengthMismatch {
            indices: indices.len(),
            transforms: transforms.len(),
        });
    }
    for (instance, &index) in indices.iter().enumerate() {
        if index < 0 || index as usize >= prototypes.len() {
            return Err(InstancerError::PrototypeOutOfRange {
                instance,
                index,
                prototypes: prototypes.len(),
            });
        }
    }
    Ok(())
}
