//! Scene objects and their container.

use crate::transform::Transform;
use ash::vk;
use glam::Vec3;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Handle to drawable geometry.
///
/// Implemented by the renderer's mesh type; scene code never needs to know
/// how vertex data is stored on the GPU.
pub trait Geometry: Send + Sync {
    /// Bind vertex (and index) buffers.
    fn bind(&self, device: &ash::Device, cmd: vk::CommandBuffer);

    /// Issue the draw call. The pipeline and buffers must already be bound.
    fn draw(&self, device: &ash::Device, cmd: vk::CommandBuffer);
}

/// Stable identifier for a scene object.
pub type SceneObjectId = u32;

/// A renderable or light-emitting entity.
pub struct SceneObject {
    pub geometry: Option<Arc<dyn Geometry>>,
    pub transform: Transform,
    pub color: Vec3,
}

impl SceneObject {
    /// Create an object with geometry at the default transform.
    pub fn with_geometry(geometry: Arc<dyn Geometry>) -> Self {
        Self {
            geometry: Some(geometry),
            transform: Transform::default(),
            color: Vec3::ONE,
        }
    }

    /// Create an object with no geometry, such as a point light.
    pub fn empty() -> Self {
        Self {
            geometry: None,
            transform: Transform::default(),
            color: Vec3::ONE,
        }
    }
}

/// Ordered collection of scene objects with stable, monotonically assigned
/// ids. Iteration order is id order, so draw order is deterministic.
#[derive(Default)]
pub struct SceneObjectMap {
    objects: BTreeMap<SceneObjectId, SceneObject>,
    next_id: SceneObjectId,
}

impl SceneObjectMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an object, returning its id.
    pub fn insert(&mut self, object: SceneObject) -> SceneObjectId {
        let id = self.next_id;
        self.next_id += 1;
        self.objects.insert(id, object);
        id
    }

    /// Look up an object.
    pub fn get(&self, id: SceneObjectId) -> Option<&SceneObject> {
        self.objects.get(&id)
    }

    /// Look up an object mutably.
    pub fn get_mut(&mut self, id: SceneObjectId) -> Option<&mut SceneObject> {
        self.objects.get_mut(&id)
    }

    /// Remove an object. Its id is never reused.
    pub fn remove(&mut self, id: SceneObjectId) -> Option<SceneObject> {
        self.objects.remove(&id)
    }

    /// Number of objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Iterate in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&SceneObjectId, &SceneObject)> {
        self.objects.iter()
    }

    /// Iterate mutably in id order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&SceneObjectId, &mut SceneObject)> {
        self.objects.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_monotonic() {
        let mut map = SceneObjectMap::new();
        let a = map.insert(SceneObject::empty());
        let b = map.insert(SceneObject::empty());
        assert!(b > a);
    }

    #[test]
    fn removed_ids_are_not_reused() {
        let mut map = SceneObjectMap::new();
        let a = map.insert(SceneObject::empty());
        map.remove(a);
        let b = map.insert(SceneObject::empty());
        assert_ne!(a, b);
        assert!(map.get(a).is_none());
        assert!(map.get(b).is_some());
    }

    #[test]
    fn iteration_is_in_id_order() {
        let mut map = SceneObjectMap::new();
        let ids: Vec<_> = (0..5).map(|_| map.insert(SceneObject::empty())).collect();
        let iterated: Vec<_> = map.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, iterated);
    }
}
