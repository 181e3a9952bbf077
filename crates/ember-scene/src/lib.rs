//! Scene representation for the Ember engine.
//!
//! Transforms, the camera, and the object container live here, independent
//! of any GPU resources. Geometry is reached only through the [`Geometry`]
//! trait so the scene can be built and tested without a device.

pub mod camera;
pub mod object;
pub mod transform;

pub use camera::Camera;
pub use object::{Geometry, SceneObject, SceneObjectId, SceneObjectMap};
pub use transform::Transform;
