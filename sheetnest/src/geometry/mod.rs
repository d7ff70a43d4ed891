mod aabb;
mod collision;
mod polygon;

#[doc(inline)]
pub use aabb::AABB;
#[doc(inline)]
pub use aabb::Footprint;
#[doc(inline)]
pub use aabb::PartPose;
#[doc(inline)]
pub use aabb::effective_box;
#[doc(inline)]
pub use collision::find_collisions;
#[doc(inline)]
pub use collision::find_out_of_bounds;
#[doc(inline)]
pub use collision::out_of_bounds;
#[doc(inline)]
pub use collision::overlaps;
#[doc(inline)]
pub use collision::utilization;
#[doc(inline)]
pub use polygon::Polygon;
