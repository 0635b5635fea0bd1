pub mod curve;
pub mod surface;

pub use curve::{Circle, Curve, CurveDomain, Line, Polyline};
pub use surface::{Cylinder, Plane, Surface, SurfaceDomain};
