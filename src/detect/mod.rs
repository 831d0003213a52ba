mod backend;
mod backends;
mod result;

pub use backend::FeatureDetector;
pub use backends::{ScriptedDetector, StubDetector};
pub use result::{MarkerDetection, PointMatch};
