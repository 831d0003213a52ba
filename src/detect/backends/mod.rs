pub mod scripted;
pub mod stub;

pub use scripted::ScriptedDetector;
pub use stub::StubDetector;
