mod stub;
#[cfg(feature = "backend-tract")]
mod tract;

pub use stub::{ScriptedBackend, StubBackend};
#[cfg(feature = "backend-tract")]
pub use tract::TractBackend;
