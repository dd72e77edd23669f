pub mod stub;
pub mod tract;

pub use stub::StubBackend;
pub use tract::TractBackend;
