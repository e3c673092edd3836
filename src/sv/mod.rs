pub mod application;
pub mod release;

pub use application::Application;
pub use release::Release;
