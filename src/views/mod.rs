//! Headless screen controllers. The web layer renders what they decide.

pub mod dashboard;
pub mod landing;

pub use dashboard::{DashboardController, DashboardView};
pub use landing::Landing;
