pub mod browser;
pub mod driver;
pub mod traits;
pub mod types;

#[cfg(test)]
pub(crate) mod fake;

pub use browser::ChromeLauncher;
pub use driver::{DriverReport, PublicationDriver};
pub use traits::SessionLauncher;
pub use types::PortalLayout;
