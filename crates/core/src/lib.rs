pub mod config;
pub mod error;
pub mod event_bus;
pub mod intent;
pub mod types;

pub use config::AppConfig;
pub use error::{SupportError, SupportResult};
pub use intent::{EnrollmentIntent, IntentStore};
