//! Supporter enrollment. Turns a visitor of a cause page into a recorded
//! supporter across sign-in redirects, the one-time survey and the join call.

pub mod context;
pub mod executor;
pub mod gate;
pub mod guard;
pub mod identity;
pub mod matcher;
pub mod memory;
pub mod page;
pub mod providers;
pub mod state_machine;
pub mod survey;

pub use executor::{EnrollmentExecutor, JoinOutcome};
pub use gate::{EnrollmentGate, GateAction, SupportRequest};
pub use identity::IdentityResolver;
pub use matcher::{SupporterIdentity, SupporterMatcher, SupporterRoster};
pub use page::{CallToAction, EnrollmentServices, SupportPage};
pub use providers::{CauseProvider, JoinEndpoint, ProfileProvider};
pub use state_machine::EnrollmentStateMachine;
pub use survey::{SurveyCoordinator, SurveyOutcome};
