//! WeChat sign-in callback handling
//!
//! One pipeline ([`CallbackOrchestrator`]) serves every flow; the flow-specific
//! parts live in [`strategy`], and the `state` string layout in [`state`].

mod error;
pub mod orchestrator;
pub mod page;
pub mod state;
pub mod strategy;
pub mod username;


pub use error::FlowError;
pub use orchestrator::{AuthorizationGrant, CallbackOrchestrator, CallbackQuery, CallbackRoute};
pub use state::{CallbackState, Flow};
pub use strategy::{FlowDeps, FlowOutcome, FlowStrategy};
pub use username::UsernameMaterializer;
