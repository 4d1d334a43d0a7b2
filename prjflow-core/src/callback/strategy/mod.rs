//! Per-flow behavior plugged into the shared callback pipeline

mod bind;
mod bootstrap;
mod login;
mod provision;

use serde_json::Value;
use std::sync::Arc;

pub use bind::BindFlow;
pub use bootstrap::BootstrapFlow;
pub use login::LoginFlow;
pub use provision::ProvisionFlow;

use super::{
    page::{render_page, PageKind},
    state::{CallbackState, Flow},
    FlowError, UsernameMaterializer,
};
use crate::{
    models::UserId,
    repository::{AccountStore, SettingsStore},
    service::{PendingBindings, TokenIssuer},
    wechat::RemoteIdentity,
};

/// Collaborators the strategies draw from
#[derive(Clone)]
pub struct FlowDeps {
    pub accounts: Arc<dyn AccountStore>,
    pub settings: Arc<dyn SettingsStore>,
    pub tokens: TokenIssuer,
    pub bindings: PendingBindings,
    pub usernames: UsernameMaterializer,
}

/// What a successful `process` hands back to the pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct FlowOutcome {
    pub payload: Value,
    pub message: String,
}

impl FlowOutcome {
    pub fn new(payload: Value, message: impl Into<String>) -> Self {
        Self {
            payload,
            message: message.into(),
        }
    }
}

pub enum FlowStrategy {
    Bootstrap(BootstrapFlow),
    Login(LoginFlow),
    Bind(BindFlow),
    Provision(ProvisionFlow),
}

impl FlowStrategy {
    #[must_use]
    pub fn for_flow(flow: Flow, deps: &FlowDeps) -> Self {
        match flow {
            Flow::Bootstrap => Self::Bootstrap(BootstrapFlow::new(deps)),
            Flow::Login => Self::Login(LoginFlow::new(deps)),
            Flow::Bind => Self::Bind(BindFlow::new(deps)),
            Flow::Provision => Self::Provision(ProvisionFlow::new(deps)),
        }
    }

    /// Checks run before the authorization URL is handed out
    ///
    /// Returns the user id to embed in `state`, if the flow carries one.
    pub async fn authorize(
        &self,
        ticket: &str,
        acting_user: Option<UserId>,
    ) -> Result<Option<UserId>, FlowError> {
        match self {
            Self::Bootstrap(flow) => flow.validate().await.map(|()| None),
            Self::Login(_) => Ok(None),
            Self::Bind(flow) => flow.register(ticket, acting_user).await.map(|()| None),
            Self::Provision(flow) => {
                let user_id = acting_user
                    .ok_or_else(|| FlowError::Precondition("login required".to_string()))?;
                flow.ensure_can_create(user_id).await.map(|()| Some(user_id))
            }
        }
    }

    /// Preconditions checked before any remote call
    pub async fn validate(&self, state: &CallbackState) -> Result<(), FlowError> {
        match self {
            Self::Bootstrap(flow) => flow.validate().await,
            Self::Login(_) => Ok(()),
            Self::Bind(flow) => flow.validate(&state.ticket).await,
            Self::Provision(flow) => flow.validate(state.user_id).await,
        }
    }

    pub async fn process(
        &self,
        state: &CallbackState,
        identity: &RemoteIdentity,
    ) -> Result<FlowOutcome, FlowError> {
        match self {
            Self::Bootstrap(flow) => flow.process(identity).await,
            Self::Login(flow) => flow.process(identity).await,
            Self::Bind(flow) => flow.process(&state.ticket, identity).await,
            Self::Provision(flow) => flow.process(state.user_id, identity).await,
        }
    }

    #[must_use]
    pub fn success_html(&self, outcome: &FlowOutcome) -> String {
        let title = match self {
            Self::Bootstrap(_) => "Initialization complete",
            Self::Login(_) => "Login successful",
            Self::Bind(_) => "Binding successful",
            Self::Provision(_) => "User added",
        };
        let hint = format!("{}. You can close this window.", outcome.message);
        render_page(PageKind::Success, title, &hint)
    }

    #[must_use]
    pub fn error_html(&self, err: &FlowError) -> String {
        let title = match self {
            Self::Bootstrap(_) => "Initialization failed",
            Self::Login(_) => "Login failed",
            Self::Bind(_) => "Binding failed",
            Self::Provision(_) => "Adding user failed",
        };
        render_page(PageKind::Error, title, &err.public_message())
    }
}

/// Nickname for a freshly created account
fn nickname_or_username(identity: &RemoteIdentity, username: &str) -> String {
    if identity.nickname.is_empty() {
        username.to_string()
    } else {
        identity.nickname.clone()
    }
}
