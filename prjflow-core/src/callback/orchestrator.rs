use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};

use super::{
    state::{has_reserved_prefix, CallbackState, Flow},
    strategy::{FlowDeps, FlowOutcome, FlowStrategy},
    FlowError,
};
use crate::{
    config::WeChatConfig,
    models::{NotificationKind, UserId},
    service::TicketHub,
    wechat::{authorization_url, CredentialResolver, IdentityProviderFactory},
};

const MSG_SCANNED: &str = "scanned, authorizing";
const MSG_FETCHING_PROFILE: &str = "fetching profile";

/// Which callback endpoint the provider redirected to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackRoute {
    Init,
    Login,
    Bind,
    AddUser,
}

impl CallbackRoute {
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Init => "/api/init/callback",
            Self::Login => "/api/auth/wechat/callback",
            Self::Bind => "/api/auth/wechat/bind/callback",
            Self::AddUser => "/api/users/wechat/add/callback",
        }
    }

    /// The flow whose authorization URLs redirect here
    #[must_use]
    pub const fn flow(self) -> Flow {
        match self {
            Self::Init => Flow::Bootstrap,
            Self::Login => Flow::Login,
            Self::Bind => Flow::Bind,
            Self::AddUser => Flow::Provision,
        }
    }
}

/// Query string the provider appends to the redirect
#[derive(Debug, Clone, Default)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
}

impl CallbackQuery {
    /// Lenient parse of a raw query string
    ///
    /// The first occurrence of each key wins; unknown keys and undecodable
    /// bytes are tolerated so a malformed redirect still reaches the pipeline.
    #[must_use]
    pub fn from_query_string(raw: &str) -> Self {
        let mut query = Self::default();
        for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
            let slot = match key.as_ref() {
                "code" => &mut query.code,
                "state" => &mut query.state,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }
        query
    }
}

/// A ticket and the provider URL that will report back under it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorizationGrant {
    pub ticket: String,
    pub auth_url: String,
}

/// Runs the shared WeChat callback pipeline for every flow
pub struct CallbackOrchestrator {
    hub: TicketHub,
    providers: Arc<dyn IdentityProviderFactory>,
    credentials: CredentialResolver,
    callback_base: String,
    deps: FlowDeps,
}

impl CallbackOrchestrator {
    pub fn new(
        hub: TicketHub,
        providers: Arc<dyn IdentityProviderFactory>,
        config: WeChatConfig,
        deps: FlowDeps,
    ) -> Self {
        let callback_base = config.callback_base_url.trim_end_matches('/').to_string();
        Self {
            hub,
            providers,
            credentials: CredentialResolver::new(deps.settings.clone(), config),
            callback_base,
            deps,
        }
    }

    #[must_use]
    pub const fn hub(&self) -> &TicketHub {
        &self.hub
    }

    /// Resolver for the provider settings currently in effect
    #[must_use]
    pub const fn credentials(&self) -> &CredentialResolver {
        &self.credentials
    }

    /// Issue the provider URL for `route`
    ///
    /// A missing ticket is generated. Bind and provision need the signed-in
    /// `acting_user`; bind remembers it against the ticket.
    pub async fn build_authorization_url(
        &self,
        route: CallbackRoute,
        ticket: Option<&str>,
        acting_user: Option<UserId>,
    ) -> Result<AuthorizationGrant, FlowError> {
        let flow = route.flow();
        let ticket = match ticket.map(str::trim).filter(|t| !t.is_empty()) {
            Some(ticket) => ticket.to_string(),
            None => nanoid::nanoid!(),
        };
        if flow.is_untagged() && has_reserved_prefix(&ticket) {
            return Err(FlowError::InvalidRequest(
                "ticket must not start with a reserved prefix".to_string(),
            ));
        }

        let credentials = self.credentials.resolve().await?;
        let strategy = FlowStrategy::for_flow(flow, &self.deps);
        let user_id = strategy.authorize(&ticket, acting_user).await?;

        let state = CallbackState::new(flow, ticket.clone(), user_id).encode();
        let redirect_uri = format!("{}{}", self.callback_base, route.path());
        let auth_url = authorization_url(&credentials, &redirect_uri, &state)?;

        debug!(flow = %flow, ticket = %ticket, "Authorization URL issued");

        Ok(AuthorizationGrant {
            ticket,
            auth_url: auth_url.to_string(),
        })
    }

    /// Handle one provider redirect and render the page for the browser tab
    ///
    /// Never fails: every error is pushed to the ticket's subscribers and
    /// rendered through the flow's error page.
    pub async fn handle_callback(&self, route: CallbackRoute, query: &CallbackQuery) -> String {
        let mut state = CallbackState::decode(query.state.as_deref().unwrap_or_default());
        if state.flow == Flow::Login && route == CallbackRoute::Bind {
            state.flow = Flow::Bind;
        }
        if state.flow != route.flow() {
            debug!(route = ?route, flow = %state.flow, "Callback state does not match route");
        }

        let strategy = FlowStrategy::for_flow(state.flow, &self.deps);
        let span = info_span!("wechat_callback", flow = %state.flow, ticket = %state.ticket);

        async {
            match self.run(&strategy, &state, query.code.as_deref()).await {
                Ok(outcome) => {
                    info!("WeChat callback completed");
                    self.hub.publish(
                        &state.ticket,
                        NotificationKind::Success,
                        Some(outcome.payload.clone()),
                        outcome.message.clone(),
                    );
                    strategy.success_html(&outcome)
                }
                Err(err) => {
                    warn!(error = %err, "WeChat callback failed");
                    self.hub.publish(
                        &state.ticket,
                        NotificationKind::Error,
                        None,
                        err.public_message(),
                    );
                    strategy.error_html(&err)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run(
        &self,
        strategy: &FlowStrategy,
        state: &CallbackState,
        code: Option<&str>,
    ) -> Result<FlowOutcome, FlowError> {
        let code = code
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or(FlowError::MissingCode)?;

        // resolved per callback so saved settings apply without a restart
        let credentials = self.credentials.resolve().await?;

        strategy.validate(state).await?;

        self.notify(&state.ticket, MSG_SCANNED);

        let provider = self.providers.connect(&credentials)?;
        let token = provider.exchange_code(code).await.map_err(|e| {
            FlowError::provider(
                format!(
                    "failed to exchange authorization code: {e} ({})",
                    credentials.diagnostic()
                ),
                e,
            )
        })?;

        self.notify(&state.ticket, MSG_FETCHING_PROFILE);

        let identity = provider
            .fetch_profile(&token.access_token, &token.open_id)
            .await
            .map_err(|e| FlowError::provider(format!("failed to fetch WeChat profile: {e}"), e))?;

        strategy.process(state, &identity).await
    }

    fn notify(&self, ticket: &str, text: &str) {
        self.hub.publish(ticket, NotificationKind::Info, None, text);
    }
}
