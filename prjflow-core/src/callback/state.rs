//! `state` parameter codec
//!
//! The only place that knows the string layout:
//!
//! | flow       | layout                              |
//! |------------|-------------------------------------|
//! | bootstrap  | `ticket:<ticket>`                   |
//! | provision  | `adduser:<ticket>:<user id>`        |
//! | login/bind | `<ticket>`                          |
//!
//! Provision tickets may contain `:`; the user id is split off at the last one.

use std::fmt;

use crate::models::UserId;

const BOOTSTRAP_PREFIX: &str = "ticket:";
const PROVISION_PREFIX: &str = "adduser:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flow {
    Bootstrap,
    Login,
    Bind,
    Provision,
}

impl Flow {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bootstrap => "bootstrap",
            Self::Login => "login",
            Self::Bind => "bind",
            Self::Provision => "provision",
        }
    }

    /// Login and bind put the bare ticket in `state`
    #[must_use]
    pub const fn is_untagged(self) -> bool {
        matches!(self, Self::Login | Self::Bind)
    }
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackState {
    pub flow: Flow,
    pub ticket: String,
    pub user_id: Option<UserId>,
}

impl CallbackState {
    #[must_use]
    pub fn new(flow: Flow, ticket: impl Into<String>, user_id: Option<UserId>) -> Self {
        Self {
            flow,
            ticket: ticket.into(),
            user_id,
        }
    }

    /// Render the `state` string
    ///
    /// A provision state without a user id renders with an empty id segment,
    /// which decodes as malformed.
    #[must_use]
    pub fn encode(&self) -> String {
        match self.flow {
            Flow::Bootstrap => format!("{BOOTSTRAP_PREFIX}{}", self.ticket),
            Flow::Provision => format!(
                "{PROVISION_PREFIX}{}:{}",
                self.ticket,
                self.user_id.map(|id| id.to_string()).unwrap_or_default()
            ),
            Flow::Login | Flow::Bind => self.ticket.clone(),
        }
    }

    /// Parse a `state` string; never fails
    ///
    /// Untagged input decodes as [`Flow::Login`]; callers on the bind route
    /// reinterpret it. A malformed provision state yields an empty ticket and
    /// no user id.
    #[must_use]
    pub fn decode(state: &str) -> Self {
        if let Some(ticket) = state.strip_prefix(BOOTSTRAP_PREFIX) {
            return Self::new(Flow::Bootstrap, ticket, None);
        }

        if let Some(rest) = state.strip_prefix(PROVISION_PREFIX) {
            return match rest.rfind(':') {
                Some(idx) if idx > 0 => match rest[idx + 1..].parse::<UserId>() {
                    Ok(user_id) => Self::new(Flow::Provision, &rest[..idx], Some(user_id)),
                    Err(_) => Self::new(Flow::Provision, "", None),
                },
                _ => Self::new(Flow::Provision, "", None),
            };
        }

        Self::new(Flow::Login, state, None)
    }
}

/// Whether an untagged ticket would be mistaken for a tagged state
#[must_use]
pub fn has_reserved_prefix(ticket: &str) -> bool {
    ticket.starts_with(BOOTSTRAP_PREFIX) || ticket.starts_with(PROVISION_PREFIX)
}
