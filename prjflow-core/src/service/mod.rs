pub mod bind_ticket;
pub mod ticket_hub;
pub mod token;

pub use bind_ticket::PendingBindings;
pub use ticket_hub::{SubscriptionId, TicketHub, TicketSubscription};
pub use token::{Claims, TokenIssuer};
