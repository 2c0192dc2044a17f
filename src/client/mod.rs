//! STOMP client: connection, subscriptions and inbound messages.

mod connection;
mod handle;
pub mod message;
pub mod options;
pub mod registry;
pub mod state;

pub use connection::{DropReason, PublishOutcome, StompClient};
pub use handle::SubscriptionHandle;
pub use message::{MessageBody, StompMessage};
pub use options::{ConnectOptions, ResubscribePolicy};
pub use registry::{MessageHandler, SubscriptionId};
pub use state::{ConnectionState, SubscriptionState};
