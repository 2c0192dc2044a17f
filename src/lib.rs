//! # estude-realtime
//!
//! Real-time attendance and notification client for the EStude school
//! platform.
//!
//! The backend publishes new attendance sessions, new assignments and
//! attendance record changes over STOMP on a WebSocket endpoint. This crate
//! provides the client side: a STOMP client with an owned subscription
//! registry, the topic naming contract, a reducer that folds events into
//! held state, and the glue that keeps subscriptions in step with the
//! signed-in user.
//!
//! ## Architecture
//!
//! ```text
//! UserSession (lifecycle)
//!     │  set_user(Some) → connect + feed.start
//!     │  set_user(None) → feed.teardown + disconnect
//!     │
//!     ├── ClassroomFeed (feed/)  ──▶ NotificationBus
//!     │       │  Topic (topic)
//!     │       │  RealtimeEvent → ClassroomState (domain/)
//!     │
//!     ├── StompClient (client/)
//!     │       │  SubscriptionRegistry: pending queue + active map
//!     │       │  Frame codec (stomp/)
//!     │
//!     └── Connector (transport/)
//!             ├── WebSocketConnector (tokio-tungstenite; raw or SockJS framing)
//!             └── MemoryConnector (tests)
//! ```

pub mod client;
pub mod config;
pub mod domain;
pub mod error;
pub mod feed;
pub mod lifecycle;
pub mod stomp;
pub mod topic;
pub mod transport;

pub use client::{ConnectOptions, ConnectionState, PublishOutcome, StompClient};
pub use config::RealtimeConfig;
pub use error::RealtimeError;
pub use feed::{ClassroomFeed, FeedSeed, Notification, NotificationBus, Viewer};
pub use lifecycle::UserSession;
