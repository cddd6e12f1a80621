pub mod auth;
pub mod chat;
pub mod clock;
pub mod dao;
pub mod events;
pub mod expiry;

pub use auth::{AuthError, Identity, IdentityLookup, JwtIdentityLookup};
pub use chat::{ChatError, ChatService};
pub use clock::{Clock, ManualClock, SystemClock};
pub use events::{ChatEvent, EventPublisher};
pub use expiry::ExpirySweeper;
