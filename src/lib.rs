mod bus;
mod redact;
mod refresh;
mod session;
mod store;
mod transport;
pub mod types;

pub use bus::{
    EventBus, Subscription, TOPIC_CHARTS, TOPIC_DASHBOARD, TOPIC_RECAP, TOPIC_REMINDERS,
};
pub use redact::redact_secrets;
pub use session::{ApiError, SessionClient};
pub use store::{KeyringTokenStore, MemoryTokenStore, StoreError, TokenStore};
pub use transport::{ApiTransport, HttpTransport, TransportConfig, TransportError};
