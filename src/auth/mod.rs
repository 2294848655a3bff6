//! Session storage, token lifecycle, and single-flight refresh.

pub mod error;
pub mod gate;
pub mod session;
pub mod store;
pub mod token;

pub use error::StoreError;
pub use gate::AuthGate;
pub use session::SessionController;
pub use store::{FileSessionStore, MemorySessionStore, SessionStore};
pub use token::{Session, TokenGrant, TokenSet, UserProfile};
