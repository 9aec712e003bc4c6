pub mod api;
pub use api::{BalanceResponse, SyncRequest, SyncResponse};
pub mod reconcile;
pub use reconcile::{FrameMessage, Observation, Reconciler};
pub mod token;
pub use token::TokenError;
