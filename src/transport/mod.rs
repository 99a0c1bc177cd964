// ABOUTME: Transport module - the collaborator that performs HTTP exchanges.
// ABOUTME: Defines the Transport trait, exchange types, and a reqwest transport.

mod http;
mod traits;
mod types;

pub use http::HttpTransport;
pub use traits::Transport;
pub use types::*;
