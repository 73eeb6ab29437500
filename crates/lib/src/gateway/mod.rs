//! Gateway: HTTP relay between chat clients and the completion backend.
//!
//! Single port. `GET /` is a health probe; `POST /chat` takes `{ messages, mode }` with a bearer
//! credential and answers `{ response, userId }`. CORS preflights are answered permissively.

mod protocol;
mod server;

pub use protocol::{ErrorBody, RelayRequest, RelayResponse};
pub use server::{router, run_gateway, GatewayState};
