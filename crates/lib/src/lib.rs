//! modechat core library: persona modes, sessions and persistence, completion clients, the
//! chat controller, and the HTTP gateway, shared by the CLI.

pub mod auth;
pub mod config;
pub mod controller;
pub mod gateway;
pub mod init;
pub mod llm;
pub mod mode;
pub mod session;
pub mod store;
pub mod transcript;
