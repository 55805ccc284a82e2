pub mod api;
pub mod cache;
pub mod config;
pub mod diagnostics;
pub mod diff;
pub mod hooks;
pub mod ignore;
pub mod logging;
pub mod scanner;
pub mod session;
pub mod store;
pub mod transcript;
pub mod types;
