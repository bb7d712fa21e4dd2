pub mod agent;
pub mod config;
pub mod error;
pub mod limiter;
pub mod locale;
pub mod resources;
pub mod state;
pub mod transifex;
pub mod zendesk;
