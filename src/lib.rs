pub mod cli;
pub mod config;
pub mod error;
pub mod events;
pub mod incentive;
pub mod incidents;
pub mod logging;
pub mod projection;
pub mod replay;
pub mod roles;
pub mod state;
pub mod time;
pub mod workflow;
