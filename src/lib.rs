//! Cloud Update - an authenticated webhook receiver that runs host
//! maintenance actions.
//!
//! A signed `POST /webhook` asks the host to re-run cloud-init, apply
//! package updates, or reboot. At most one such job runs at a time; its
//! progress is reported by `GET /job/status`.

pub mod config;
pub mod executor;
pub mod jobs;
pub mod logging;
pub mod ratelimit;
pub mod server;
pub mod system;
pub mod types;
pub mod webhooks;
pub mod worker;

#[cfg(test)]
pub mod test_utils;
