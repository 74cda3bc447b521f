//! AI Agent — intent classification and capability dispatch.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod intent;
pub mod mailbox;
pub mod services;
