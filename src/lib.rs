//! Karigar Online: sign-in, onboarding and the service dashboard, backed by
//! a hosted session provider.

pub mod app;
pub mod auth;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod notification;
pub mod onboarding;
pub mod session;
