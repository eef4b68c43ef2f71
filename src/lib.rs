//! Earthquake-preparedness client: family safety broadcasts over SMS and
//! WhatsApp, the nearby-earthquake feed, and backend-driven preparedness
//! checks.

pub mod api;
pub mod app;
pub mod broadcast;
pub mod dispatch;
pub mod message;
pub mod quakes;
pub mod storage;
pub mod utils;

#[cfg(feature = "gui")]
pub mod ui;
