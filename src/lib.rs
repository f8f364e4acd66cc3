//! TripDesk - Travel agency booking back office
//!
//! Package catalogue, inquiries and quotes, bookings paid through a hosted
//! checkout, a chat widget relay and the admin JSON API around them.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
