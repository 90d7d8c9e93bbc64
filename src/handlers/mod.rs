// handlers/mod.rs - Two-tier handler architecture
//
// Public (no auth): service descriptor, health, token acquisition, CRM webhooks
// Protected (JWT + company + user validation): everything under /api

pub mod protected;
pub mod public;
pub mod system;
