// handlers/public/mod.rs - Public handlers (no authentication required)
//
// Token acquisition and inbound CRM webhooks. Webhooks authenticate with a
// per-company HMAC signature instead of a JWT.

pub mod auth;
pub mod webhooks;
