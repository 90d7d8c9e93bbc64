// handlers/protected/mod.rs - Protected handlers (JWT authentication required)
//
// Route Prefix: /api/*
// Middleware: JWT validation -> company validation -> user validation, which
// leaves a `CurrentUser` extension for every handler below.

pub mod auth;     // Session introspection
pub mod calendar; // Appointment calendar from the local mirror
pub mod company;  // Company settings and CRM credential (office manager)
pub mod leads;    // Local lead list and proxied CRM lead operations
pub mod sync;     // Delta sync status and on-demand runs
pub mod tasks;    // Proxied CRM tasks
pub mod users;    // Company user management (office manager)
