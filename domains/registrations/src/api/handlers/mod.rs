//! HTTP handlers for registrations and invitations

pub mod invitations;
pub mod registrations;
