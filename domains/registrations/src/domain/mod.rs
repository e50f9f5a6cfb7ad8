//! Registrations domain layer: entities, state machines, commands, errors

pub mod commands;
pub mod entities;
pub mod error;
pub mod state;
pub mod validation;
