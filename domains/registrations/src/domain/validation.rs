//! Validation helpers for registration input

use validator::ValidateEmail;

use crate::domain::entities::EntryType;
use crate::domain::error::{RegistrationError, Result};

/// Maximum number of contacts accepted in one invite request
pub const MAX_CONTACTS_PER_REQUEST: usize = 20;

/// Maximum team name length in characters
pub const MAX_TEAM_NAME_LEN: usize = 100;

/// Trim and lower-case an invitee e-mail, rejecting malformed addresses
pub fn normalize_contact(contact: &str) -> Result<String> {
    let normalized = contact.trim().to_lowercase();
    if !normalized.validate_email() {
        return Err(RegistrationError::Validation(format!(
            "Invalid contact email: {}",
            contact.trim()
        )));
    }
    Ok(normalized)
}

/// Individuals declare exactly 1; teams declare `2..=max_team_size`
pub fn validate_declared_size(
    entry_type: EntryType,
    declared_size: i32,
    max_team_size: i32,
) -> Result<()> {
    match entry_type {
        EntryType::Individual if declared_size != 1 => Err(RegistrationError::Validation(
            "Individual entries must declare a size of 1".to_string(),
        )),
        EntryType::Team if max_team_size < 2 => Err(RegistrationError::Validation(
            "This competition does not accept team entries".to_string(),
        )),
        EntryType::Team if !(2..=max_team_size).contains(&declared_size) => {
            Err(RegistrationError::Validation(format!(
                "Team size must be between 2 and {}",
                max_team_size
            )))
        }
        _ => Ok(()),
    }
}

/// Trim a team name; blank names become `None`
pub fn normalize_team_name(name: Option<String>) -> Result<Option<String>> {
    let Some(name) = name else {
        return Ok(None);
    };
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.chars().count() > MAX_TEAM_NAME_LEN {
        return Err(RegistrationError::Validation(format!(
            "Team name must be at most {} characters",
            MAX_TEAM_NAME_LEN
        )));
    }
    Ok(Some(trimmed.to_string()))
}

/// Normalize a batch of contacts, dropping duplicates while keeping order
pub fn normalize_contacts(contacts: &[String]) -> Result<Vec<String>> {
    if contacts.is_empty() {
        return Err(RegistrationError::Validation(
            "At least one contact is required".to_string(),
        ));
    }
    if contacts.len() > MAX_CONTACTS_PER_REQUEST {
        return Err(RegistrationError::Validation(format!(
            "At most {} contacts per request",
            MAX_CONTACTS_PER_REQUEST
        )));
    }

    let mut normalized: Vec<String> = Vec::with_capacity(contacts.len());
    for contact in contacts {
        let contact = normalize_contact(contact)?;
        if !normalized.contains(&contact) {
            normalized.push(contact);
        }
    }
    Ok(normalized)
}
