//! Seat ledger: the only writer of a competition's seat counter

use crate::domain::commands::{ReleaseSeats, ReserveSeats};
use crate::domain::entities::Competition;
use crate::domain::error::{RegistrationError, Result};
use crate::repository::StoreTransaction;

pub struct SeatLedger;

impl SeatLedger {
    /// Lock the competition row, check capacity and take `count` seats.
    ///
    /// All or nothing: on `InsufficientSeats` the counter is untouched.
    pub async fn reserve(
        tx: &mut dyn StoreTransaction,
        command: ReserveSeats,
    ) -> Result<Competition> {
        if command.count < 1 {
            return Err(RegistrationError::Validation(
                "Seat reservations must be positive".to_string(),
            ));
        }

        let mut competition = tx
            .lock_competition(command.competition_id)
            .await?
            .ok_or(RegistrationError::NotFound("Competition"))?;

        if competition.seats_remaining < command.count {
            tracing::info!(
                competition_id = %competition.id,
                requested = command.count,
                available = competition.seats_remaining,
                "Seat reservation refused"
            );
            return Err(RegistrationError::InsufficientSeats {
                requested: command.count,
                available: competition.seats_remaining,
            });
        }

        competition.seats_remaining -= command.count;
        tx.set_seats_remaining(competition.id, competition.seats_remaining)
            .await?;

        tracing::debug!(
            competition_id = %competition.id,
            reserved = command.count,
            seats_remaining = competition.seats_remaining,
            "Seats reserved"
        );
        Ok(competition)
    }

    /// Return `count` seats, never exceeding `total_seats`.
    ///
    /// A zero count is a no-op and takes no lock.
    pub async fn release(tx: &mut dyn StoreTransaction, command: ReleaseSeats) -> Result<()> {
        if command.count <= 0 {
            return Ok(());
        }

        let competition = tx
            .lock_competition(command.competition_id)
            .await?
            .ok_or(RegistrationError::NotFound("Competition"))?;

        let restored = (competition.seats_remaining + command.count).min(competition.total_seats);
        if restored - competition.seats_remaining < command.count {
            tracing::warn!(
                competition_id = %competition.id,
                requested = command.count,
                seats_remaining = competition.seats_remaining,
                total_seats = competition.total_seats,
                "Seat release clamped at total capacity"
            );
        }

        tx.set_seats_remaining(competition.id, restored).await?;

        tracing::debug!(
            competition_id = %competition.id,
            released = restored - competition.seats_remaining,
            seats_remaining = restored,
            "Seats released"
        );
        Ok(())
    }
}
