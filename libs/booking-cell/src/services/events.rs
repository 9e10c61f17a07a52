use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use crate::models::BookingEvent;

/// Seam to the notification collaborator. The booking transaction calls
/// this exactly once per committed transition; implementations own
/// formatting and delivery.
#[async_trait]
pub trait EventDispatcher: Send + Sync {
    async fn dispatch(&self, event: &BookingEvent) -> Result<()>;
}

/// Default dispatcher: records the event in the log stream. Stands in
/// until a messaging-backed dispatcher is wired up at the edge.
pub struct LogEventDispatcher;

#[async_trait]
impl EventDispatcher for LogEventDispatcher {
    async fn dispatch(&self, event: &BookingEvent) -> Result<()> {
        match event {
            BookingEvent::BookingCreated {
                booking_id,
                associate_id,
                client_id,
                date,
                time,
                duration_minutes,
            } => {
                info!(
                    "Booking created: {} for client {} with associate {} on {} at {} ({} min)",
                    booking_id, client_id, associate_id, date, time, duration_minutes
                );
            }
            BookingEvent::BookingCancelled { booking_id } => {
                info!("Booking cancelled: {}", booking_id);
            }
        }
        Ok(())
    }
}
