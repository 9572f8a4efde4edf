use crate::domain::model::Notification;
use crate::domain::ports::Notifier;
use crate::utils::error::Result;
use async_trait::async_trait;

/// Delivers notifications as log lines.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> Result<()> {
        match notification {
            Notification::Message(text) => tracing::info!("{}", text),
            Notification::Films(films) => {
                tracing::info!("{} film(s) found", films.len());
                for (rank, film) in films.iter().enumerate() {
                    tracing::info!(
                        "#{} {} ({:.1}) directed by {} - {}",
                        rank + 1,
                        film.name,
                        film.rating,
                        film.directors,
                        film.poster_url
                    );
                }
            }
        }
        Ok(())
    }
}
