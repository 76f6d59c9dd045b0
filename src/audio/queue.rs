use parking_lot::Mutex;
use rand::seq::SliceRandom;
use std::{collections::VecDeque, time::Duration};
use thiserror::Error;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::audio::track::Track;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("índice {index} fuera de rango (la cola tiene {len} canciones)")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("no llegó ninguna canción en {0:?}")]
    TimedOut(Duration),
    #[error("espera de la cola cancelada")]
    Cancelled,
}

/// Cola FIFO de reproducción de una sesión.
///
/// `dequeue` suspende hasta que haya un elemento, venza el plazo o se
/// cancele el token de la sesión. El lock nunca se mantiene a través de un
/// `.await`.
#[derive(Debug, Default)]
pub struct PlaybackQueue {
    items: Mutex<VecDeque<Track>>,
    available: Notify,
}

impl PlaybackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Agrega un track al final de la cola
    pub fn enqueue(&self, track: Track) {
        info!("➕ Agregado a la cola: {}", track.title);
        self.items.lock().push_back(track);
        self.available.notify_one();
    }

    /// Espera el siguiente track (FIFO), con plazo máximo
    pub async fn dequeue(
        &self,
        wait: Duration,
        cancel: &CancellationToken,
    ) -> Result<Track, QueueError> {
        let deadline = tokio::time::Instant::now() + wait;

        loop {
            let notified = self.available.notified();
            tokio::pin!(notified);
            // Registrarse antes de mirar la cola para no perder un notify
            notified.as_mut().enable();

            if let Some(track) = self.items.lock().pop_front() {
                debug!("➡️ Siguiente en cola (FIFO): {}", track.title);
                return Ok(track);
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(QueueError::Cancelled),
                _ = &mut notified => continue,
                _ = tokio::time::sleep_until(deadline) => return Err(QueueError::TimedOut(wait)),
            }
        }
    }

    /// Mezcla la cola en el lugar
    pub fn shuffle(&self) {
        let mut items = self.items.lock();
        let mut rng = rand::thread_rng();
        items.make_contiguous().shuffle(&mut rng);
        info!("🔀 Cola mezclada ({} canciones)", items.len());
    }

    /// Elimina el track en `index` (base 0)
    pub fn remove_at(&self, index: usize) -> Result<Track, QueueError> {
        let mut items = self.items.lock();
        let len = items.len();
        let removed = items
            .remove(index)
            .ok_or(QueueError::IndexOutOfRange { index, len })?;
        debug!("❌ Track eliminado en posición {}", index);
        Ok(removed)
    }

    /// Limpia la cola
    pub fn clear(&self) {
        let mut items = self.items.lock();
        if !items.is_empty() {
            items.clear();
            info!("🗑️ Cola limpiada");
        }
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Copia de sólo lectura, en orden de reproducción
    pub fn peek_all(&self) -> Vec<Track> {
        self.items.lock().iter().cloned().collect()
    }

    /// Obtiene una página específica de la cola (base 1)
    pub fn page(&self, page: usize, per_page: usize) -> QueuePage {
        let items = self.items.lock();
        let per_page = per_page.max(1);
        let total_items = items.len();
        let total_pages = total_items.div_ceil(per_page).max(1);
        let current_page = page.clamp(1, total_pages);
        let start = (current_page - 1) * per_page;

        QueuePage {
            items: items.iter().skip(start).take(per_page).cloned().collect(),
            offset: start,
            current_page,
            total_pages,
            total_items,
            total_duration: items.iter().map(|t| t.duration).sum(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueuePage {
    pub items: Vec<Track>,
    /// Posición (base 0) del primer elemento de la página
    pub offset: usize,
    pub current_page: usize,
    pub total_pages: usize,
    pub total_items: usize,
    pub total_duration: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serenity::model::id::UserId;
    use std::sync::Arc;

    fn track(id: &str) -> Track {
        Track::new(id, format!("Canción {id}"), format!("https://youtu.be/{id}"), UserId::new(7))
            .with_duration(Duration::from_secs(60))
    }

    fn ids(tracks: &[Track]) -> Vec<String> {
        tracks.iter().map(|t| t.id.clone()).collect()
    }

    #[tokio::test]
    async fn dequeues_in_insertion_order() {
        let queue = PlaybackQueue::new();
        let cancel = CancellationToken::new();
        for id in ["a", "b", "c"] {
            queue.enqueue(track(id));
        }

        let mut out = Vec::new();
        for _ in 0..3 {
            out.push(queue.dequeue(Duration::from_secs(1), &cancel).await.unwrap());
        }

        assert_eq!(ids(&out), vec!["a", "b", "c"]);
        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn dequeue_times_out_on_empty_queue() {
        let queue = PlaybackQueue::new();
        let cancel = CancellationToken::new();

        let result = queue.dequeue(Duration::from_secs(120), &cancel).await;

        assert_eq!(result, Err(QueueError::TimedOut(Duration::from_secs(120))));
    }

    #[tokio::test(start_paused = true)]
    async fn dequeue_wakes_when_a_track_arrives() {
        let queue = Arc::new(PlaybackQueue::new());
        let cancel = CancellationToken::new();

        let producer = {
            let queue = queue.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(30)).await;
                queue.enqueue(track("late"));
            })
        };

        let got = queue.dequeue(Duration::from_secs(120), &cancel).await.unwrap();
        producer.await.unwrap();

        assert_eq!(got.id, "late");
    }

    #[tokio::test]
    async fn dequeue_stops_when_cancelled() {
        let queue = PlaybackQueue::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = queue.dequeue(Duration::from_secs(120), &cancel).await;

        assert_eq!(result, Err(QueueError::Cancelled));
    }

    #[test]
    fn remove_at_rejects_out_of_range() {
        let queue = PlaybackQueue::new();
        queue.enqueue(track("a"));
        queue.enqueue(track("b"));

        assert_eq!(
            queue.remove_at(2).unwrap_err(),
            QueueError::IndexOutOfRange { index: 2, len: 2 }
        );
        assert_eq!(queue.remove_at(0).unwrap().id, "a");
        assert_eq!(ids(&queue.peek_all()), vec!["b"]);
    }

    #[test]
    fn shuffle_keeps_the_same_tracks() {
        let queue = PlaybackQueue::new();
        for i in 0..20 {
            queue.enqueue(track(&i.to_string()));
        }

        queue.shuffle();

        let mut shuffled = ids(&queue.peek_all());
        shuffled.sort();
        let mut expected: Vec<String> = (0..20).map(|i| i.to_string()).collect();
        expected.sort();
        assert_eq!(shuffled, expected);
    }

    #[test]
    fn clear_on_empty_queue_is_a_no_op() {
        let queue = PlaybackQueue::new();
        queue.clear();
        queue.enqueue(track("a"));
        queue.clear();
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn pages_are_clamped_and_sized() {
        let queue = PlaybackQueue::new();
        for i in 0..10 {
            queue.enqueue(track(&i.to_string()));
        }

        let second = queue.page(2, 8);
        assert_eq!(ids(&second.items), vec!["8", "9"]);
        assert_eq!(second.offset, 8);
        assert_eq!(second.total_pages, 2);
        assert_eq!(second.total_duration, Duration::from_secs(600));

        let beyond = queue.page(9, 8);
        assert_eq!(beyond.current_page, 2);

        let empty = PlaybackQueue::new().page(1, 8);
        assert_eq!(empty.total_pages, 1);
        assert!(empty.items.is_empty());
    }
}
