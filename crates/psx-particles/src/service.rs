// ABOUTME: Async front end for the particle manager: a tokio task fed by a command channel.
// ABOUTME: Requests and expiry timers are handled one at a time on that task.

use std::time::Instant;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::backend::ParticleBackend;
use crate::clock::TokioClock;
use crate::error::ParticleError;
use crate::group::{DisposeCallback, ParticleGroup};
use crate::manager::ParticleManager;

pub enum Command {
    Add(ParticleGroup),
    Dispose {
        id: String,
        on_dispose: Option<DisposeCallback>,
    },
    Shutdown {
        done: oneshot::Sender<usize>,
    },
}

/// Cloneable handle for adding and disposing particle groups
#[derive(Clone)]
pub struct ParticleEmitter {
    tx: mpsc::UnboundedSender<Command>,
}

impl ParticleEmitter {
    /// Queue a group. Malformed groups are rejected here, before they reach the task.
    pub fn add_particle_group(&self, group: ParticleGroup) -> Result<(), ParticleError> {
        group.validate()?;
        self.send(Command::Add(group))
    }

    pub fn dispose_particle_group(
        &self,
        id: impl Into<String>,
        on_dispose: Option<DisposeCallback>,
    ) -> Result<(), ParticleError> {
        self.send(Command::Dispose {
            id: id.into(),
            on_dispose,
        })
    }

    fn send(&self, command: Command) -> Result<(), ParticleError> {
        self.tx.send(command).map_err(|_| ParticleError::ServiceClosed)
    }
}

pub struct ParticleService {
    emitter: ParticleEmitter,
    join: JoinHandle<()>,
}

impl ParticleService {
    /// Start the service task on the current tokio runtime
    pub fn spawn<B>(backend: B) -> Self
    where
        B: ParticleBackend + Send + 'static,
    {
        Self::spawn_with(ParticleManager::new(backend, TokioClock))
    }

    pub fn spawn_with<B>(manager: ParticleManager<B, TokioClock>) -> Self
    where
        B: ParticleBackend + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let join = tokio::spawn(run(manager, rx));
        tracing::info!("Particle service started");
        Self {
            emitter: ParticleEmitter { tx },
            join,
        }
    }

    pub fn emitter(&self) -> ParticleEmitter {
        self.emitter.clone()
    }

    /// Dispose every live group and stop the task. Returns how many groups were disposed.
    pub async fn shutdown(self) -> Result<usize, ParticleError> {
        let (done, disposed) = oneshot::channel();
        self.emitter.send(Command::Shutdown { done })?;
        let disposed = disposed.await.map_err(|_| ParticleError::ServiceClosed)?;
        if let Err(e) = self.join.await {
            tracing::warn!("Particle service task failed: {}", e);
        }
        Ok(disposed)
    }
}

async fn run<B>(
    mut manager: ParticleManager<B, TokioClock>,
    mut rx: mpsc::UnboundedReceiver<Command>,
) where
    B: ParticleBackend + Send + 'static,
{
    loop {
        let deadline = manager.next_deadline();
        tokio::select! {
            command = rx.recv() => match command {
                Some(Command::Add(group)) => {
                    if let Err(e) = manager.add_group(group) {
                        tracing::warn!("Rejected particle group: {}", e);
                    }
                }
                Some(Command::Dispose { id, on_dispose }) => {
                    manager.dispose_group(&id, on_dispose);
                }
                Some(Command::Shutdown { done }) => {
                    let disposed = manager.dispose_all();
                    let _ = done.send(disposed);
                    break;
                }
                None => {
                    manager.dispose_all();
                    break;
                }
            },
            _ = sleep_until(deadline) => {
                manager.expire_due();
            }
        }
    }
    tracing::info!("Particle service stopped");
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SceneDrawSet;
    use crate::group::{Attribute, POSITION};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::sleep;

    fn burst(id: &str, fired: &Arc<AtomicUsize>) -> ParticleGroup {
        let fired = fired.clone();
        ParticleGroup::new(id, 2)
            .with_attribute(POSITION, Attribute::new(vec![0.0; 6], 3))
            .with_duration(Duration::from_millis(2000))
            .on_dispose(move || {
                fired.fetch_add(1, Ordering::SeqCst);
            })
    }

    #[tokio::test(start_paused = true)]
    async fn timed_group_expires_on_schedule() {
        let backend = SceneDrawSet::new();
        let reader = backend.reader();
        let service = ParticleService::spawn(backend);
        let emitter = service.emitter();
        let fired = Arc::new(AtomicUsize::new(0));

        emitter.add_particle_group(burst("demo", &fired)).unwrap();
        sleep(Duration::from_millis(1999)).await;
        assert!(reader.contains("demo"));
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        sleep(Duration::from_millis(2)).await;
        assert!(!reader.contains("demo"));
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        assert_eq!(service.shutdown().await, Ok(0));
    }

    #[tokio::test(start_paused = true)]
    async fn dispose_before_deadline_fires_once() {
        let backend = SceneDrawSet::new();
        let reader = backend.reader();
        let service = ParticleService::spawn(backend);
        let emitter = service.emitter();
        let fired = Arc::new(AtomicUsize::new(0));

        emitter.add_particle_group(burst("demo", &fired)).unwrap();
        sleep(Duration::from_millis(500)).await;
        emitter.dispose_particle_group("demo", None).unwrap();
        sleep(Duration::from_millis(3000)).await;

        assert!(reader.is_empty());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        service.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_disposes_live_groups_and_closes_emitters() {
        let backend = SceneDrawSet::new();
        let reader = backend.reader();
        let service = ParticleService::spawn(backend);
        let emitter = service.emitter();
        let fired = Arc::new(AtomicUsize::new(0));

        emitter.add_particle_group(burst("a", &fired)).unwrap();
        emitter.add_particle_group(burst("b", &fired)).unwrap();
        assert_eq!(service.shutdown().await, Ok(2));
        assert_eq!(fired.load(Ordering::SeqCst), 2);
        assert_eq!(reader.counters().live_geometries(), 0);

        assert_eq!(
            emitter.dispose_particle_group("a", None),
            Err(ParticleError::ServiceClosed)
        );
    }

    #[tokio::test]
    async fn malformed_groups_are_rejected_at_the_emitter() {
        let service = ParticleService::spawn(SceneDrawSet::new());
        let emitter = service.emitter();
        assert_eq!(
            emitter.add_particle_group(ParticleGroup::new("", 1)),
            Err(ParticleError::EmptyId)
        );
        service.shutdown().await.unwrap();
    }
}
