use crate::{
    channel::{self, Channel, Transport},
    clock::Clock,
    directory::Directory,
    error::Result,
    stats::{self, Stats},
    store::{AnswerEntry, AssignmentStore, SessionState, SubscriptionId},
};
use chrono::NaiveDate;
use core::{num::NonZeroI64, time::Duration};
use model::{AssignmentRecord, Envelope, Question};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::{
    sync::{broadcast::error::RecvError, watch},
    time,
};

const RECONNECT_BASE: Duration = Duration::from_millis(500);
const RECONNECT_MAX: Duration = Duration::from_secs(30);

/// Surfaced to the UI as a non-blocking toast; the optimistic value is
/// kept either way.
pub type PersistFailureHandler = Box<dyn Fn(AssignmentRecord) + Send + Sync>;

pub struct SessionConfig {
    pub class_id: NonZeroI64,
    pub date: NaiveDate,
    /// The question projected for this class day, already selected
    /// through [`Directory::pick_question`].
    pub question: Question,
    pub on_persist_failure: Option<PersistFailureHandler>,
}

struct Internal {
    class_id: NonZeroI64,
    date: NaiveDate,
    question: Question,
    roster_size: usize,
    store: Mutex<AssignmentStore>,
    directory: Arc<Directory>,
    channel: Channel,
    clock: Arc<dyn Clock>,
    on_persist_failure: Option<PersistFailureHandler>,
}

impl Internal {
    /// The store is single-mutator by design; the mutex only bridges the
    /// detached persistence workers and the channel pump onto it. Nothing
    /// awaits while holding the guard.
    fn store(&self) -> MutexGuard<'_, AssignmentStore> {
        self.store.lock().expect("assignment store poisoned")
    }

    fn deliver(&self, frame: &[u8]) {
        let Some(envelope) = channel::decode(self.channel.topic(), frame) else {
            return;
        };
        match envelope {
            Envelope::Assignment { class_id, date, student_id, answer, updated_at } => {
                if class_id != self.class_id || date != self.date {
                    log::warn!(
                        "frame for {class_id}:{date} arrived on {}; dropped",
                        self.channel.topic()
                    );
                    return;
                }
                self.store().apply_remote(student_id, AnswerEntry { answer, updated_at });
            }
            Envelope::Unknown => log::debug!("ignored unknown frame on {}", self.channel.topic()),
        }
    }

    /// Reconcile through the read path. Anything the channel missed while
    /// down comes in here; the merge rule keeps newer local state intact.
    async fn rehydrate(&self) {
        self.directory.refresh_assignments(self.class_id, self.date);
        match self.directory.assignments(self.class_id, self.date).await {
            Ok(records) => {
                let mut store = self.store();
                for record in records {
                    let entry = AnswerEntry { answer: record.answer, updated_at: record.updated_at };
                    store.apply_remote(record.student_id, entry);
                }
            }
            Err(err) => log::warn!("re-hydrate for {} failed: {err}", self.channel.topic()),
        }
    }
}

/// One open class-day view: the assignment store wired to the realtime
/// channel and the persistence client. The handle is the view's whole
/// API; dropping or closing it tears the channel subscription down while
/// in-flight upserts run to completion.
pub struct Session {
    inner: Arc<Internal>,
    shutdown: watch::Sender<bool>,
}

impl Session {
    pub async fn open(
        config: SessionConfig,
        directory: Arc<Directory>,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let roster = directory.roster(config.class_id).await?;
        let records = directory.assignments(config.class_id, config.date).await?;

        let mut store = AssignmentStore::new(config.class_id, config.date, config.question.id);
        store.hydrate(records)?;

        let channel = Channel::new(transport, config.class_id, config.date);
        let inner = Arc::new(Internal {
            class_id: config.class_id,
            date: config.date,
            question: config.question,
            roster_size: roster.len(),
            store: Mutex::new(store),
            directory,
            channel,
            clock,
            on_persist_failure: config.on_persist_failure,
        });

        let (shutdown, shutdown_rx) = watch::channel(false);
        tokio::spawn(pump(Arc::clone(&inner), shutdown_rx));
        Ok(Self { inner, shutdown })
    }

    pub fn question(&self) -> &Question {
        &self.inner.question
    }

    /// Record a drag-drop locally, broadcast it to the other viewers, and
    /// persist it in the background. Never blocks and never fails; the
    /// caller must not await anything to keep the interaction responsive.
    pub fn set_answer(&self, student_id: NonZeroI64, answer: &str) {
        let now = self.inner.clock.now();
        let record = self.inner.store().set(student_id, String::from(answer), now);
        self.inner.channel.publish(&Envelope::assignment(&record));

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            match inner.directory.upsert(&record.upsert()).await {
                Ok(_) => inner.store().confirm(record.student_id),
                Err(err) => {
                    log::error!("persisting student {} failed: {err}", record.student_id);
                    inner.store().fail(record.student_id);
                    if let Some(handler) = &inner.on_persist_failure {
                        handler(record);
                    }
                }
            }
        });
    }

    pub fn snapshot(&self) -> SessionState {
        self.inner.store().snapshot()
    }

    pub fn stats(&self) -> Stats {
        let snapshot = self.inner.store().snapshot();
        stats::tally(&snapshot, self.inner.roster_size, &self.inner.question.answers)
    }

    /// Stats recomputed after every store change, local or remote.
    pub fn subscribe_stats<F>(&self, mut listener: F) -> SubscriptionId
    where
        F: FnMut(Stats) + Send + 'static,
    {
        let roster_size = self.inner.roster_size;
        let answers = self.inner.question.answers.clone();
        self.inner.store().subscribe(Box::new(move |state| {
            listener(stats::tally(state, roster_size, &answers));
        }))
    }

    pub fn unsubscribe_stats(&self, id: SubscriptionId) {
        self.inner.store().unsubscribe(id);
    }

    pub fn close(self) {
        let _ = self.shutdown.send(true);
    }
}

/// Inbound side of the channel. Frames published while the subscription
/// is down are gone for good, so every (re)subscription after the first
/// reconciles through the read path before trusting the stream again.
async fn pump(inner: Arc<Internal>, mut shutdown: watch::Receiver<bool>) {
    let mut delay = RECONNECT_BASE;
    let mut connected_before = false;
    loop {
        if *shutdown.borrow() {
            return;
        }
        let mut rx = match inner.channel.subscribe() {
            Ok(rx) => rx,
            Err(err) => {
                log::warn!(
                    "subscribe to {} failed: {err}; retrying in {delay:?}",
                    inner.channel.topic()
                );
                tokio::select! {
                    _ = shutdown.changed() => return,
                    _ = time::sleep(delay) => {}
                }
                delay = (delay * 2).min(RECONNECT_MAX);
                continue;
            }
        };
        delay = RECONNECT_BASE;
        if connected_before {
            inner.rehydrate().await;
        }
        connected_before = true;

        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => return,
                frame = rx.recv() => match frame {
                    Ok(frame) => inner.deliver(&frame),
                    Err(RecvError::Lagged(count)) => {
                        log::warn!("{count} frames lost on {}; re-hydrating", inner.channel.topic());
                        inner.rehydrate().await;
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
    }
}
