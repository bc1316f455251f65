#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use perch::{
    AbstractActor, ActorSystem, EnqueueResult, ExecutionUnit, Mailbox, MailboxElement,
    StrongActorPtr, SystemConfig,
};

/// Actor that stores every message and counts its own destruction.
pub struct TestActor {
    pub mailbox: Mailbox,
    drops: Arc<AtomicUsize>,
    on_drop: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl TestActor {
    pub fn new(drops: Arc<AtomicUsize>) -> Self {
        Self {
            mailbox: Mailbox::new(),
            drops,
            on_drop: None,
        }
    }

    /// Runs `hook` while the payload is being destroyed.
    pub fn with_drop_hook(mut self, hook: impl FnOnce() + Send + Sync + 'static) -> Self {
        self.on_drop = Some(Box::new(hook));
        self
    }
}

impl AbstractActor for TestActor {
    fn enqueue(&self, element: MailboxElement) -> EnqueueResult {
        self.mailbox.push(element)
    }

    fn name(&self) -> &str {
        "test.actor"
    }
}

impl Drop for TestActor {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
        if let Some(hook) = self.on_drop.take() {
            hook();
        }
    }
}

/// Execution unit that records scheduled actors instead of running them.
#[derive(Default)]
pub struct RecordingExecutionUnit {
    jobs: Mutex<Vec<StrongActorPtr>>,
}

impl RecordingExecutionUnit {
    pub fn take_jobs(&self) -> Vec<StrongActorPtr> {
        std::mem::take(&mut *self.jobs.lock())
    }

    pub fn job_count(&self) -> usize {
        self.jobs.lock().len()
    }
}

impl ExecutionUnit for RecordingExecutionUnit {
    fn exec_later(&self, job: StrongActorPtr) {
        self.jobs.lock().push(job);
    }
}

/// Creates an actor system with the default configuration and quiet logging.
pub fn setup_test_system() -> ActorSystem {
    setup_test_system_with(SystemConfig::default())
}

pub fn setup_test_system_with(config: SystemConfig) -> ActorSystem {
    perch::logging::init_test();
    ActorSystem::new(config).expect("default test configuration is valid")
}

/// Spawns a [`TestActor`] and returns it with its drop counter.
pub fn spawn_counted(system: &ActorSystem) -> (StrongActorPtr, Arc<AtomicUsize>) {
    let drops = Arc::new(AtomicUsize::new(0));
    let ptr = system.spawn(TestActor::new(drops.clone()));
    (ptr, drops)
}
