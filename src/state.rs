// src/state.rs

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tokio::sync::watch;
use uuid::Uuid;

use crate::commerce::CommerceApi;
use crate::copy_generation::CopyGenerator;
use crate::models::RegistrationRequest;
use crate::registration::{RegistrationOrchestrator, RegistrationRun};

const RUN_CACHE_CAPACITY: u64 = 1_000;
const RUN_TIME_TO_IDLE: Duration = Duration::from_secs(60 * 60);

/// A registration run kept in memory so the caller can poll or retry it.
#[derive(Clone)]
pub struct RunHandle {
    pub request: Arc<RegistrationRequest>,
    pub progress: Arc<watch::Sender<RegistrationRun>>,
}

impl RunHandle {
    pub fn new(request: RegistrationRequest) -> Self {
        let (progress, _) = watch::channel(RegistrationRun::default());
        Self {
            request: Arc::new(request),
            progress: Arc::new(progress),
        }
    }

    pub fn snapshot(&self) -> RegistrationRun {
        self.progress.borrow().clone()
    }
}

#[derive(Clone)]
pub struct AppState {
    pub commerce: Arc<dyn CommerceApi>,
    pub copy_generator: Arc<dyn CopyGenerator>,
    pub orchestrator: Arc<RegistrationOrchestrator>,
    pub runs: Cache<Uuid, RunHandle>,
}

impl AppState {
    pub fn new(
        commerce: Arc<dyn CommerceApi>,
        copy_generator: Arc<dyn CopyGenerator>,
        registration_timeout: Duration,
    ) -> Self {
        let orchestrator = Arc::new(RegistrationOrchestrator::new(
            commerce.clone(),
            registration_timeout,
        ));
        let runs = Cache::builder()
            .max_capacity(RUN_CACHE_CAPACITY)
            .time_to_idle(RUN_TIME_TO_IDLE)
            .build();

        Self {
            commerce,
            copy_generator,
            orchestrator,
            runs,
        }
    }
}
