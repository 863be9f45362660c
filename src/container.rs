//! Lifecycle, registry, and worker-pool dispatch for a set of
//! subscriptions.

use std::sync::{Arc, Mutex};

use mongodb::Database;
use serde::de::DeserializeOwned;

use crate::{
    error::Result,
    error_handler::{ErrorHandler, ExceptionTranslator, LoggingErrorHandler},
    request::SubscriptionRequest,
    subscription::Subscription,
    task::{TaskHandle, TaskState},
    task_factory,
};

/// The retained, restartable form of a registration: a factory able to
/// build a fresh task from the original request, plus whichever task is
/// currently serving it.
///
/// This is the resolution to the specification's open question about
/// restart: rather than resubmitting a terminal, `Cancelled` task to the
/// worker pool, `Container::start` asks the factory for a brand new one.
pub(crate) struct Registration {
    factory: Box<dyn Fn() -> Result<Arc<dyn TaskHandle>> + Send + Sync>,
    current: Mutex<Arc<dyn TaskHandle>>,
}

impl Registration {
    pub(crate) fn current(&self) -> Arc<dyn TaskHandle> {
        self.current.lock().unwrap().clone()
    }
}

struct ContainerState {
    running: bool,
    registrations: Vec<Arc<Registration>>,
}

/// A long-lived runtime coordinating an arbitrary set of change-stream and
/// tailable-cursor subscriptions against a single database.
///
/// Subscriptions may be registered before or after [`Container::start`].
/// [`Container::stop`] cancels every active task but keeps each
/// registration around so a later `start()` can rebuild and resubmit it.
/// `running` and the registration list share one lock, so `register`,
/// `start`, `stop`, and `remove` never observe a half-updated view of each
/// other.
pub struct Container {
    database: Database,
    state: Mutex<ContainerState>,
    error_handler: Arc<dyn ErrorHandler>,
    translator: Option<Arc<dyn ExceptionTranslator>>,
    auto_startup: bool,
    phase: i32,
}

impl Container {
    /// Creates a container bound to `database`, with the default
    /// [`LoggingErrorHandler`] and no exception translator.
    pub fn new(database: Database) -> Self {
        Self {
            database,
            state: Mutex::new(ContainerState {
                running: false,
                registrations: Vec::new(),
            }),
            error_handler: Arc::new(LoggingErrorHandler),
            translator: None,
            auto_startup: false,
            phase: i32::MAX,
        }
    }

    /// Overrides the default error handler.
    pub fn with_error_handler(mut self, handler: Arc<dyn ErrorHandler>) -> Self {
        self.error_handler = handler;
        self
    }

    /// Installs an exception translator consulted before every error
    /// reaches the error handler.
    pub fn with_exception_translator(mut self, translator: Arc<dyn ExceptionTranslator>) -> Self {
        self.translator = Some(translator);
        self
    }

    /// Overrides the default phase (`i32::MAX`: start last, stop first).
    pub fn with_phase(mut self, phase: i32) -> Self {
        self.phase = phase;
        self
    }

    /// Overrides the default auto-startup flag (`false`: the host decides
    /// when to call [`Container::start`]).
    pub fn with_auto_startup(mut self, auto_startup: bool) -> Self {
        self.auto_startup = auto_startup;
        self
    }

    /// Registers a subscription. If the container is currently running,
    /// the backing task is submitted to the worker pool immediately;
    /// otherwise it starts out in the `Created` state and is submitted the
    /// next time [`Container::start`] runs.
    ///
    /// Registering the same logical request twice returns a new, distinct
    /// `Subscription` — de-duplication is not required.
    pub fn register<T>(&self, request: SubscriptionRequest<T>) -> Result<Subscription>
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        let SubscriptionRequest {
            listener,
            options,
            converter,
            fallback,
        } = request;
        let database = self.database.clone();
        let error_handler = self.error_handler.clone();
        let translator = self.translator.clone();

        let factory = move || -> Result<Arc<dyn TaskHandle>> {
            let request = SubscriptionRequest {
                listener: listener.clone(),
                options: options.clone(),
                converter: converter.clone(),
                fallback: fallback.clone(),
            };
            task_factory::build_task(
                database.clone(),
                request,
                error_handler.clone(),
                translator.clone(),
            )
        };

        let initial = factory()?;
        let registration = Arc::new(Registration {
            factory: Box::new(factory),
            current: Mutex::new(initial.clone()),
        });

        let mut state = self.state.lock().unwrap();
        state.registrations.push(registration.clone());
        if state.running {
            initial.spawn();
        }
        drop(state);

        Ok(Subscription { inner: registration })
    }

    /// Submits every registered subscription whose task is not already
    /// active, then marks the container running. A no-op if already
    /// running.
    pub fn start(&self) {
        let mut state = self.state.lock().unwrap();
        if state.running {
            return;
        }
        for registration in &state.registrations {
            let mut current = registration.current.lock().unwrap();
            match current.state() {
                TaskState::Created => {
                    current.clone().spawn();
                }
                TaskState::Cancelled => {
                    match (registration.factory)() {
                        Ok(fresh) => {
                            fresh.clone().spawn();
                            *current = fresh;
                        }
                        Err(err) => self.error_handler.handle(err),
                    }
                }
                TaskState::Starting | TaskState::Running => {}
            }
        }
        state.running = true;
    }

    /// Cancels every registered subscription's active task, closing its
    /// cursor, and marks the container stopped. Registrations are
    /// retained so a later `start()` can rebuild them. A no-op if already
    /// stopped.
    pub fn stop(&self) {
        let mut state = self.state.lock().unwrap();
        if !state.running {
            return;
        }
        for registration in &state.registrations {
            registration.current().cancel();
        }
        state.running = false;
    }

    /// Calls [`Container::stop`], then invokes `on_done`, mirroring hosts
    /// that need a completion callback for lifecycle shutdown sequencing.
    pub fn stop_then(&self, on_done: impl FnOnce()) {
        self.stop();
        on_done();
    }

    /// Cancels `subscription` if active and removes it from the registry.
    /// A removed subscription does not restart on a later `start()`.
    pub fn remove(&self, subscription: &Subscription) {
        let mut state = self.state.lock().unwrap();
        if let Some(index) = state
            .registrations
            .iter()
            .position(|registration| Arc::ptr_eq(registration, &subscription.inner))
        {
            state.registrations[index].current().cancel();
            state.registrations.remove(index);
        }
    }

    /// Whether the container is currently running.
    pub fn is_running(&self) -> bool {
        self.state.lock().unwrap().running
    }

    /// Whether this container should be started automatically by a host
    /// lifecycle framework.
    pub fn is_auto_startup(&self) -> bool {
        self.auto_startup
    }

    /// An ordering hint for external lifecycle frameworks: higher values
    /// start later and stop earlier.
    pub fn phase(&self) -> i32 {
        self.phase
    }
}
