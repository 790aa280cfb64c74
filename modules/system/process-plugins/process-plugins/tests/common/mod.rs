#![allow(clippy::unwrap_used, clippy::expect_used, dead_code)]

//! Shared fakes and builders for process plugin host integration tests.

use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use process_plugins::infra::classfile::ClassUnit;
use process_plugins::{
    BindingConfig, ClassSource, DiagnosticContext, EngineError, Execution, ExecutionListener,
    HandlerFactory, LifecycleListenerFactory, MemoryClassSource, ProcessEngine, ProcessIdentity, ProcessPluginDefinition,
    ProcessPluginsConfig, ProcessPluginsHost, StepError, StepHandler, TaskListener, TaskPage,
    TaskStatus, TaskTracker, TrackedTask, TrackerError, UserTask, ValueCodec,
};
use process_plugins::domain::diagnostics::PLUGIN_NAME;

pub const DEFAULT_LISTENER: &str = "dev.dsf.bpe.v2.activity.DefaultUserTaskListener";
pub const DEFAULT_LISTENER_INTERNAL: &str = "dev/dsf/bpe/v2/activity/DefaultUserTaskListener";

// ---------------------------------------------------------------------------
// Class units
// ---------------------------------------------------------------------------

pub fn encoded(unit: ClassUnit) -> Vec<u8> {
    unit.sealed().encode().unwrap().to_vec()
}

pub fn source_with(label: &str, units: Vec<ClassUnit>) -> MemoryClassSource {
    units.into_iter().fold(MemoryClassSource::new(label), |source, unit| {
        let path = ClassUnit::resource_path(&unit.name);
        source.with_entry(path, encoded(unit))
    })
}

/// Host API classes shared by all plugins of one API version.
pub fn api_source(version: u32) -> Arc<dyn ClassSource> {
    let units = if version == 2 {
        vec![ClassUnit::new(DEFAULT_LISTENER_INTERNAL)]
    } else {
        vec![ClassUnit::new("dev/dsf/bpe/v1/activity/DefaultUserTaskListener")]
    };
    Arc::new(source_with(&format!("api-v{version}"), units))
}

pub fn api_sources() -> HashMap<u32, Arc<dyn ClassSource>> {
    HashMap::from([(1, api_source(1)), (2, api_source(2))])
}

/// Class source counting reads per path.
pub struct CountingSource {
    inner: MemoryClassSource,
    reads: Mutex<HashMap<String, usize>>,
}

impl CountingSource {
    pub fn new(inner: MemoryClassSource) -> Self {
        Self {
            inner,
            reads: Mutex::new(HashMap::new()),
        }
    }

    pub fn reads(&self, path: &str) -> usize {
        self.reads.lock().get(path).copied().unwrap_or(0)
    }
}

impl ClassSource for CountingSource {
    fn describe(&self) -> String {
        format!("counting:{}", self.inner.describe())
    }

    fn read(&self, path: &str) -> io::Result<Option<Vec<u8>>> {
        *self.reads.lock().entry(path.to_owned()).or_default() += 1;
        // Widen the window in which concurrent loads overlap.
        std::thread::sleep(std::time::Duration::from_millis(5));
        self.inner.read(path)
    }
}

// ---------------------------------------------------------------------------
// Plugins
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct TestPlugin {
    pub name: String,
    pub version: String,
    pub api_version: u32,
    pub identities: Vec<ProcessIdentity>,
    pub default_listener: String,
    pub handlers: Vec<(String, HandlerFactory)>,
    pub codecs: Vec<Arc<dyn ValueCodec>>,
    pub source: Arc<dyn ClassSource>,
    pub models: Vec<(String, String)>,
}

impl TestPlugin {
    /// Plugin owning `process|1.0` with the API v2 default task listener registered.
    pub fn new(name: &str, process: &str) -> Self {
        Self {
            name: name.to_owned(),
            version: "1.0.0".to_owned(),
            api_version: 2,
            identities: vec![ProcessIdentity::new(process, "1.0")],
            default_listener: DEFAULT_LISTENER.to_owned(),
            handlers: vec![(
                DEFAULT_LISTENER.to_owned(),
                HandlerFactory::task_listener(|_| {
                    Ok(Arc::new(NoopTaskListener) as Arc<dyn TaskListener>)
                }),
            )],
            codecs: Vec::new(),
            source: Arc::new(MemoryClassSource::new(name)),
            models: Vec::new(),
        }
    }

    pub fn with_handler(mut self, class_name: &str, factory: HandlerFactory) -> Self {
        self.handlers.push((class_name.to_owned(), factory));
        self
    }

    pub fn with_identity(mut self, process: &str, version: &str) -> Self {
        self.identities.push(ProcessIdentity::new(process, version));
        self
    }

    pub fn with_source(mut self, source: Arc<dyn ClassSource>) -> Self {
        self.source = source;
        self
    }

    pub fn with_codec(mut self, codec: Arc<dyn ValueCodec>) -> Self {
        self.codecs.push(codec);
        self
    }

    pub fn with_model(mut self, file: &str, xml: &str) -> Self {
        self.models.push((file.to_owned(), xml.to_owned()));
        self
    }

    pub fn with_version(mut self, version: &str) -> Self {
        self.version = version.to_owned();
        self
    }

    pub fn with_api_version(mut self, api_version: u32) -> Self {
        self.api_version = api_version;
        self
    }

    pub fn shared(self) -> Arc<dyn ProcessPluginDefinition> {
        Arc::new(self)
    }
}

impl ProcessPluginDefinition for TestPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn api_version(&self) -> u32 {
        self.api_version
    }

    fn process_identities(&self) -> Vec<ProcessIdentity> {
        self.identities.clone()
    }

    fn default_task_listener_class(&self) -> &str {
        &self.default_listener
    }

    fn handlers(&self) -> Vec<(String, HandlerFactory)> {
        self.handlers.clone()
    }

    fn value_codecs(&self) -> Vec<Arc<dyn ValueCodec>> {
        self.codecs.clone()
    }

    fn class_source(&self) -> Arc<dyn ClassSource> {
        Arc::clone(&self.source)
    }

    fn process_models(&self) -> Vec<(String, String)> {
        self.models.clone()
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Shared log of calls, each entry `"<label>@<plugin from diagnostic context>"`.
pub type CallLog = Arc<Mutex<Vec<String>>>;

pub fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

fn attributed(label: &str) -> String {
    let plugin = DiagnosticContext::current()
        .and_then(|c| c.get(PLUGIN_NAME).map(str::to_owned))
        .unwrap_or_else(|| "<none>".to_owned());
    format!("{label}@{plugin}")
}

pub struct RecordingStep {
    label: String,
    log: CallLog,
}

#[async_trait]
impl StepHandler for RecordingStep {
    async fn execute(&self, execution: &dyn Execution) -> Result<(), StepError> {
        self.log.lock().push(attributed(&self.label));
        execution.set_variable("handled_by", serde_json::json!(self.label));
        Ok(())
    }
}

/// Step recording its label and the `target` field of its binding.
pub fn recording_step(label: &str, log: &CallLog) -> HandlerFactory {
    let label = label.to_owned();
    let log = Arc::clone(log);
    HandlerFactory::step(move |config: &BindingConfig| {
        let label = match config.string("target") {
            Some(target) => format!("{label}:{target}"),
            None => label.clone(),
        };
        Ok(Arc::new(RecordingStep {
            label,
            log: Arc::clone(&log),
        }) as Arc<dyn StepHandler>)
    })
}

/// Step that fails the given way, logging `"<kind>@<plugin>"` first when a log is attached.
pub struct FailingStep {
    kind: StepErrorKind,
    log: Option<CallLog>,
}

#[derive(Clone, Copy, Debug)]
pub enum StepErrorKind {
    Bpmn,
    Fault,
    Panic,
}

#[async_trait]
impl StepHandler for FailingStep {
    async fn execute(&self, _execution: &dyn Execution) -> Result<(), StepError> {
        if let Some(log) = &self.log {
            log.lock().push(attributed(&format!("{:?}", self.kind).to_lowercase()));
        }
        match self.kind {
            StepErrorKind::Bpmn => Err(StepError::bpmn("target-not-reachable", "ping timed out")),
            StepErrorKind::Fault => Err(StepError::fault("connection refused")),
            StepErrorKind::Panic => panic!("handler blew up"),
        }
    }
}

pub fn failing_step(kind: StepErrorKind) -> HandlerFactory {
    HandlerFactory::step(move |_| {
        Ok(Arc::new(FailingStep { kind, log: None }) as Arc<dyn StepHandler>)
    })
}

pub fn logged_failing_step(kind: StepErrorKind, log: &CallLog) -> HandlerFactory {
    let log = Arc::clone(log);
    HandlerFactory::step(move |_| {
        Ok(Arc::new(FailingStep {
            kind,
            log: Some(Arc::clone(&log)),
        }) as Arc<dyn StepHandler>)
    })
}

pub struct NoopTaskListener;

#[async_trait]
impl TaskListener for NoopTaskListener {
    async fn notify(&self, _task: &dyn UserTask) -> Result<(), StepError> {
        Ok(())
    }
}

pub struct RecordingTaskListener(pub CallLog);

#[async_trait]
impl TaskListener for RecordingTaskListener {
    async fn notify(&self, task: &dyn UserTask) -> Result<(), StepError> {
        self.0
            .lock()
            .push(attributed(&format!("{}:{}", task.task_id(), task.event_name())));
        Ok(())
    }
}

pub struct RecordingExecutionListener(pub CallLog);

#[async_trait]
impl ExecutionListener for RecordingExecutionListener {
    async fn notify(&self, execution: &dyn Execution) -> Result<(), StepError> {
        self.0
            .lock()
            .push(attributed(&format!("listener:{}", execution.activity_id())));
        Ok(())
    }
}

/// Lifecycle listener logging `"<phase>:<activity>@<plugin>"`.
pub struct RecordingLifecycleListener {
    phase: &'static str,
    log: CallLog,
}

#[async_trait]
impl ExecutionListener for RecordingLifecycleListener {
    async fn notify(&self, execution: &dyn Execution) -> Result<(), StepError> {
        self.log
            .lock()
            .push(attributed(&format!("{}:{}", self.phase, execution.activity_id())));
        Ok(())
    }
}

/// Lifecycle listeners of one API version, all recording into one log.
pub struct RecordingLifecycle {
    pub api_version: u32,
    pub log: CallLog,
}

impl RecordingLifecycle {
    fn listener(&self, phase: &'static str) -> Arc<dyn ExecutionListener> {
        Arc::new(RecordingLifecycleListener {
            phase,
            log: Arc::clone(&self.log),
        })
    }
}

impl LifecycleListenerFactory for RecordingLifecycle {
    fn api_version(&self) -> u32 {
        self.api_version
    }

    fn start_listener(&self) -> Arc<dyn ExecutionListener> {
        self.listener("start")
    }

    fn end_listener(&self) -> Arc<dyn ExecutionListener> {
        self.listener("end")
    }

    fn continue_listener(&self) -> Arc<dyn ExecutionListener> {
        self.listener("continue")
    }
}

// ---------------------------------------------------------------------------
// Engine handles
// ---------------------------------------------------------------------------

pub struct TestExecution {
    pub instance_id: String,
    pub business_key: Option<String>,
    pub activity_id: String,
    pub variables: Mutex<HashMap<String, serde_json::Value>>,
}

impl TestExecution {
    pub fn new(instance_id: &str, business_key: Option<&str>) -> Self {
        Self {
            instance_id: instance_id.to_owned(),
            business_key: business_key.map(str::to_owned),
            activity_id: "Task_1".to_owned(),
            variables: Mutex::new(HashMap::new()),
        }
    }
}

impl Execution for TestExecution {
    fn process_instance_id(&self) -> &str {
        &self.instance_id
    }

    fn business_key(&self) -> Option<&str> {
        self.business_key.as_deref()
    }

    fn activity_id(&self) -> &str {
        &self.activity_id
    }

    fn variable(&self, name: &str) -> Option<serde_json::Value> {
        self.variables.lock().get(name).cloned()
    }

    fn set_variable(&self, name: &str, value: serde_json::Value) {
        self.variables.lock().insert(name.to_owned(), value);
    }
}

pub struct TestUserTask {
    pub id: String,
    pub event: String,
    pub execution: TestExecution,
}

impl UserTask for TestUserTask {
    fn task_id(&self) -> &str {
        &self.id
    }

    fn event_name(&self) -> &str {
        &self.event
    }

    fn execution(&self) -> &dyn Execution {
        &self.execution
    }
}

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// In-memory task tracker paging `page_size` tasks per search.
pub struct MemoryTracker {
    tasks: Vec<TrackedTask>,
    page_size: usize,
    failing_updates: HashSet<String>,
    fail_search: bool,
    pub searches: AtomicUsize,
    pub updates: Mutex<Vec<(String, TaskStatus, String)>>,
}

impl MemoryTracker {
    pub fn new(tasks: Vec<TrackedTask>, page_size: usize) -> Self {
        Self {
            tasks,
            page_size,
            failing_updates: HashSet::new(),
            fail_search: false,
            searches: AtomicUsize::new(0),
            updates: Mutex::new(Vec::new()),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), 10)
    }

    pub fn failing_update(mut self, task_id: &str) -> Self {
        self.failing_updates.insert(task_id.to_owned());
        self
    }

    pub fn failing_search(mut self) -> Self {
        self.fail_search = true;
        self
    }

    pub fn updated_ids(&self) -> Vec<String> {
        self.updates.lock().iter().map(|(id, _, _)| id.clone()).collect()
    }
}

pub fn in_progress(id: &str, business_key: &str) -> TrackedTask {
    TrackedTask {
        id: id.to_owned(),
        status: TaskStatus::InProgress,
        business_key: Some(business_key.to_owned()),
    }
}

#[async_trait]
impl TaskTracker for MemoryTracker {
    async fn search_in_progress(&self, page: u32) -> Result<TaskPage, TrackerError> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        if self.fail_search {
            return Err(TrackerError::Search("tracker unavailable".to_owned()));
        }
        let start = (usize::try_from(page).unwrap() - 1) * self.page_size;
        let matching: Vec<&TrackedTask> = self
            .tasks
            .iter()
            .filter(|t| t.status == TaskStatus::InProgress)
            .collect();
        let tasks = matching
            .iter()
            .skip(start)
            .take(self.page_size)
            .map(|t| (*t).clone())
            .collect();
        let has_next = start + self.page_size < matching.len();
        Ok(TaskPage { tasks, has_next })
    }

    async fn update_task_status(
        &self,
        task_id: &str,
        status: TaskStatus,
        note: &str,
    ) -> Result<(), TrackerError> {
        if self.failing_updates.contains(task_id) {
            return Err(TrackerError::Update {
                task_id: task_id.to_owned(),
                message: "412 Precondition Failed".to_owned(),
            });
        }
        self.updates
            .lock()
            .push((task_id.to_owned(), status, note.to_owned()));
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingEngine {
    pub fail: bool,
    pub deleted: Mutex<Vec<(String, String)>>,
}

impl RecordingEngine {
    pub fn failing() -> Self {
        Self {
            fail: true,
            deleted: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ProcessEngine for RecordingEngine {
    async fn delete_process_instance(
        &self,
        instance_id: &str,
        reason: &str,
    ) -> Result<(), EngineError> {
        if self.fail {
            return Err(EngineError::Internal("engine shutting down".to_owned()));
        }
        self.deleted
            .lock()
            .push((instance_id.to_owned(), reason.to_owned()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Host
// ---------------------------------------------------------------------------

pub fn host_with(
    config: ProcessPluginsConfig,
    tracker: Arc<MemoryTracker>,
    engine: Arc<RecordingEngine>,
) -> ProcessPluginsHost {
    ProcessPluginsHost::new(config, api_sources(), Vec::new(), tracker, engine).unwrap()
}

/// Host whose API v2 processes get lifecycle listeners recording into `log`.
pub fn host_with_lifecycle(
    log: &CallLog,
    tracker: Arc<MemoryTracker>,
    engine: Arc<RecordingEngine>,
) -> ProcessPluginsHost {
    let lifecycle: Arc<dyn LifecycleListenerFactory> = Arc::new(RecordingLifecycle {
        api_version: 2,
        log: Arc::clone(log),
    });
    ProcessPluginsHost::new(
        ProcessPluginsConfig::default(),
        api_sources(),
        vec![lifecycle],
        tracker,
        engine,
    )
    .unwrap()
}

pub fn host(tracker: Arc<MemoryTracker>, engine: Arc<RecordingEngine>) -> ProcessPluginsHost {
    host_with(ProcessPluginsConfig::default(), tracker, engine)
}
