//! Engine callback surface.
//!
//! Every callback names the process identity of the calling instance and the
//! binding recorded at parse time. The owner is resolved against the registry
//! snapshot current at call time; a call that resolved a descriptor keeps it
//! until it returns, even if a redeployment publishes a new snapshot meanwhile.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use process_plugins_sdk::{Execution, ProcessIdentity, StepError, UserTask};
use tracing::{debug, trace};

use super::definition::InvocationBinding;
use super::descriptor::ModuleDescriptor;
use super::diagnostics::DiagnosticContext;
use super::error::ContainerError;
use super::lifecycle::{LifecycleListener, LifecycleListeners};
use super::recovery::RecoveryPath;
use super::registry::ModuleRegistry;

/// Result of a router-mediated call as seen by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DelegateOutcome {
    /// Continue with the next element.
    Completed,
    /// Take the matching error boundary event.
    ErrorEvent { code: String, message: String },
    /// The instance was terminated by the recovery path.
    Terminated { reason: String },
}

impl DelegateOutcome {
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, DelegateOutcome::Completed)
    }
}

#[derive(Clone)]
pub struct DelegateRouter {
    registry: Arc<ModuleRegistry>,
    recovery: RecoveryPath,
    lifecycle: LifecycleListeners,
}

impl DelegateRouter {
    #[must_use]
    pub fn new(
        registry: Arc<ModuleRegistry>,
        recovery: RecoveryPath,
        lifecycle: LifecycleListeners,
    ) -> Self {
        Self {
            registry,
            recovery,
            lifecycle,
        }
    }

    /// Service task.
    pub async fn execute_step(
        &self,
        identity: &ProcessIdentity,
        binding: &InvocationBinding,
        execution: &dyn Execution,
    ) -> DelegateOutcome {
        self.step("execute-step", identity, binding, execution).await
    }

    /// Send task.
    pub async fn execute_send_message(
        &self,
        identity: &ProcessIdentity,
        binding: &InvocationBinding,
        execution: &dyn Execution,
    ) -> DelegateOutcome {
        self.step("send-message", identity, binding, execution).await
    }

    /// Message end event.
    pub async fn execute_end_event(
        &self,
        identity: &ProcessIdentity,
        binding: &InvocationBinding,
        execution: &dyn Execution,
    ) -> DelegateOutcome {
        self.step("end-event", identity, binding, execution).await
    }

    /// Message intermediate throw event.
    pub async fn execute_throw_event(
        &self,
        identity: &ProcessIdentity,
        binding: &InvocationBinding,
        execution: &dyn Execution,
    ) -> DelegateOutcome {
        self.step("throw-event", identity, binding, execution).await
    }

    pub async fn notify_task_listener(
        &self,
        identity: &ProcessIdentity,
        binding: &InvocationBinding,
        task: &dyn UserTask,
    ) -> DelegateOutcome {
        let execution = task.execution();
        let class = binding.class_name();
        let Some(module) = self.owner("task-listener", identity, class, execution) else {
            return self.recovery.plugin_missing(identity, execution).await;
        };

        let listener = match module
            .container()
            .task_listener(binding.class_name(), binding.config())
        {
            Ok(listener) => listener,
            Err(e) => return self.unavailable(identity, binding, execution, &e).await,
        };

        self.invoke(&module, identity, binding.class_name(), execution, async move {
            listener.notify(task).await
        })
        .await
    }

    pub async fn notify_execution_listener(
        &self,
        identity: &ProcessIdentity,
        binding: &InvocationBinding,
        execution: &dyn Execution,
    ) -> DelegateOutcome {
        let class = binding.class_name();
        let Some(module) = self.owner("execution-listener", identity, class, execution) else {
            return self.recovery.plugin_missing(identity, execution).await;
        };

        let listener = match module
            .container()
            .execution_listener(binding.class_name(), binding.config())
        {
            Ok(listener) => listener,
            Err(e) => return self.unavailable(identity, binding, execution, &e).await,
        };

        self.invoke(&module, identity, binding.class_name(), execution, async move {
            listener.notify(execution).await
        })
        .await
    }

    /// Host lifecycle listener the parser attached, run with the owning
    /// plugin's diagnostic context.
    pub async fn notify_lifecycle_listener(
        &self,
        identity: &ProcessIdentity,
        listener: LifecycleListener,
        execution: &dyn Execution,
    ) -> DelegateOutcome {
        let name = listener.to_string();
        let Some(module) = self.owner("lifecycle-listener", identity, &name, execution) else {
            return self.recovery.plugin_missing(identity, execution).await;
        };

        let Some(handler) = self.lifecycle.listener(module.api_version(), listener) else {
            let message = format!(
                "no lifecycle listeners for API version {}",
                module.api_version()
            );
            return self
                .recovery
                .handler_failed(identity, &name, execution, &message)
                .await;
        };

        self.invoke(&module, identity, &name, execution, async move {
            handler.notify(execution).await
        })
        .await
    }

    async fn step(
        &self,
        callback: &'static str,
        identity: &ProcessIdentity,
        binding: &InvocationBinding,
        execution: &dyn Execution,
    ) -> DelegateOutcome {
        let Some(module) = self.owner(callback, identity, binding.class_name(), execution) else {
            return self.recovery.plugin_missing(identity, execution).await;
        };

        let handler = match module
            .container()
            .step_handler(binding.class_name(), binding.config())
        {
            Ok(handler) => handler,
            Err(e) => return self.unavailable(identity, binding, execution, &e).await,
        };

        self.invoke(&module, identity, binding.class_name(), execution, async move {
            handler.execute(execution).await
        })
        .await
    }

    fn owner(
        &self,
        callback: &'static str,
        identity: &ProcessIdentity,
        class: &str,
        execution: &dyn Execution,
    ) -> Option<Arc<ModuleDescriptor>> {
        let module = self.registry.resolve(identity);
        trace!(
            callback,
            process = %identity,
            instance = execution.process_instance_id(),
            class,
            plugin = module.as_ref().map(|m| m.name()),
            "Routing engine callback"
        );
        module
    }

    async fn unavailable(
        &self,
        identity: &ProcessIdentity,
        binding: &InvocationBinding,
        execution: &dyn Execution,
        error: &ContainerError,
    ) -> DelegateOutcome {
        self.recovery
            .handler_failed(identity, binding.class_name(), execution, &error.to_string())
            .await
    }

    async fn invoke<F>(
        &self,
        module: &ModuleDescriptor,
        identity: &ProcessIdentity,
        class: &str,
        execution: &dyn Execution,
        call: F,
    ) -> DelegateOutcome
    where
        F: Future<Output = Result<(), StepError>> + Send,
    {
        let result = DiagnosticContext::for_module(module)
            .with_process(identity)
            .with_execution(execution)
            .scope(AssertUnwindSafe(call).catch_unwind())
            .await;

        match result {
            Ok(Ok(())) => DelegateOutcome::Completed,
            Ok(Err(StepError::Bpmn { code, message })) => {
                debug!(
                    process = %identity,
                    instance = execution.process_instance_id(),
                    code = %code,
                    "Handler raised BPMN error"
                );
                DelegateOutcome::ErrorEvent { code, message }
            }
            Ok(Err(StepError::Fault(message))) => {
                self.recovery
                    .handler_failed(identity, class, execution, &message)
                    .await
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                self.recovery
                    .handler_failed(identity, class, execution, &message)
                    .await
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_owned()
    }
}
