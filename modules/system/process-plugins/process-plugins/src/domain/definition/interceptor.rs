//! Binds process model elements to router-mediated handler invocations.
//!
//! Every `class` reference found in a model becomes an [`InvocationBinding`]
//! that names the class without resolving it. User tasks additionally get the
//! owning plugin's default `create` listener unless a declared `create`
//! listener already is, or extends, that class. When the API version of a
//! process has host lifecycle listeners, message start events, end events,
//! message catch events and receive tasks are marked to run them.

use std::sync::Arc;

use process_plugins_sdk::{BindingConfig, FieldValue, ProcessIdentity};
use tracing::debug;

use super::element::Element;
use super::model::{BindingKind, InvocationBinding, ParsedActivity, ParsedProcess};
use crate::domain::descriptor::ModuleDescriptor;
use crate::domain::diagnostics::DiagnosticContext;
use crate::domain::error::DefinitionError;
use crate::domain::lifecycle::{LifecycleListener, LifecycleListeners};
use crate::domain::registry::ModuleRegistry;

pub const API_VERSION_PROPERTY: &str = "process-api-version";
pub const TASK_CREATE_EVENT: &str = "create";

const DEFAULT_TASK_LISTENER_EVENT: &str = TASK_CREATE_EVENT;
const DEFAULT_EXECUTION_LISTENER_EVENT: &str = "start";

#[derive(Clone)]
pub struct DefinitionParsingInterceptor {
    registry: Arc<ModuleRegistry>,
    lifecycle: LifecycleListeners,
}

impl DefinitionParsingInterceptor {
    #[must_use]
    pub fn new(registry: Arc<ModuleRegistry>, lifecycle: LifecycleListeners) -> Self {
        Self {
            registry,
            lifecycle,
        }
    }

    /// Parses every process of `xml`, each bound to the plugin that owns its
    /// identity in the current registry snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`DefinitionError`] if the document is malformed, a process lacks
    /// id or version tag, or declares an API version its owner does not implement.
    pub fn parse(&self, xml: &str) -> Result<Vec<ParsedProcess>, DefinitionError> {
        let snapshot = self.registry.snapshot();
        parse_document(xml, &self.lifecycle, |identity| {
            snapshot.resolve(identity).cloned()
        })
    }

    /// Parses every process of `xml` on behalf of `module`, which need not be
    /// registered yet.
    ///
    /// # Errors
    ///
    /// See [`DefinitionParsingInterceptor::parse`].
    pub fn parse_for_module(
        &self,
        xml: &str,
        module: &Arc<ModuleDescriptor>,
    ) -> Result<Vec<ParsedProcess>, DefinitionError> {
        parse_document(xml, &self.lifecycle, |_| Some(Arc::clone(module)))
    }
}

fn parse_document<F>(
    xml: &str,
    lifecycle: &LifecycleListeners,
    owner: F,
) -> Result<Vec<ParsedProcess>, DefinitionError>
where
    F: Fn(&ProcessIdentity) -> Option<Arc<ModuleDescriptor>>,
{
    let root = Element::parse(xml)?;
    let processes: Vec<&Element> = if root.name() == "process" {
        vec![&root]
    } else {
        root.children_named("process").collect()
    };

    let mut parsed = Vec::with_capacity(processes.len());
    for process in processes {
        // Identity comes from each process element; one document may carry
        // processes of different plugins.
        let identity = process_identity(process)?;
        let api_version = declared_api_version(process, &identity)?;
        let module = owner(&identity);

        let result = match &module {
            Some(module) => DiagnosticContext::for_module(module)
                .with_process(&identity)
                .sync_scope(|| {
                    ProcessParse::new(Some(module), lifecycle).run(process, identity, api_version)
                }),
            None => {
                debug!(process = %identity, "No plugin owns process, default task listeners not added");
                ProcessParse::new(None, lifecycle).run(process, identity, api_version)
            }
        };
        parsed.push(result?);
    }
    Ok(parsed)
}

fn process_identity(process: &Element) -> Result<ProcessIdentity, DefinitionError> {
    let id = process
        .non_blank_attribute("id")
        .ok_or(DefinitionError::MissingProcessId)?;
    let version = process
        .non_blank_attribute("versionTag")
        .ok_or_else(|| DefinitionError::MissingVersionTag {
            process: id.to_owned(),
        })?;
    Ok(ProcessIdentity::new(id, version))
}

fn declared_api_version(
    process: &Element,
    identity: &ProcessIdentity,
) -> Result<Option<u32>, DefinitionError> {
    let Some(properties) = process
        .child("extensionElements")
        .and_then(|e| e.child("properties"))
    else {
        return Ok(None);
    };

    let Some(value) = properties
        .children_named("property")
        .find(|p| p.attribute("name") == Some(API_VERSION_PROPERTY))
        .and_then(|p| p.attribute("value"))
    else {
        return Ok(None);
    };

    value
        .trim()
        .parse()
        .map(Some)
        .map_err(|_| DefinitionError::InvalidApiVersion {
            process: identity.to_string(),
            value: value.to_owned(),
        })
}

struct ProcessParse<'a> {
    module: Option<&'a ModuleDescriptor>,
    lifecycle: &'a LifecycleListeners,
    with_lifecycle_listeners: bool,
}

impl<'a> ProcessParse<'a> {
    fn new(module: Option<&'a Arc<ModuleDescriptor>>, lifecycle: &'a LifecycleListeners) -> Self {
        Self {
            module: module.map(AsRef::as_ref),
            lifecycle,
            with_lifecycle_listeners: false,
        }
    }

    fn run(
        mut self,
        process: &Element,
        identity: ProcessIdentity,
        api_version: Option<u32>,
    ) -> Result<ParsedProcess, DefinitionError> {
        if let (Some(declared), Some(module)) = (api_version, self.module)
            && declared != module.api_version()
        {
            return Err(DefinitionError::ApiVersionMismatch {
                identity,
                plugin: module.to_string(),
                declared,
                actual: module.api_version(),
            });
        }

        let api_version = api_version.or_else(|| self.module.map(ModuleDescriptor::api_version));
        self.with_lifecycle_listeners = api_version.is_some_and(|v| self.lifecycle.supports(v));

        let execution_listeners = execution_listeners(process);
        let mut activities = Vec::new();
        self.collect_activities(process, &mut activities);

        debug!(
            process = %identity,
            activities = activities.len(),
            "Parsed process definition"
        );
        Ok(ParsedProcess {
            api_version,
            plugin: self.module.map(|m| m.name().to_owned()),
            identity,
            execution_listeners,
            activities,
        })
    }

    fn collect_activities(&self, scope: &Element, activities: &mut Vec<ParsedActivity>) {
        for element in scope.children() {
            let Some(id) = element.attribute("id") else {
                continue;
            };

            let mut activity = ParsedActivity::new(id, element.name());
            activity.behavior = behavior(element);
            activity.execution_listeners = execution_listeners(element);

            if element.name() == "userTask" {
                activity.task_listeners = task_listeners(element);
                self.ensure_default_task_listener(element, &mut activity);
            }
            if self.with_lifecycle_listeners {
                activity.lifecycle_listener = lifecycle_listener(element);
            }

            if activity.is_bound() {
                activities.push(activity);
            }

            if element.name() == "subProcess" {
                self.collect_activities(element, activities);
            }
        }
    }

    fn ensure_default_task_listener(&self, element: &Element, activity: &mut ParsedActivity) {
        let Some(module) = self.module else {
            return;
        };
        let default_class = module.default_task_listener_class();

        let satisfied = activity
            .task_listeners
            .iter()
            .filter(|l| matches!(l.kind(), BindingKind::TaskListener(event) if event == TASK_CREATE_EVENT))
            .any(|l| is_default_or_subclass(module, l.class_name()));

        if satisfied {
            debug!(
                element = %activity.id,
                default_class,
                event = TASK_CREATE_EVENT,
                "Custom task listener extending default is defined"
            );
            return;
        }

        debug!(
            element = %activity.id,
            default_class,
            event = TASK_CREATE_EVENT,
            "Adding default task listener"
        );
        activity.task_listeners.push(InvocationBinding::new(
            BindingKind::TaskListener(TASK_CREATE_EVENT.to_owned()),
            default_class,
            field_declarations(element),
        ));
        activity.default_listener_added = true;
    }
}

/// Whether `class_name` is the module's default task listener or extends it,
/// as seen by the module's own loading context.
fn is_default_or_subclass(module: &ModuleDescriptor, class_name: &str) -> bool {
    let default_class = module.default_task_listener_class();
    if same_class(class_name, default_class) {
        return true;
    }

    let context = module.context();
    let loaded = context
        .load_class(default_class)
        .and_then(|default| Ok((default, context.load_class(class_name)?)));
    match loaded {
        Ok((default, declared)) => declared.is_subtype_of(&default),
        Err(e) => {
            debug!(
                class = class_name,
                context = context.name(),
                error = %e,
                "Unable to check task listener against default"
            );
            false
        }
    }
}

fn lifecycle_listener(element: &Element) -> Option<LifecycleListener> {
    let has_message = element.child("messageEventDefinition").is_some();
    let listener = match (element.name(), has_message) {
        ("startEvent", true) => LifecycleListener::Start,
        ("startEvent", false) => {
            debug!(
                element = element.attribute("id"),
                "Not adding lifecycle listener to start event without message"
            );
            return None;
        }
        ("endEvent", _) => LifecycleListener::End,
        ("intermediateCatchEvent", true) | ("receiveTask", _) => LifecycleListener::Continue,
        _ => return None,
    };
    debug!(
        element = element.attribute("id"),
        listener = %listener,
        event = listener.event(),
        "Adding lifecycle listener"
    );
    Some(listener)
}

fn same_class(a: &str, b: &str) -> bool {
    a.replace('/', ".") == b.replace('/', ".")
}

fn behavior(element: &Element) -> Option<InvocationBinding> {
    let (kind, carrier) = match element.name() {
        "serviceTask" => (BindingKind::ServiceTask, element),
        "sendTask" => (BindingKind::SendTask, element),
        "endEvent" => (
            BindingKind::MessageEndEvent,
            element.child("messageEventDefinition")?,
        ),
        "intermediateThrowEvent" => (
            BindingKind::MessageIntermediateThrowEvent,
            element.child("messageEventDefinition")?,
        ),
        _ => return None,
    };

    let Some(class_name) = carrier.non_blank_attribute("class") else {
        debug!(
            element = element.attribute("id"),
            kind = %kind,
            "Not modifying element without class"
        );
        return None;
    };

    debug!(
        element = element.attribute("id"),
        kind = %kind,
        class = class_name,
        "Binding element to plugin handler"
    );
    Some(InvocationBinding::new(
        kind,
        class_name,
        field_declarations(carrier),
    ))
}

fn task_listeners(element: &Element) -> Vec<InvocationBinding> {
    listeners(element, "taskListener", DEFAULT_TASK_LISTENER_EVENT, BindingKind::TaskListener)
}

fn execution_listeners(element: &Element) -> Vec<InvocationBinding> {
    listeners(
        element,
        "executionListener",
        DEFAULT_EXECUTION_LISTENER_EVENT,
        BindingKind::ExecutionListener,
    )
}

fn listeners(
    element: &Element,
    tag: &str,
    default_event: &str,
    kind: fn(String) -> BindingKind,
) -> Vec<InvocationBinding> {
    let Some(extensions) = element.child("extensionElements") else {
        return Vec::new();
    };

    extensions
        .children_named(tag)
        .filter_map(|listener| {
            let Some(class_name) = listener.non_blank_attribute("class") else {
                debug!(
                    element = element.attribute("id"),
                    listener = tag,
                    "Not modifying listener without class"
                );
                return None;
            };
            let event = listener.non_blank_attribute("event").unwrap_or(default_event);
            Some(InvocationBinding::new(
                kind(event.to_owned()),
                class_name,
                field_declarations(listener),
            ))
        })
        .collect()
}

/// `field` declarations of `element`, from its `extensionElements` or direct children.
fn field_declarations(element: &Element) -> BindingConfig {
    let direct = element.children_named("field");
    let nested = element
        .child("extensionElements")
        .into_iter()
        .flat_map(|e| e.children_named("field"));

    let mut config = BindingConfig::new();
    for field in direct.chain(nested) {
        let Some(name) = field.non_blank_attribute("name") else {
            continue;
        };
        if let Some(value) = field_value(field) {
            config.insert(name, value);
        }
    }
    config
}

fn field_value(field: &Element) -> Option<FieldValue> {
    if let Some(v) = field.attribute("stringValue") {
        return Some(FieldValue::String(v.to_owned()));
    }
    if let Some(v) = field.attribute("expression") {
        return Some(FieldValue::Expression(v.to_owned()));
    }
    if let Some(v) = field.child("string") {
        return Some(FieldValue::String(v.text().to_owned()));
    }
    field
        .child("expression")
        .map(|v| FieldValue::Expression(v.text().to_owned()))
}
