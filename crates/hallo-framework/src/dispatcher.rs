//! Function dispatch and module lifecycle.
//!
//! [`Dispatcher`] owns the [`FunctionRegistry`] and drives everything that
//! touches it:
//!
//! - **Direct dispatch** resolves a command line to a function, checks the
//!   caller's rights, runs the function and sends the reply.
//! - **Passive dispatch** offers an event to every function that declared
//!   interest in its type, one after another.
//! - **Module lifecycle** loads, reloads and unloads modules from the
//!   [`ModuleCatalog`], restoring and saving persistent functions.
//!
//! Every call into function code is isolated: an error or a panic is logged
//! with the function's identity and never reaches the caller or the other
//! functions of the same pass.
//!
//! # Rights
//!
//! The right checked for a function is `function_<ClassName>`, resolved
//! against the first available of: the user (in the channel's context), the
//! channel, the server, the global rights.
//!
//! # Example
//!
//! ```rust,ignore
//! let dispatcher = Dispatcher::new(
//!     ModuleCatalog::new().with_module(DICE),
//!     Arc::new(GlobalRights::new(true)),
//! );
//! dispatcher.load_all();
//!
//! // from a server loop
//! dispatcher.dispatch_event(&event);
//!
//! // at shutdown
//! dispatcher.close();
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use hallo_core::{Addressing, BoxedServer, Channel, Destination, Event, EventType, GlobalRights, User};
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{Level, debug, error, info, span, trace, warn};

use crate::context::LoadContext;
use crate::error::{ModuleError, ModuleResult};
use crate::function::Invocation;
use crate::module::{ModuleCatalog, ModuleDescriptor};
use crate::registry::{FunctionRegistry, LoadedFunction, catch};

/// Reply sent when no function matches a direct command.
pub const NOT_RECOGNISED: &str = "This is not a recognised function.";

/// Reply sent when the caller lacks the right to run the function.
pub const NO_PERMISSION: &str = "You do not have permission to use this function.";

// =============================================================================
// Dispatch results
// =============================================================================

/// Options for a direct dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchFlags {
    /// Do not reply "not recognised" when no function matches.
    pub hide_errors: bool,
}

impl DispatchFlags {
    pub const NONE: Self = Self { hide_errors: false };
    pub const HIDE_ERRORS: Self = Self { hide_errors: true };
}

/// What a direct dispatch did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// No function answers to the command.
    NotRecognised,
    /// The caller may not use the function; it was not run.
    Denied { function: &'static str },
    /// The function ran.
    Completed {
        function: &'static str,
        responded: bool,
    },
    /// The function returned an error or panicked.
    Failed {
        function: &'static str,
        error: String,
    },
}

/// Tally of one passive dispatch pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassiveSummary {
    /// Functions that ran to completion.
    pub invoked: usize,
    /// Functions skipped for lack of rights.
    pub denied: usize,
    /// Functions that returned an error or panicked.
    pub failed: usize,
    /// Responses sent.
    pub responses: usize,
}

/// What loading a module did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub module: &'static str,
    /// Class names of the registered functions.
    pub loaded: Vec<&'static str>,
    /// Functions left out, with the reason.
    pub skipped: Vec<(&'static str, String)>,
    /// Whether a previously loaded version was unloaded first.
    pub reloaded: bool,
}

// =============================================================================
// Dispatcher
// =============================================================================

/// Routes events to functions and manages module lifecycle.
pub struct Dispatcher {
    catalog: ModuleCatalog,
    registry: FunctionRegistry,
    global: Arc<GlobalRights>,
    data_dir: Option<PathBuf>,
    module_configs: HashMap<String, Arc<Value>>,
    /// Serialises load/unload so two reloads of a module cannot interleave.
    lifecycle: Mutex<()>,
}

impl Dispatcher {
    /// Creates a dispatcher with nothing loaded.
    pub fn new(catalog: ModuleCatalog, global: Arc<GlobalRights>) -> Self {
        Self {
            catalog,
            registry: FunctionRegistry::new(),
            global,
            data_dir: None,
            module_configs: HashMap::new(),
            lifecycle: Mutex::new(()),
        }
    }

    /// Directory persistent functions keep their state in.
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    /// Config section handed to the named module's load context.
    pub fn with_module_config(mut self, module: impl Into<String>, config: Value) -> Self {
        self.module_configs.insert(module.into(), Arc::new(config));
        self
    }

    pub fn with_module_configs(mut self, configs: HashMap<String, Value>) -> Self {
        for (module, config) in configs {
            self.module_configs.insert(module, Arc::new(config));
        }
        self
    }

    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    pub fn catalog(&self) -> &ModuleCatalog {
        &self.catalog
    }

    pub fn global_rights(&self) -> &Arc<GlobalRights> {
        &self.global
    }

    fn load_context(&self, module: &str) -> LoadContext {
        let config = self
            .module_configs
            .get(module)
            .cloned()
            .unwrap_or_else(|| Arc::new(Value::Object(Default::default())));
        LoadContext::new(module, config, self.data_dir.clone())
    }

    // ─── Module lifecycle ────────────────────────────────────────────────────

    /// Loads every enabled module. Returns how many loaded.
    pub fn load_all(&self) -> usize {
        self.catalog
            .enabled_names()
            .into_iter()
            .filter(|name| self.load_module(name).is_ok())
            .count()
    }

    /// Loads `name`, unloading a previously loaded version first.
    ///
    /// Unknown or disabled modules are rejected without side effects.
    /// Functions that fail validation, fail to load, or collide with an
    /// already registered name are skipped and listed in the report; they
    /// never fail the module as a whole.
    ///
    /// A reload is not atomic for concurrent dispatch: the old functions are
    /// removed and saved, the load hooks run, and only then are the new
    /// functions inserted. In between, the module's names are unregistered,
    /// so a command may go unrecognised or match a shorter name owned by
    /// another module (`roll dice 5` resolving to `roll` with `dice 5`).
    /// Save hooks always run before the new load hooks, so a persistent
    /// function reloads the state it just saved.
    pub fn load_module(&self, name: &str) -> ModuleResult<LoadReport> {
        let module = self.catalog.get(name).inspect_err(|e| {
            warn!(module = %name, error = %e, "Module load rejected");
        })?;
        let _guard = self.lifecycle.lock();

        let reloaded = self.unload_locked(module.name);
        let ctx = self.load_context(module.name);
        let mut report = LoadReport {
            module: module.name,
            reloaded,
            ..LoadReport::default()
        };

        let candidates = self.build_functions(&module, &ctx, &mut report);
        for (class_name, rejection) in self.registry.insert_module(module.name, candidates) {
            report.skipped.push((class_name, rejection.to_string()));
        }
        report.loaded = self
            .registry
            .module_functions(module.name)
            .iter()
            .map(|f| f.class_name())
            .collect();

        info!(
            module = %module.name,
            functions = report.loaded.len(),
            skipped = report.skipped.len(),
            reloaded,
            "Module loaded"
        );
        Ok(report)
    }

    fn build_functions(
        &self,
        module: &ModuleDescriptor,
        ctx: &LoadContext,
        report: &mut LoadReport,
    ) -> Vec<LoadedFunction> {
        let mut candidates = Vec::with_capacity(module.functions.len());
        for descriptor in module.functions {
            match LoadedFunction::build(module.name, descriptor, ctx) {
                Ok(Ok(function)) => candidates.push(function),
                Ok(Err(rejection)) => {
                    warn!(
                        module = %module.name,
                        function = descriptor.class_name,
                        reason = %rejection,
                        "Skipping invalid function"
                    );
                    report
                        .skipped
                        .push((descriptor.class_name, rejection.to_string()));
                }
                Err(e) => {
                    error!(
                        module = %module.name,
                        function = descriptor.class_name,
                        error = %e,
                        "Function failed to load"
                    );
                    report.skipped.push((descriptor.class_name, e.to_string()));
                }
            }
        }
        candidates
    }

    /// Unloads `name`, saving its persistent functions.
    pub fn unload_module(&self, name: &str) -> ModuleResult<()> {
        let _guard = self.lifecycle.lock();
        if self.unload_locked(name) {
            Ok(())
        } else {
            Err(ModuleError::NotLoaded(name.to_string()))
        }
    }

    /// Removes the module from the registry, then saves persistent functions.
    /// Save failures are logged and do not stop the unload.
    fn unload_locked(&self, name: &str) -> bool {
        let Some(functions) = self.registry.remove_module(name) else {
            return false;
        };
        let ctx = self.load_context(name);
        for function in &functions {
            let Some(instance) = function.persistent_instance() else {
                continue;
            };
            match catch(|| instance.save(&ctx)).and_then(|saved| saved) {
                Ok(()) => debug!(module = %name, function = function.class_name(), "Saved function"),
                Err(e) => error!(
                    module = %name,
                    function = function.class_name(),
                    error = %e,
                    "Failed to save function"
                ),
            }
        }
        info!(module = %name, functions = functions.len(), "Module unloaded");
        true
    }

    /// Unloads every module, flushing persistent state.
    pub fn close(&self) {
        let _guard = self.lifecycle.lock();
        for module in self.registry.modules() {
            self.unload_locked(module);
        }
    }

    // ─── Rights ──────────────────────────────────────────────────────────────

    /// Whether `function` may run for the given caller.
    pub fn check_permission(
        &self,
        function: &LoadedFunction,
        server: Option<&BoxedServer>,
        user: Option<&Arc<User>>,
        channel: Option<&Channel>,
    ) -> bool {
        let right = function.right_name();
        if let Some(user) = user {
            return user.rights_check(&right, channel);
        }
        if let Some(channel) = channel {
            return channel.rights_check(&right);
        }
        if let Some(server) = server {
            return server.rights_check(&right);
        }
        self.global.rights_check(&right)
    }

    // ─── Direct dispatch ─────────────────────────────────────────────────────

    /// Resolves and runs a direct command.
    ///
    /// Replies (the function's response, or an error message) go to
    /// `destination` through `server`.
    pub fn dispatch(
        &self,
        server: &BoxedServer,
        command_text: &str,
        user: Option<&Arc<User>>,
        destination: &Destination,
        flags: DispatchFlags,
    ) -> DispatchOutcome {
        self.dispatch_command(server, command_text, user, destination, flags, None)
    }

    fn dispatch_command(
        &self,
        server: &BoxedServer,
        command_text: &str,
        user: Option<&Arc<User>>,
        destination: &Destination,
        flags: DispatchFlags,
        event: Option<&Event>,
    ) -> DispatchOutcome {
        let span = span!(
            Level::DEBUG,
            "dispatch",
            server = %server.name(),
            destination = %destination.name()
        );
        let _enter = span.enter();

        let Some((function, command_name, args)) = self.registry.resolve(command_text) else {
            debug!(command = %command_text, hide_errors = flags.hide_errors, "Command not recognised");
            if !flags.hide_errors {
                self.reply(server, destination, event, NOT_RECOGNISED);
            }
            return DispatchOutcome::NotRecognised;
        };
        let class_name = function.class_name();

        let channel = destination.as_channel().map(Arc::as_ref);
        if !self.check_permission(&function, Some(server), user, channel) {
            debug!(function = class_name, "Permission denied");
            self.reply(server, destination, event, NO_PERMISSION);
            return DispatchOutcome::Denied {
                function: class_name,
            };
        }

        let mut call = Invocation::new(
            command_name,
            args,
            Arc::clone(server),
            user.cloned(),
            destination.clone(),
        );
        if let Some(event) = event {
            call = call.with_event(event.clone());
        }

        let result = function
            .instance()
            .and_then(|instance| catch(|| instance.run(&call)).and_then(|r| r));
        match result {
            Ok(Some(response)) => {
                trace!(function = class_name, "Function responded");
                self.send(Some(server), response);
                DispatchOutcome::Completed {
                    function: class_name,
                    responded: true,
                }
            }
            Ok(None) => DispatchOutcome::Completed {
                function: class_name,
                responded: false,
            },
            Err(e) => {
                error!(
                    module = function.module(),
                    function = class_name,
                    error = %e,
                    "Function failed"
                );
                self.reply(
                    server,
                    destination,
                    event,
                    format!("Function failed with error message: {e}"),
                );
                DispatchOutcome::Failed {
                    function: class_name,
                    error: e.to_string(),
                }
            }
        }
    }

    // ─── Passive dispatch ────────────────────────────────────────────────────

    /// Offers `event` to every function with passive interest in its type.
    ///
    /// Functions run one after another in load order. A function the caller
    /// may not use is skipped silently; a failing one is logged and the pass
    /// continues. Events in channels with passive functions disabled are
    /// ignored.
    pub fn dispatch_passive(&self, event: &Event) -> PassiveSummary {
        let mut summary = PassiveSummary::default();
        let event_type = event.event_type();
        if !self.registry.has_interest(event_type) {
            return summary;
        }
        if event.channel().is_some_and(|c| !c.is_passive_enabled()) {
            trace!(event_type = %event_type, "Passive functions disabled in channel");
            return summary;
        }

        let span = span!(Level::DEBUG, "dispatch_passive", event_type = %event_type);
        let _enter = span.enter();

        let channel = event.channel().map(Arc::as_ref);
        for function in self.registry.interested(event_type) {
            let class_name = function.class_name();
            if !self.check_permission(&function, event.server(), event.user(), channel) {
                trace!(function = class_name, "Passive function not permitted");
                summary.denied += 1;
                continue;
            }

            let result = function
                .instance()
                .and_then(|instance| catch(|| instance.passive_run(event)).and_then(|r| r));
            match result {
                Ok(response) => {
                    summary.invoked += 1;
                    if let Some(response) = response {
                        if self.send(event.server(), response) {
                            summary.responses += 1;
                        }
                    }
                }
                Err(e) => {
                    summary.failed += 1;
                    error!(
                        module = function.module(),
                        function = class_name,
                        event_type = %event_type,
                        error = %e,
                        "Passive function failed"
                    );
                }
            }
        }
        summary
    }

    // ─── Routing ─────────────────────────────────────────────────────────────

    /// Routes an inbound event from a server loop.
    ///
    /// Messages addressed to the bot go to direct dispatch (hiding "not
    /// recognised" when the bot was only mentioned by nickname); every other
    /// inbound event goes to passive dispatch. Outbound events are ignored.
    pub fn dispatch_event(&self, event: &Event) {
        if !event.is_inbound() {
            return;
        }
        if let Some((server, command_text, destination, addressing)) = direct_target(event) {
            let flags = DispatchFlags {
                hide_errors: addressing.hide_errors(),
            };
            self.dispatch_command(
                server,
                command_text,
                event.user(),
                &destination,
                flags,
                Some(event),
            );
        } else {
            self.dispatch_passive(event);
        }
    }

    // ─── Sending ─────────────────────────────────────────────────────────────

    fn reply(
        &self,
        server: &BoxedServer,
        destination: &Destination,
        event: Option<&Event>,
        text: impl Into<String>,
    ) {
        let text = text.into();
        let response = match event.and_then(|e| e.create_response(text.clone())) {
            Some(response) => response,
            None => Event::say(server, destination, text),
        };
        self.send(Some(server), response);
    }

    /// Sends through the event's own server, else `fallback`.
    fn send(&self, fallback: Option<&BoxedServer>, event: Event) -> bool {
        let Some(server) = event.server().or(fallback).cloned() else {
            debug!(event_type = %event.event_type(), "Response has no server, dropped");
            return false;
        };
        match server.send(event) {
            Ok(()) => true,
            Err(e) => {
                warn!(server = %server.name(), error = %e, "Failed to send response");
                false
            }
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("catalog", &self.catalog)
            .field("registry", &self.registry)
            .field("data_dir", &self.data_dir)
            .finish()
    }
}

fn direct_target(
    event: &Event,
) -> Option<(&BoxedServer, &str, Destination, Addressing)> {
    if event.event_type() != EventType::Message {
        return None;
    }
    let addressing = event.addressing().filter(|a| a.is_addressed())?;
    let command_text = event.command_text()?;
    Some((event.server()?, command_text, event.destination()?, addressing))
}
