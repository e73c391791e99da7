//! Main runtime orchestration.
//!
//! [`HalloRuntime`] owns everything shared between servers: the global
//! rights, the user groups, and the [`Dispatcher`] with its loaded modules.
//! Protocol crates build a [`ServerSettings`] through
//! [`server_settings`](HalloRuntime::server_settings), register their server,
//! and feed every inbound event to [`handle_event`](HalloRuntime::handle_event)
//! (or [`submit_event`](HalloRuntime::submit_event) from async code).
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use hallo_runtime::HalloRuntime;
//!
//! let runtime = HalloRuntime::builder()
//!     .config_file("hallo.toml")
//!     .module(DICE)
//!     .build()?;
//!
//! let server = IrcServer::new(runtime.server_settings("libera"));
//! runtime.register_server(server.clone())?;
//!
//! runtime.run().await?;
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use hallo_core::{
    BoxedServer, CommandPrefix, Event, GlobalRights, ServerSettings, UserGroup, UserGroupRegistry,
};
use hallo_framework::{Dispatcher, ModuleCatalog, ModuleDescriptor};
use parking_lot::{Mutex, RwLock};
use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::clock::run_clock;
use crate::config::schema::mask;
use crate::config::{ConfigLoader, HalloConfig, ServerConfig, validate_config};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;

const DEFAULT_TICK_PERIOD: Duration = Duration::from_secs(1);

/// The Hallo runtime.
pub struct HalloRuntime {
    config: HalloConfig,
    global: Arc<GlobalRights>,
    user_groups: Arc<UserGroupRegistry>,
    dispatcher: Arc<Dispatcher>,
    servers: RwLock<HashMap<String, BoxedServer>>,
    tick_period: Duration,
    running: AtomicBool,
    shutdown: watch::Sender<bool>,
    clock: Mutex<Option<JoinHandle<()>>>,
}

impl HalloRuntime {
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Creates a runtime from an already loaded configuration.
    ///
    /// Initializes logging, builds the global rights and user groups, and
    /// prepares (but does not load) the modules of `catalog`.
    pub fn from_config(config: HalloConfig, catalog: ModuleCatalog) -> RuntimeResult<Self> {
        logging::init_from_config(&config.logging);
        validate_config(&config)?;

        let global = Arc::new(GlobalRights::with_mask(
            mask(&config.rights.permissions),
            config.rights.default_allow,
        ));

        let user_groups = Arc::new(UserGroupRegistry::new());
        for (name, rights) in &config.user_groups {
            user_groups.insert(UserGroup::with_permissions(name.as_str(), mask(rights)));
        }

        let catalog = if config.modules.enabled.is_empty() {
            catalog
        } else {
            catalog.allow_only(config.modules.enabled.iter().cloned())
        };
        let mut dispatcher = Dispatcher::new(catalog, Arc::clone(&global));
        if let Some(dir) = config.modules.resolved_data_dir() {
            dispatcher = dispatcher.with_data_dir(dir);
        }
        for (module, section) in &config.modules.config {
            dispatcher = dispatcher.with_module_config(module.as_str(), section.clone());
        }

        info!(
            log_level = %config.logging.level,
            default_allow = config.rights.default_allow,
            user_groups = user_groups.len(),
            "Runtime initialized from configuration"
        );

        let (shutdown, _) = watch::channel(false);
        Ok(Self {
            config,
            global,
            user_groups,
            dispatcher: Arc::new(dispatcher),
            servers: RwLock::new(HashMap::new()),
            tick_period: DEFAULT_TICK_PERIOD,
            running: AtomicBool::new(false),
            shutdown,
            clock: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &HalloConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn global_rights(&self) -> &Arc<GlobalRights> {
        &self.global
    }

    pub fn user_groups(&self) -> &Arc<UserGroupRegistry> {
        &self.user_groups
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    // =========================================================================
    // Servers
    // =========================================================================

    /// Settings for the server called `name`, from its config section or the
    /// defaults when it has none.
    pub fn server_settings(&self, name: &str) -> ServerSettings {
        let fallback;
        let server = match self.config.server(name) {
            Some(server) => server,
            None => {
                fallback = ServerConfig::new(name);
                &fallback
            }
        };
        ServerSettings::new(name, server.nick.clone(), Arc::clone(&self.global))
            .with_prefix(server.command_prefix())
            .with_permissions(server.permission_mask())
    }

    /// Registers a server and applies its configured channels and users.
    pub fn register_server(&self, server: BoxedServer) -> RuntimeResult<()> {
        let name = server.name().to_string();
        {
            let mut servers = self.servers.write();
            if servers.contains_key(&name) {
                return Err(RuntimeError::ServerExists(name));
            }
            servers.insert(name.clone(), Arc::clone(&server));
        }
        if let Some(config) = self.config.server(&name) {
            self.apply_server_config(&server, config);
        }
        info!(server = %name, "Registered server");
        Ok(())
    }

    fn apply_server_config(&self, server: &BoxedServer, config: &ServerConfig) {
        for channel_config in &config.channels {
            let channel = server.get_channel_by_name(&channel_config.name);
            channel.set_auto_join(channel_config.auto_join);
            channel.set_password(channel_config.password.clone());
            channel.set_logging(channel_config.logging);
            channel.set_uppercase(channel_config.uppercase);
            channel.set_passive_enabled(channel_config.passive_enabled);
            channel.set_prefix(channel_config.prefix.clone().map(CommandPrefix::Literal));
            channel.set_permissions(channel_config.permission_mask());
        }
        for user_config in &config.users {
            let user = server.get_user_by_name(&user_config.name);
            for group in &user_config.groups {
                match self.user_groups.get(group) {
                    Some(group) => user.add_user_group(group),
                    None => warn!(server = %config.name, user = %user_config.name, group = %group, "Unknown user group"),
                }
            }
            user.set_permissions(user_config.permission_mask());
        }
        debug!(
            server = %config.name,
            channels = config.channels.len(),
            users = config.users.len(),
            "Applied server configuration"
        );
    }

    pub fn unregister_server(&self, name: &str) -> RuntimeResult<BoxedServer> {
        let server = self
            .servers
            .write()
            .remove(name)
            .ok_or_else(|| RuntimeError::ServerNotFound(name.to_string()))?;
        info!(server = %name, "Unregistered server");
        Ok(server)
    }

    pub fn server(&self, name: &str) -> Option<BoxedServer> {
        self.servers.read().get(name).cloned()
    }

    pub fn servers(&self) -> Vec<BoxedServer> {
        self.servers.read().values().cloned().collect()
    }

    // =========================================================================
    // Events
    // =========================================================================

    /// Processes one inbound event on the calling thread.
    ///
    /// The server's destination graph is updated first, so functions see the
    /// state after the event. Pings are answered directly; everything else
    /// goes to the dispatcher.
    pub fn handle_event(&self, event: &Event) {
        process_event(&self.dispatcher, event);
    }

    /// Processes one inbound event on the blocking pool.
    pub async fn submit_event(&self, event: Event) {
        let dispatcher = Arc::clone(&self.dispatcher);
        let result =
            tokio::task::spawn_blocking(move || process_event(&dispatcher, &event)).await;
        if let Err(e) = result {
            error!(error = %e, "Event dispatch task failed");
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Loads the enabled modules and starts the clock.
    pub async fn start(&self) -> RuntimeResult<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Runtime is already running");
            return Ok(());
        }
        info!("Starting Hallo runtime");

        let loaded = self.dispatcher.load_all();
        info!(modules = loaded, "Modules loaded");

        self.shutdown.send_replace(false);
        let handle = tokio::spawn(run_clock(
            Arc::clone(&self.dispatcher),
            self.tick_period,
            self.shutdown.subscribe(),
        ));
        *self.clock.lock() = Some(handle);

        info!("Runtime started");
        Ok(())
    }

    /// Stops the clock and unloads every module, saving persistent state.
    pub async fn stop(&self) -> RuntimeResult<()> {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Runtime is not running");
            return Ok(());
        }
        info!("Stopping Hallo runtime");

        self.shutdown.send_replace(true);
        let handle = self.clock.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(error = %e, "Clock task failed");
            }
        }

        let dispatcher = Arc::clone(&self.dispatcher);
        if let Err(e) = tokio::task::spawn_blocking(move || dispatcher.close()).await {
            error!(error = %e, "Module shutdown task failed");
        }

        info!("Runtime stopped");
        Ok(())
    }

    /// Runs until Ctrl+C or SIGTERM.
    pub async fn run(&self) -> RuntimeResult<()> {
        self.start().await?;
        info!("Hallo is now running. Press Ctrl+C to stop.");

        let waited = wait_for_shutdown().await;
        self.stop().await?;
        waited.map_err(RuntimeError::from)
    }

    /// Runs until `shutdown` completes.
    pub async fn run_until<F>(&self, shutdown: F) -> RuntimeResult<()>
    where
        F: std::future::Future<Output = ()>,
    {
        self.start().await?;
        shutdown.await;
        self.stop().await
    }
}

impl std::fmt::Debug for HalloRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HalloRuntime")
            .field("servers", &self.servers.read().keys().collect::<Vec<_>>())
            .field("dispatcher", &self.dispatcher)
            .field("running", &self.is_running())
            .finish()
    }
}

fn process_event(dispatcher: &Dispatcher, event: &Event) {
    let Some(server) = event.server() else {
        dispatcher.dispatch_event(event);
        return;
    };
    if !event.is_inbound() {
        return;
    }
    server.state().observe(event);
    if let Some(pong) = event.pong() {
        if let Err(e) = server.send(pong) {
            warn!(server = %server.name(), error = %e, "Failed to answer ping");
        }
    }
    dispatcher.dispatch_event(event);
}

async fn wait_for_shutdown() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
        tokio::select! {
            result = signal::ctrl_c() => {
                result?;
                info!("Received Ctrl+C, shutting down");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await?;
        info!("Received Ctrl+C, shutting down");
    }

    Ok(())
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for a [`HalloRuntime`].
///
/// ```rust,ignore
/// let runtime = HalloRuntime::builder()
///     .config_file("config/hallo.toml")
///     .profile("production")
///     .modules([DICE, GREETER])
///     .build()?;
/// ```
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
    config: Option<HalloConfig>,
    catalog: ModuleCatalog,
    tick_period: Duration,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new().with_current_dir().with_user_config_dir(),
            config: None,
            catalog: ModuleCatalog::new(),
            tick_period: DEFAULT_TICK_PERIOD,
        }
    }

    /// Sets a specific configuration file to load.
    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Merges configuration programmatically, above every loaded source.
    pub fn merge(mut self, config: HalloConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Uses `config` as is, skipping file and environment loading.
    pub fn config(mut self, config: HalloConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Compiles a module into the runtime.
    pub fn module(mut self, module: ModuleDescriptor) -> Self {
        self.catalog = self.catalog.with_module(module);
        self
    }

    pub fn modules(mut self, modules: impl IntoIterator<Item = ModuleDescriptor>) -> Self {
        self.catalog = self.catalog.with_modules(modules);
        self
    }

    /// Interval between `second` ticks.
    pub fn tick_period(mut self, period: Duration) -> Self {
        self.tick_period = period;
        self
    }

    pub fn build(self) -> RuntimeResult<HalloRuntime> {
        let config = match self.config {
            Some(config) => config,
            None => self.config_loader.load()?,
        };
        let mut runtime = HalloRuntime::from_config(config, self.catalog)?;
        runtime.tick_period = self.tick_period;
        Ok(runtime)
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::atomic::AtomicUsize;

    use hallo_core::testing::RecordingServer;
    use hallo_core::{EventType, Server};
    use hallo_framework::{Function, FunctionResult, Invocation, define_module};

    use super::*;
    use crate::config::{ChannelConfig, UserConfig};

    #[derive(Default)]
    struct Echo;

    impl Function for Echo {
        fn help_name(&self) -> &str {
            "echo"
        }
        fn names(&self) -> Vec<String> {
            vec!["echo".into()]
        }
        fn help_docs(&self) -> &str {
            "Repeats the arguments."
        }
        fn run(&self, call: &Invocation) -> FunctionResult {
            Ok(Some(call.reply(call.args())))
        }
    }

    static SECONDS: AtomicUsize = AtomicUsize::new(0);

    #[derive(Default)]
    struct Ticker;

    impl Function for Ticker {
        fn help_name(&self) -> &str {
            "ticker"
        }
        fn names(&self) -> Vec<String> {
            vec!["ticker".into()]
        }
        fn help_docs(&self) -> &str {
            "Counts seconds."
        }
        fn run(&self, _call: &Invocation) -> FunctionResult {
            Ok(None)
        }
        fn passive_events(&self) -> Vec<EventType> {
            vec![EventType::Second]
        }
        fn passive_run(&self, _event: &Event) -> FunctionResult {
            SECONDS.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }
    }

    static UTIL: ModuleDescriptor = define_module! {
        name: "util",
        functions: [Echo],
    };

    static CLOCKWORK: ModuleDescriptor = define_module! {
        name: "clockwork",
        functions: [Ticker],
    };

    fn config() -> HalloConfig {
        let mut config = HalloConfig::default();
        config.modules.data_dir = Some(std::env::temp_dir().join("hallo-runtime-tests"));
        config
            .user_groups
            .insert("god".into(), BTreeMap::from([("function_Echo".to_string(), true)]));

        let mut server = ServerConfig::new("libera");
        server.prefix = Some("!".into());
        let mut channel = ChannelConfig::new("#hallo");
        channel.auto_join = true;
        channel.passive_enabled = false;
        server.channels.push(channel);
        server.users.push(UserConfig {
            name: "dr-spangle".into(),
            groups: vec!["god".into()],
            permissions: BTreeMap::new(),
        });
        config.servers.push(server);
        config
    }

    fn runtime(config: HalloConfig) -> HalloRuntime {
        HalloRuntime::builder()
            .config(config)
            .modules([UTIL, CLOCKWORK])
            .tick_period(Duration::from_millis(10))
            .build()
            .unwrap()
    }

    #[test]
    fn test_server_settings_from_config() {
        let runtime = runtime(config());
        let settings = runtime.server_settings("libera");
        assert_eq!(settings.prefix(), CommandPrefix::literal("!"));

        let unknown = runtime.server_settings("elsewhere");
        assert_eq!(unknown.prefix(), CommandPrefix::Nick);
        assert_eq!(unknown.nick(), "hallo");
    }

    #[test]
    fn test_register_server_applies_config() {
        let runtime = runtime(config());
        let server = RecordingServer::with_settings(runtime.server_settings("libera"));
        runtime.register_server(server.boxed()).unwrap();

        let channel = server.state().find_channel("#hallo").unwrap();
        assert!(channel.is_auto_join());
        assert!(!channel.is_passive_enabled());

        let user = server.state().find_user("dr-spangle").unwrap();
        assert!(user.get_user_group_by_name("god").is_some());

        assert!(matches!(
            runtime.register_server(server.boxed()),
            Err(RuntimeError::ServerExists(_))
        ));
        assert!(runtime.unregister_server("libera").is_ok());
        assert!(matches!(
            runtime.unregister_server("libera"),
            Err(RuntimeError::ServerNotFound(_))
        ));
    }

    #[test]
    fn test_handle_event_observes_then_dispatches() {
        let runtime = runtime(config());
        runtime.dispatcher().load_module("util").unwrap();
        let recording = RecordingServer::with_settings(runtime.server_settings("libera"));
        let server = recording.boxed();
        runtime.register_server(server.clone()).unwrap();

        let channel = server.get_channel_by_name("#hallo");
        let user = server.get_user_by_name("alice");
        runtime.handle_event(&Event::join(&server, channel.clone(), user.clone(), None));
        assert!(channel.is_user_in_channel(&user));

        runtime.handle_event(&Event::message(&server, Some(channel), Some(user), "!echo hi"));
        assert_eq!(recording.sent_texts(), vec!["hi".to_string()]);
    }

    #[test]
    fn test_ping_is_answered() {
        let runtime = runtime(config());
        let recording = RecordingServer::with_settings(runtime.server_settings("libera"));
        let server = recording.boxed();
        runtime.handle_event(&Event::ping(&server, "12345"));
        let sent = recording.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].event_type(), EventType::Ping);
    }

    #[test]
    fn test_enabled_modules_restrict_catalog() {
        let mut config = config();
        config.modules.enabled = vec!["util".into()];
        let runtime = runtime(config);
        assert_eq!(runtime.dispatcher().load_all(), 1);
        assert!(runtime.dispatcher().registry().is_loaded("util"));
        assert!(!runtime.dispatcher().registry().is_loaded("clockwork"));
    }

    #[test]
    fn test_global_rights_from_config() {
        let mut config = config();
        config.rights.default_allow = false;
        config.rights.permissions.insert("function_Echo".into(), true);
        let runtime = runtime(config);
        assert!(runtime.global_rights().rights_check("function_Echo"));
        assert!(!runtime.global_rights().rights_check("function_Roll"));
        assert_eq!(runtime.user_groups().names(), vec!["god".to_string()]);
    }

    #[tokio::test]
    async fn test_run_until_loads_ticks_and_unloads() {
        let runtime = runtime(config());
        runtime
            .run_until(async {
                tokio::time::sleep(Duration::from_millis(100)).await;
            })
            .await
            .unwrap();

        assert!(SECONDS.load(Ordering::SeqCst) > 0);
        assert!(!runtime.is_running());
        assert!(runtime.dispatcher().registry().modules().is_empty());
    }

    #[tokio::test]
    async fn test_submit_event() {
        let runtime = runtime(config());
        runtime.dispatcher().load_module("util").unwrap();
        let recording = RecordingServer::with_settings(runtime.server_settings("libera"));
        let server = recording.boxed();
        let user = server.get_user_by_name("alice");

        runtime
            .submit_event(Event::message(&server, None, Some(user), "echo private"))
            .await;
        assert_eq!(recording.sent_texts(), vec!["private".to_string()]);
    }
}
