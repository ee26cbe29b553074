//! Lifecycle driver for a host application.
//!
//! `Created -> Configured -> Running -> {Completed, Failed} -> Terminated`
//!
//! The application plugs in through [`Hooks`]; the shell owns the ordering.

mod error;
mod hooks;
mod options;
mod sinks;
mod state;

pub use error::ShellError;
pub use hooks::{run_fn, FnHooks, Hooks};
pub use options::ShellOptions;
pub use state::{Outcome, State};

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::context::AppContext;
use crate::logging::{panic_message, Level, LogRecord, LogRouter};
use sinks::StandardLogging;

/// Drives one application run through its lifecycle.
///
/// Steps take `&mut self`, so transitions never overlap. Whatever happens in
/// the hooks, dropping or terminating the shell closes every sink.
///
/// ## Example
///
/// ```no_run
/// use shell_fnd::shell::{run_fn, ApplicationShell, ShellOptions};
/// use shell_fnd::Config;
///
/// let options = ShellOptions::new("converter")
///     .with_config(Config::builder().with_file("config.toml", true))
///     .require(["io.input_dir"]);
///
/// let mut shell = ApplicationShell::new(options, run_fn(|ctx| {
///     let input: String = ctx.config().get("io.input_dir", "input");
///     ctx.logger().info(format!("scanning {input}"));
///     Ok(())
/// }));
///
/// let outcome = shell.execute()?;
/// outcome.into_result()?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct ApplicationShell<H> {
    options: ShellOptions,
    hooks: H,
    state: State,
    router: Arc<LogRouter>,
    context: Option<AppContext>,
    sinks_installed: bool,
}

impl<H: Hooks> ApplicationShell<H> {
    /// Creates the shell in `Created`. Performs no I/O.
    pub fn new(options: ShellOptions, hooks: H) -> Self {
        let router = options
            .router
            .clone()
            .unwrap_or_else(|| Arc::new(LogRouter::new()));
        Self {
            options,
            hooks,
            state: State::Created,
            router,
            context: None,
            sinks_installed: false,
        }
    }

    /// Loads and validates configuration, installs the standard sinks, then
    /// runs [`Hooks::configure`].
    ///
    /// On any failure the shell stays in `Created`.
    pub fn configure(&mut self) -> Result<(), ShellError> {
        self.ensure_state(State::Created, "configure")?;

        let store = self.options.config.clone().build()?;
        store.validate(&self.options.required)?;

        let logging = StandardLogging::from_config(&store, &self.options.base_dir);
        if !self.sinks_installed {
            self.sinks_installed = true;
            sinks::install(&self.router, &store, &logging, self.options.ui.as_ref())?;
        }

        let ctx = AppContext::new(
            &self.options.app_name,
            store,
            Arc::clone(&self.router),
            logging.log_dir,
        );
        ctx.logger()
            .info(format!("{} started", self.options.app_name));
        self.hooks.configure(&ctx).map_err(ShellError::Hook)?;

        self.context = Some(ctx);
        self.transition(State::Configured);
        Ok(())
    }

    /// Runs [`Hooks::run`] and records how it ended.
    ///
    /// A returned error or a panic moves the shell to `Failed`: `on_failure`
    /// runs, an ERROR record is emitted, and all sinks are flushed. The
    /// returned `Err` is reserved for calling `run` out of order.
    pub fn run(&mut self) -> Result<Outcome, ShellError> {
        self.ensure_state(State::Configured, "run")?;
        self.transition(State::Running);

        let (outcome, next) = {
            let Some(ctx) = self.context.as_ref() else {
                return Err(ShellError::InvalidTransition {
                    from: State::Created,
                    action: "run",
                });
            };
            let hooks = &mut self.hooks;

            let result = panic::catch_unwind(AssertUnwindSafe(|| hooks.run(ctx)))
                .unwrap_or_else(|payload| {
                    Err(anyhow::anyhow!(
                        "run panicked: {}",
                        panic_message(payload.as_ref())
                    ))
                });

            match result {
                Ok(()) => {
                    ctx.logger().info("run completed");
                    (Outcome::Completed, State::Completed)
                }
                Err(err) => {
                    let hook = panic::catch_unwind(AssertUnwindSafe(|| hooks.on_failure(ctx, &err)));
                    if let Err(payload) = hook {
                        ctx.logger().warning(format!(
                            "on_failure hook panicked: {}",
                            panic_message(payload.as_ref())
                        ));
                    }
                    report_error(&self.router, ctx.app_name(), format!("run failed: {err:#}"));
                    (Outcome::Failed(err), State::Failed)
                }
            }
        };

        self.router.flush_all();
        self.transition(next);
        Ok(outcome)
    }

    /// Configures, runs and terminates in one call.
    ///
    /// A configuration failure is logged at ERROR, the shell is terminated,
    /// and the error returned.
    pub fn execute(&mut self) -> Result<Outcome, ShellError> {
        if let Err(err) = self.configure() {
            report_error(
                &self.router,
                &self.options.app_name,
                format!("startup failed: {err}"),
            );
            self.terminate();
            return Err(err);
        }
        let outcome = self.run();
        self.terminate();
        outcome
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    pub fn hooks_mut(&mut self) -> &mut H {
        &mut self.hooks
    }

    fn ensure_state(&self, required: State, action: &'static str) -> Result<(), ShellError> {
        if self.state == required {
            Ok(())
        } else {
            Err(ShellError::InvalidTransition {
                from: self.state,
                action,
            })
        }
    }
}

impl<H> ApplicationShell<H> {
    pub fn state(&self) -> State {
        self.state
    }

    pub fn app_name(&self) -> &str {
        &self.options.app_name
    }

    pub fn router(&self) -> &Arc<LogRouter> {
        &self.router
    }

    /// Present between a successful `configure` and `terminate`.
    pub fn context(&self) -> Option<&AppContext> {
        self.context.as_ref()
    }

    /// Flushes and closes every sink and releases the context. Valid from any
    /// state; repeated calls do nothing.
    ///
    /// After a failed run nothing more is logged, so the failure report stays
    /// the last record.
    pub fn terminate(&mut self) {
        if self.state == State::Terminated {
            return;
        }
        if let Some(ctx) = self.context.as_ref().filter(|_| self.state != State::Failed) {
            ctx.logger().info(format!("{} shutting down", ctx.app_name()));
        }
        self.router.close_all();
        self.context = None;
        self.transition(State::Terminated);
    }

    fn transition(&mut self, next: State) {
        tracing::debug!(app = %self.options.app_name, from = %self.state, to = %next, "shell transition");
        self.state = next;
    }
}

impl<H> Drop for ApplicationShell<H> {
    fn drop(&mut self) {
        self.terminate();
    }
}

/// Emits an ERROR record, falling back to the router's fallback sink when no
/// sink is registered so a terminal failure is never silent.
fn report_error(router: &LogRouter, source: &str, message: String) {
    let record = LogRecord::new(Level::Error, source, message);
    if router.sink_count() == 0 {
        router.fallback(&record);
    } else {
        router.route(&record);
    }
}
