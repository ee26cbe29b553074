use crate::context::AppContext;

/// Application-specific steps the shell invokes in lifecycle order.
///
/// The shell always finishes its own setup (config load and validation,
/// standard sinks) before calling [`configure`](Hooks::configure), so hooks can
/// rely on both.
pub trait Hooks {
    /// Extra setup after the base step, e.g. registering additional sinks.
    /// An error keeps the shell in `Created`.
    fn configure(&mut self, _ctx: &AppContext) -> anyhow::Result<()> {
        Ok(())
    }

    /// The domain work. Long runs should poll their own stop flag.
    fn run(&mut self, ctx: &AppContext) -> anyhow::Result<()>;

    /// Called once when `run` fails, before the shell logs the failure and flushes.
    fn on_failure(&mut self, _ctx: &AppContext, _error: &anyhow::Error) {}
}

/// Hooks built from a single `run` closure.
pub struct FnHooks<F>(F);

/// Wraps a closure as [`Hooks`] with default `configure` and `on_failure`.
pub fn run_fn<F>(run: F) -> FnHooks<F>
where
    F: FnMut(&AppContext) -> anyhow::Result<()>,
{
    FnHooks(run)
}

impl<F> Hooks for FnHooks<F>
where
    F: FnMut(&AppContext) -> anyhow::Result<()>,
{
    fn run(&mut self, ctx: &AppContext) -> anyhow::Result<()> {
        (self.0)(ctx)
    }
}
