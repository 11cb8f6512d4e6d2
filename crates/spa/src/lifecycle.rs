//! Host-side wrapper enforcing the plugin state machine.
//!
//! ```text
//! Unbound -> Bound -> Initialized -> Active <-> Deactivated
//!                                                   |
//!   (any state but Active) ------------------> Destroyed
//! ```
//!
//! Calls that are not valid in the current state fail with
//! [`Error::InvalidTransition`] and never reach the plugin.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use serde::{Deserialize, Serialize};

use crate::containers::{ModuleBox, SimpleStr};
use crate::error::{BindError, Error, Result};
use crate::plugin::{Plugin, Ticket};
use crate::port::Port;
use crate::ticket::Operation;
use crate::visitor::Visitor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum State {
    Unbound,
    Bound,
    Initialized,
    Active,
    Deactivated,
    Destroyed,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            State::Unbound => "unbound",
            State::Bound => "bound",
            State::Initialized => "initialized",
            State::Active => "active",
            State::Deactivated => "deactivated",
            State::Destroyed => "destroyed",
        })
    }
}

pub struct Instance {
    plugin: Option<ModuleBox<dyn Plugin>>,
    state: State,
    faulted: bool,
}

impl Instance {
    pub fn new(plugin: ModuleBox<dyn Plugin>) -> Self {
        Self {
            plugin: Some(plugin),
            state: State::Unbound,
            faulted: false,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Set after `run` hit a fatal error. A faulted instance cannot be
    /// activated again.
    pub fn is_faulted(&self) -> bool {
        self.faulted
    }

    fn require(&self, allowed: &[State], operation: &'static str) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(Error::InvalidTransition {
                state: self.state,
                operation,
            })
        }
    }

    fn plugin_mut(&mut self, operation: &'static str) -> Result<&mut ModuleBox<dyn Plugin>> {
        let state = self.state;
        self.plugin
            .as_mut()
            .ok_or(Error::InvalidTransition { state, operation })
    }

    /// Port lookup, only while ports may still be bound.
    pub fn port(&mut self, name: &str) -> Result<&mut dyn Port> {
        self.require(&[State::Unbound, State::Bound], "look up ports of")?;
        self.plugin_mut("look up ports of")?.port(name)
    }

    /// Binds every port in `names` through `binder`.
    ///
    /// Stops at the first failure, leaving earlier ports bound; the caller
    /// must discard the instance in that case. Rebinding a port replaces its
    /// previous binding.
    pub fn bind<'n, I>(&mut self, names: I, binder: &mut dyn Visitor) -> Result<(), BindError>
    where
        I: IntoIterator<Item = &'n str>,
    {
        self.require(&[State::Unbound, State::Bound], "bind")
            .map_err(|err| BindError::new(String::new(), err))?;

        for name in names {
            let port = self
                .port(name)
                .map_err(|err| BindError::new(name, err))?;
            port.accept(binder)
                .map_err(|err| BindError::new(name, err))?;
            if port.requires_binding() && !port.is_bound() {
                return Err(BindError::new(
                    name,
                    Error::Unbound {
                        name: SimpleStr::from(name),
                    },
                ));
            }
        }
        self.state = State::Bound;
        Ok(())
    }

    pub fn init(&mut self) -> Result<()> {
        self.require(&[State::Bound], "init")?;
        self.plugin_mut("init")?.init()?;
        self.state = State::Initialized;
        Ok(())
    }

    pub fn activate(&mut self) -> Result<()> {
        self.require(&[State::Initialized, State::Deactivated], "activate")?;
        if self.faulted {
            return Err(Error::Rejected("instance faulted during run"));
        }
        self.plugin_mut("activate")?.activate();
        self.state = State::Active;
        Ok(())
    }

    /// One processing cycle.
    ///
    /// A panic inside the plugin is caught and reported as
    /// [`Error::Panicked`]. Fatal errors deactivate the instance and mark it
    /// faulted; other errors leave it active.
    pub fn run(&mut self) -> Result<()> {
        self.require(&[State::Active], "run")?;
        let plugin = self.plugin_mut("run")?;
        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| plugin.run())) {
            Ok(result) => result,
            Err(_) => Err(Error::Panicked("run")),
        };

        if let Err(err) = &outcome {
            if err.is_fatal() {
                if !matches!(err, Error::Panicked(_)) {
                    plugin.deactivate();
                }
                self.state = State::Deactivated;
                self.faulted = true;
            }
        }
        outcome
    }

    pub fn deactivate(&mut self) -> Result<()> {
        self.require(&[State::Active], "deactivate")?;
        self.plugin_mut("deactivate")?.deactivate();
        self.state = State::Deactivated;
        Ok(())
    }

    /// Drops the plugin. Refused while active; deactivate first.
    pub fn destroy(&mut self) -> Result<()> {
        self.require(
            &[
                State::Unbound,
                State::Bound,
                State::Initialized,
                State::Deactivated,
            ],
            "destroy",
        )?;
        self.plugin = None;
        self.state = State::Destroyed;
        Ok(())
    }

    fn idle_plugin(&mut self, operation: &'static str) -> Result<&mut ModuleBox<dyn Plugin>> {
        self.require(
            &[
                State::Unbound,
                State::Bound,
                State::Initialized,
                State::Deactivated,
            ],
            operation,
        )?;
        self.plugin_mut(operation)
    }

    /// Requests an asynchronous save. The audio thread must be stopped, so
    /// this is refused while active.
    pub fn save(&mut self, path: &str, ticket: Ticket) -> Result<bool> {
        Ok(self.idle_plugin("save")?.save(path, ticket))
    }

    pub fn load(&mut self, path: &str, ticket: Ticket) -> Result<bool> {
        Ok(self.idle_plugin("load")?.load(path, ticket))
    }

    pub fn restore(&mut self, ticket: Ticket) -> Result<bool> {
        Ok(self.idle_plugin("restore")?.restore(ticket))
    }

    pub fn save_check(&mut self, path: &str, ticket: Ticket) -> Result<bool> {
        Ok(self.idle_plugin("check save of")?.save_check(path, ticket))
    }

    pub fn load_check(&mut self, path: &str, ticket: Ticket) -> Result<bool> {
        Ok(self.idle_plugin("check load of")?.load_check(path, ticket))
    }

    pub fn restore_check(&mut self, ticket: Ticket) -> Result<bool> {
        Ok(self.idle_plugin("check restore of")?.restore_check(ticket))
    }

    pub fn request_failed(&mut self, operation: Operation, ticket: Ticket) -> Result<bool> {
        Ok(self
            .idle_plugin("check the outcome of")?
            .request_failed(operation, ticket))
    }

    pub fn ui_ext_show(&mut self, show: bool) -> Result<()> {
        self.plugin_mut("show the UI of")?.ui_ext_show(show);
        Ok(())
    }

    pub fn net_port(&self) -> Option<u16> {
        self.plugin.as_ref().and_then(|plugin| plugin.net_port())
    }

    pub fn window_id(&self) -> Option<String> {
        self.plugin
            .as_ref()
            .and_then(|plugin| plugin.window_id().map(str::to_owned))
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        if self.state == State::Active {
            if let Some(plugin) = self.plugin.as_mut() {
                plugin.deactivate();
            }
        }
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("state", &self.state)
            .field("faulted", &self.faulted)
            .finish()
    }
}
