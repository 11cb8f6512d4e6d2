use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use spa::{Instance, OscArg, OscReader, Operation, State, Ticket};

use crate::binder::{HostBinder, HostPorts};
use crate::loader::LoadedModule;
use crate::metadata::PluginMetadata;
use crate::{HostConfig, HostError};

/// One plugin instance together with the host memory it is bound to.
pub struct Host {
    // Field order is drop order: the plugin goes first, then the memory its
    // ports point into, then the module that contains its code.
    instance: Instance,
    ports: HostPorts,
    module: LoadedModule,
    metadata: PluginMetadata,
    config: HostConfig,
    next_ticket: Ticket,
}

impl Host {
    /// Loads the module at `path` and instantiates its plugin.
    pub fn open(path: impl AsRef<Path>, config: HostConfig) -> Result<Self, HostError> {
        let module = LoadedModule::open(path)?;
        Self::instantiate(module, config)
    }

    /// Binds every port the descriptor names, then initialises and activates
    /// the plugin. On failure the partially bound instance is dropped.
    pub fn instantiate(module: LoadedModule, config: HostConfig) -> Result<Self, HostError> {
        let descriptor = module.descriptor();
        let metadata = PluginMetadata::from_descriptor(descriptor, module.abi_version());

        let mut ports = HostPorts::new(&config);
        let mut instance = Instance::new(descriptor.instantiate());
        {
            let mut binder = HostBinder::new(&mut ports);
            for name in &metadata.ports {
                binder.set_port_name(name);
                instance.bind([name.as_str()], &mut binder)?;
            }
            if metadata.ports.is_empty() {
                instance.bind(std::iter::empty::<&str>(), &mut binder)?;
            }
        }
        instance.init()?;
        instance.activate()?;

        tracing::info!(
            plugin = %metadata.unique_name,
            ports = metadata.ports.len(),
            block_size = config.block_size,
            "plugin instantiated"
        );

        Ok(Self {
            instance,
            ports,
            module,
            metadata,
            config,
            next_ticket: 1,
        })
    }

    pub fn metadata(&self) -> &PluginMetadata {
        &self.metadata
    }

    pub fn module(&self) -> &LoadedModule {
        &self.module
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn state(&self) -> State {
        self.instance.state()
    }

    pub fn instance_mut(&mut self) -> &mut Instance {
        &mut self.instance
    }

    /// Queues a control message for the plugin's next `run`. Returns `false`
    /// when the ring was full and the message was dropped.
    pub fn send(&mut self, path: &str, args: &[OscArg<'_>]) -> Result<bool, HostError> {
        let control = self.ports.control().ok_or(HostError::NoControlChannel)?;
        let sent = control.write(path, args)?;
        if !sent {
            tracing::warn!(path, dropped = control.dropped(), "control channel full, message dropped");
        }
        Ok(sent)
    }

    pub fn dropped_messages(&self) -> u64 {
        self.ports.dropped_messages()
    }

    pub fn input_mut(&mut self) -> (&mut [f32], &mut [f32]) {
        self.ports.input_mut()
    }

    pub fn output(&self) -> (&[f32], &[f32]) {
        self.ports.output()
    }

    pub fn set_sample_count(&mut self, frames: u32) {
        self.ports.set_sample_count(frames);
    }

    /// Messages the plugin sent back, if it has an output channel.
    pub fn replies(&mut self) -> Option<&mut OscReader> {
        self.ports.replies()
    }

    /// Runs one block over the bound buffers.
    ///
    /// Errors the plugin recovers from are logged and swallowed. Fatal ones
    /// leave the instance deactivated and are returned.
    pub fn run(&mut self) -> Result<(), HostError> {
        match self.instance.run() {
            Ok(()) => Ok(()),
            Err(err) if !err.is_fatal() && self.instance.state() == State::Active => {
                tracing::warn!(?err, "plugin reported an error, continuing");
                Ok(())
            }
            Err(err) => {
                tracing::error!(?err, plugin = %self.metadata.unique_name, "plugin instance stopped");
                Err(err.into())
            }
        }
    }

    /// Copies one block of input, runs the plugin and returns the output.
    /// Input longer than the block size is cut off.
    pub fn run_block(&mut self, left: &[f32], right: &[f32]) -> Result<(&[f32], &[f32]), HostError> {
        let frames = left.len().min(right.len()).min(self.ports.block_size() as usize);
        {
            let (in_left, in_right) = self.ports.input_mut();
            in_left[..frames].copy_from_slice(&left[..frames]);
            in_right[..frames].copy_from_slice(&right[..frames]);
        }
        self.ports.set_sample_count(frames as u32);
        self.run()?;
        let (out_left, out_right) = self.ports.output();
        Ok((&out_left[..frames], &out_right[..frames]))
    }

    pub fn next_ticket(&mut self) -> Ticket {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        ticket
    }

    /// Saves plugin state to `path` and waits for completion. Processing is
    /// paused for the duration.
    pub fn save(&mut self, path: &Path) -> Result<bool, HostError> {
        let path = path.to_string_lossy().into_owned();
        let ticket = self.next_ticket();
        self.paused(|instance, timeout| {
            if !instance.save(&path, ticket)? {
                return Ok(false);
            }
            await_ticket(instance, Operation::Save, ticket, timeout, |instance| {
                instance.save_check(&path, ticket)
            })
        })
    }

    pub fn load(&mut self, path: &Path) -> Result<bool, HostError> {
        let path = path.to_string_lossy().into_owned();
        let ticket = self.next_ticket();
        self.paused(|instance, timeout| {
            if !instance.load(&path, ticket)? {
                return Ok(false);
            }
            await_ticket(instance, Operation::Load, ticket, timeout, |instance| {
                instance.load_check(&path, ticket)
            })
        })
    }

    pub fn restore(&mut self) -> Result<bool, HostError> {
        let ticket = self.next_ticket();
        self.paused(|instance, timeout| {
            if !instance.restore(ticket)? {
                return Ok(false);
            }
            await_ticket(instance, Operation::Restore, ticket, timeout, |instance| {
                instance.restore_check(ticket)
            })
        })
    }

    fn paused<F>(&mut self, operation: F) -> Result<bool, HostError>
    where
        F: FnOnce(&mut Instance, Duration) -> spa::Result<bool>,
    {
        let was_active = self.instance.state() == State::Active;
        if was_active {
            self.instance.deactivate()?;
        }
        let timeout = Duration::from_millis(self.config.ticket_timeout_ms);
        let outcome = operation(&mut self.instance, timeout);
        let reactivated = if was_active {
            self.instance.activate()
        } else {
            Ok(())
        };
        settle_paused(outcome, reactivated)
    }

    /// Deactivates and destroys the plugin, then unloads its module.
    pub fn shutdown(mut self) -> Result<(), HostError> {
        if self.instance.state() == State::Active {
            self.instance.deactivate()?;
        }
        self.instance.destroy()?;
        tracing::info!(plugin = %self.metadata.unique_name, "plugin shut down");
        Ok(())
    }
}

/// Polls `check` until it reports completion, the plugin reports the request
/// failed, or `timeout` elapses.
fn await_ticket<F>(
    instance: &mut Instance,
    operation: Operation,
    ticket: Ticket,
    timeout: Duration,
    mut check: F,
) -> spa::Result<bool>
where
    F: FnMut(&mut Instance) -> spa::Result<bool>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if check(instance)? {
            return Ok(true);
        }
        if instance.request_failed(operation, ticket)? {
            tracing::warn!(?operation, ticket, "plugin reported the request failed");
            return Ok(false);
        }
        if Instant::now() >= deadline {
            tracing::warn!(?operation, ticket, "gave up waiting for the plugin");
            return Ok(false);
        }
        thread::sleep(Duration::from_millis(1));
    }
}

/// Combines the outcome of a paused operation with reactivation. A failed
/// reactivation wins, with the operation's own error logged.
fn settle_paused(
    outcome: spa::Result<bool>,
    reactivated: spa::Result<()>,
) -> Result<bool, HostError> {
    if let Err(err) = reactivated {
        if let Err(lost) = &outcome {
            tracing::error!(error = %lost, "request failed before reactivation failed too");
        }
        return Err(err.into());
    }
    Ok(outcome?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use spa::Error;

    #[test]
    fn reactivation_failure_is_reported() {
        let result = settle_paused(
            Err(Error::Malformed("bad state file")),
            Err(Error::Rejected("instance faulted during run")),
        );
        assert!(matches!(
            result,
            Err(HostError::Plugin(Error::Rejected("instance faulted during run")))
        ));
    }

    #[test]
    fn operation_error_surfaces_after_reactivation() {
        let result = settle_paused(Err(Error::Malformed("bad state file")), Ok(()));
        assert!(matches!(
            result,
            Err(HostError::Plugin(Error::Malformed("bad state file")))
        ));
        assert!(matches!(settle_paused(Ok(true), Ok(())), Ok(true)));
    }
}
