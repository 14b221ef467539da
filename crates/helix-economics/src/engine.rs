//! # Engine
//!
//! Owns the system state, the host and the configuration, and runs each action
//! atomically: on error the state and every host-side effect of the action are
//! rolled back together.

use crate::action::Action;
use crate::config::EconomicsConfig;
use crate::context::Context;
use crate::contract::SystemContract;
use crate::host::{DeferredId, Host};
use crate::memory::MemoryHost;
use crate::state::SystemState;
use helix_core::{Result, TimePoint};
use tracing::{debug, warn};

#[derive(Debug)]
pub struct Engine<H: Host> {
    state: SystemState,
    host: H,
    config: EconomicsConfig,
}

/// Result of one deferred action run by [`Engine::run_deferred`]
#[derive(Debug)]
pub struct DeferredOutcome {
    pub id: DeferredId,
    pub result: Result<()>,
}

impl<H: Host> Engine<H> {
    /// Engine with fresh state
    pub fn new(config: EconomicsConfig, host: H) -> Self {
        let state = SystemState::new(&config);
        Self::with_state(config, host, state)
    }

    /// Engine resuming from previously saved state
    pub fn with_state(config: EconomicsConfig, host: H, state: SystemState) -> Self {
        Self {
            state,
            host,
            config,
        }
    }

    pub fn state(&self) -> &SystemState {
        &self.state
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn config(&self) -> &EconomicsConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: EconomicsConfig) {
        self.config = config;
    }

    pub fn into_parts(self) -> (SystemState, H) {
        (self.state, self.host)
    }

    /// Apply one action atomically
    pub fn execute(&mut self, ctx: &Context, action: &Action) -> Result<()> {
        let snapshot = self.state.clone();
        self.host.checkpoint();

        let result = SystemContract::new(&mut self.state, &mut self.host, &self.config, ctx).apply(action);
        match result {
            Ok(()) => {
                self.host.commit();
                debug!(action = action.name(), now = %ctx.now(), "action applied");
                Ok(())
            }
            Err(e) => {
                self.state = snapshot;
                self.host.rollback();
                warn!(action = action.name(), now = %ctx.now(), error = %e, "action rolled back");
                Err(e)
            }
        }
    }
}

impl Engine<MemoryHost> {
    /// Run every deferred action due at `now`, each as its own atomic action
    ///
    /// A failed deferred action is dropped, like any other failed transaction.
    pub fn run_deferred(&mut self, now: TimePoint) -> Vec<DeferredOutcome> {
        let due = self.host.take_due(now);
        due.into_iter()
            .map(|deferred| {
                let ctx = Context::new(now).with_auth(deferred.authorizer.clone());
                let result = self.execute(&ctx, &deferred.action);
                DeferredOutcome {
                    id: deferred.id,
                    result,
                }
            })
            .collect()
    }
}
