pub mod rhai_host;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::components::TickClock;
use crate::events::GameEventBus;
use crate::script_call::{FrameScriptCalls, ScriptCall};
use crate::TickSet;

pub use rhai_host::RhaiScripts;

pub const DEFAULT_RHAI_MAX_OPERATIONS: u64 = 500_000;
pub const DEFAULT_RHAI_MAX_CALL_LEVELS: usize = 64;

const MAX_SCRIPT_ERRORS: usize = 100;

/// Runs the handler behind a script call. The trigger core never looks at
/// what a handler does, only whether it succeeded.
pub trait ScriptExecutor: Send + Sync {
    fn execute(&mut self, call: &ScriptCall, frame: u64) -> Result<(), String>;
}

#[derive(Resource)]
pub struct ScriptHost(pub Box<dyn ScriptExecutor>);

impl ScriptHost {
    pub fn new(executor: impl ScriptExecutor + 'static) -> Self {
        Self(Box::new(executor))
    }
}

impl Default for ScriptHost {
    fn default() -> Self {
        Self::new(RhaiScripts::new())
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ScriptError {
    pub call_name: String,
    pub entity_id: Option<u64>,
    pub error_message: String,
    pub frame: u64,
}

#[derive(Resource, Default)]
pub struct ScriptErrors {
    pub entries: Vec<ScriptError>,
}

impl ScriptErrors {
    pub fn push(&mut self, entry: ScriptError) {
        self.entries.push(entry);
        if self.entries.len() > MAX_SCRIPT_ERRORS {
            let excess = self.entries.len() - MAX_SCRIPT_ERRORS;
            self.entries.drain(0..excess);
        }
    }
}

pub struct ScriptingPlugin;

impl Plugin for ScriptingPlugin {
    fn build(&self, app: &mut App) {
        if !app.world().contains_resource::<ScriptHost>() {
            app.insert_resource(ScriptHost::default());
        }
        app.insert_resource(ScriptErrors::default())
            .init_resource::<FrameScriptCalls>()
            .add_systems(FixedUpdate, execute_script_calls.in_set(TickSet::Dispatch));
    }
}

/// Hands the frame's batch to the executor. Failures are logged and kept in
/// `ScriptErrors`; they never stop the frame.
pub(crate) fn execute_script_calls(
    clock: Res<TickClock>,
    mut host: ResMut<ScriptHost>,
    mut calls: ResMut<FrameScriptCalls>,
    mut errors: ResMut<ScriptErrors>,
    mut bus: ResMut<GameEventBus>,
) {
    for call in calls.0.take() {
        match host.0.execute(&call, clock.frame) {
            Ok(()) => bus.emit_script_call(&call, true),
            Err(error_message) => {
                warn!(
                    "[Tilewalk scripts] '{}' failed for entity {}: {}",
                    call.name, call.primary, error_message
                );
                errors.push(ScriptError {
                    call_name: call.name.clone(),
                    entity_id: Some(call.primary),
                    error_message,
                    frame: clock.frame,
                });
                bus.emit_script_call(&call, false);
            }
        }
    }
}
