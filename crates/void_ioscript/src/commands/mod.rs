//! Built-in commands
//!
//! Each family registers its commands with a `register` function:
//! - control: accept, refuse, if, else, goto, gosub, return, random
//! - variable: set, inc/add, dec/sub, mul, div, mod, pow, nthroot, unset, ++, --
//! - timer: starttimer, stoptimer and the `timer<name>` pseudo-command
//! - event: sendevent, setevent, setmainevent
//! - entity: setgroup, destroy
//! - host: playanim, speak, behavior, settarget, setspeed, quest, playsound
//! - debug: showlocals, showglobals, showvars

pub mod control;
pub mod debug;
pub mod entity;
pub mod event;
pub mod host;
pub mod timer;
pub mod variable;

use crate::command::CommandRegistry;
use crate::ScriptError;

/// Register every built-in command family
pub fn register_all(registry: &mut CommandRegistry) -> Result<(), ScriptError> {
    // Control flow
    control::register(registry)?;

    // Variables and arithmetic
    variable::register(registry)?;

    // Stopwatches
    timer::register(registry)?;

    // Event routing
    event::register(registry)?;

    // Entity state
    entity::register(registry)?;

    // Gameplay commands forwarded to the host
    host::register(registry)?;

    // Variable dumps
    debug::register(registry)?;

    Ok(())
}
