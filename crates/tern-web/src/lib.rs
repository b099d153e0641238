//! # Tern Web
//!
//! Web-platform utilities built on `tern-vm-core`:
//!
//! - [`structured_clone`]: `structuredClone` semantics with buffer fast paths
//! - [`event_handler`]: lazily registered `on<event>` attributes
//! - [`event_target`] and [`event`]: the listener facility those attributes use
//! - [`webidl`]: argument-count checks and the illegal-constructor guard

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod error;
pub mod event;
pub mod event_handler;
pub mod event_target;
pub mod structured_clone;
pub mod webidl;

pub use error::{WebError, WebResult};
pub use event::{EventInit, create_event, default_prevented, prevent_default};
pub use event_handler::{HandlerWrapper, define_event_handler};
pub use event_target::{
    AddEventListenerOptions, add_event_listener, dispatch_event, remove_event_listener,
};
pub use structured_clone::{CloneMemo, CloneOptions, Cloner, clone_array_buffer, clone_value};
pub use webidl::{
    IllegalConstructorKey, check_illegal_constructor, illegal_constructor_key, required_arguments,
};
