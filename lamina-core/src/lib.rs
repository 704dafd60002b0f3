//! # lamina-core
//!
//! Action dispatch and resource locking for lamina. Every mutation of
//! application state is an [`Action`](action::Action) that is validated and
//! run on one owning thread; actions that need a locked resource are parked
//! and retried when it unlocks. State lives in observable
//! [`StateVariable`](state::StateVariable)s grouped by
//! [`StateHandler`](state::StateHandler)s.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use lamina_core::action::NullContext;
//! use lamina_core::{actions::ActivateLayer, ActionDispatcher, ActionRegistry, AppState, Config};
//!
//! let config = Config::load();
//! let dispatcher = ActionDispatcher::spawn(&config)?;
//! let app = AppState::new(&config, dispatcher.handle());
//!
//! // From any thread:
//! ActivateLayer::dispatch(&app.dispatcher, &app.layers, &layer);
//!
//! // Or from text:
//! let registry = ActionRegistry::with_builtin_actions();
//! registry.dispatch_string("ActivateLayer layer=1", &app, Box::new(NullContext))?;
//! ```
//!
//! ## Module Overview
//!
//! - [`state`]: `StateVariable`, `Signal`, `StateHandler`, `StateEngine`
//! - [`resource`]: `ResourceLock` and its RAII `ResourceGuard`
//! - [`action`]: the `Action` trait, contexts, text parsing, `ActionRegistry`
//! - [`dispatch`]: `ActionDispatcher`, `DispatcherHandle`, `DispatchLoop`
//! - [`actions`]: the concrete actions
//! - [`layer`], [`interface`], [`tool`]: the state handlers actions operate on
//! - [`config`]: TOML configuration (embedded defaults + user override)

pub mod action;
pub mod actions;
pub mod app;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod interface;
pub mod layer;
pub mod resource;
pub mod state;
pub mod tool;

pub use action::{Action, ActionContext, ActionRegistry, Validation};
pub use app::AppState;
pub use config::Config;
pub use dispatch::{ActionDispatcher, DispatcherHandle};
pub use error::{ActionError, StateError};
pub use resource::{ResourceGuard, ResourceLock, ResourceLockHandle};

pub use lamina_types::{LayerData, LayerId, LayerIoDescriptor, LayerIoMode, LayerKind, ParamValue};
