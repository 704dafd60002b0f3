use std::sync::Arc;

use lamina_types::ParamValue;

use crate::action::{Action, ActionArgs, ActionContext, ActionHandle, RegisteredAction, RunResult, Validation};
use crate::app::AppState;
use crate::dispatch::DispatcherHandle;
use crate::error::ActionError;
use crate::interface::InterfaceManager;

fn check_windowid(interface: &InterfaceManager, windowid: &str) -> Validation {
    if interface.is_windowid(windowid) {
        Validation::Ready
    } else {
        Validation::Invalid(format!("WindowID: '{}' is invalid", windowid))
    }
}

/// Ask the front end to show a window, and mark it visible.
#[derive(Debug)]
pub struct ShowWindow {
    windowid: String,
    interface: Arc<InterfaceManager>,
}

impl ShowWindow {
    pub fn create(interface: &Arc<InterfaceManager>, windowid: &str) -> ActionHandle {
        Box::new(Self {
            windowid: windowid.to_string(),
            interface: Arc::clone(interface),
        })
    }

    pub fn dispatch(dispatcher: &DispatcherHandle, interface: &Arc<InterfaceManager>, windowid: &str) {
        dispatcher.post(Self::create(interface, windowid));
    }
}

impl Action for ShowWindow {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn validate(&mut self, _ctx: &dyn ActionContext) -> Validation {
        check_windowid(&self.interface, &self.windowid)
    }

    fn run(&mut self, _ctx: &dyn ActionContext) -> RunResult {
        if let Some(visible) = self.interface.visibility(&self.windowid) {
            visible.set(true);
        }
        self.interface.show_window.emit(&self.windowid);
        Ok(None)
    }

    fn params(&self) -> Vec<(&'static str, ParamValue)> {
        vec![("windowid", self.windowid.clone().into())]
    }
}

impl RegisteredAction for ShowWindow {
    const TYPE_NAME: &'static str = "ShowWindow";
    const PARAMS: &'static [&'static str] = &["windowid"];

    fn from_args(args: &ActionArgs, app: &AppState) -> Result<Self, ActionError> {
        Ok(Self {
            windowid: args.require("windowid")?.trim().to_string(),
            interface: Arc::clone(&app.interface),
        })
    }
}

/// Ask the front end to close a window, and mark it hidden.
#[derive(Debug)]
pub struct CloseWindow {
    windowid: String,
    interface: Arc<InterfaceManager>,
}

impl CloseWindow {
    pub fn create(interface: &Arc<InterfaceManager>, windowid: &str) -> ActionHandle {
        Box::new(Self {
            windowid: windowid.to_string(),
            interface: Arc::clone(interface),
        })
    }

    pub fn dispatch(dispatcher: &DispatcherHandle, interface: &Arc<InterfaceManager>, windowid: &str) {
        dispatcher.post(Self::create(interface, windowid));
    }
}

impl Action for CloseWindow {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn validate(&mut self, _ctx: &dyn ActionContext) -> Validation {
        check_windowid(&self.interface, &self.windowid)
    }

    fn run(&mut self, _ctx: &dyn ActionContext) -> RunResult {
        if let Some(visible) = self.interface.visibility(&self.windowid) {
            visible.set(false);
        }
        self.interface.close_window.emit(&self.windowid);
        Ok(None)
    }

    fn params(&self) -> Vec<(&'static str, ParamValue)> {
        vec![("windowid", self.windowid.clone().into())]
    }
}

impl RegisteredAction for CloseWindow {
    const TYPE_NAME: &'static str = "CloseWindow";
    const PARAMS: &'static [&'static str] = &["windowid"];

    fn from_args(args: &ActionArgs, app: &AppState) -> Result<Self, ActionError> {
        Ok(Self {
            windowid: args.require("windowid")?.trim().to_string(),
            interface: Arc::clone(&app.interface),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::NullContext;
    use parking_lot::Mutex;

    #[test]
    fn test_show_then_close_updates_state_and_signals() {
        let interface = Arc::new(InterfaceManager::new(&["history".to_string()]));
        let shown = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&shown);
        let _sub = interface.show_window.connect(move |id: &String| sink.lock().push(id.clone()));

        let mut show = ShowWindow::create(&interface, "history");
        assert!(matches!(show.validate(&NullContext), Validation::Ready));
        show.run(&NullContext).unwrap();
        assert!(interface.visibility("history").unwrap().get());
        assert_eq!(*shown.lock(), vec!["history".to_string()]);

        let mut close = CloseWindow::create(&interface, "history");
        close.run(&NullContext).unwrap();
        assert!(!interface.visibility("history").unwrap().get());
    }

    #[test]
    fn test_unknown_window_is_invalid() {
        let interface = Arc::new(InterfaceManager::new(&[]));
        let mut show = ShowWindow::create(&interface, "viewer1");
        assert!(matches!(show.validate(&NullContext), Validation::Invalid(_)));
        interface.add_windowid("viewer1");
        assert!(matches!(show.validate(&NullContext), Validation::Ready));
    }
}
