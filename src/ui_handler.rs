use crate::ui::SwitcherWindow;
use crate::ui_commands::UiCommand;
use gtk4::Application;
use gtk4::prelude::*;
use std::cell::RefCell;
use std::rc::Rc;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Handles UI commands and dispatches them to the SwitcherWindow.
/// Quits `app` once the daemon drops its end of the channel.
pub fn handle_ui_commands(
    app: Application,
    switcher: Rc<RefCell<SwitcherWindow>>,
    mut ui_rx: mpsc::UnboundedReceiver<UiCommand>,
) {
    info!("UI command handler started");

    // Use glib to handle commands on the GTK main thread
    glib::spawn_future_local(async move {
        while let Some(command) = ui_rx.recv().await {
            match command {
                UiCommand::Show {
                    windows,
                    highlighted,
                } => {
                    debug!("Showing UI with {} windows, index {}", windows.len(), highlighted);
                    switcher.borrow_mut().show(windows, highlighted);
                }
                UiCommand::SetHighlighted { index } => {
                    debug!("Highlighting tile {}", index);
                    switcher.borrow_mut().set_highlighted(index);
                }
                UiCommand::Hide => {
                    debug!("Hiding UI");
                    switcher.borrow_mut().hide();
                }
                UiCommand::SetKeyboardGrab { exclusive } => {
                    debug!("Keyboard grab on surface: {}", exclusive);
                    switcher.borrow().set_keyboard_grab(exclusive);
                }
            }
        }

        info!("Daemon gone, quitting UI");
        app.quit();
    });
}
