use crate::config::Presentation;
use crate::ui_commands::PointerEvent;
use crate::window::WindowHandle;
use gtk4::prelude::*;
use gtk4::{
    Application, ApplicationWindow, Box as GtkBox, EventControllerMotion, GestureClick, Label,
    Orientation, Widget,
};
use gtk4_layer_shell::{Edge, KeyboardMode, Layer, LayerShell};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, warn};

const WINDOW_PADDING: i32 = 20;
const TILE_PADDING: i32 = 10;
const TILE_WIDTH: i32 = 120;
const MAX_TITLE_LENGTH: usize = 20;
const PANEL_MARGIN: i32 = 8;

/// Where pointer input on the tiles goes.
pub type PointerSink = Rc<dyn Fn(PointerEvent)>;

pub struct SwitcherWindow {
    window: ApplicationWindow,
    container: GtkBox,
    tiles: Vec<Widget>,
    highlighted: usize,
    on_pointer: PointerSink,
}

impl SwitcherWindow {
    pub fn new(app: &Application, presentation: Presentation, on_pointer: PointerSink) -> Self {
        let window = ApplicationWindow::builder()
            .application(app)
            .title("Window Switcher")
            .decorated(false)
            .resizable(false)
            .build();

        // Keyboard interactivity is off until a session takes the grab.
        window.init_layer_shell();
        window.set_layer(Layer::Overlay);
        window.set_keyboard_mode(KeyboardMode::None);

        let container = GtkBox::new(Orientation::Horizontal, TILE_PADDING);
        container.set_margin_start(WINDOW_PADDING);
        container.set_margin_end(WINDOW_PADDING);
        container.set_margin_top(WINDOW_PADDING);
        container.set_margin_bottom(WINDOW_PADDING);
        container.set_valign(gtk4::Align::Center);

        match presentation {
            // No anchors: the compositor centers the surface.
            Presentation::Overlay => {
                container.set_halign(gtk4::Align::Center);
            }
            Presentation::Panel => {
                window.set_anchor(Edge::Top, true);
                window.set_anchor(Edge::Left, true);
                window.set_anchor(Edge::Right, true);
                window.set_margin(Edge::Top, PANEL_MARGIN);
                window.add_css_class("panel");
                container.set_halign(gtk4::Align::Start);
            }
        }

        window.set_child(Some(&container));

        SwitcherWindow {
            window,
            container,
            tiles: Vec::new(),
            highlighted: 0,
            on_pointer,
        }
    }

    /// Rebuild the tiles for `windows` and present the window.
    pub fn show(&mut self, windows: Vec<WindowHandle>, highlighted: usize) {
        debug!("Building UI for {} windows", windows.len());

        while let Some(child) = self.container.first_child() {
            self.container.remove(&child);
        }
        self.tiles.clear();

        for (index, window) in windows.iter().enumerate() {
            let tile = self.create_window_tile(window, index);
            self.container.append(&tile);
            self.tiles.push(tile);
        }

        self.highlighted = highlighted.min(self.tiles.len().saturating_sub(1));
        if let Some(tile) = self.tiles.get(self.highlighted) {
            tile.add_css_class("selected");
        }

        self.window.set_visible(true);
        self.window.present();
    }

    pub fn set_highlighted(&mut self, index: usize) {
        if index >= self.tiles.len() {
            warn!("Highlight index {} out of range ({} tiles)", index, self.tiles.len());
            return;
        }
        if let Some(tile) = self.tiles.get(self.highlighted) {
            tile.remove_css_class("selected");
        }
        self.highlighted = index;
        self.tiles[index].add_css_class("selected");
    }

    fn create_window_tile(&self, window: &WindowHandle, index: usize) -> Widget {
        let vbox = GtkBox::new(Orientation::Vertical, 5);
        vbox.set_margin_start(TILE_PADDING);
        vbox.set_margin_end(TILE_PADDING);
        vbox.set_width_request(TILE_WIDTH);
        vbox.add_css_class("tile");

        let app = Label::new(Some(window.app_id.as_deref().unwrap_or("?")));
        app.add_css_class("app-id");
        vbox.append(&app);

        let title = truncate_string(&window.title, MAX_TITLE_LENGTH);
        let label = Label::new(Some(&title));
        label.set_ellipsize(gtk4::pango::EllipsizeMode::End);
        label.set_max_width_chars(MAX_TITLE_LENGTH as i32);
        vbox.append(&label);

        // A tile mapped under a resting pointer gets an enter too; only
        // movement counts as hovering.
        let motion = EventControllerMotion::new();
        let hover = Rc::new(RefCell::new(HoverTracker::default()));
        let tracker = hover.clone();
        motion.connect_enter(move |_, x, y| tracker.borrow_mut().enter(x, y));
        let tracker = hover.clone();
        let on_pointer = self.on_pointer.clone();
        motion.connect_motion(move |_, x, y| {
            if tracker.borrow_mut().motion(x, y) {
                on_pointer(PointerEvent::Select(index));
            }
        });
        motion.connect_leave(move |_| hover.borrow_mut().leave());
        vbox.add_controller(motion);

        let click = GestureClick::new();
        let on_pointer = self.on_pointer.clone();
        click.connect_released(move |_, _, _, _| on_pointer(PointerEvent::Activate(index)));
        vbox.add_controller(click);

        vbox.upcast()
    }

    /// Exclusive interactivity routes every key to this surface, keeping
    /// them from the focused client while sway still sees each release.
    pub fn set_keyboard_grab(&self, exclusive: bool) {
        let mode = if exclusive {
            KeyboardMode::Exclusive
        } else {
            KeyboardMode::None
        };
        self.window.set_keyboard_mode(mode);
    }

    /// Hide rather than close, so the GTK application stays alive.
    pub fn hide(&mut self) {
        self.window.set_visible(false);
    }
}

/// Tells pointer movement over a tile apart from a tile appearing under a
/// pointer that never moved.
#[derive(Debug, Default)]
struct HoverTracker {
    origin: Option<(f64, f64)>,
    moved: bool,
}

impl HoverTracker {
    fn enter(&mut self, x: f64, y: f64) {
        self.origin = Some((x, y));
        self.moved = false;
    }

    /// True on the first real movement since the pointer entered.
    fn motion(&mut self, x: f64, y: f64) -> bool {
        if self.moved {
            return false;
        }
        match self.origin {
            Some(origin) if origin != (x, y) => {
                self.moved = true;
                true
            }
            Some(_) => false,
            None => {
                self.origin = Some((x, y));
                false
            }
        }
    }

    fn leave(&mut self) {
        *self = HoverTracker::default();
    }
}

fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Setup CSS styling for the window switcher
pub fn setup_css() {
    let provider = gtk4::CssProvider::new();
    provider.load_from_data(
        r#"
        window {
            background-color: rgba(30, 30, 30, 0.95);
            border-radius: 10px;
            border: 2px solid rgba(100, 100, 100, 0.5);
        }

        window.panel {
            border-radius: 0;
            border-width: 0 0 2px 0;
        }

        box {
            background-color: transparent;
        }

        label {
            color: #ffffff;
            font-size: 12px;
        }

        label.app-id {
            font-weight: bold;
            font-size: 14px;
        }

        .tile {
            padding: 8px;
        }

        .selected {
            background-color: rgba(70, 130, 180, 0.7);
            border-radius: 8px;
        }
        "#,
    );

    let Some(display) = gtk4::gdk::Display::default() else {
        warn!("No default display, switcher will be unstyled");
        return;
    };
    gtk4::style_context_add_provider_for_display(
        &display,
        &provider,
        gtk4::STYLE_PROVIDER_PRIORITY_APPLICATION,
    );
}
