//! System tray icon with state-based updates.
//!
//! Shows a colored status dot for the sync client (running, stopped,
//! restarting) and a context menu with Log Console, Configuration, Status,
//! Restart and Quit.

use crate::{AppCommand, AppError, AppResult, TrayIconState};

use std::panic::Location;

use error_location::ErrorLocation;
use tracing::{info, instrument};
use tray_icon::menu::{Menu, MenuId, MenuItem, PredefinedMenuItem};
use tray_icon::{Icon, TrayIcon, TrayIconBuilder};

/// Edge length of the generated tray icon, in pixels.
pub(crate) const ICON_SIZE: u32 = 32;

/// IDs of the tray menu entries.
#[derive(Debug, Clone)]
pub struct MenuIds {
    /// "Log Console" entry.
    pub log_console: MenuId,
    /// "Configuration" entry.
    pub configuration: MenuId,
    /// "Status" entry.
    pub status: MenuId,
    /// "Restart" entry.
    pub restart: MenuId,
    /// "Quit" entry.
    pub quit: MenuId,
}

impl MenuIds {
    /// Command for a clicked menu entry, if it is one of ours.
    pub fn command_for(&self, id: &MenuId) -> Option<AppCommand> {
        if *id == self.log_console {
            Some(AppCommand::OpenLogConsole)
        } else if *id == self.configuration {
            Some(AppCommand::OpenConfiguration)
        } else if *id == self.status {
            Some(AppCommand::ShowStatus)
        } else if *id == self.restart {
            Some(AppCommand::Restart)
        } else if *id == self.quit {
            Some(AppCommand::Shutdown)
        } else {
            None
        }
    }
}

/// System tray icon manager.
pub struct TrayManager {
    tray_icon: TrayIcon,
    display_name: String,
    menu_ids: MenuIds,
}

impl TrayManager {
    /// Create a new tray manager in the Stopped state.
    #[track_caller]
    #[instrument]
    pub fn new(display_name: &str) -> AppResult<Self> {
        let menu = Menu::new();

        let log_console_item = MenuItem::new("Log Console", true, None);
        let configuration_item = MenuItem::new("Configuration", true, None);
        let status_item = MenuItem::new("Status", true, None);
        let restart_item = MenuItem::new("Restart", true, None);
        let quit_item = MenuItem::new("Quit", true, None);

        let menu_ids = MenuIds {
            log_console: log_console_item.id().clone(),
            configuration: configuration_item.id().clone(),
            status: status_item.id().clone(),
            restart: restart_item.id().clone(),
            quit: quit_item.id().clone(),
        };

        menu.append_items(&[
            &log_console_item,
            &configuration_item,
            &status_item,
            &restart_item,
            &PredefinedMenuItem::separator(),
            &quit_item,
        ])
        .map_err(|e| AppError::TrayError {
            reason: format!("Failed to build tray menu: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })?;

        let initial = TrayIconState::Stopped;

        let tray_icon = TrayIconBuilder::new()
            .with_tooltip(tooltip(display_name, initial))
            .with_menu(Box::new(menu))
            .with_icon(Self::load_icon(initial)?)
            .build()
            .map_err(|e| AppError::TrayError {
                reason: format!("Failed to create tray icon: {}", e),
                location: ErrorLocation::from(Location::caller()),
            })?;

        info!("System tray icon initialized");

        Ok(Self {
            tray_icon,
            display_name: display_name.to_string(),
            menu_ids,
        })
    }

    /// Update the tray icon state with new icon and tooltip.
    #[track_caller]
    #[instrument(skip(self))]
    pub fn update_state(&mut self, state: TrayIconState) -> AppResult<()> {
        self.tray_icon
            .set_icon(Some(Self::load_icon(state)?))
            .map_err(|e| AppError::TrayError {
                reason: format!("Failed to update icon: {}", e),
                location: ErrorLocation::from(Location::caller()),
            })?;

        self.tray_icon
            .set_tooltip(Some(tooltip(&self.display_name, state)))
            .map_err(|e| AppError::TrayError {
                reason: format!("Failed to update tooltip: {}", e),
                location: ErrorLocation::from(Location::caller()),
            })?;

        Ok(())
    }

    /// Menu entry IDs, for routing menu events.
    pub fn menu_ids(&self) -> &MenuIds {
        &self.menu_ids
    }

    /// Build the status dot icon for `state`.
    #[track_caller]
    fn load_icon(state: TrayIconState) -> AppResult<Icon> {
        let rgba = dot_rgba(state.color(), ICON_SIZE);

        Icon::from_rgba(rgba, ICON_SIZE, ICON_SIZE).map_err(|e| AppError::TrayError {
            reason: format!("Failed to create icon from RGBA: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })
    }
}

/// Tooltip text, e.g. "OneDrive - Running".
pub(crate) fn tooltip(display_name: &str, state: TrayIconState) -> String {
    format!("{} - {}", display_name, state.label())
}

/// RGBA pixels of a filled circle of `color` on a transparent square.
pub(crate) fn dot_rgba(color: [u8; 3], size: u32) -> Vec<u8> {
    let [r, g, b] = color;
    let center = (size as f32 - 1.0) / 2.0;
    let radius = size as f32 / 2.0 - 1.0;

    let mut rgba = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let dx = x as f32 - center;
            let dy = y as f32 - center;
            if dx * dx + dy * dy <= radius * radius {
                rgba.extend_from_slice(&[r, g, b, 0xff]);
            } else {
                rgba.extend_from_slice(&[0, 0, 0, 0]);
            }
        }
    }
    rgba
}
