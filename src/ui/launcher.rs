use gtk4::gio;
use log::warn;

use crate::dispatch::{LaunchError, Launcher, WindowStatus};

/// Hands URIs to the desktop's default handlers (browser, messaging app).
pub struct DesktopLauncher;

impl DesktopLauncher {
    fn launch(uri: &str) -> Result<(), gtk4::glib::Error> {
        gio::AppInfo::launch_default_for_uri(uri, None::<&gio::AppLaunchContext>)
    }
}

impl Launcher for DesktopLauncher {
    fn navigate(&self, uri: &str) -> Result<(), LaunchError> {
        Self::launch(uri).map_err(|e| LaunchError::Navigation { uri: uri.to_string(), reason: e.to_string() })
    }

    fn open_window(&self, uri: &str) -> WindowStatus {
        match Self::launch(uri) {
            Ok(()) => WindowStatus::Opened,
            Err(e) => {
                warn!("no browser window for {uri}: {e}");
                WindowStatus::Missing
            }
        }
    }
}
