use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dispatch::phone::{encode_body, normalize_phone, whatsapp_digits};
use crate::dispatch::sequencer::{DispatchItem, Platform};

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("could not open {uri}: {reason}")]
    Navigation { uri: String, reason: String },
    #[error("the window for {uri} was blocked or closed immediately")]
    Blocked { uri: String },
}

/// What became of a window opened for a hand-off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowStatus {
    Opened,
    /// A handle came back but the window was already gone.
    Closed,
    /// No handle at all, usually a pop-up blocker.
    Missing,
}

/// The host's way of leaving the app for a URI.
pub trait Launcher {
    /// Navigate the current context to `uri`. The OS gives no delivery
    /// confirmation, so `Ok` only means navigation did not fail.
    fn navigate(&self, uri: &str) -> Result<(), LaunchError>;

    /// Open `uri` in a new window or tab.
    fn open_window(&self, uri: &str) -> WindowStatus;
}

/// Where the app is running, which decides how WhatsApp is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    #[default]
    DesktopBrowser,
    MobileBrowser,
    NativeApp,
}

/// Turns one dispatch item into an external hand-off.
pub trait Handoff {
    fn platform(&self) -> Platform;

    fn uri_for(&self, item: &DispatchItem) -> String;

    fn open(&self, item: &DispatchItem) -> Result<(), LaunchError>;
}

pub struct SmsHandoff<'a> {
    launcher: &'a dyn Launcher,
    country_code: String,
}

impl<'a> SmsHandoff<'a> {
    pub fn new(launcher: &'a dyn Launcher, country_code: impl Into<String>) -> Self {
        Self { launcher, country_code: country_code.into() }
    }
}

impl Handoff for SmsHandoff<'_> {
    fn platform(&self) -> Platform {
        Platform::Sms
    }

    fn uri_for(&self, item: &DispatchItem) -> String {
        format!(
            "sms:{}?body={}",
            normalize_phone(&item.recipient.phone_number, &self.country_code),
            encode_body(&item.rendered_message)
        )
    }

    fn open(&self, item: &DispatchItem) -> Result<(), LaunchError> {
        let uri = self.uri_for(item);
        debug!("sms hand-off for {}", item.recipient.name);
        self.launcher.navigate(&uri)
    }
}

/// WhatsApp Web in a new browser tab.
pub struct WhatsAppWebHandoff<'a> {
    launcher: &'a dyn Launcher,
    country_code: String,
}

impl<'a> WhatsAppWebHandoff<'a> {
    pub fn new(launcher: &'a dyn Launcher, country_code: impl Into<String>) -> Self {
        Self { launcher, country_code: country_code.into() }
    }
}

impl Handoff for WhatsAppWebHandoff<'_> {
    fn platform(&self) -> Platform {
        Platform::WhatsApp
    }

    fn uri_for(&self, item: &DispatchItem) -> String {
        format!(
            "https://web.whatsapp.com/send?phone={}&text={}",
            whatsapp_digits(&item.recipient.phone_number, &self.country_code),
            encode_body(&item.rendered_message)
        )
    }

    fn open(&self, item: &DispatchItem) -> Result<(), LaunchError> {
        let uri = self.uri_for(item);
        match self.launcher.open_window(&uri) {
            WindowStatus::Opened => Ok(()),
            status => {
                warn!("whatsapp web window for {} not usable: {status:?}", item.recipient.name);
                Err(LaunchError::Blocked { uri })
            }
        }
    }
}

/// WhatsApp through the phone's own app, either the `wa.me` link from a
/// mobile browser or the `whatsapp:` scheme from a native shell.
pub struct WhatsAppNativeHandoff<'a> {
    launcher: &'a dyn Launcher,
    country_code: String,
    app_scheme: bool,
}

impl<'a> WhatsAppNativeHandoff<'a> {
    pub fn mobile_web(launcher: &'a dyn Launcher, country_code: impl Into<String>) -> Self {
        Self { launcher, country_code: country_code.into(), app_scheme: false }
    }

    pub fn app(launcher: &'a dyn Launcher, country_code: impl Into<String>) -> Self {
        Self { launcher, country_code: country_code.into(), app_scheme: true }
    }
}

impl Handoff for WhatsAppNativeHandoff<'_> {
    fn platform(&self) -> Platform {
        Platform::WhatsApp
    }

    fn uri_for(&self, item: &DispatchItem) -> String {
        let phone = whatsapp_digits(&item.recipient.phone_number, &self.country_code);
        let text = encode_body(&item.rendered_message);
        if self.app_scheme {
            format!("whatsapp://send?phone={phone}&text={text}")
        } else {
            format!("https://wa.me/{phone}?text={text}")
        }
    }

    fn open(&self, item: &DispatchItem) -> Result<(), LaunchError> {
        let uri = self.uri_for(item);
        self.launcher.navigate(&uri)
    }
}

/// Pick the adapter for a platform in the given environment.
pub fn for_platform<'a>(
    platform: Platform,
    environment: Environment,
    launcher: &'a dyn Launcher,
    country_code: &str,
) -> Box<dyn Handoff + 'a> {
    match (platform, environment) {
        (Platform::Sms, _) => Box::new(SmsHandoff::new(launcher, country_code)),
        (Platform::WhatsApp, Environment::DesktopBrowser) => {
            Box::new(WhatsAppWebHandoff::new(launcher, country_code))
        }
        (Platform::WhatsApp, Environment::MobileBrowser) => {
            Box::new(WhatsAppNativeHandoff::mobile_web(launcher, country_code))
        }
        (Platform::WhatsApp, Environment::NativeApp) => {
            Box::new(WhatsAppNativeHandoff::app(launcher, country_code))
        }
    }
}
