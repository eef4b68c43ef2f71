use std::cell::RefCell;
use std::time::Duration;

use pretty_assertions::assert_eq;
use quakeready::api::models::{Coordinates, FamilyMember};
use quakeready::broadcast::{BroadcastSession, Decision, prepare_items};
use quakeready::dispatch::handoff::for_platform;
use quakeready::dispatch::{Advance, DispatchError, Environment, HostEvent, LaunchError, Launcher, Platform, WindowStatus};
use quakeready::message::MessageContext;

/// Browser stand-in whose pop-up blocker kicks in after `allow` windows.
struct Browser {
    allow: usize,
    visited: RefCell<Vec<String>>,
}

impl Browser {
    fn new(allow: usize) -> Self {
        Self { allow, visited: RefCell::new(Vec::new()) }
    }
}

impl Launcher for Browser {
    fn navigate(&self, uri: &str) -> Result<(), LaunchError> {
        self.visited.borrow_mut().push(uri.to_string());
        Ok(())
    }

    fn open_window(&self, uri: &str) -> WindowStatus {
        if self.visited.borrow().len() >= self.allow {
            return WindowStatus::Closed;
        }
        self.visited.borrow_mut().push(uri.to_string());
        WindowStatus::Opened
    }
}

fn family() -> Vec<FamilyMember> {
    [("1", "Anne", "+905551112233"), ("2", "Baba", "0555 222 33 44"), ("3", "Can", "5553334455")]
        .into_iter()
        .map(|(id, name, phone)| FamilyMember {
            id: id.into(),
            name: name.into(),
            phone_number: phone.into(),
            relation: None,
        })
        .collect()
}

#[test]
fn sms_broadcast_reaches_everyone_in_order() {
    let browser = Browser::new(usize::MAX);
    let handoff = for_platform(Platform::Sms, Environment::MobileBrowser, &browser, "90");
    let ctx = MessageContext { sender: "Deniz", location: Some(Coordinates::new(41.0, 29.0)), meeting_point: None };
    let mut session = BroadcastSession::new(Duration::from_secs(60));
    session.begin(prepare_items(&family(), "{name}: {sender} OK {location}", &ctx), Platform::Sms).unwrap();

    let mut steps = Vec::new();
    while session.can_advance() {
        steps.push(session.advance(handoff.as_ref()).unwrap().advance);
        session.handle_event(HostEvent::VisibilityChanged { visible: true });
    }

    assert_eq!(steps, vec![Advance::Next { index: 1 }, Advance::Next { index: 2 }, Advance::Completed]);
    assert_eq!(
        browser.visited.borrow()[0],
        "sms:+905551112233?body=Anne%3A%20Deniz%20OK%20https%3A%2F%2Fmaps.google.com%2F%3Fq%3D41.000000%2C29.000000"
    );
    let numbers: Vec<String> = browser
        .visited
        .borrow()
        .iter()
        .map(|uri| uri.split('?').next().unwrap_or_default().to_string())
        .collect();
    assert_eq!(numbers, vec!["sms:+905551112233", "sms:+905552223344", "sms:+905553334455"]);
    assert!(session.sequence().is_completed());
    session.acknowledge().unwrap();
    assert!(!session.sequence().is_active());
}

#[test]
fn popup_blocker_stops_whatsapp_web_broadcast() {
    let browser = Browser::new(1);
    let handoff = for_platform(Platform::WhatsApp, Environment::DesktopBrowser, &browser, "90");
    let ctx = MessageContext::default();
    let mut session = BroadcastSession::new(Duration::from_secs(60));
    session.begin(prepare_items(&family(), "ok", &ctx), Platform::WhatsApp).unwrap();

    let step = session.advance(handoff.as_ref()).unwrap();
    assert!(session.handle_timeout(step.token.unwrap()));
    let err = session.advance(handoff.as_ref()).unwrap_err();

    assert_eq!(err.to_string(), "Could not open WhatsApp for Baba. The broadcast was stopped.");
    assert!(matches!(err, DispatchError::HandoffFailed { .. }));
    assert!(!session.sequence().is_active());
    assert_eq!(
        *browser.visited.borrow(),
        vec!["https://web.whatsapp.com/send?phone=905551112233&text=ok".to_string()]
    );
}

#[test]
fn skipping_a_recipient_keeps_the_rest() {
    let browser = Browser::new(usize::MAX);
    let handoff = for_platform(Platform::WhatsApp, Environment::NativeApp, &browser, "90");
    let mut session = BroadcastSession::new(Duration::from_secs(1));
    session.begin(prepare_items(&family(), "ok", &MessageContext::default()), Platform::WhatsApp).unwrap();

    session.decline(Decision::Skip).unwrap();
    let step = session.advance(handoff.as_ref()).unwrap();
    session.handle_timeout(step.token.unwrap());
    session.advance(handoff.as_ref()).unwrap();

    assert_eq!(
        *browser.visited.borrow(),
        vec![
            "whatsapp://send?phone=905552223344&text=ok".to_string(),
            "whatsapp://send?phone=905553334455&text=ok".to_string(),
        ]
    );
    assert!(session.sequence().is_completed());
}
