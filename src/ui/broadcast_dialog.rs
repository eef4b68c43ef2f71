use adw::prelude::*;
use gtk4 as gtk;
use log::{info, warn};
use std::cell::RefCell;
use std::rc::Rc;

use crate::api::models::{FamilyMember, MeetingPoint};
use crate::app::Services;
use crate::broadcast::{BroadcastSession, Decision, prepare_items};
use crate::dispatch::handoff::for_platform;
use crate::dispatch::{Advance, HostEvent, Platform};
use crate::ui::launcher::DesktopLauncher;

/// Walk the user through sending the "I'm OK" message to each family member.
pub fn show_broadcast_dialog(
    parent: &adw::ApplicationWindow,
    overlay: &adw::ToastOverlay,
    services: Rc<RefCell<Services>>,
    members: Vec<FamilyMember>,
    meeting_point: Option<MeetingPoint>,
    platform: Platform,
) {
    let (items, timeout, environment, country_code) = {
        let services = services.borrow();
        let ctx = services.message_context(services.settings.location, meeting_point.as_ref());
        let items = prepare_items(&members, &services.settings.message_template, &ctx);
        (
            items,
            services.settings.return_timeout(),
            services.settings.environment,
            services.settings.country_code.clone(),
        )
    };

    let session = Rc::new(RefCell::new(BroadcastSession::new(timeout)));
    if let Err(err) = session.borrow_mut().begin(items, platform) {
        overlay.add_toast(adw::Toast::new(&err.to_string()));
        return;
    }

    let dialog = gtk::Dialog::builder()
        .title(format!("I'm OK via {platform}"))
        .transient_for(parent)
        .modal(true)
        .default_width(420)
        .build();
    let content = gtk::Box::new(gtk::Orientation::Vertical, 12);
    content.set_margin_top(12);
    content.set_margin_bottom(12);
    content.set_margin_start(12);
    content.set_margin_end(12);
    let status = gtk::Label::new(None);
    status.set_wrap(true);
    status.set_halign(gtk::Align::Start);
    let preview = gtk::Label::new(None);
    preview.set_wrap(true);
    preview.add_css_class("dim-label");
    preview.set_halign(gtk::Align::Start);
    content.append(&status);
    content.append(&preview);
    dialog.content_area().append(&content);

    let _ = dialog.add_button("Stop", gtk::ResponseType::Cancel);
    let _ = dialog.add_button("Skip", gtk::ResponseType::Reject);
    let send_btn = dialog.add_button("Send", gtk::ResponseType::Accept);
    send_btn.add_css_class("suggested-action");
    let done_btn = dialog.add_button("Done", gtk::ResponseType::Close);
    done_btn.set_visible(false);

    let refresh: Rc<dyn Fn()> = {
        let session = session.clone();
        let dialog = dialog.clone();
        let done_btn = done_btn.clone();
        Rc::new(move || {
            let session = session.borrow();
            let seq = session.sequence();
            let (handled, total) = seq.progress();
            if seq.is_completed() {
                status.set_label(&format!("Everyone has been handled ({total} of {total})."));
                preview.set_label("");
                done_btn.set_visible(true);
            } else if let Some(item) = seq.current() {
                if session.is_waiting() {
                    status.set_label(&format!("Waiting for you to come back… ({handled} of {total} done)"));
                } else {
                    status.set_label(&format!(
                        "Next: {} ({}) – {} of {total}",
                        item.recipient.name,
                        item.recipient.phone_number,
                        handled + 1
                    ));
                }
                preview.set_label(&item.rendered_message);
            }
            dialog.set_response_sensitive(gtk::ResponseType::Accept, session.can_advance());
            dialog.set_response_sensitive(gtk::ResponseType::Reject, session.can_advance());
            dialog.set_response_sensitive(gtk::ResponseType::Cancel, !seq.is_completed());
        })
    };
    refresh();

    // The dialog regaining focus means the user is back from the other app.
    {
        let session = session.clone();
        let refresh = refresh.clone();
        dialog.connect_is_active_notify(move |d| {
            let event = if d.is_active() { HostEvent::FocusGained } else { HostEvent::FocusLost };
            if session.borrow_mut().handle_event(event) {
                refresh();
            }
        });
    }
    {
        let session = session.clone();
        let refresh = refresh.clone();
        dialog.connect_visible_notify(move |d| {
            let event = HostEvent::VisibilityChanged { visible: d.is_visible() };
            if session.borrow_mut().handle_event(event) {
                refresh();
            }
        });
    }

    let overlay = overlay.clone();
    dialog.connect_response(move |dlg, resp| match resp {
        gtk::ResponseType::Accept => {
            let launcher = DesktopLauncher;
            let handoff = for_platform(platform, environment, &launcher, &country_code);
            let recipient = session.borrow().sequence().current().map(|i| i.recipient.name.clone());
            let result = session.borrow_mut().advance(handoff.as_ref());
            match result {
                Ok(step) => {
                    if let Some(name) = recipient {
                        let body = format!("{platform} status message opened for {name}");
                        if let Err(e) = services.borrow().store.push_notification("I'm OK sent", &body) {
                            warn!("notification not recorded: {e}");
                        }
                    }
                    if let Some(token) = step.token {
                        let session = session.clone();
                        let refresh = refresh.clone();
                        let secs = u32::try_from(timeout.as_secs()).unwrap_or(u32::MAX);
                        glib::timeout_add_seconds_local_once(secs, move || {
                            if session.borrow_mut().handle_timeout(token) {
                                info!("no return signal; enabling the next recipient");
                                refresh();
                            }
                        });
                    }
                    if step.advance == Advance::Completed {
                        info!("broadcast complete");
                    }
                    refresh();
                }
                Err(err) => {
                    overlay.add_toast(adw::Toast::new(&err.to_string()));
                    dlg.close();
                }
            }
        }
        gtk::ResponseType::Reject => {
            let result = session.borrow_mut().decline(Decision::Skip);
            if let Err(err) = result {
                overlay.add_toast(adw::Toast::new(&err.to_string()));
            }
            refresh();
        }
        gtk::ResponseType::Close => {
            if let Err(e) = session.borrow_mut().acknowledge() {
                warn!("broadcast not acknowledged: {e}");
            }
            dlg.close();
        }
        _ => {
            if let Err(e) = session.borrow_mut().decline(Decision::CancelRemaining) {
                warn!("broadcast not stopped cleanly: {e}");
            }
            dlg.close();
        }
    });

    dialog.present();
}
