use adw::prelude::*;
use adw::Application;
use log::warn;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

use crate::api::ApiError;
use crate::api::models::{Coordinates, Earthquake, FamilyMember, MeetingPoint, NewFamilyMember};
use crate::app::{EARTHQUAKE_CACHE_KEY, FAMILY_CACHE_KEY, MEETING_POINT_CACHE_KEY, Services};
use crate::dispatch::Platform;
use crate::quakes::nearby;

const FEED_LIMIT: usize = 200;
const MIN_MAGNITUDE: f64 = 2.5;

/// Window-wide state, owned by the GTK main loop.
struct Shared {
    services: Rc<RefCell<Services>>,
    members: RefCell<Vec<FamilyMember>>,
    meeting_point: RefCell<Option<MeetingPoint>>,
    quakes: RefCell<Vec<Earthquake>>,
}

/// Fetch on the network runtime, then settle through [`Services::settle`] on
/// the main loop: fresh data is cached, a failure falls back to the cache.
fn load<T, Fut>(
    shared: &Rc<Shared>,
    overlay: &adw::ToastOverlay,
    key: &'static str,
    fetch: Fut,
    apply: impl Fn(&Shared, T) + 'static,
) where
    T: Serialize + DeserializeOwned + Send + 'static,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
{
    let rx = crate::utils::run_async_to_main(fetch);
    let shared = shared.clone();
    let overlay = overlay.clone();
    rx.attach(None, move |res| {
        let settled = shared.services.borrow_mut().settle(key, res);
        match settled {
            Ok(value) => apply(&shared, value),
            Err(err) => overlay.add_toast(adw::Toast::new(&format!("Could not load {key}: {err}"))),
        }
        glib::ControlFlow::Break
    });
}

pub fn show_main_window(app: &Application) {
    let window = adw::ApplicationWindow::builder()
        .application(app)
        .title("QuakeReady")
        .default_width(960)
        .default_height(640)
        .build();

    let overlay = adw::ToastOverlay::new();

    let split = adw::Flap::builder()
        .reveal_flap(true)
        .locked(true)
        .modal(false)
        .build();

    let family_list = Rc::new(crate::ui::family_list::FamilyList::new());
    split.set_flap(Some(&family_list.widget()));

    let quake_box = gtk4::Box::new(gtk4::Orientation::Vertical, 6);
    quake_box.set_margin_top(8);
    quake_box.set_margin_bottom(8);
    quake_box.set_margin_start(8);
    quake_box.set_margin_end(8);
    let quake_title = gtk4::Label::new(Some("Nearby earthquakes"));
    quake_title.add_css_class("heading");
    quake_title.set_halign(gtk4::Align::Start);
    quake_box.append(&quake_title);
    let quake_list = gtk4::ListBox::new();
    quake_list.set_selection_mode(gtk4::SelectionMode::None);
    let scroller = gtk4::ScrolledWindow::builder().vexpand(true).hexpand(true).child(&quake_list).build();
    quake_box.append(&scroller);
    split.set_content(Some(&quake_box));

    overlay.set_child(Some(&split));

    let container = gtk4::Box::new(gtk4::Orientation::Vertical, 0);
    let header = adw::HeaderBar::new();
    let title = gtk4::Label::new(Some("QuakeReady"));
    header.set_title_widget(Some(&title));

    let add_btn = gtk4::Button::with_label("Add Member");
    header.pack_start(&add_btn);

    let ok_btn = gtk4::Button::with_label("I'm OK");
    ok_btn.add_css_class("suggested-action");
    header.pack_end(&ok_btn);

    let platform_dropdown = gtk4::DropDown::from_strings(&["SMS", "WhatsApp"]);
    header.pack_end(&platform_dropdown);

    let location_btn = gtk4::Button::with_label("Location");
    header.pack_start(&location_btn);

    container.append(&header);
    container.append(&overlay);
    window.set_content(Some(&container));
    window.present();

    let services = match Services::from_disk() {
        Ok(services) => services,
        Err(err) => {
            overlay.add_toast(adw::Toast::new(&format!("Could not start: {err}")));
            return;
        }
    };
    platform_dropdown.set_selected(match services.settings.platform {
        Platform::Sms => 0,
        Platform::WhatsApp => 1,
    });

    let cached_members: Vec<FamilyMember> = services.store.get::<Vec<FamilyMember>>(FAMILY_CACHE_KEY).ok().flatten().unwrap_or_default();
    let cached_point: Option<MeetingPoint> = services.store.get::<Option<MeetingPoint>>(MEETING_POINT_CACHE_KEY).ok().flatten().flatten();
    let cached_quakes: Vec<Earthquake> = services.store.get::<Vec<Earthquake>>(EARTHQUAKE_CACHE_KEY).ok().flatten().unwrap_or_default();
    family_list.set_members(&cached_members);

    let shared = Rc::new(Shared {
        services: Rc::new(RefCell::new(services)),
        members: RefCell::new(cached_members),
        meeting_point: RefCell::new(cached_point),
        quakes: RefCell::new(cached_quakes),
    });

    let show_quakes: Rc<dyn Fn()> = {
        let shared = shared.clone();
        let quake_list = quake_list.clone();
        Rc::new(move || {
            while let Some(child) = quake_list.first_child() {
                quake_list.remove(&child);
            }
            let services = shared.services.borrow();
            let Some(origin) = services.settings.location else {
                let hint = gtk4::Label::new(Some("Use \"Location\" to see earthquakes near you."));
                hint.add_css_class("dim-label");
                quake_list.append(&hint);
                return;
            };
            let feed = shared.quakes.borrow();
            for near in nearby(&feed, origin, services.settings.nearby_radius_km, MIN_MAGNITUDE) {
                let text = format!(
                    "M{:.1}  {}  ({:.0} km, {})",
                    near.quake.magnitude,
                    near.quake.place,
                    near.distance_km,
                    near.quake.time.format("%Y-%m-%d %H:%M UTC")
                );
                let label = gtk4::Label::new(Some(&text));
                label.set_halign(gtk4::Align::Start);
                quake_list.append(&label);
            }
        })
    };
    show_quakes();

    // Each resource loads on its own, so one failing endpoint keeps the others.
    {
        let api = shared.services.borrow().api.clone();
        let family_list = family_list.clone();
        load(&shared, &overlay, FAMILY_CACHE_KEY, async move { api.family().await }, move |shared, members| {
            family_list.set_members(&members);
            *shared.members.borrow_mut() = members;
        });
    }
    {
        let api = shared.services.borrow().api.clone();
        load(&shared, &overlay, MEETING_POINT_CACHE_KEY, async move { api.meeting_point().await }, |shared, point| {
            *shared.meeting_point.borrow_mut() = point;
        });
    }
    {
        let api = shared.services.borrow().api.clone();
        let show_quakes = show_quakes.clone();
        load(&shared, &overlay, EARTHQUAKE_CACHE_KEY, async move { api.earthquakes(FEED_LIMIT).await }, move |shared, feed| {
            *shared.quakes.borrow_mut() = feed;
            show_quakes();
        });
    }

    {
        let shared = shared.clone();
        let overlay = overlay.clone();
        let window = window.clone();
        let show_quakes = show_quakes.clone();
        location_btn.connect_clicked(move |_| {
            show_location_dialog(&window, &overlay, &shared, show_quakes.clone());
        });
    }

    {
        let shared = shared.clone();
        let overlay = overlay.clone();
        let window = window.clone();
        let platform_dropdown = platform_dropdown.clone();
        ok_btn.connect_clicked(move |_| {
            let platform = if platform_dropdown.selected() == 1 { Platform::WhatsApp } else { Platform::Sms };
            {
                let mut services = shared.services.borrow_mut();
                if services.settings.platform != platform {
                    services.settings.platform = platform;
                    if let Err(e) = services.settings.save() {
                        warn!("platform choice not saved: {e}");
                    }
                }
            }
            let members = shared.members.borrow().clone();
            let point = shared.meeting_point.borrow().clone();
            crate::ui::broadcast_dialog::show_broadcast_dialog(
                &window,
                &overlay,
                shared.services.clone(),
                members,
                point,
                platform,
            );
        });
    }

    {
        let shared = shared.clone();
        let overlay = overlay.clone();
        let family_list = family_list.clone();
        let window = window.clone();
        add_btn.connect_clicked(move |_| {
            let dialog = gtk4::Dialog::builder().title("Add Family Member").transient_for(&window).modal(true).build();
            let content = gtk4::Box::new(gtk4::Orientation::Vertical, 12);
            content.set_margin_top(12);
            content.set_margin_bottom(12);
            content.set_margin_start(12);
            content.set_margin_end(12);

            let name_entry = gtk4::Entry::new();
            name_entry.set_placeholder_text(Some("Name"));
            let phone_entry = gtk4::Entry::new();
            phone_entry.set_placeholder_text(Some("Phone number"));
            let relation_entry = gtk4::Entry::new();
            relation_entry.set_placeholder_text(Some("Relation (optional)"));
            content.append(&name_entry);
            content.append(&phone_entry);
            content.append(&relation_entry);
            dialog.content_area().append(&content);

            let _ = dialog.add_button("Cancel", gtk4::ResponseType::Cancel);
            let save_btn = dialog.add_button("Add", gtk4::ResponseType::Ok);
            save_btn.add_css_class("suggested-action");
            dialog.set_default_response(gtk4::ResponseType::Ok);

            let shared = shared.clone();
            let overlay2 = overlay.clone();
            let family_list = family_list.clone();
            dialog.connect_response(move |dlg, resp| {
                if resp == gtk4::ResponseType::Ok {
                    let name = name_entry.text().trim().to_string();
                    let phone_number = phone_entry.text().trim().to_string();
                    let relation = relation_entry.text().trim().to_string();
                    if name.is_empty() || phone_number.is_empty() {
                        overlay2.add_toast(adw::Toast::new("Please enter a name and phone number."));
                        return;
                    }
                    let member = NewFamilyMember {
                        name,
                        phone_number,
                        relation: if relation.is_empty() { None } else { Some(relation) },
                    };
                    let api = shared.services.borrow().api.clone();
                    let rx = crate::utils::run_async_to_main(async move { api.add_family_member(&member).await });

                    let shared = shared.clone();
                    let overlay3 = overlay2.clone();
                    let family_list = family_list.clone();
                    rx.attach(None, move |res| {
                        match res {
                            Ok(added) => {
                                let members = {
                                    let mut members = shared.members.borrow_mut();
                                    members.push(added);
                                    members.clone()
                                };
                                if let Err(e) = shared.services.borrow_mut().store.put(FAMILY_CACHE_KEY, &members) {
                                    warn!("family list not cached: {e}");
                                }
                                family_list.set_members(&members);
                            }
                            Err(err) => {
                                overlay3.add_toast(adw::Toast::new(&format!("Failed to add member: {err}")));
                            }
                        }
                        glib::ControlFlow::Break
                    });
                }
                dlg.close();
            });

            dialog.present();
        });
    }
}

/// Ask for the user's coordinates; they go into the status message and the
/// nearby-quakes list, and are saved with the settings.
fn show_location_dialog(
    window: &adw::ApplicationWindow,
    overlay: &adw::ToastOverlay,
    shared: &Rc<Shared>,
    show_quakes: Rc<dyn Fn()>,
) {
    let dialog = gtk4::Dialog::builder().title("Your Location").transient_for(window).modal(true).build();
    let content = gtk4::Box::new(gtk4::Orientation::Vertical, 12);
    content.set_margin_top(12);
    content.set_margin_bottom(12);
    content.set_margin_start(12);
    content.set_margin_end(12);

    let current = shared.services.borrow().settings.location;
    let lat_entry = gtk4::Entry::new();
    lat_entry.set_placeholder_text(Some("Latitude, e.g. 41.0082"));
    let lng_entry = gtk4::Entry::new();
    lng_entry.set_placeholder_text(Some("Longitude, e.g. 28.9784"));
    if let Some(at) = current {
        lat_entry.set_text(&at.latitude.to_string());
        lng_entry.set_text(&at.longitude.to_string());
    }
    content.append(&lat_entry);
    content.append(&lng_entry);
    dialog.content_area().append(&content);

    let _ = dialog.add_button("Cancel", gtk4::ResponseType::Cancel);
    let save_btn = dialog.add_button("Save", gtk4::ResponseType::Ok);
    save_btn.add_css_class("suggested-action");
    dialog.set_default_response(gtk4::ResponseType::Ok);

    let shared = shared.clone();
    let overlay = overlay.clone();
    dialog.connect_response(move |dlg, resp| {
        if resp == gtk4::ResponseType::Ok {
            let Some(at) = Coordinates::parse(&lat_entry.text(), &lng_entry.text()) else {
                overlay.add_toast(adw::Toast::new("Latitude must be within ±90 and longitude within ±180."));
                return;
            };
            {
                let mut services = shared.services.borrow_mut();
                services.settings.location = Some(at);
                if let Err(e) = services.settings.save() {
                    warn!("location not saved: {e}");
                    overlay.add_toast(adw::Toast::new(&format!("Location kept for this session only: {e}")));
                }
            }
            show_quakes();
        }
        dlg.close();
    });

    dialog.present();
}
