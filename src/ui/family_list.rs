use gtk4::prelude::*;
use gtk4 as gtk;

use crate::api::models::FamilyMember;

pub struct FamilyList {
    root: gtk::Box,
    list: gtk::ListBox,
}

impl FamilyList {
    pub fn new() -> Self {
        let root = gtk::Box::new(gtk::Orientation::Vertical, 6);
        root.set_margin_top(8);
        root.set_margin_bottom(8);
        root.set_margin_start(8);
        root.set_margin_end(8);

        let title = gtk::Label::new(Some("Family"));
        title.add_css_class("heading");
        title.set_halign(gtk::Align::Start);
        root.append(&title);

        let list = gtk::ListBox::new();
        list.set_selection_mode(gtk::SelectionMode::None);
        root.append(&list);

        Self { root, list }
    }

    pub fn widget(&self) -> gtk::Widget {
        self.root.clone().upcast()
    }

    pub fn set_members(&self, members: &[FamilyMember]) {
        while let Some(child) = self.list.first_child() {
            self.list.remove(&child);
        }
        if members.is_empty() {
            let empty = gtk::Label::new(Some("No family members yet."));
            empty.add_css_class("dim-label");
            self.list.append(&empty);
            return;
        }
        for member in members {
            let row = gtk::Box::new(gtk::Orientation::Vertical, 2);
            row.set_margin_top(8);
            row.set_margin_bottom(8);
            row.set_margin_start(8);
            row.set_margin_end(8);

            let name = match &member.relation {
                Some(relation) => format!("{} ({relation})", member.name),
                None => member.name.clone(),
            };
            let label = gtk::Label::new(Some(&name));
            label.set_halign(gtk::Align::Start);
            let phone = gtk::Label::new(Some(&member.phone_number));
            phone.add_css_class("dim-label");
            phone.set_halign(gtk::Align::Start);
            row.append(&label);
            row.append(&phone);
            self.list.append(&row);
        }
    }
}
