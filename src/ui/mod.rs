pub mod broadcast_dialog;
pub mod family_list;
pub mod launcher;
pub mod login;
pub mod main_window;
