//! Desktop adapters for Hyprland/wlroots sessions.

pub mod grim;
pub mod hyprland;
pub mod procfs;
