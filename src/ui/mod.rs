pub mod layout;
pub mod theme;

pub use layout::draw_ui;
