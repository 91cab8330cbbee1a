//! The `viewer` crate contains everything related to visualizing the keyboard.

mod material;
mod objects;
mod scene;
mod window;

pub use window::Window;
