pub mod counter;

pub use counter::WindowStore;
