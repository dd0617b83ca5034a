mod window_property;

pub use self::window_property::*;
