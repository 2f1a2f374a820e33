mod position;
mod purpose;
mod window;
mod year;

pub use position::{Position, UnknownPosition};
pub use purpose::Purpose;
pub use window::{TimeWindow, WindowGate};
pub use year::{UnknownYear, Year};
