pub mod model;

pub use model::{load_raw_bin, read_u8, read_u16, read_u32, Image, Segment};
