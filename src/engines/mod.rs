pub mod device;
pub mod llava;
pub mod model;
pub mod vlm;
