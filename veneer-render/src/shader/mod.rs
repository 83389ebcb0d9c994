pub mod spirv;
pub mod ui;
