pub mod clipboard;
pub mod shapes;
pub mod stroke;
pub mod text;
