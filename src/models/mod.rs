pub mod internal;
pub mod persona;
