pub mod persona;
