pub mod ist;
