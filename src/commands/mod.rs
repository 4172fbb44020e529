pub mod dfu;
