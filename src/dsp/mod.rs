pub mod extract;
pub mod fft;
pub mod window;
