pub mod capture;
pub mod stop_signal;
