// Wall onboard runtime: command arbitration, obstacle interlocks and watchdog
// for a two-channel differential robot, driven over zenoh

pub mod config;
pub mod control;
pub mod hw;
pub mod messages;
pub mod runtime;
