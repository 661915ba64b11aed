//! Hardware-independent core library for nivel-rs
//!
//! This crate contains all platform-agnostic logic for the tank level
//! controller: level sampling, the hysteresis pump actuator, status feedback
//! (display, LED bar-graph, buzzer), the debounced button mailbox, the
//! single-connection configuration service and the main cycle tying them
//! together.
//!
//! Every hardware collaborator is a trait, so the crate compiles on both the
//! ESP32-S3 target and desktop hosts (for the simulator and tests).

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod app_state;
pub mod config;
pub mod cycle;
pub mod feedback;
pub mod framebuffer;
pub mod http;
pub mod input;
pub mod pump;
pub mod sensors;

#[cfg(test)]
pub(crate) mod testing;
