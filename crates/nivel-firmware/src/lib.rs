//! ESP32-S3 firmware-specific modules for nivel-rs
//!
//! This crate contains the hardware-specific code that cannot compile on
//! desktop targets: peripheral adapters for the `nivel-core` collaborator
//! traits, the GPIO interrupt handler, the smoltcp-backed transport and the
//! Wi-Fi bring-up.

#![no_std]

extern crate alloc;

pub mod bootloader;
pub mod buttons;
pub mod hardware;
pub mod net;
pub mod wifi_secrets;
