#![cfg_attr(not(test), no_std)]

pub mod configuration;
pub mod design_parameters;
pub mod frame_buffer;
pub mod sample_source;
pub mod sampler;
pub mod settings;
pub mod streamer;

#[cfg(target_os = "none")]
pub mod hardware;
