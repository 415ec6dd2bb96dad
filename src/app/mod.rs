// src/app/mod.rs

pub mod application;
pub mod launcher;

pub use application::{Application, resolve_executable};
pub use launcher::{LaunchRequest, Launcher};
