//! The tutorial workflows, one compiled graph each.

pub mod calculator;
pub mod chat;
pub mod greeting;
pub mod looping;
pub mod process;
