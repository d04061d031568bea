//! Passive device-cloning stage: watches `log_pkt` traffic for a
//! `NEW_DEVICE` announcement followed by `GET_DESCRIPTOR` responses,
//! and persists whatever it accumulated to disk on the next reset.

mod cloner;

pub use cloner::{Cloner, ClonerState};
