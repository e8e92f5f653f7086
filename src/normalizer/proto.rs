//! Generated protobuf bindings and conversion helpers.
//!
//! The wire schema is compiled by `build.rs` via `prost-build` from
//! `proto/bidofferv3.proto`. This module only adds the glue between the
//! generated types and the crate's `Event` shapes.

#![allow(clippy::all)]

include!(concat!(env!("OUT_DIR"), "/mdfeed.bidoffer.v3.rs"));

/// `units + nanos * 1e-9`, IEEE-754 double precision. Never compare the
/// result by equality; use an absolute tolerance of 1e-9.
pub(crate) fn money_to_f64(money: &Option<Money>) -> f64 {
    match money {
        Some(m) => m.units as f64 + m.nanos as f64 * 1e-9,
        None => 0.0,
    }
}

pub(crate) fn session_flag_from_i32(value: i32) -> crate::event::SessionFlag {
    crate::event::SessionFlag::from_proto(value)
}
