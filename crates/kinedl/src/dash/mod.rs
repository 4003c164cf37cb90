//! MPEG-DASH manifest handling.
//!
//! Parsing itself is done by [`dash_mpd`]; this module fetches the document, repairs a
//! known upstream defect before parsing, and turns the parsed tree into the ordered
//! segment lists of one video and one audio track.

pub mod manifest;
pub mod resolve;
mod url;

pub use manifest::{fetch_manifest, repair_manifest};
pub use resolve::{available_resolutions, segments_for, Segment, TrackSegments};
