//! Diagram session: the three-stage image pipeline (original → refined →
//! edited) and the request lifecycle around generation calls.

mod image;
mod state;

pub use image::EncodedImage;
pub use state::{DiagramSession, EditTicket, Phase, RefineTicket, SessionSnapshot};
