//! Detection pipeline stages.
//!
//! - `preprocess`: frame → input tensor
//! - `decode`: raw layer rows → candidate boxes
//! - `nms`: overlap suppression
//! - `annotate`: drawing + `Detection` assembly
//! - `pipeline`: `Recognizer`, which chains the stages per frame

mod annotate;
mod decode;
mod nms;
mod pipeline;
mod preprocess;
mod types;

pub use annotate::{class_color, Annotator, Palette};
pub use decode::decode_outputs;
pub use nms::suppress;
pub use pipeline::Recognizer;
pub use preprocess::Preprocessor;
pub use types::{format_confidence, round_confidence, BoundingBox, Detection};
