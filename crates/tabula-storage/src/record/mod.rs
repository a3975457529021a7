//! Records: schemas, values, the binary codec and the record file.

mod codec;
mod file;
mod schema;
mod value;

pub use codec::{normalize_date, RecordCodec, DATE_SENTINEL};
pub use file::RecordFile;
pub use schema::{Column, Schema};
pub use value::{Record, Value};
