pub mod record_reader;

pub use record_reader::RecordReader;
