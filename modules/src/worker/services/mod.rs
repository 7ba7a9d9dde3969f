mod processor;

pub use processor::{ProcessorConfig, ProcessorService, RequestProcessor};
