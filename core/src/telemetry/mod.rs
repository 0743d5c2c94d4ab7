pub mod log;
pub mod observer;

pub use log::LogManager;
pub use observer::{
    ContrastObserver, DiagnosticObserver, DiagnosticTrace, Fanout, FrameCapture,
    LogObserver, NullObserver, Trace,
};
