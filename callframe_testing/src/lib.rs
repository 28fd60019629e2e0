//! Test support for `callframe`.
//!
//! Provides recording fakes for every call and listener capability, and a
//! global log-capture fixture.
//!
//! ```rust
//! use callframe::{call::ClientCall, metadata::Metadata};
//! use callframe_testing::{EventLog, RecordingClientCall, RecordingListener};
//!
//! let log = EventLog::new();
//! let mut call = RecordingClientCall::<u8>::new(log.clone());
//! ClientCall::<u8, u8>::start(&mut call, Box::new(RecordingListener::new(log.clone())), Metadata::new())
//!     .expect("fresh call starts");
//! assert_eq!(log.events(), ["call.start {}"]);
//! ```

pub mod logging;
pub mod recording;

pub use logging::{LoggerHandle, logger};
pub use recording::{
    EventLog,
    ListenerSlot,
    RecordingChannel,
    RecordingClientCall,
    RecordingListener,
    RecordingServerCall,
    RecordingServerListener,
};
