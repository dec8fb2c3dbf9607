pub mod stream_thread;
pub mod streams;
pub mod synchronizer;
pub mod tracking;
