/// Multipart HTTP binding.
pub mod http;
/// Object-storage binding.
pub mod object_store;
/// Upload and navigation ports, and the record-upload-navigate flow.
pub mod port;
