pub mod trace;

pub use self::trace::format_trace;
