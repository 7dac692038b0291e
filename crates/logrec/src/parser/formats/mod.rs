/// Concrete log format grammars

pub mod apt_history;

pub use apt_history::{AptHistoryEntry, AptHistoryFormat};
