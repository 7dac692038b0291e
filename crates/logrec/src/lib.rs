// Domain-driven module structure for logrec.

// Core engine
pub mod parser;
pub mod output;

// Process lifecycle
pub mod conf;
pub mod runtime;
