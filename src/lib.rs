pub mod arguments;
pub mod cli;
pub mod error;
pub mod manifest;
pub mod metadata;
pub mod nuget;
