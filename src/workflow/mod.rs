pub mod discovery;
pub mod endpoint;
pub mod flows;
pub mod intake;
pub mod translate;
pub mod types;
