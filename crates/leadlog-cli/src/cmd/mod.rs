pub mod audit;
pub mod comment;
pub mod completions;
pub mod convert;
pub mod history;
pub mod init;
pub mod lead;
pub mod move_cmd;
pub mod reasons;
pub mod reject;
